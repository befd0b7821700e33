//! Reactions to completed writes.

use crate::state::{Event, EventBroadcaster};
use async_trait::async_trait;
use podium_core::{AsyncHandler, BoxedHandler, Result, RunAllHandler};
use podium_store::ModifiedResource;
use std::sync::Arc;

/// Logs every modification at debug level.
pub struct LoggingListener;

#[async_trait]
impl AsyncHandler<Vec<ModifiedResource>> for LoggingListener {
    async fn handle(&self, input: &Vec<ModifiedResource>) -> Result<()> {
        for change in input {
            tracing::debug!(
                resource = %change.identifier(),
                modification = %change.modification_type(),
                "Resource modified"
            );
        }
        Ok(())
    }
}

/// Publishes every modification to the notification subscribers.
pub struct BroadcastListener {
    broadcaster: Arc<EventBroadcaster>,
}

impl BroadcastListener {
    pub fn new(broadcaster: Arc<EventBroadcaster>) -> Self {
        Self { broadcaster }
    }
}

#[async_trait]
impl AsyncHandler<Vec<ModifiedResource>> for BroadcastListener {
    async fn handle(&self, input: &Vec<ModifiedResource>) -> Result<()> {
        for change in input {
            self.broadcaster
                .broadcast(Event::ResourceModified(change.clone()));
        }
        Ok(())
    }
}

/// Every listener, run in order.
pub fn change_listener(
    broadcaster: Arc<EventBroadcaster>,
) -> BoxedHandler<Vec<ModifiedResource>, Option<()>> {
    Arc::new(RunAllHandler::new(vec![
        Arc::new(LoggingListener) as BoxedHandler<Vec<ModifiedResource>>,
        Arc::new(BroadcastListener::new(broadcaster)),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use podium_store::{create_modified_resource, ModificationType, ResourceIdentifier};

    #[tokio::test]
    async fn test_changes_are_broadcast_in_order() {
        let broadcaster = Arc::new(EventBroadcaster::new());
        let mut rx = broadcaster.subscribe();
        let listener = change_listener(broadcaster.clone());

        let changes = vec![
            create_modified_resource(
                ResourceIdentifier::parse("http://h/c/").unwrap(),
                ModificationType::Changed,
            ),
            create_modified_resource(
                ResourceIdentifier::parse("http://h/c/doc").unwrap(),
                ModificationType::Created,
            ),
        ];
        listener.handle_safe(&changes).await.unwrap();

        for expected in &changes {
            match rx.recv().await.unwrap() {
                Event::ResourceModified(change) => assert_eq!(&change, expected),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }
}
