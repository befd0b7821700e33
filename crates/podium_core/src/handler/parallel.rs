//! Concurrent fan-out over every handler.

use super::{AsyncHandler, BoxedHandler};
use crate::error::Result;
use async_trait::async_trait;
use futures::future::try_join_all;

/// Runs every candidate concurrently and collects their results.
///
/// `can_handle` only accepts when every candidate accepts. Results keep the
/// candidate order; the first failure fails the whole call.
pub struct ParallelHandler<I, O> {
    handlers: Vec<BoxedHandler<I, O>>,
}

impl<I, O> ParallelHandler<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    /// Creates a handler over `handlers`.
    pub fn new(handlers: Vec<BoxedHandler<I, O>>) -> Self {
        Self { handlers }
    }
}

#[async_trait]
impl<I, O> AsyncHandler<I, Vec<O>> for ParallelHandler<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    async fn can_handle(&self, input: &I) -> Result<()> {
        try_join_all(self.handlers.iter().map(|h| h.can_handle(input))).await?;
        Ok(())
    }

    async fn handle(&self, input: &I) -> Result<Vec<O>> {
        try_join_all(self.handlers.iter().map(|h| h.handle(input))).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_collects_in_order() {
        let log = new_log();
        let composite = ParallelHandler::new(vec![
            boxed(Recorder::new("a", &log)),
            boxed(Recorder::new("b", &log)),
        ]);

        let results = composite.handle_safe(&"x".to_string()).await.unwrap();
        assert_eq!(results, vec!["a:x", "b:x"]);
    }

    #[tokio::test]
    async fn test_requires_all_to_accept() {
        let log = new_log();
        let composite = ParallelHandler::new(vec![
            boxed(Recorder::new("a", &log)),
            boxed(Recorder::new("b", &log).rejecting()),
        ]);

        assert!(composite.handle_safe(&"x".to_string()).await.is_err());
        assert!(!entries(&log).iter().any(|e| e.ends_with(".handle")));
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let log = new_log();
        let composite = ParallelHandler::new(vec![
            boxed(Recorder::new("a", &log)),
            boxed(Recorder::new("b", &log).failing()),
        ]);

        assert!(composite.handle(&"x".to_string()).await.is_err());
    }
}
