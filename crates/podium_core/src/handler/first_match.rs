//! Priority-ordered selection of exactly one handler.

use super::{AsyncHandler, BoxedHandler};
use crate::error::{Error, Result};
use async_trait::async_trait;

/// Hands the input to the first candidate whose `can_handle` accepts it.
///
/// Candidates are probed in the order they were given. If none accepts, the
/// failure is the [`Error::aggregate`] of every rejection, so nesting this
/// handler inside another composite still reads as "unsupported".
pub struct FirstMatchHandler<I, O> {
    handlers: Vec<BoxedHandler<I, O>>,
}

impl<I, O> FirstMatchHandler<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    /// Creates a handler over `handlers`, highest priority first.
    pub fn new(handlers: Vec<BoxedHandler<I, O>>) -> Self {
        Self { handlers }
    }

    /// Returns the number of candidates.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if there are no candidates.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    async fn find_handler(&self, input: &I) -> Result<&BoxedHandler<I, O>> {
        let mut errors = Vec::new();
        for handler in &self.handlers {
            match handler.can_handle(input).await {
                Ok(()) => return Ok(handler),
                Err(err) => errors.push(err),
            }
        }
        Err(Error::aggregate(errors))
    }
}

#[async_trait]
impl<I, O> AsyncHandler<I, O> for FirstMatchHandler<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    async fn can_handle(&self, input: &I) -> Result<()> {
        self.find_handler(input).await.map(|_| ())
    }

    async fn handle(&self, input: &I) -> Result<O> {
        self.find_handler(input).await?.handle(input).await
    }

    async fn handle_safe(&self, input: &I) -> Result<O> {
        // find_handler already ran can_handle on the chosen candidate
        self.handle(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::ErrorKind;

    #[tokio::test]
    async fn test_skips_rejecting_handler() {
        let log = new_log();
        let composite = FirstMatchHandler::new(vec![
            boxed(Recorder::new("a", &log).rejecting()),
            boxed(Recorder::new("b", &log)),
        ]);

        let result = composite.handle_safe(&"x".to_string()).await.unwrap();
        assert_eq!(result, "b:x");
        assert!(!entries(&log).contains(&"a.handle".to_string()));
    }

    #[tokio::test]
    async fn test_short_circuits() {
        let log = new_log();
        let composite = FirstMatchHandler::new(vec![
            boxed(Recorder::new("a", &log)),
            boxed(Recorder::new("b", &log)),
        ]);

        composite.handle_safe(&"x".to_string()).await.unwrap();
        assert_eq!(entries(&log), vec!["a.can_handle", "a.handle"]);
    }

    #[tokio::test]
    async fn test_none_accepting_aggregates_rejections() {
        let log = new_log();
        let composite = FirstMatchHandler::new(vec![
            boxed(Recorder::new("a", &log).rejecting()),
            boxed(Recorder::new("b", &log).rejecting()),
        ]);

        let err = composite.can_handle(&"x".to_string()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(err.to_string().contains("a rejects"));
        assert!(err.to_string().contains("b rejects"));
    }

    #[tokio::test]
    async fn test_handle_error_is_not_retried() {
        let log = new_log();
        let composite = FirstMatchHandler::new(vec![
            boxed(Recorder::new("a", &log).failing()),
            boxed(Recorder::new("b", &log)),
        ]);

        let err = composite.handle_safe(&"x".to_string()).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert!(!entries(&log).contains(&"b.handle".to_string()));
    }

    #[tokio::test]
    async fn test_empty_rejects() {
        let composite: FirstMatchHandler<String, String> = FirstMatchHandler::new(vec![]);
        assert!(composite.is_empty());
        let err = composite.can_handle(&"x".to_string()).await.unwrap_err();
        assert!(err.is_unsupported());
    }
}
