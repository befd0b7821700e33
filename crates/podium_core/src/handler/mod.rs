//! Composable request handlers.
//!
//! A handler separates the cheap question "can I handle this?" from the
//! actual work, which lets the composites below route an input without
//! performing (and rolling back) side effects:
//!
//! - [`FirstMatchHandler`]: the first candidate that accepts handles the input
//! - [`RunAllHandler`]: every candidate handles the input, in order
//! - [`FirstSuccessHandler`]: the first candidate that *succeeds* wins
//! - [`ParallelHandler`]: every candidate handles the input concurrently
//!
//! Composites are handlers themselves, so they nest arbitrarily.
//!
//! ```rust,ignore
//! use podium_core::handler::{AsyncHandler, FirstMatchHandler};
//!
//! let router = FirstMatchHandler::new(vec![get_handler, put_handler]);
//! let response = router.handle_safe(&operation).await?;
//! ```

mod first_match;
mod first_success;
mod parallel;
mod run_all;

pub use first_match::FirstMatchHandler;
pub use first_success::FirstSuccessHandler;
pub use parallel::ParallelHandler;
pub use run_all::RunAllHandler;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A unit of request-handling logic over a fixed input/output pair.
///
/// Implementations keep no per-call state; anything shared (a store, a
/// registry) is injected at construction time.
#[async_trait]
pub trait AsyncHandler<I, O = ()>: Send + Sync
where
    I: Send + Sync,
    O: Send,
{
    /// Checks, without side effects, whether this handler supports `input`.
    ///
    /// Fails with [`Error::NotSupported`](crate::Error::NotSupported) (or any
    /// other error carrying the reason) when it does not.
    async fn can_handle(&self, _input: &I) -> Result<()> {
        Ok(())
    }

    /// Performs the work. Only called after `can_handle` accepted the input.
    async fn handle(&self, input: &I) -> Result<O>;

    /// Runs `can_handle` and, if it accepts, `handle`.
    async fn handle_safe(&self, input: &I) -> Result<O> {
        self.can_handle(input).await?;
        self.handle(input).await
    }
}

/// A shared, type-erased handler as held by the composites.
pub type BoxedHandler<I, O = ()> = Arc<dyn AsyncHandler<I, O>>;

/// Accepts every input and returns a clone of a fixed value.
#[derive(Debug, Clone)]
pub struct StaticHandler<O> {
    value: O,
}

impl<O> StaticHandler<O> {
    /// Creates a handler that always returns `value`.
    pub fn new(value: O) -> Self {
        Self { value }
    }
}

#[async_trait]
impl<I, O> AsyncHandler<I, O> for StaticHandler<O>
where
    I: Send + Sync,
    O: Clone + Send + Sync,
{
    async fn handle(&self, _input: &I) -> Result<O> {
        Ok(self.value.clone())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_handle_safe_checks_first() {
        let log = new_log();
        let handler = Recorder::new("a", &log).rejecting();
        let result = handler.handle_safe(&"x".to_string()).await;
        assert!(result.unwrap_err().is_unsupported());
        assert_eq!(entries(&log), vec!["a.can_handle"]);
    }

    #[tokio::test]
    async fn test_handle_safe_propagates_handle_error() {
        let log = new_log();
        let handler = Recorder::new("a", &log).failing();
        let result = handler.handle_safe(&"x".to_string()).await;
        assert!(matches!(result, Err(crate::Error::Internal(_))));
        assert_eq!(entries(&log), vec!["a.can_handle", "a.handle"]);
    }

    #[tokio::test]
    async fn test_static_handler() {
        let handler = StaticHandler::new(7u32);
        let value = AsyncHandler::<String, u32>::handle_safe(&handler, &"x".to_string())
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
