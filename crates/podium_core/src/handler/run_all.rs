//! Unconditional fan-out over every handler, in order.

use super::{AsyncHandler, BoxedHandler};
use crate::error::Result;
use async_trait::async_trait;

/// Calls `handle` on every candidate in order, ignoring `can_handle`.
///
/// Meant for side-effecting passes where every registered unit must run
/// (loggers, notifiers, metric taps). The result of the last candidate is
/// returned, or `None` when there are no candidates. The first failure
/// aborts the iteration and is propagated unchanged.
pub struct RunAllHandler<I, O> {
    handlers: Vec<BoxedHandler<I, O>>,
}

impl<I, O> RunAllHandler<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    /// Creates a handler that runs all `handlers` in the given order.
    pub fn new(handlers: Vec<BoxedHandler<I, O>>) -> Self {
        Self { handlers }
    }
}

#[async_trait]
impl<I, O> AsyncHandler<I, Option<O>> for RunAllHandler<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    async fn handle(&self, input: &I) -> Result<Option<O>> {
        let mut result = None;
        for handler in &self.handlers {
            result = Some(handler.handle(input).await?);
        }
        Ok(result)
    }
}
