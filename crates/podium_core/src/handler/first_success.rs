//! Try every handler until one succeeds.

use super::{AsyncHandler, BoxedHandler};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

/// Returns the result of the first candidate whose `handle_safe` succeeds.
///
/// Unlike [`FirstMatchHandler`](super::FirstMatchHandler) a candidate that
/// accepts the input but then fails does not end the search. Intermediate
/// failures are recorded and only surface, as an aggregate, when every
/// candidate failed.
pub struct FirstSuccessHandler<I, O> {
    handlers: Vec<BoxedHandler<I, O>>,
}

impl<I, O> FirstSuccessHandler<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    /// Creates a handler that tries `handlers` in the given order.
    pub fn new(handlers: Vec<BoxedHandler<I, O>>) -> Self {
        Self { handlers }
    }
}

#[async_trait]
impl<I, O> AsyncHandler<I, O> for FirstSuccessHandler<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    /// Accepts when at least one candidate accepts.
    async fn can_handle(&self, input: &I) -> Result<()> {
        let mut errors = Vec::new();
        for handler in &self.handlers {
            match handler.can_handle(input).await {
                Ok(()) => return Ok(()),
                Err(err) => errors.push(err),
            }
        }
        Err(Error::aggregate(errors))
    }

    async fn handle(&self, input: &I) -> Result<O> {
        let mut errors = Vec::new();
        for (index, handler) in self.handlers.iter().enumerate() {
            match handler.handle_safe(input).await {
                Ok(output) => return Ok(output),
                Err(err) => {
                    debug!(index, error = %err, "handler failed, trying next");
                    errors.push(err);
                }
            }
        }
        Err(Error::aggregate(errors))
    }

    async fn handle_safe(&self, input: &I) -> Result<O> {
        // every candidate is already checked by its own handle_safe
        self.handle(input).await
    }
}
