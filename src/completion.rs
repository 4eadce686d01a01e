//! One completion event, fanned out to an optional callback and to the
//! value returned by the operation.

use std::fmt;
use std::sync::Arc;

use crate::error::TdsMiddlewareError;
use crate::logging::{LogLevel, Logger};

/// Callback invoked with the same outcome the operation returns.
pub type Callback<T> = Box<dyn FnOnce(Result<&T, &TdsMiddlewareError>) + Send>;

/// Box a closure as a [`Callback`].
pub fn callback<T, F>(f: F) -> Callback<T>
where
    F: FnOnce(Result<&T, &TdsMiddlewareError>) + Send + 'static,
{
    Box::new(f)
}

pub(crate) struct Completion<T> {
    callback: Option<Callback<T>>,
    logger: Arc<dyn Logger>,
}

impl<T> Completion<T> {
    pub(crate) fn new(callback: Option<Callback<T>>, logger: Arc<dyn Logger>) -> Self {
        Self { callback, logger }
    }

    /// Log a failure, hand the outcome to the callback, then return it.
    pub(crate) fn settle(
        self,
        result: Result<T, TdsMiddlewareError>,
    ) -> Result<T, TdsMiddlewareError> {
        if let Err(err) = &result {
            self.logger.log(LogLevel::Error, &err.to_string());
        }
        if let Some(callback) = self.callback {
            callback(result.as_ref());
        }
        result
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}
