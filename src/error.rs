use std::fmt;

use thiserror::Error;

/// Why the pool could not hand out a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionFailure {
    /// No connection became available within the configured acquire timeout.
    Timeout,
    /// The pool has been closed by `destroy()`.
    Closed,
    /// The connector failed to open a new physical connection.
    Backend(String),
}

impl fmt::Display for AcquisitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("Timeout"),
            Self::Closed => f.write_str("pool is closed"),
            Self::Backend(msg) => write!(f, "{msg}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TdsMiddlewareError {
    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error("Connection acquisition error: {0}")]
    AcquisitionError(AcquisitionFailure),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Transform error on column {column} (result set {result_set}): {message}")]
    TransformError {
        column: String,
        result_set: usize,
        message: String,
    },

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),
}

impl TdsMiddlewareError {
    /// True for failures that happened before a connection was handed out.
    #[must_use]
    pub fn is_acquisition(&self) -> bool {
        matches!(self, Self::AcquisitionError(_))
    }
}

impl From<deadpool::managed::PoolError<TdsMiddlewareError>> for TdsMiddlewareError {
    fn from(err: deadpool::managed::PoolError<TdsMiddlewareError>) -> Self {
        use deadpool::managed::PoolError;

        let failure = match err {
            PoolError::Timeout(_) => AcquisitionFailure::Timeout,
            PoolError::Closed => AcquisitionFailure::Closed,
            PoolError::Backend(e) => AcquisitionFailure::Backend(e.to_string()),
            #[allow(unreachable_patterns)]
            other => AcquisitionFailure::Backend(other.to_string()),
        };
        TdsMiddlewareError::AcquisitionError(failure)
    }
}
