//! Logger injected into every component.
//!
//! Callers pick a sink through [`LoggerConfig`]: their own [`Logger`]
//! object, a plain function, `true` for diagnostic output through `tracing`,
//! or nothing at all.

use std::fmt;
use std::sync::Arc;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// Anything that accepts `log(level, message)` calls.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

impl<F> Logger for F
where
    F: Fn(LogLevel, &str) + Send + Sync,
{
    fn log(&self, level: LogLevel, message: &str) {
        self(level, message);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Forwards to `tracing` events under the `tds_middleware` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "tds_middleware", "{message}"),
            LogLevel::Info => tracing::info!(target: "tds_middleware", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "tds_middleware", "{message}"),
            LogLevel::Error => tracing::error!(target: "tds_middleware", "{message}"),
        }
    }
}

/// How the caller asked for logging to be wired.
#[derive(Clone, Default)]
pub enum LoggerConfig {
    /// No logging.
    #[default]
    Disabled,
    /// Diagnostic output through `tracing`, under the `tds_middleware`
    /// target. Nothing is printed unless the application installs a
    /// subscriber.
    Enabled,
    /// A caller-supplied logger.
    Custom(Arc<dyn Logger>),
}

impl LoggerConfig {
    /// Wrap a plain function as the logger.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(LogLevel, &str) + Send + Sync + 'static,
    {
        LoggerConfig::Custom(Arc::new(f))
    }

    /// Resolve into the logger handed to each component.
    #[must_use]
    pub fn into_logger(self) -> Arc<dyn Logger> {
        match self {
            LoggerConfig::Disabled => Arc::new(NoopLogger),
            LoggerConfig::Enabled => Arc::new(TracingLogger),
            LoggerConfig::Custom(logger) => logger,
        }
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Enabled => f.write_str("Enabled"),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<Logger>").finish(),
        }
    }
}

/// `true` logs through `tracing` (a subscriber must be installed to see the
/// output); `false` disables logging.
impl From<bool> for LoggerConfig {
    fn from(enabled: bool) -> Self {
        if enabled {
            LoggerConfig::Enabled
        } else {
            LoggerConfig::Disabled
        }
    }
}

impl From<Option<bool>> for LoggerConfig {
    fn from(enabled: Option<bool>) -> Self {
        enabled.map_or(LoggerConfig::Disabled, LoggerConfig::from)
    }
}

impl From<Arc<dyn Logger>> for LoggerConfig {
    fn from(logger: Arc<dyn Logger>) -> Self {
        LoggerConfig::Custom(logger)
    }
}
