use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use deadpool::managed::{Manager, Metrics, RecycleError, RecycleResult};

use crate::error::TdsMiddlewareError;
use crate::logging::{LogLevel, Logger};
use crate::protocol::{Connector, ProtocolConnection};

/// A pooled connection plus the moment it was last returned to the pool.
#[derive(Debug)]
pub struct TrackedConnection<T> {
    pub(crate) conn: T,
    returned_at: Instant,
}

impl<T> TrackedConnection<T> {
    fn new(conn: T) -> Self {
        Self {
            conn,
            returned_at: Instant::now(),
        }
    }

    pub(crate) fn mark_returned(&mut self) {
        self.returned_at = Instant::now();
    }

    /// Time spent in the pool since the last release.
    pub(crate) fn idle_for(&self) -> Duration {
        self.returned_at.elapsed()
    }
}

/// deadpool manager that opens connections through a [`Connector`].
///
/// Connections that report themselves broken, or that sat idle for longer
/// than the idle timeout, are not handed out again.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    idle_timeout: Duration,
    logger: Arc<dyn Logger>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, idle_timeout: Duration, logger: Arc<dyn Logger>) -> Self {
        Self {
            connector,
            idle_timeout,
            logger,
        }
    }
}

impl<C: Connector> Manager for ConnectionManager<C> {
    type Type = TrackedConnection<C::Connection>;
    type Error = TdsMiddlewareError;

    async fn create(&self) -> Result<Self::Type, TdsMiddlewareError> {
        self.logger.log(LogLevel::Debug, "opening connection");
        self.connector.connect().await.map(TrackedConnection::new)
    }

    async fn recycle(
        &self,
        tracked: &mut Self::Type,
        _metrics: &Metrics,
    ) -> RecycleResult<TdsMiddlewareError> {
        if tracked.conn.is_broken() {
            self.logger.log(LogLevel::Debug, "discarding broken connection");
            return Err(RecycleError::Message("connection is broken".into()));
        }
        // deadpool's own metrics stamp hand-out time, not return time
        if tracked.idle_for() > self.idle_timeout {
            self.logger
                .log(LogLevel::Debug, "discarding connection past idle timeout");
            return Err(RecycleError::Message("idle timeout exceeded".into()));
        }
        Ok(())
    }
}

impl<C: Connector> fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}
