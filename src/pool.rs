//! Connection gateway over a `deadpool` managed pool.
//!
//! Every successful acquisition yields a [`PooledConnection`]; dropping it is
//! the one and only release, so each acquisition is paired with exactly one
//! release whichever way the borrowing operation exits.

mod connection;
mod manager;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use deadpool::Runtime;

pub use connection::PooledConnection;
pub use manager::{ConnectionManager, TrackedConnection};

use crate::config::PoolOptions;
use crate::error::TdsMiddlewareError;
use crate::logging::{LogLevel, Logger};
use crate::protocol::Connector;

/// The deadpool pool type backing a gateway.
pub type Pool<C> = deadpool::managed::Pool<ConnectionManager<C>>;

#[derive(Debug, Default)]
pub(crate) struct ReleaseCounters {
    acquired: AtomicU64,
    released: AtomicU64,
}

impl ReleaseCounters {
    fn record_acquire(&self) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Point-in-time view of the pool and of this gateway's acquire/release
/// accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_size: usize,
    /// Physical connections currently open.
    pub size: usize,
    /// Idle connections ready to be handed out.
    pub available: usize,
    /// Callers waiting for a connection.
    pub waiting: usize,
    /// Successful acquisitions so far.
    pub acquired: u64,
    /// Releases so far.
    pub released: u64,
}

impl PoolStatus {
    /// Connections handed out and not yet released.
    #[must_use]
    pub fn in_use(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

pub struct ConnectionGateway<C: Connector> {
    pool: Pool<C>,
    counters: Arc<ReleaseCounters>,
    logger: Arc<dyn Logger>,
}

impl<C: Connector> ConnectionGateway<C> {
    /// Build the pool around `connector`.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::ConfigError` if deadpool rejects the
    /// pool settings.
    pub fn new(
        connector: C,
        options: &PoolOptions,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, TdsMiddlewareError> {
        let manager = ConnectionManager::new(connector, options.idle_timeout(), logger.clone());
        let pool = Pool::<C>::builder(manager)
            .max_size(options.max)
            .wait_timeout(Some(options.acquire_timeout()))
            .create_timeout(Some(options.acquire_timeout()))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| TdsMiddlewareError::ConfigError(format!("failed to build pool: {e}")))?;

        Ok(Self {
            pool,
            counters: Arc::new(ReleaseCounters::default()),
            logger,
        })
    }

    /// Take a connection from the pool.
    ///
    /// Does not log or report failures; callers settle them.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::AcquisitionError` on timeout, a closed
    /// pool, or a connector failure.
    pub async fn acquire(&self) -> Result<PooledConnection<C>, TdsMiddlewareError> {
        let object = self.pool.get().await?;
        self.counters.record_acquire();
        self.logger.log(LogLevel::Debug, "connection acquired");
        Ok(PooledConnection::new(
            object,
            self.counters.clone(),
            self.logger.clone(),
        ))
    }

    /// Close the pool. Idle connections are dropped; connections in use are
    /// dropped when their operation releases them. Safe to call repeatedly.
    pub fn close(&self) {
        if !self.pool.is_closed() {
            self.logger.log(LogLevel::Debug, "draining connection pool");
            self.pool.close();
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
            acquired: self.counters.acquired.load(Ordering::SeqCst),
            released: self.counters.released.load(Ordering::SeqCst),
        }
    }
}

// Manual Debug implementation because the connector need not implement `Debug`
impl<C: Connector> fmt::Debug for ConnectionGateway<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionGateway")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
