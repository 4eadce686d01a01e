use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use deadpool::managed::Object;

use super::ReleaseCounters;
use super::manager::ConnectionManager;
use crate::logging::{LogLevel, Logger};
use crate::protocol::Connector;

/// A connection borrowed from the pool.
///
/// Dereferences to the protocol connection. Dropping it (or calling
/// [`PooledConnection::release`]) returns it to the pool.
pub struct PooledConnection<C: Connector> {
    object: Object<ConnectionManager<C>>,
    counters: Arc<ReleaseCounters>,
    logger: Arc<dyn Logger>,
}

impl<C: Connector> PooledConnection<C> {
    pub(crate) fn new(
        object: Object<ConnectionManager<C>>,
        counters: Arc<ReleaseCounters>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            object,
            counters,
            logger,
        }
    }

    /// Return the connection to the pool.
    pub fn release(self) {
        drop(self);
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &C::Connection {
        &self.object.conn
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C::Connection {
        &mut self.object.conn
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        self.object.mark_returned();
        self.counters.record_release();
        self.logger.log(LogLevel::Debug, "connection released");
    }
}

impl<C: Connector> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PooledConnection")
            .field(&"<ProtocolConnection>")
            .finish()
    }
}
