//! Contract with the wire-protocol collaborator.
//!
//! A [`Connector`] opens physical connections for the pool; each
//! [`ProtocolConnection`] executes requests by pushing an ordered stream of
//! [`ProtocolEvent`]s into an [`EventSender`], and executes bulk loads.

mod bulk;
mod events;
mod request;

use async_trait::async_trait;

pub use bulk::{BulkColumn, BulkLoadUnit};
pub use events::{EventReceiver, EventSender, ProtocolEvent, event_channel};
pub use request::{ProtocolRequest, Submission};

use crate::error::TdsMiddlewareError;

/// Opens physical connections; used by the pool manager.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: ProtocolConnection;

    /// Open a new connection.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    async fn connect(&self) -> Result<Self::Connection, TdsMiddlewareError>;
}

/// One physical connection able to run requests and bulk loads.
#[async_trait]
pub trait ProtocolConnection: Send + 'static {
    /// Run `request` as a plain SQL batch, emitting its events in order.
    ///
    /// Returning drops `events`, which ends the stream for the consumer.
    ///
    /// # Errors
    /// Returns an error if the protocol reports a failure or the consumer
    /// went away.
    async fn exec_sql(
        &mut self,
        request: ProtocolRequest,
        events: EventSender,
    ) -> Result<(), TdsMiddlewareError>;

    /// Run `request` as a stored-procedure call, emitting its events in order.
    ///
    /// # Errors
    /// Returns an error if the protocol reports a failure or the consumer
    /// went away.
    async fn call_procedure(
        &mut self,
        request: ProtocolRequest,
        events: EventSender,
    ) -> Result<(), TdsMiddlewareError>;

    /// Insert every staged row of `unit`; returns the reported row count.
    ///
    /// # Errors
    /// Returns an error if the protocol rejects the load.
    async fn exec_bulk_load(&mut self, unit: BulkLoadUnit) -> Result<u64, TdsMiddlewareError>;

    /// A broken connection is discarded instead of being handed out again.
    fn is_broken(&self) -> bool {
        false
    }
}
