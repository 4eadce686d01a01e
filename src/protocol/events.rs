use tokio::sync::mpsc;

use crate::error::TdsMiddlewareError;
use crate::types::{ColumnMetadata, RowValues};

/// One event of a request's result stream.
///
/// For every result set the protocol emits `ColumnMetadata`, then its rows,
/// then a completion signal. Statements inside a stored procedure complete
/// with `DoneInProc`; a procedure call may report both signals for a set.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    ColumnMetadata(Vec<ColumnMetadata>),
    /// Values in column order of the most recent metadata.
    Row(Vec<RowValues>),
    Done { row_count: Option<u64>, more: bool },
    DoneInProc { row_count: Option<u64>, more: bool },
}

impl ProtocolEvent {
    #[must_use]
    pub fn done(row_count: u64) -> Self {
        ProtocolEvent::Done {
            row_count: Some(row_count),
            more: false,
        }
    }

    #[must_use]
    pub fn done_in_proc(row_count: u64) -> Self {
        ProtocolEvent::DoneInProc {
            row_count: Some(row_count),
            more: true,
        }
    }
}

/// Producer half of a request's ordered event channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<ProtocolEvent>,
}

impl EventSender {
    /// Push the next event, waiting while the consumer is behind.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::ExecutionError` if the consumer stopped
    /// reading (it failed and dropped its receiver).
    pub async fn emit(&self, event: ProtocolEvent) -> Result<(), TdsMiddlewareError> {
        self.tx.send(event).await.map_err(|_| {
            TdsMiddlewareError::ExecutionError("result consumer stopped reading".to_string())
        })
    }

    /// Whether the consumer has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of a request's ordered event channel.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<ProtocolEvent>,
}

impl EventReceiver {
    /// Next event, or `None` once the producer finished.
    pub async fn recv(&mut self) -> Option<ProtocolEvent> {
        self.rx.recv().await
    }
}

/// Bounded, strictly ordered channel between protocol and accumulator.
#[must_use]
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, EventReceiver { rx })
}
