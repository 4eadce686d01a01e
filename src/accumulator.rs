//! Turns a request's ordered event stream into a [`RequestOutcome`].
//!
//! The accumulator is an explicit state machine:
//!
//! ```text
//!            metadata                   done / doneInProc
//!   Idle ─────────────▶ AwaitingRows ─────────────────────▶ Sealed
//!    ▲                   │  ▲   │ row                          │
//!    │                   │  └───┘                              │
//!    │                   └── metadata: seal, open next ──┐     │
//!    │                                                   ▼     │
//!    └──────────────────────────── metadata ◀──────────────────┘
//! ```
//!
//! A set is sealed at most once: a completion signal arriving in `Sealed`
//! (a procedure reporting both `doneInProc` and `done` for the same set) or
//! in `Idle` (a statement without a result set) changes nothing.

use std::sync::Arc;

use crate::error::TdsMiddlewareError;
use crate::protocol::{EventReceiver, ProtocolEvent};
use crate::results::{RequestOutcome, ResultSet};
use crate::transform::{ColumnTransforms, TransformRule};
use crate::types::{ColumnMetadata, RowValues};

/// The result set currently receiving rows.
#[derive(Debug)]
struct ActiveResultSet {
    index: usize,
    buffer: ResultSet,
    transforms: ColumnTransforms,
}

#[derive(Debug, Default)]
enum AccumulatorState {
    /// Nothing received yet.
    #[default]
    Idle,
    AwaitingRows(ActiveResultSet),
    /// The last opened set has been sealed.
    Sealed,
}

#[derive(Debug)]
pub struct ResultAccumulator<'r> {
    rules: &'r [TransformRule],
    state: AccumulatorState,
    metadata_events: usize,
    sealed: Vec<ResultSet>,
}

impl<'r> ResultAccumulator<'r> {
    #[must_use]
    pub fn new(rules: &'r [TransformRule]) -> Self {
        Self {
            rules,
            state: AccumulatorState::Idle,
            metadata_events: 0,
            sealed: Vec::new(),
        }
    }

    /// Number of metadata events seen so far.
    #[must_use]
    pub fn metadata_events(&self) -> usize {
        self.metadata_events
    }

    /// Number of result sets sealed so far.
    #[must_use]
    pub fn sealed_count(&self) -> usize {
        self.sealed.len()
    }

    /// Feed one event.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::ProtocolError` for a row outside a result
    /// set or of the wrong width, and `TransformError` if a transform fails.
    pub fn apply(&mut self, event: ProtocolEvent) -> Result<(), TdsMiddlewareError> {
        match event {
            ProtocolEvent::ColumnMetadata(columns) => {
                self.open(columns);
                Ok(())
            }
            ProtocolEvent::Row(values) => self.push_row(values),
            ProtocolEvent::Done { row_count, .. } | ProtocolEvent::DoneInProc { row_count, .. } => {
                self.seal(row_count);
                Ok(())
            }
        }
    }

    /// Seal a set left open by a stream that ended without a completion
    /// signal and hand back the outcome.
    #[must_use]
    pub fn finish(mut self) -> RequestOutcome {
        if let AccumulatorState::AwaitingRows(_) = self.state {
            self.seal(None);
        }
        RequestOutcome::new(self.sealed)
    }

    /// Drain `events` until the producer closes the channel.
    ///
    /// # Errors
    /// Returns the first error raised by [`ResultAccumulator::apply`]; the
    /// receiver is dropped, which stops the producer.
    pub async fn consume(
        mut self,
        mut events: EventReceiver,
    ) -> Result<RequestOutcome, TdsMiddlewareError> {
        while let Some(event) = events.recv().await {
            self.apply(event)?;
        }
        Ok(self.finish())
    }

    fn open(&mut self, columns: Vec<ColumnMetadata>) {
        if let AccumulatorState::AwaitingRows(_) = self.state {
            // the protocol skipped the completion signal of the previous set
            self.seal(None);
        }

        let index = self.metadata_events;
        self.metadata_events += 1;

        let columns: Vec<ColumnMetadata> = columns
            .into_iter()
            .enumerate()
            .map(|(ordinal, mut col)| {
                col.ordinal = ordinal;
                col
            })
            .collect();
        let transforms = ColumnTransforms::resolve(index, &columns, self.rules);

        self.state = AccumulatorState::AwaitingRows(ActiveResultSet {
            index,
            buffer: ResultSet::new(columns),
            transforms,
        });
    }

    fn push_row(&mut self, values: Vec<RowValues>) -> Result<(), TdsMiddlewareError> {
        let AccumulatorState::AwaitingRows(active) = &mut self.state else {
            return Err(TdsMiddlewareError::ProtocolError(
                "row received outside of a result set".to_string(),
            ));
        };

        let columns = Arc::clone(&active.buffer.columns);
        if values.len() != columns.len() {
            return Err(TdsMiddlewareError::ProtocolError(format!(
                "row has {} values but result set {} has {} columns",
                values.len(),
                active.index,
                columns.len()
            )));
        }

        let processed = if active.transforms.is_empty() {
            values
        } else {
            columns
                .iter()
                .zip(values)
                .map(|(column, value)| active.transforms.apply(column, value))
                .collect::<Result<Vec<_>, _>>()?
        };
        active.buffer.add_row_values(processed);
        Ok(())
    }

    fn seal(&mut self, row_count: Option<u64>) {
        match std::mem::take(&mut self.state) {
            AccumulatorState::AwaitingRows(active) => {
                let mut buffer = active.buffer;
                buffer.rows_affected =
                    row_count.unwrap_or_else(|| u64::try_from(buffer.rows.len()).unwrap_or(u64::MAX));
                self.sealed.push(buffer);
                self.state = AccumulatorState::Sealed;
            }
            // Idle: statement without rows. Sealed: second signal for a set
            // that is already sealed.
            other => self.state = other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(names: &[&str]) -> ProtocolEvent {
        ProtocolEvent::ColumnMetadata(
            names
                .iter()
                .enumerate()
                .map(|(i, n)| ColumnMetadata::new(*n, i, "Int8"))
                .collect(),
        )
    }

    fn row(values: &[i64]) -> ProtocolEvent {
        ProtocolEvent::Row(values.iter().map(|v| RowValues::Int(*v)).collect())
    }

    fn run(rules: &[TransformRule], events: Vec<ProtocolEvent>) -> RequestOutcome {
        let mut acc = ResultAccumulator::new(rules);
        for event in events {
            acc.apply(event).expect("event applies");
        }
        acc.finish()
    }

    #[test]
    fn single_set_with_done() {
        let outcome = run(
            &[],
            vec![meta(&["id"]), row(&[1]), row(&[2]), ProtocolEvent::done(2)],
        );
        assert_eq!(outcome.result_sets.len(), 1);
        assert_eq!(outcome.rows_affected(), Some(2));
        assert_eq!(outcome.recordset().map(<[_]>::len), Some(2));
    }

    #[test]
    fn done_after_done_in_proc_is_not_double_counted() {
        let outcome = run(
            &[],
            vec![
                meta(&["a"]),
                row(&[1]),
                ProtocolEvent::done_in_proc(1),
                ProtocolEvent::done(1),
                meta(&["b"]),
                row(&[2]),
                row(&[3]),
                ProtocolEvent::done_in_proc(2),
                ProtocolEvent::done_in_proc(2),
            ],
        );
        assert_eq!(outcome.result_sets.len(), 2);
        assert_eq!(outcome.result_sets[1].rows_affected, 2);
        assert!(outcome.recordset().is_none());
    }

    #[test]
    fn completion_without_result_set_is_ignored() {
        let outcome = run(
            &[],
            vec![
                ProtocolEvent::done_in_proc(5),
                meta(&["x"]),
                row(&[1]),
                ProtocolEvent::done(1),
            ],
        );
        assert_eq!(outcome.result_sets.len(), 1);
        assert_eq!(outcome.rows_affected(), Some(1));
    }

    #[test]
    fn sealed_count_tracks_metadata_events() {
        let mut acc = ResultAccumulator::new(&[]);
        for event in [meta(&["a"]), row(&[1]), meta(&["b"]), row(&[2])] {
            acc.apply(event).expect("event applies");
        }
        assert_eq!(acc.metadata_events(), 2);
        // second metadata sealed the first set implicitly
        assert_eq!(acc.sealed_count(), 1);
        let outcome = acc.finish();
        assert_eq!(outcome.result_sets.len(), 2);
        assert_eq!(outcome.result_sets[0].rows_affected, 1);
    }

    #[test]
    fn missing_count_falls_back_to_buffered_rows() {
        let outcome = run(
            &[],
            vec![
                meta(&["a"]),
                row(&[1]),
                row(&[2]),
                row(&[3]),
                ProtocolEvent::Done {
                    row_count: None,
                    more: false,
                },
            ],
        );
        assert_eq!(outcome.rows_affected(), Some(3));
    }

    #[test]
    fn scoped_transform_applies_to_its_set_only() {
        let rules = vec![
            TransformRule::new("n", |v, _| match v {
                RowValues::Int(i) => RowValues::Int(i * 10),
                other => other,
            })
            .for_result_sets([1]),
        ];
        let outcome = run(
            &rules,
            vec![
                meta(&["n"]),
                row(&[1]),
                ProtocolEvent::done(1),
                meta(&["n"]),
                row(&[1]),
                ProtocolEvent::done(1),
                meta(&["n"]),
                row(&[1]),
                ProtocolEvent::done(1),
            ],
        );
        let firsts: Vec<_> = outcome
            .result_sets
            .iter()
            .map(|rs| rs.rows[0].get("n").cloned())
            .collect();
        assert_eq!(
            firsts,
            vec![
                Some(RowValues::Int(1)),
                Some(RowValues::Int(10)),
                Some(RowValues::Int(1))
            ]
        );
    }

    #[test]
    fn row_before_metadata_is_a_protocol_error() {
        let mut acc = ResultAccumulator::new(&[]);
        assert!(matches!(
            acc.apply(row(&[1])),
            Err(TdsMiddlewareError::ProtocolError(_))
        ));
    }

    #[test]
    fn row_width_must_match_metadata() {
        let mut acc = ResultAccumulator::new(&[]);
        acc.apply(meta(&["a", "b"])).expect("metadata applies");
        assert!(matches!(
            acc.apply(row(&[1])),
            Err(TdsMiddlewareError::ProtocolError(_))
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn consume_reads_until_channel_closes() {
        let (tx, rx) = crate::protocol::event_channel(2);
        let producer = async move {
            for event in [meta(&["a"]), row(&[7]), ProtocolEvent::done(1)] {
                tx.emit(event).await?;
            }
            Ok::<_, TdsMiddlewareError>(())
        };
        let (produced, consumed) =
            tokio::join!(producer, ResultAccumulator::new(&[]).consume(rx));
        assert!(produced.is_ok());
        let outcome = consumed.expect("outcome");
        assert_eq!(
            outcome.recordset().and_then(|rows| rows[0].get("a").cloned()),
            Some(RowValues::Int(7))
        );
    }
}
