//! Scripted in-memory backend for tests and benchmarks.
//!
//! A [`ScriptedConnector`] hands out connections that replay queued event
//! scripts and record every call made on them. Clones share state, so a test
//! keeps one handle while the middleware owns another.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::TdsMiddlewareError;
use crate::protocol::{
    BulkColumn, BulkLoadUnit, Connector, EventSender, ProtocolConnection, ProtocolEvent,
    ProtocolRequest, Submission,
};
use crate::types::{ColumnMetadata, Parameter, RowValues};

/// A call observed by a scripted connection.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Request {
        submission: Submission,
        sql: String,
        parameters: Vec<Parameter>,
    },
    BulkLoad {
        table: String,
        columns: Vec<BulkColumn>,
        rows: Vec<Vec<RowValues>>,
    },
}

/// What the next request on any scripted connection does.
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit these events, then succeed.
    Events(Vec<ProtocolEvent>),
    /// Emit these events, then fail with an execution error.
    Fail(Vec<ProtocolEvent>, String),
}

/// What the next bulk load does; without one, loads report their row count.
#[derive(Debug, Clone)]
pub enum BulkScript {
    Total(u64),
    Fail(String),
}

#[derive(Debug, Default)]
struct ScriptState {
    requests: VecDeque<Script>,
    bulk: VecDeque<BulkScript>,
    calls: Vec<RecordedCall>,
    connects: usize,
    connect_failure: Option<String>,
    break_next: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        lock(&self.state)
    }

    pub fn push_events(&self, events: Vec<ProtocolEvent>) {
        self.state().requests.push_back(Script::Events(events));
    }

    pub fn push_failure(&self, events: Vec<ProtocolEvent>, message: impl Into<String>) {
        self.state()
            .requests
            .push_back(Script::Fail(events, message.into()));
    }

    pub fn push_bulk(&self, script: BulkScript) {
        self.state().bulk.push_back(script);
    }

    /// Make every later `connect` fail with `message`; `None` restores it.
    pub fn fail_connects(&self, message: Option<&str>) {
        self.state().connect_failure = message.map(str::to_string);
    }

    /// The connection serving the next request reports itself broken
    /// afterwards.
    pub fn break_next_request(&self) {
        self.state().break_next = true;
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Physical connections opened so far.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.state().connects
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Connection = ScriptedConnection;

    async fn connect(&self) -> Result<ScriptedConnection, TdsMiddlewareError> {
        let mut state = self.state();
        if let Some(message) = &state.connect_failure {
            return Err(TdsMiddlewareError::ExecutionError(message.clone()));
        }
        state.connects += 1;
        Ok(ScriptedConnection {
            state: self.state.clone(),
            broken: false,
        })
    }
}

#[derive(Debug)]
pub struct ScriptedConnection {
    state: Arc<Mutex<ScriptState>>,
    broken: bool,
}

impl ScriptedConnection {
    async fn replay(
        &mut self,
        submission: Submission,
        request: ProtocolRequest,
        events: EventSender,
    ) -> Result<(), TdsMiddlewareError> {
        let script = {
            let mut state = lock(&self.state);
            state.calls.push(RecordedCall::Request {
                submission,
                sql: request.sql,
                parameters: request.parameters,
            });
            if state.break_next {
                state.break_next = false;
                self.broken = true;
            }
            state.requests.pop_front()
        };

        let (script_events, failure) = match script {
            Some(Script::Events(events)) => (events, None),
            Some(Script::Fail(events, message)) => (events, Some(message)),
            None => (Vec::new(), None),
        };
        for event in script_events {
            events.emit(event).await?;
        }
        match failure {
            Some(message) => Err(TdsMiddlewareError::ExecutionError(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProtocolConnection for ScriptedConnection {
    async fn exec_sql(
        &mut self,
        request: ProtocolRequest,
        events: EventSender,
    ) -> Result<(), TdsMiddlewareError> {
        self.replay(Submission::Sql, request, events).await
    }

    async fn call_procedure(
        &mut self,
        request: ProtocolRequest,
        events: EventSender,
    ) -> Result<(), TdsMiddlewareError> {
        self.replay(Submission::Procedure, request, events).await
    }

    async fn exec_bulk_load(&mut self, unit: BulkLoadUnit) -> Result<u64, TdsMiddlewareError> {
        let (table, columns, rows) = unit.into_parts();
        let staged = rows.len() as u64;
        let mut state = lock(&self.state);
        state.calls.push(RecordedCall::BulkLoad {
            table,
            columns,
            rows,
        });
        match state.bulk.pop_front() {
            Some(BulkScript::Total(total)) => Ok(total),
            Some(BulkScript::Fail(message)) => Err(TdsMiddlewareError::ExecutionError(message)),
            None => Ok(staged),
        }
    }

    fn is_broken(&self) -> bool {
        self.broken
    }
}

fn lock(state: &Mutex<ScriptState>) -> MutexGuard<'_, ScriptState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Metadata event for `names`, typed as `nvarchar`.
#[must_use]
pub fn metadata(names: &[&str]) -> ProtocolEvent {
    ProtocolEvent::ColumnMetadata(
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ColumnMetadata::new(*name, i, "NVarchar"))
            .collect(),
    )
}

/// Events for one complete result set ending in `Done` with its row count.
#[must_use]
pub fn result_set(names: &[&str], rows: Vec<Vec<RowValues>>) -> Vec<ProtocolEvent> {
    let count = rows.len() as u64;
    let mut events = Vec::with_capacity(rows.len() + 2);
    events.push(metadata(names));
    events.extend(rows.into_iter().map(ProtocolEvent::Row));
    events.push(ProtocolEvent::done(count));
    events
}
