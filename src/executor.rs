//! Request execution: submission, event wiring and accumulation.

use crate::accumulator::ResultAccumulator;
use crate::completion::{Callback, callback};
use crate::error::TdsMiddlewareError;
use crate::protocol::{EventSender, ProtocolConnection, ProtocolRequest, Submission, event_channel};
use crate::results::RequestOutcome;
use crate::transform::TransformRule;
use crate::types::{Parameter, RowValues};

/// Events buffered between protocol and accumulator before the producer waits.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Submit `sql` as a stored-procedure name instead of SQL text.
    pub call_procedure: bool,
    /// Rules applied to column values, first match wins.
    pub transformers: Vec<TransformRule>,
}

impl RequestOptions {
    #[must_use]
    pub fn submission(&self) -> Submission {
        if self.call_procedure {
            Submission::Procedure
        } else {
            Submission::Sql
        }
    }
}

/// Everything `request` needs: SQL (or procedure name), ordered parameters,
/// options and an optional completion callback.
///
/// ```rust
/// use tds_middleware::prelude::*;
///
/// let spec = RequestSpec::new("SELECT amt_cents FROM payments WHERE id = @id")
///     .param("id", 7)
///     .transform(TransformRule::new(
///         ColumnMatcher::pattern("^amt").expect("valid pattern"),
///         |v, _| v.as_float().map_or(v.clone(), |f| RowValues::Float(f / 100.0)),
///     ));
/// # let _ = spec;
/// ```
pub struct RequestSpec {
    pub sql: String,
    pub parameters: Vec<Parameter>,
    pub options: RequestOptions,
    pub callback: Option<Callback<RequestOutcome>>,
}

impl RequestSpec {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
            options: RequestOptions::default(),
            callback: None,
        }
    }

    /// A stored-procedure call; parameters become its arguments.
    #[must_use]
    pub fn procedure(name: impl Into<String>) -> Self {
        Self::new(name).call_procedure(true)
    }

    #[must_use]
    pub fn param(self, name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.parameter(Parameter::new(name, value))
    }

    #[must_use]
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[must_use]
    pub fn call_procedure(mut self, call_procedure: bool) -> Self {
        self.options.call_procedure = call_procedure;
        self
    }

    #[must_use]
    pub fn transform(mut self, rule: TransformRule) -> Self {
        self.options.transformers.push(rule);
        self
    }

    #[must_use]
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn callback<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Result<&RequestOutcome, &TdsMiddlewareError>) + Send + 'static,
    {
        self.callback = Some(callback(f));
        self
    }
}

impl std::fmt::Debug for RequestSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSpec")
            .field("sql", &self.sql)
            .field("parameters", &self.parameters)
            .field("options", &self.options)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Run one request on `conn` and collect its result sets.
///
/// The protocol side pushes events into a bounded channel while the
/// accumulator drains it; both run concurrently on the calling task.
///
/// # Errors
/// Returns the accumulator's error (`TransformError`, `ProtocolError`) if it
/// failed, otherwise the protocol's execution error.
pub async fn execute_request<P>(
    conn: &mut P,
    sql: &str,
    parameters: Vec<Parameter>,
    options: &RequestOptions,
) -> Result<RequestOutcome, TdsMiddlewareError>
where
    P: ProtocolConnection + ?Sized,
{
    let mut request = ProtocolRequest::new(sql);
    for parameter in parameters {
        request.add_parameter(parameter);
    }

    let (events, receiver) = event_channel(EVENT_CHANNEL_CAPACITY);
    let produce = submit(conn, options.submission(), request, events);
    let consume = ResultAccumulator::new(&options.transformers).consume(receiver);

    match tokio::join!(produce, consume) {
        (_, Err(consumer_err)) => Err(consumer_err),
        (Err(execution_err), Ok(_)) => Err(execution_err),
        (Ok(()), Ok(outcome)) => Ok(outcome),
    }
}

async fn submit<P>(
    conn: &mut P,
    submission: Submission,
    request: ProtocolRequest,
    events: EventSender,
) -> Result<(), TdsMiddlewareError>
where
    P: ProtocolConnection + ?Sized,
{
    match submission {
        Submission::Sql => conn.exec_sql(request, events).await,
        Submission::Procedure => conn.call_procedure(request, events).await,
    }
}
