//! Bulk loading: column/row staging followed by a single bulk submission.

use crate::completion::{Callback, callback};
use crate::error::TdsMiddlewareError;
use crate::protocol::{BulkColumn, BulkLoadUnit, ProtocolConnection};
use crate::types::RowValues;

/// Table, column definitions and rows for one bulk load.
pub struct BulkLoadSpec {
    pub table: String,
    pub columns: Vec<BulkColumn>,
    pub rows: Vec<Vec<RowValues>>,
    pub callback: Option<Callback<u64>>,
}

impl BulkLoadSpec {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            callback: None,
        }
    }

    #[must_use]
    pub fn column(mut self, column: BulkColumn) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn row<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn rows(mut self, rows: Vec<Vec<RowValues>>) -> Self {
        self.rows.extend(rows);
        self
    }

    #[must_use]
    pub fn callback<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Result<&u64, &TdsMiddlewareError>) + Send + 'static,
    {
        self.callback = Some(callback(f));
        self
    }
}

impl std::fmt::Debug for BulkLoadSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkLoadSpec")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("rows", &self.rows.len())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Build a bulk-load unit for `table`: columns in order, then rows in order.
///
/// # Errors
/// Returns `TdsMiddlewareError::ParameterError` for the first column or row
/// the unit refuses.
pub fn stage(
    table: &str,
    columns: Vec<BulkColumn>,
    rows: Vec<Vec<RowValues>>,
) -> Result<BulkLoadUnit, TdsMiddlewareError> {
    let mut unit = BulkLoadUnit::new(table);
    for column in columns {
        unit.add_column(column)?;
    }
    for row in rows {
        unit.add_row(row)?;
    }
    Ok(unit)
}

/// Stage and submit a bulk load on `conn`; returns the reported row count.
///
/// Nothing is submitted unless every row stages cleanly.
///
/// # Errors
/// Returns a staging `ParameterError` or the protocol's failure.
pub async fn execute_bulk_load<P>(
    conn: &mut P,
    table: &str,
    columns: Vec<BulkColumn>,
    rows: Vec<Vec<RowValues>>,
) -> Result<u64, TdsMiddlewareError>
where
    P: ProtocolConnection + ?Sized,
{
    let unit = stage(table, columns, rows)?;
    conn.exec_bulk_load(unit).await
}
