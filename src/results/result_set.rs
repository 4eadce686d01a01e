use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, build_column_index};
use crate::types::{ColumnMetadata, RowValues};

/// One tabular output of a request.
///
/// Holds the column metadata reported by the protocol, the buffered rows and
/// the affected-row count reported when the set was sealed.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// Column metadata, in column order
    pub columns: Arc<Vec<ColumnMetadata>>,
    /// The rows returned for this set
    pub rows: Vec<CustomDbRow>,
    /// The number of rows affected as reported by the completion signal
    pub rows_affected: u64,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    /// Create an empty result set for the given columns.
    #[must_use]
    pub fn new(columns: Vec<ColumnMetadata>) -> ResultSet {
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let index = build_column_index(&names);
        ResultSet {
            columns: Arc::new(columns),
            rows: Vec::new(),
            rows_affected: 0,
            column_names: Arc::new(names),
            column_index: Arc::new(index),
        }
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    /// Metadata for a column looked up by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.column_index
            .get(name)
            .and_then(|&idx| self.columns.get(idx))
    }

    /// Append a row whose values are already in column order.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        self.rows.push(CustomDbRow::with_index(
            self.column_names.clone(),
            self.column_index.clone(),
            row_values,
        ));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl PartialEq for ResultSet {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.rows == other.rows
            && self.rows_affected == other.rows_affected
    }
}
