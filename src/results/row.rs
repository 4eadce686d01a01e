use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// A row from a database query result
///
/// This struct represents a single row from a database query result,
/// with access to both the column names and the values. Rows of the same
/// result set share their column names and lookup index.
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row, in column order
    pub values: Vec<RowValues>,
    // Shared name -> position index, built once per result set
    #[doc(hidden)]
    pub(crate) column_index_cache: Arc<HashMap<String, usize>>,
}

impl CustomDbRow {
    /// Create a new database row, building its own column index.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        let cache = Arc::new(build_column_index(&column_names));
        Self {
            column_names,
            values,
            column_index_cache: cache,
        }
    }

    pub(crate) fn with_index(
        column_names: Arc<Vec<String>>,
        column_index_cache: Arc<HashMap<String, usize>>,
        values: Vec<RowValues>,
    ) -> Self {
        Self {
            column_names,
            values,
            column_index_cache,
        }
    }

    /// Get the index of a column by name
    ///
    /// # Returns
    ///
    /// The index of the column, or None if not found
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }

        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value from the row by column name
    ///
    /// # Returns
    ///
    /// The value at the column, or None if the column wasn't found
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    /// Iterate `(column name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.column_names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl PartialEq for CustomDbRow {
    fn eq(&self, other: &Self) -> bool {
        self.column_names == other.column_names && self.values == other.values
    }
}

pub(crate) fn build_column_index(column_names: &[String]) -> HashMap<String, usize> {
    column_names
        .iter()
        .enumerate()
        // first occurrence wins for duplicated names
        .rev()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_index() {
        let names = Arc::new(vec!["id".to_string(), "name".to_string()]);
        let row = CustomDbRow::new(
            names,
            vec![RowValues::Int(1), RowValues::Text("a".into())],
        );
        assert_eq!(row.get("name"), Some(&RowValues::Text("a".into())));
        assert_eq!(row.get_by_index(0), Some(&RowValues::Int(1)));
        assert_eq!(row.get("missing"), None);
        let pairs: Vec<_> = row.iter().map(|(n, _)| n).collect();
        assert_eq!(pairs, vec!["id", "name"]);
    }

    #[test]
    fn duplicated_column_names_resolve_to_first() {
        let names = Arc::new(vec!["x".to_string(), "x".to_string()]);
        let row = CustomDbRow::new(names, vec![RowValues::Int(1), RowValues::Int(2)]);
        assert_eq!(row.get("x"), Some(&RowValues::Int(1)));
    }
}
