use serde::{Deserialize, Serialize};

use crate::error::TdsMiddlewareError;
use crate::types::{DataType, RowValues};

/// Column definition for a bulk load, in table column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkColumn {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub nullable: bool,
}

impl BulkColumn {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
        }
    }

    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// A bulk-load unit bound to one table: columns first, then staged rows.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkLoadUnit {
    table: String,
    columns: Vec<BulkColumn>,
    rows: Vec<Vec<RowValues>>,
}

impl BulkLoadUnit {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Register the next column.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::ParameterError` once rows have been staged
    /// or if the column name is already registered.
    pub fn add_column(&mut self, column: BulkColumn) -> Result<(), TdsMiddlewareError> {
        if !self.rows.is_empty() {
            return Err(TdsMiddlewareError::ParameterError(format!(
                "column {} added after rows were staged for {}",
                column.name, self.table
            )));
        }
        if self.columns.iter().any(|c| c.name == column.name) {
            return Err(TdsMiddlewareError::ParameterError(format!(
                "duplicate bulk column {}",
                column.name
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Stage the next row after checking it against the column definitions.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::ParameterError` if the row width, a null in
    /// a non-nullable column, or a value type does not fit the columns.
    pub fn add_row(&mut self, row: Vec<RowValues>) -> Result<(), TdsMiddlewareError> {
        let row_number = self.rows.len();
        if self.columns.is_empty() {
            return Err(TdsMiddlewareError::ParameterError(format!(
                "no columns defined for bulk load into {}",
                self.table
            )));
        }
        if row.len() != self.columns.len() {
            return Err(TdsMiddlewareError::ParameterError(format!(
                "row {row_number} has {} values, expected {}",
                row.len(),
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(&row) {
            if value.is_null() && !column.nullable {
                return Err(TdsMiddlewareError::ParameterError(format!(
                    "row {row_number}: null in non-nullable column {}",
                    column.name
                )));
            }
            if !column.data_type.accepts(value) {
                return Err(TdsMiddlewareError::ParameterError(format!(
                    "row {row_number}: {} value does not fit column {} ({})",
                    value.kind(),
                    column.name,
                    column.data_type.sql_name()
                )));
            }
        }
        self.rows.push(row);
        Ok(())
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn columns(&self) -> &[BulkColumn] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<RowValues>] {
        &self.rows
    }

    /// Split into `(table, columns, rows)` for submission.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<BulkColumn>, Vec<Vec<RowValues>>) {
        (self.table, self.columns, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> BulkLoadUnit {
        let mut unit = BulkLoadUnit::new("orders");
        unit.add_column(BulkColumn::new("id", DataType::Int)).ok();
        unit.add_column(BulkColumn::new("note", DataType::NVarChar).nullable(true))
            .ok();
        unit
    }

    #[test]
    fn stages_matching_rows() {
        let mut unit = unit();
        assert!(unit.add_row(vec![RowValues::Int(1), RowValues::Null]).is_ok());
        assert!(unit.add_row(vec![RowValues::Int(2), "x".into()]).is_ok());
        assert_eq!(unit.rows().len(), 2);
        assert_eq!(unit.table(), "orders");
    }

    #[test]
    fn rejects_bad_rows() {
        let mut unit = unit();
        assert!(unit.add_row(vec![RowValues::Int(1)]).is_err());
        assert!(unit.add_row(vec![RowValues::Null, RowValues::Null]).is_err());
        assert!(unit.add_row(vec!["one".into(), RowValues::Null]).is_err());
        assert!(unit.rows().is_empty());
    }

    #[test]
    fn columns_are_fixed_once_rows_are_staged() {
        let mut unit = unit();
        assert!(unit.add_column(BulkColumn::new("id", DataType::Int)).is_err());
        unit.add_row(vec![RowValues::Int(1), RowValues::Null]).ok();
        assert!(unit.add_column(BulkColumn::new("late", DataType::Int)).is_err());
    }
}
