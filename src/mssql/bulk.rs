use std::borrow::Cow;

use tiberius::{ColumnData, IntoSql, TokenRow};

use super::client::MssqlClient;
use crate::error::TdsMiddlewareError;
use crate::protocol::{BulkColumn, BulkLoadUnit};
use crate::types::{DataType, RowValues};

/// Send every staged row through a bulk insert; returns the server's total.
///
/// Columns must be listed in the table's column order.
pub(crate) async fn bulk_load(
    client: &mut MssqlClient,
    unit: BulkLoadUnit,
) -> Result<u64, TdsMiddlewareError> {
    let (table, columns, rows) = unit.into_parts();
    let mut request = client.bulk_insert(&table).await?;

    for row in rows {
        let mut token_row = TokenRow::new();
        for (column, value) in columns.iter().zip(row) {
            token_row.push(column_data(column, value)?);
        }
        request.send(token_row).await?;
    }

    let result = request.finalize().await?;
    Ok(result.total())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn column_data(
    column: &BulkColumn,
    value: RowValues,
) -> Result<ColumnData<'static>, TdsMiddlewareError> {
    let data = match (column.data_type, value) {
        (DataType::Bit, RowValues::Null) => ColumnData::Bit(None),
        (DataType::Bit, RowValues::Bool(b)) => ColumnData::Bit(Some(b)),
        (DataType::Bit, RowValues::Int(i)) => ColumnData::Bit(Some(i != 0)),
        (DataType::TinyInt, RowValues::Null) => ColumnData::U8(None),
        (DataType::TinyInt, RowValues::Int(i)) => ColumnData::U8(Some(narrow(column, i)?)),
        (DataType::SmallInt, RowValues::Null) => ColumnData::I16(None),
        (DataType::SmallInt, RowValues::Int(i)) => ColumnData::I16(Some(narrow(column, i)?)),
        (DataType::Int, RowValues::Null) => ColumnData::I32(None),
        (DataType::Int, RowValues::Int(i)) => ColumnData::I32(Some(narrow(column, i)?)),
        (DataType::BigInt, RowValues::Null) => ColumnData::I64(None),
        (DataType::BigInt, RowValues::Int(i)) => ColumnData::I64(Some(i)),
        (DataType::Real, RowValues::Null) => ColumnData::F32(None),
        (DataType::Real, RowValues::Float(f)) => ColumnData::F32(Some(f as f32)),
        (DataType::Real, RowValues::Int(i)) => ColumnData::F32(Some(i as f32)),
        (DataType::Float, RowValues::Null) => ColumnData::F64(None),
        (DataType::Float, RowValues::Float(f)) => ColumnData::F64(Some(f)),
        (DataType::Float, RowValues::Int(i)) => ColumnData::F64(Some(i as f64)),
        (DataType::NVarChar | DataType::VarChar, RowValues::Null) => ColumnData::String(None),
        (DataType::NVarChar | DataType::VarChar, RowValues::Text(s)) => {
            ColumnData::String(Some(Cow::Owned(s)))
        }
        (DataType::NVarChar | DataType::VarChar, RowValues::JSON(v)) => {
            ColumnData::String(Some(Cow::Owned(v.to_string())))
        }
        (DataType::VarBinary, RowValues::Null) => ColumnData::Binary(None),
        (DataType::VarBinary, RowValues::Blob(b)) => ColumnData::Binary(Some(Cow::Owned(b))),
        (DataType::DateTime2, RowValues::Null) => ColumnData::DateTime2(None),
        (DataType::DateTime2, value) => match value.as_timestamp() {
            Some(ts) => ts.into_sql(),
            None => return Err(mismatch(column, &value)),
        },
        (_, value) => return Err(mismatch(column, &value)),
    };
    Ok(data)
}

fn narrow<T: TryFrom<i64>>(column: &BulkColumn, value: i64) -> Result<T, TdsMiddlewareError> {
    T::try_from(value).map_err(|_| {
        TdsMiddlewareError::ParameterError(format!(
            "value {value} out of range for column {} ({})",
            column.name,
            column.data_type.sql_name()
        ))
    })
}

fn mismatch(column: &BulkColumn, value: &RowValues) -> TdsMiddlewareError {
    TdsMiddlewareError::ParameterError(format!(
        "{} value does not fit column {} ({})",
        value.kind(),
        column.name,
        column.data_type.sql_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_narrow_to_column_width() {
        let col = BulkColumn::new("qty", DataType::SmallInt);
        assert_eq!(
            column_data(&col, RowValues::Int(12)).expect("fits"),
            ColumnData::I16(Some(12))
        );
        assert!(column_data(&col, RowValues::Int(70_000)).is_err());
    }

    #[test]
    fn nulls_keep_their_column_type() {
        let col = BulkColumn::new("note", DataType::NVarChar).nullable(true);
        assert_eq!(
            column_data(&col, RowValues::Null).expect("null"),
            ColumnData::String(None)
        );
    }

    #[test]
    fn mismatched_values_are_rejected() {
        let col = BulkColumn::new("blob", DataType::VarBinary);
        assert!(column_data(&col, RowValues::Text("x".into())).is_err());
    }
}
