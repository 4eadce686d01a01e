use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values that can be stored in a database row or used as query parameters.
///
/// The same enum flows through parameters, row values handed to transform
/// rules, and staged bulk-load rows:
/// ```rust
/// use tds_middleware::prelude::*;
///
/// let params = vec![
///     Parameter::new("id", RowValues::Int(1)),
///     Parameter::new("name", RowValues::Text("alice".into())),
///     Parameter::new("active", RowValues::Bool(true)),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    /// Floats as-is, integers widened.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RowValues::Int(_) => "int",
            RowValues::Float(_) => "float",
            RowValues::Text(_) => "text",
            RowValues::Bool(_) => "bool",
            RowValues::Timestamp(_) => "timestamp",
            RowValues::Null => "null",
            RowValues::JSON(_) => "json",
            RowValues::Blob(_) => "blob",
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// SQL Server column types accepted by bulk-load column definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bit,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Real,
    Float,
    NVarChar,
    VarChar,
    VarBinary,
    DateTime2,
}

impl DataType {
    /// Whether a non-null value can be written into a column of this type.
    #[must_use]
    pub fn accepts(self, value: &RowValues) -> bool {
        match (self, value) {
            (_, RowValues::Null) => true,
            (DataType::Bit, RowValues::Bool(_)) => true,
            (DataType::Bit, RowValues::Int(i)) => *i == 0 || *i == 1,
            (
                DataType::TinyInt | DataType::SmallInt | DataType::Int | DataType::BigInt,
                RowValues::Int(_),
            ) => true,
            (DataType::Real | DataType::Float, RowValues::Float(_) | RowValues::Int(_)) => true,
            (DataType::NVarChar | DataType::VarChar, RowValues::Text(_) | RowValues::JSON(_)) => {
                true
            }
            (DataType::VarBinary, RowValues::Blob(_)) => true,
            (DataType::DateTime2, RowValues::Timestamp(_)) => true,
            (DataType::DateTime2, RowValues::Text(_)) => value.as_timestamp().is_some(),
            _ => false,
        }
    }

    /// The T-SQL spelling used when declaring parameters of this type.
    #[must_use]
    pub fn sql_name(self) -> &'static str {
        match self {
            DataType::Bit => "bit",
            DataType::TinyInt => "tinyint",
            DataType::SmallInt => "smallint",
            DataType::Int => "int",
            DataType::BigInt => "bigint",
            DataType::Real => "real",
            DataType::Float => "float",
            DataType::NVarChar => "nvarchar(max)",
            DataType::VarChar => "varchar(max)",
            DataType::VarBinary => "varbinary(max)",
            DataType::DateTime2 => "datetime2",
        }
    }

    /// Type inferred for a parameter value when the caller did not give one.
    #[must_use]
    pub fn infer(value: &RowValues) -> DataType {
        match value {
            RowValues::Int(_) => DataType::BigInt,
            RowValues::Float(_) => DataType::Float,
            RowValues::Bool(_) => DataType::Bit,
            RowValues::Timestamp(_) => DataType::DateTime2,
            RowValues::Blob(_) => DataType::VarBinary,
            RowValues::Text(_) | RowValues::JSON(_) | RowValues::Null => DataType::NVarChar,
        }
    }
}

/// A named request parameter, registered in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Name without the leading `@`.
    pub name: String,
    pub value: RowValues,
    /// Declared type; inferred from the value when absent.
    pub data_type: Option<DataType>,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        let name = name.into();
        let name = name.strip_prefix('@').map(str::to_string).unwrap_or(name);
        Self {
            name,
            value: value.into(),
            data_type: None,
        }
    }

    #[must_use]
    pub fn typed(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    #[must_use]
    pub fn effective_type(&self) -> DataType {
        self.data_type
            .unwrap_or_else(|| DataType::infer(&self.value))
    }
}

/// Metadata for one column of a result set, as reported by the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Position of the column within its result set.
    pub ordinal: usize,
    /// Protocol-reported type name.
    pub type_name: String,
    pub nullable: Option<bool>,
}

impl ColumnMetadata {
    #[must_use]
    pub fn new(name: impl Into<String>, ordinal: usize, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ordinal,
            type_name: type_name.into(),
            nullable: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_names_drop_leading_at() {
        let p = Parameter::new("@id", 5);
        assert_eq!(p.name, "id");
        assert_eq!(p.effective_type(), DataType::BigInt);
        assert_eq!(p.typed(DataType::Int).effective_type(), DataType::Int);
    }

    #[test]
    fn data_type_acceptance() {
        assert!(DataType::Bit.accepts(&RowValues::Int(1)));
        assert!(!DataType::Bit.accepts(&RowValues::Int(2)));
        assert!(DataType::Float.accepts(&RowValues::Int(2)));
        assert!(!DataType::Int.accepts(&RowValues::Text("x".into())));
        assert!(DataType::DateTime2.accepts(&RowValues::Text("2024-01-02 03:04:05".into())));
        assert!(DataType::NVarChar.accepts(&RowValues::Null));
    }
}
