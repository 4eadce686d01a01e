use std::collections::HashSet;

use chrono::NaiveDateTime;
use tiberius::Query;

use crate::error::TdsMiddlewareError;
use crate::protocol::{ProtocolRequest, Submission};
use crate::types::{DataType, Parameter, RowValues};

/// T-SQL text for `request`.
///
/// Named parameters (`@id`) are bound positionally as `@P1..@Pn`; SQL
/// batches go through `sp_executesql` so the caller's names stay usable.
pub(crate) fn build_statement(
    request: &ProtocolRequest,
    submission: Submission,
) -> Result<String, TdsMiddlewareError> {
    let mut seen = HashSet::new();
    for parameter in &request.parameters {
        validate_identifier(&parameter.name)?;
        if !seen.insert(parameter.name.to_ascii_lowercase()) {
            return Err(TdsMiddlewareError::ParameterError(format!(
                "duplicate parameter @{}",
                parameter.name
            )));
        }
    }

    let assignments = request
        .parameters
        .iter()
        .enumerate()
        .map(|(i, p)| format!("@{} = @P{}", p.name, i + 1))
        .collect::<Vec<_>>()
        .join(", ");

    match submission {
        Submission::Sql if request.parameters.is_empty() => Ok(request.sql.clone()),
        Submission::Sql => {
            let declarations = request
                .parameters
                .iter()
                .map(|p| format!("@{} {}", p.name, p.effective_type().sql_name()))
                .collect::<Vec<_>>()
                .join(", ");
            Ok(format!(
                "EXEC sp_executesql N'{}', N'{declarations}', {assignments}",
                request.sql.replace('\'', "''")
            ))
        }
        Submission::Procedure => {
            validate_procedure_name(&request.sql)?;
            if request.parameters.is_empty() {
                Ok(format!("EXEC {}", request.sql.trim()))
            } else {
                Ok(format!("EXEC {} {assignments}", request.sql.trim()))
            }
        }
    }
}

/// Bind every parameter value in order.
pub(crate) fn bind_parameters(query: &mut Query<'_>, parameters: &[Parameter]) {
    for parameter in parameters {
        match &parameter.value {
            RowValues::Int(i) => query.bind(*i),
            RowValues::Float(f) => query.bind(*f),
            RowValues::Text(s) => query.bind(s.clone()),
            RowValues::Bool(b) => query.bind(*b),
            RowValues::Timestamp(dt) => query.bind(*dt),
            RowValues::JSON(jsval) => query.bind(jsval.to_string()),
            RowValues::Blob(bytes) => query.bind(bytes.clone()),
            RowValues::Null => bind_null(query, parameter.effective_type()),
        }
    }
}

fn bind_null(query: &mut Query<'_>, data_type: DataType) {
    match data_type {
        DataType::Bit => query.bind(Option::<bool>::None),
        DataType::TinyInt | DataType::SmallInt | DataType::Int | DataType::BigInt => {
            query.bind(Option::<i64>::None);
        }
        DataType::Real | DataType::Float => query.bind(Option::<f64>::None),
        DataType::NVarChar | DataType::VarChar => query.bind(Option::<String>::None),
        DataType::VarBinary => query.bind(Option::<Vec<u8>>::None),
        DataType::DateTime2 => query.bind(Option::<NaiveDateTime>::None),
    }
}

fn validate_identifier(name: &str) -> Result<(), TdsMiddlewareError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(TdsMiddlewareError::ParameterError(format!(
            "invalid parameter name: {name:?}"
        )))
    }
}

/// Accepts `name`, `schema.name`, `db.schema.name`, each part either a plain
/// identifier or bracket-quoted.
fn validate_procedure_name(name: &str) -> Result<(), TdsMiddlewareError> {
    let name = name.trim();
    let valid = !name.is_empty()
        && name.split('.').count() <= 3
        && name.split('.').all(|part| {
            if let Some(inner) = part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
                !inner.is_empty() && !inner.contains(']')
            } else {
                validate_identifier(part).is_ok() || (part.starts_with('#') && part.len() > 1)
            }
        });
    if valid {
        Ok(())
    } else {
        Err(TdsMiddlewareError::ParameterError(format!(
            "invalid procedure name: {name:?}"
        )))
    }
}
