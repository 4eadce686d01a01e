use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::TryStreamExt;
use tiberius::{Column, ColumnData, Query, QueryItem, Row};

use super::client::MssqlClient;
use super::params::{bind_parameters, build_statement};
use crate::error::TdsMiddlewareError;
use crate::protocol::{EventSender, ProtocolEvent, ProtocolRequest, Submission};
use crate::types::{ColumnMetadata, RowValues};

/// Run `request` and push its result sets as events.
///
/// tiberius does not surface per-statement done tokens, so each result set
/// is completed with its own row count when the next one starts or the
/// stream ends. Procedure sets complete with `DoneInProc` and the call
/// closes with a final `Done`.
pub(crate) async fn stream_request(
    client: &mut MssqlClient,
    request: &ProtocolRequest,
    submission: Submission,
    events: &EventSender,
) -> Result<(), TdsMiddlewareError> {
    let statement = build_statement(request, submission)?;
    let mut query = Query::new(statement);
    bind_parameters(&mut query, &request.parameters);

    let mut stream = query.query(client).await?;
    let mut open_set: Option<u64> = None;

    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(meta) => {
                if let Some(rows) = open_set.take() {
                    events.emit(set_completion(submission, rows)).await?;
                }
                events
                    .emit(ProtocolEvent::ColumnMetadata(column_metadata(meta.columns())))
                    .await?;
                open_set = Some(0);
            }
            QueryItem::Row(row) => {
                events.emit(ProtocolEvent::Row(convert_row(&row))).await?;
                if let Some(rows) = open_set.as_mut() {
                    *rows += 1;
                }
            }
        }
    }

    if let Some(rows) = open_set {
        events.emit(set_completion(submission, rows)).await?;
    }
    if submission == Submission::Procedure {
        events
            .emit(ProtocolEvent::Done {
                row_count: None,
                more: false,
            })
            .await?;
    }
    Ok(())
}

fn set_completion(submission: Submission, rows: u64) -> ProtocolEvent {
    match submission {
        Submission::Sql => ProtocolEvent::done(rows),
        Submission::Procedure => ProtocolEvent::done_in_proc(rows),
    }
}

fn column_metadata(columns: &[Column]) -> Vec<ColumnMetadata> {
    columns
        .iter()
        .enumerate()
        .map(|(i, col)| ColumnMetadata::new(col.name(), i, format!("{:?}", col.column_type())))
        .collect()
}

/// Convert a tiberius row; date and time types go through chrono.
pub(crate) fn convert_row(row: &Row) -> Vec<RowValues> {
    row.cells()
        .enumerate()
        .map(|(i, (_col, data))| match data {
            ColumnData::DateTime(Some(_))
            | ColumnData::SmallDateTime(Some(_))
            | ColumnData::DateTime2(Some(_)) => row
                .try_get::<NaiveDateTime, _>(i)
                .ok()
                .flatten()
                .map_or(RowValues::Null, RowValues::Timestamp),
            ColumnData::DateTimeOffset(Some(_)) => row
                .try_get::<DateTime<Utc>, _>(i)
                .ok()
                .flatten()
                .map_or(RowValues::Null, |dt| RowValues::Timestamp(dt.naive_utc())),
            ColumnData::Date(Some(_)) => row
                .try_get::<NaiveDate, _>(i)
                .ok()
                .flatten()
                .map_or(RowValues::Null, |d| {
                    RowValues::Timestamp(d.and_time(NaiveTime::MIN))
                }),
            ColumnData::Time(Some(_)) => row
                .try_get::<NaiveTime, _>(i)
                .ok()
                .flatten()
                .map_or(RowValues::Null, |t| {
                    RowValues::Text(t.format("%H:%M:%S%.f").to_string())
                }),
            _ => convert_column_data(data),
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn convert_column_data(data: &ColumnData<'_>) -> RowValues {
    match data {
        ColumnData::Bit(Some(b)) => RowValues::Bool(*b),
        ColumnData::U8(Some(v)) => RowValues::Int(i64::from(*v)),
        ColumnData::I16(Some(v)) => RowValues::Int(i64::from(*v)),
        ColumnData::I32(Some(v)) => RowValues::Int(i64::from(*v)),
        ColumnData::I64(Some(v)) => RowValues::Int(*v),
        ColumnData::F32(Some(v)) => RowValues::Float(f64::from(*v)),
        ColumnData::F64(Some(v)) => RowValues::Float(*v),
        ColumnData::Numeric(Some(n)) => {
            RowValues::Float(n.value() as f64 / 10f64.powi(i32::from(n.scale())))
        }
        ColumnData::String(Some(s)) => RowValues::Text(s.to_string()),
        ColumnData::Guid(Some(g)) => RowValues::Text(g.to_string()),
        ColumnData::Binary(Some(b)) => RowValues::Blob(b.to_vec()),
        ColumnData::Xml(Some(xml)) => RowValues::Text(xml.to_string()),
        _ => RowValues::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn scalar_column_data_converts() {
        assert_eq!(convert_column_data(&ColumnData::I32(Some(7))), RowValues::Int(7));
        assert_eq!(convert_column_data(&ColumnData::U8(Some(255))), RowValues::Int(255));
        assert_eq!(convert_column_data(&ColumnData::Bit(Some(true))), RowValues::Bool(true));
        assert_eq!(
            convert_column_data(&ColumnData::String(Some(Cow::Borrowed("abc")))),
            RowValues::Text("abc".into())
        );
        assert_eq!(convert_column_data(&ColumnData::I64(None)), RowValues::Null);
    }

    #[test]
    fn numeric_uses_scale() {
        let n = tiberius::numeric::Numeric::new_with_scale(12345, 2);
        assert_eq!(
            convert_column_data(&ColumnData::Numeric(Some(n))),
            RowValues::Float(123.45)
        );
    }

    #[test]
    fn procedure_sets_complete_in_proc() {
        assert_eq!(
            set_completion(Submission::Procedure, 3),
            ProtocolEvent::done_in_proc(3)
        );
        assert_eq!(set_completion(Submission::Sql, 3), ProtocolEvent::done(3));
    }
}
