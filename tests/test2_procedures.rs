use tds_middleware::prelude::*;
use tds_middleware::protocol::Submission;
use tds_middleware::test_utils::{RecordedCall, ScriptedConnector, metadata};

fn middleware(
    connector: &ScriptedConnector,
) -> Result<TdsMiddleware<ScriptedConnector>, TdsMiddlewareError> {
    let config = Configuration::new(ConnectionOptions::new("scripted"), PoolOptions::default());
    TdsMiddleware::new(config, false, connector.clone())
}

#[tokio::test(flavor = "current_thread")]
async fn procedure_sets_complete_once() -> Result<(), Box<dyn std::error::Error>> {
    let connector = ScriptedConnector::new();
    connector.push_events(vec![
        metadata(&["order_id"]),
        ProtocolEvent::Row(vec![RowValues::Int(10)]),
        ProtocolEvent::Row(vec![RowValues::Int(11)]),
        ProtocolEvent::done_in_proc(2),
        metadata(&["total"]),
        ProtocolEvent::Row(vec![RowValues::Int(21)]),
        ProtocolEvent::done_in_proc(1),
        // the call itself completes after its statements
        ProtocolEvent::done(1),
    ]);
    let db = middleware(&connector)?;

    let outcome = db
        .request(RequestSpec::procedure("dbo.get_orders").param("@customer", 7))
        .await?;

    assert_eq!(outcome.result_sets.len(), 2);
    assert_eq!(outcome.result_sets[0].rows_affected, 2);
    assert_eq!(outcome.result_sets[1].rows_affected, 1);
    assert_eq!(
        outcome.result_sets[1].rows[0].get("total"),
        Some(&RowValues::Int(21))
    );

    assert_eq!(
        connector.calls(),
        vec![RecordedCall::Request {
            submission: Submission::Procedure,
            sql: "dbo.get_orders".to_string(),
            parameters: vec![Parameter::new("customer", 7)],
        }]
    );
    assert_eq!(db.status().released, 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn done_without_count_uses_buffered_rows() -> Result<(), Box<dyn std::error::Error>> {
    let connector = ScriptedConnector::new();
    connector.push_events(vec![
        metadata(&["a"]),
        ProtocolEvent::Row(vec![RowValues::Int(1)]),
        ProtocolEvent::Row(vec![RowValues::Int(2)]),
        ProtocolEvent::Row(vec![RowValues::Int(3)]),
        ProtocolEvent::DoneInProc {
            row_count: None,
            more: true,
        },
        ProtocolEvent::Done {
            row_count: None,
            more: false,
        },
    ]);
    let db = middleware(&connector)?;

    let outcome = db.request(RequestSpec::procedure("list_a")).await?;
    assert_eq!(outcome.rows_affected(), Some(3));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn stream_ending_with_open_set_still_returns_it() -> Result<(), Box<dyn std::error::Error>> {
    let connector = ScriptedConnector::new();
    connector.push_events(vec![
        metadata(&["a"]),
        ProtocolEvent::Row(vec![RowValues::Int(1)]),
    ]);
    let db = middleware(&connector)?;

    let outcome = db.request(RequestSpec::new("SELECT a FROM t")).await?;
    assert_eq!(outcome.result_sets.len(), 1);
    assert_eq!(outcome.rows_affected(), Some(1));
    Ok(())
}
