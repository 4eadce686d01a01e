use std::sync::{Arc, Mutex};

use tds_middleware::prelude::*;
use tds_middleware::test_utils::{ScriptedConnector, metadata, result_set};

fn middleware_with(
    connector: &ScriptedConnector,
    pool: PoolOptions,
) -> Result<TdsMiddleware<ScriptedConnector>, TdsMiddlewareError> {
    let config = Configuration::new(ConnectionOptions::new("scripted"), pool);
    TdsMiddleware::new(config, false, connector.clone())
}

#[tokio::test(flavor = "current_thread")]
async fn execution_error_releases_and_reports() -> Result<(), Box<dyn std::error::Error>> {
    let connector = ScriptedConnector::new();
    connector.push_failure(
        vec![metadata(&["a"]), ProtocolEvent::Row(vec![RowValues::Int(1)])],
        "deadlock victim",
    );
    let db = middleware_with(&connector, PoolOptions::default())?;

    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    let err = db
        .request(RequestSpec::new("SELECT a FROM t").callback(move |res| {
            *sink.lock().unwrap() = Some(res.err().map(ToString::to_string));
        }))
        .await
        .expect_err("execution fails");

    assert!(matches!(err, TdsMiddlewareError::ExecutionError(ref m) if m == "deadlock victim"));
    assert_eq!(seen.lock().unwrap().clone(), Some(Some(err.to_string())));
    let status = db.status();
    assert_eq!(status.acquired, 1);
    assert_eq!(status.released, 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn transform_error_fails_request_and_releases() -> Result<(), Box<dyn std::error::Error>> {
    let connector = ScriptedConnector::new();
    connector.push_events(result_set(
        &["id", "payload"],
        vec![vec![RowValues::Int(1), RowValues::Text("{bad".into())]],
    ));
    let db = middleware_with(&connector, PoolOptions::default())?;

    let parse_json = TransformRule::try_new("payload", |value, _| match value {
        RowValues::Text(s) => Ok(RowValues::JSON(serde_json::from_str(&s)?)),
        other => Ok(other),
    });
    let err = db
        .request(RequestSpec::new("SELECT id, payload FROM t").transform(parse_json))
        .await
        .expect_err("transform fails");

    match err {
        TdsMiddlewareError::TransformError {
            column, result_set, ..
        } => {
            assert_eq!(column, "payload");
            assert_eq!(result_set, 0);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(db.status().in_use(), 0);
    assert_eq!(db.status().released, 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn acquisition_timeout_executes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let connector = ScriptedConnector::new();
    let pool = PoolOptions {
        min: 1,
        max: 1,
        idle_timeout: 10_000,
        acquire_timeout: 50,
    };
    let db = middleware_with(&connector, pool)?;

    let held = db.connect().await?;
    let err = db
        .request(RequestSpec::new("SELECT 1"))
        .await
        .expect_err("pool exhausted");

    assert!(matches!(
        err,
        TdsMiddlewareError::AcquisitionError(AcquisitionFailure::Timeout)
    ));
    assert!(connector.calls().is_empty());
    let status = db.status();
    assert_eq!(status.acquired, 1);
    assert_eq!(status.released, 0);

    held.release();
    assert_eq!(db.status().released, 1);

    // the freed connection is reused, not reopened
    db.request(RequestSpec::new("SELECT 1")).await?;
    assert_eq!(connector.connects(), 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn connector_failure_is_an_acquisition_error() -> Result<(), Box<dyn std::error::Error>> {
    let connector = ScriptedConnector::new();
    connector.fail_connects(Some("connection refused"));
    let db = middleware_with(&connector, PoolOptions::default())?;

    let seen = Arc::new(Mutex::new(false));
    let sink = seen.clone();
    let err = db
        .connect_with(callback(
            move |res: Result<&PooledConnection<ScriptedConnector>, &TdsMiddlewareError>| {
                *sink.lock().unwrap() = res.is_err();
            },
        ))
        .await
        .expect_err("connect fails");

    match err {
        TdsMiddlewareError::AcquisitionError(AcquisitionFailure::Backend(msg)) => {
            assert!(msg.contains("connection refused"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(*seen.lock().unwrap());
    assert_eq!(db.status().acquired, 0);
    assert_eq!(db.status().released, 0);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn failures_are_logged_at_error_level() -> Result<(), Box<dyn std::error::Error>> {
    let connector = ScriptedConnector::new();
    connector.push_failure(vec![], "syntax error");
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let db = TdsMiddleware::new(
        Configuration::new(ConnectionOptions::new("scripted"), PoolOptions::default()),
        LoggerConfig::function(move |level, message| {
            sink.lock().unwrap().push((level, message.to_string()));
        }),
        connector.clone(),
    )?;

    let _ = db.request(RequestSpec::new("SELEC 1")).await;

    let lines = lines.lock().unwrap();
    let errors: Vec<_> = lines
        .iter()
        .filter(|(level, _)| *level == LogLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].1.contains("syntax error"));
    Ok(())
}

fn short_idle_pool(idle_timeout: u64) -> PoolOptions {
    PoolOptions {
        min: 1,
        max: 1,
        idle_timeout,
        acquire_timeout: 1_000,
    }
}

#[tokio::test(flavor = "current_thread")]
async fn broken_connection_is_not_handed_out_again() -> Result<(), Box<dyn std::error::Error>> {
    let connector = ScriptedConnector::new();
    let db = middleware_with(&connector, short_idle_pool(10_000))?;

    connector.break_next_request();
    db.request(RequestSpec::new("SELECT 1")).await?;
    assert_eq!(connector.connects(), 1);

    db.request(RequestSpec::new("SELECT 2")).await?;
    assert_eq!(connector.connects(), 2);

    // the replacement is healthy and stays
    db.request(RequestSpec::new("SELECT 3")).await?;
    assert_eq!(connector.connects(), 2);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn connection_idle_past_timeout_is_replaced() -> Result<(), Box<dyn std::error::Error>> {
    let connector = ScriptedConnector::new();
    let db = middleware_with(&connector, short_idle_pool(50))?;

    db.request(RequestSpec::new("SELECT 1")).await?;
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    db.request(RequestSpec::new("SELECT 1")).await?;

    assert_eq!(connector.connects(), 2);
    assert_eq!(db.status().size, 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn long_checkout_does_not_count_as_idle() -> Result<(), Box<dyn std::error::Error>> {
    let connector = ScriptedConnector::new();
    let db = middleware_with(&connector, short_idle_pool(100))?;

    let held = db.connect().await?;
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    held.release();

    let again = db.connect().await?;
    assert_eq!(connector.connects(), 1);
    again.release();
    assert_eq!(db.status().released, 2);
    Ok(())
}
