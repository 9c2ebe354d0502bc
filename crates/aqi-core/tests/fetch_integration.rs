//! Fetcher and pipeline tests against a local HTTP server.

use std::collections::HashMap;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use aqi_core::{
    DedupPolicy, Error, FetchOutcome, Fetcher, Ingestor, RunOutcome, RunState, StoreTarget, run,
};
use aqi_store::{ReadingQuery, ReadingStore};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/resource")
}

fn records_router(body: Value) -> Router {
    Router::new().route(
        "/resource",
        get(move || {
            let body = body.clone();
            async move { Json(body) }
        }),
    )
}

fn delhi_record() -> Value {
    json!({
        "station": "S1",
        "city": "Delhi",
        "state": "Delhi",
        "pollutant_id": "PM2.5",
        "avg_value": "120.5",
        "latitude": "28.6",
        "longitude": "77.2",
        "last_update": "01-01-2024 10:00:00"
    })
}

#[tokio::test]
async fn test_fetch_returns_records_verbatim() {
    let records = json!([
        delhi_record(),
        {"station": "S2", "avg_value": 42, "pollutant_unit": "ug/m3"},
        {"station": "S3", "avg_value": "NA"}
    ]);
    let url = serve(records_router(json!({ "total": 3, "records": records.clone() }))).await;

    let fetcher = Fetcher::new(&url, Some("key".to_string())).unwrap();
    let outcome = fetcher.fetch().await.unwrap();

    let FetchOutcome::Records(batch) = outcome else {
        panic!("expected records");
    };
    assert_eq!(batch.len(), 3);
    let fetched: Vec<Value> = batch.iter().cloned().map(Value::Object).collect();
    assert_eq!(Value::Array(fetched), records);
}

#[tokio::test]
async fn test_fetch_keeps_numbers_as_sent() {
    let app = Router::new().route(
        "/resource",
        get(|| async { r#"{"records":[{"station":"S1","avg_value":1.10,"latitude":28.600}]}"# }),
    );
    let url = serve(app).await;

    let batch = Fetcher::new(&url, None)
        .unwrap()
        .fetch()
        .await
        .unwrap()
        .into_batch();
    let record = &batch.records()[0];

    assert_eq!(serde_json::to_string(&record["avg_value"]).unwrap(), "1.10");
    assert_eq!(serde_json::to_string(&record["latitude"]).unwrap(), "28.600");
}

#[tokio::test]
async fn test_fetch_sends_key_format_and_limit() {
    let app = Router::new().route(
        "/resource",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            Json(json!({ "records": [params] }))
        }),
    );
    let url = serve(app).await;

    let fetcher = Fetcher::new(&url, Some("secret".to_string())).unwrap();
    let batch = fetcher.fetch().await.unwrap().into_batch();
    let echoed = &batch.records()[0];

    assert_eq!(echoed["api-key"], "secret");
    assert_eq!(echoed["format"], "json");
    assert_eq!(echoed["limit"], "1000");
}

#[tokio::test]
async fn test_fetch_without_key_sends_empty_key() {
    let app = Router::new().route(
        "/resource",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            Json(json!({ "records": [params] }))
        }),
    );
    let url = serve(app).await;

    let fetcher = Fetcher::new(&url, None).unwrap();
    let batch = fetcher.fetch().await.unwrap().into_batch();
    assert_eq!(batch.records()[0]["api-key"], "");
}

#[tokio::test]
async fn test_missing_records_is_empty_not_failure() {
    let url = serve(records_router(json!({ "message": "ok" }))).await;
    let fetcher = Fetcher::new(&url, None).unwrap();
    assert_eq!(fetcher.fetch().await.unwrap(), FetchOutcome::Empty);
}

#[tokio::test]
async fn test_empty_records_is_empty_not_failure() {
    let url = serve(records_router(json!({ "records": [] }))).await;
    let fetcher = Fetcher::new(&url, None).unwrap();
    assert!(fetcher.fetch().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_http_error_status_is_network_failure() {
    let app = Router::new().route(
        "/resource",
        get(|| async { (StatusCode::FORBIDDEN, Json(json!({ "error": "Invalid key" }))) }),
    );
    let url = serve(app).await;

    let err = Fetcher::new(&url, Some("bad".to_string()))
        .unwrap()
        .fetch()
        .await
        .unwrap_err();
    assert!(err.is_network_failure());
    assert!(matches!(err, Error::Status { status: 403, .. }));
    assert!(!err.to_string().contains("bad"));
}

#[tokio::test]
async fn test_invalid_json_is_network_failure() {
    let app = Router::new().route("/resource", get(|| async { "<html>maintenance</html>" }));
    let url = serve(app).await;

    let err = Fetcher::new(&url, None).unwrap().fetch().await.unwrap_err();
    assert!(err.is_network_failure());
    assert!(matches!(err, Error::Decode { .. }));
}

#[tokio::test]
async fn test_connection_refused_is_network_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = Fetcher::new(&format!("http://{addr}/resource"), Some("hidden".to_string())).unwrap();
    let err = fetcher.fetch().await.unwrap_err();

    assert!(matches!(err, Error::Network { .. }));
    assert!(err.is_network_failure());
    assert!(!err.to_string().contains("hidden"));
}

#[tokio::test]
async fn test_run_writes_csv_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pollution_data.csv");
    let url = serve(records_router(json!({ "records": [delhi_record()] }))).await;

    let fetcher = Fetcher::new(&url, Some("key".to_string())).unwrap();
    let ingestor = Ingestor::new(StoreTarget::Csv {
        path: path.clone(),
        overwrite: true,
    });

    let first = run(&fetcher, &ingestor).await;
    let second = run(&fetcher, &ingestor).await;

    assert_eq!(first.state, RunState::Done);
    assert_eq!(second.exit_code(), 0);
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.contains("01-01-2024 10:00:00"));
}

#[tokio::test]
async fn test_run_appends_to_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let target = StoreTarget::Sqlite {
        path: dir.path().join("pollution_data.db"),
        table: "readings".to_string(),
    };
    let url = serve(records_router(json!({ "records": [delhi_record(), delhi_record()] }))).await;
    let fetcher = Fetcher::new(&url, None).unwrap();

    let keep_all = Ingestor::new(target.clone());
    for _ in 0..3 {
        let report = run(&fetcher, &keep_all).await;
        assert_eq!(report.fetched, 2);
    }
    assert_eq!(target.open_existing().unwrap().count().unwrap(), 6);

    let skipping = Ingestor::new(target.clone()).with_dedup(DedupPolicy::SkipExisting);
    let report = run(&fetcher, &skipping).await;
    match report.outcome {
        RunOutcome::Done(result) => {
            assert_eq!(result.rows_written, 0);
            assert_eq!(result.rows_skipped, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let rows = target
        .open_existing()
        .unwrap()
        .query(&ReadingQuery::new().station("S1"))
        .unwrap();
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0].avg_value, Some(120.5));
}

#[tokio::test]
async fn test_run_no_data_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pollution_data.csv");
    let url = serve(records_router(json!({ "records": [] }))).await;

    let report = run(
        &Fetcher::new(&url, None).unwrap(),
        &Ingestor::new(StoreTarget::Csv {
            path: path.clone(),
            overwrite: true,
        }),
    )
    .await;

    assert_eq!(report.outcome, RunOutcome::NoData);
    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.exit_code(), 0);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_run_fetch_failure_exit_code() {
    let app = Router::new().route("/resource", get(|| async { StatusCode::FORBIDDEN }));
    let url = serve(app).await;
    let dir = tempfile::tempdir().unwrap();

    let report = run(
        &Fetcher::new(&url, None).unwrap(),
        &Ingestor::new(StoreTarget::Csv {
            path: dir.path().join("x.csv"),
            overwrite: true,
        }),
    )
    .await;

    assert_eq!(report.state, RunState::FetchFailed);
    assert_eq!(report.exit_code(), 2);
}

#[tokio::test]
async fn test_run_ingest_failure_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.csv");
    std::fs::write(&path, "a,b\n1,2\n").unwrap();
    let url = serve(records_router(json!({ "records": [delhi_record()] }))).await;

    let report = run(
        &Fetcher::new(&url, None).unwrap(),
        &Ingestor::new(StoreTarget::Csv {
            path: path.clone(),
            overwrite: false,
        }),
    )
    .await;

    assert_eq!(report.state, RunState::IngestFailed);
    assert_eq!(report.exit_code(), 3);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
}
