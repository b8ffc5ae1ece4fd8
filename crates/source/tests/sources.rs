//! Source behaviour against a CSV file and a stub ClickHouse HTTP endpoint

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use roas_cohort::{CohortFrame, Day, Dimension, Metric};
use roas_source::{ClickHouseConfig, ClickHouseSource, CohortSource, CsvSource, RowFilter, SourceError};
use tokio::sync::Mutex;

const CSV: &str = "date_idx,opt_group_map,conv_window_map,country_map,installs,cost,iaa_roas_d0\n\
0,A,w,US,10,100,0.1\n\
1,A,w,DE,10,50,0.4\n\
2,B,w,US,10,10,\\N\n";

#[derive(Default)]
struct Captured {
    params: HashMap<String, String>,
    body: String,
    bodies: Vec<String>,
    user: Option<String>,
}

async fn spawn_stub(status: StatusCode, response: &'static str) -> Result<(String, Arc<Mutex<Captured>>)> {
    let captured = Arc::new(Mutex::new(Captured::default()));
    let app = Router::new()
        .route(
            "/",
            post(
                move |State(captured): State<Arc<Mutex<Captured>>>,
                      Query(params): Query<HashMap<String, String>>,
                      headers: HeaderMap,
                      body: String| async move {
                    let mut c = captured.lock().await;
                    c.params = params;
                    c.bodies.push(body.clone());
                    c.body = body;
                    c.user = headers
                        .get("X-ClickHouse-User")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    (status, response)
                },
            ),
        )
        .with_state(Arc::clone(&captured));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), captured))
}

fn clickhouse(url: String) -> Result<ClickHouseSource> {
    Ok(ClickHouseSource::new(ClickHouseConfig {
        url,
        user: Some("reader".to_string()),
        ..ClickHouseConfig::default()
    })?)
}

#[tokio::test]
async fn csv_source_applies_filter() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(CSV.as_bytes())?;
    file.flush()?;
    let source = CsvSource::from_path(file.path())?;
    assert_eq!(source.len(), 3);

    let all = source.query(&RowFilter::new(0, 2)?).await?;
    assert_eq!(all.len(), 3);

    let us = source
        .query(&RowFilter::new(0, 2)?.with_dimension(Dimension::Country, "US"))
        .await?;
    assert_eq!(us.len(), 2);

    let none = source.query(&RowFilter::new(5, 9)?).await?;
    assert!(none.is_empty());
    Ok(())
}

#[tokio::test]
async fn csv_source_rejects_reversed_range() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(CSV.as_bytes())?;
    file.flush()?;
    let source = CsvSource::from_path(file.path())?;
    let filter = RowFilter {
        date_from: 3,
        date_to: 1,
        opt_group_map: None,
        conv_window_map: None,
        country_map: None,
    };
    assert!(matches!(source.query(&filter).await, Err(SourceError::InvalidFilter(_))));
    Ok(())
}

#[tokio::test]
async fn clickhouse_sends_bound_parameters() -> Result<()> {
    let (url, captured) = spawn_stub(StatusCode::OK, CSV).await?;
    let source = clickhouse(url)?;

    let filter = RowFilter::new(0, 2)?.with_dimension(Dimension::OptGroup, "A");
    let frame = source.query(&filter).await?;
    assert_eq!(frame.len(), 3);
    assert_eq!(frame.rows()[2].metric(Metric::IaaRoas, Day::D0), None);

    let c = captured.lock().await;
    assert!(c.body.ends_with("FORMAT CSVWithNames"));
    assert!(c.body.contains("opt_group_map = {opt:String}"));
    assert_eq!(c.params.get("param_date_from").map(String::as_str), Some("0"));
    assert_eq!(c.params.get("param_date_to").map(String::as_str), Some("2"));
    assert_eq!(c.params.get("param_opt").map(String::as_str), Some("A"));
    assert_eq!(c.user.as_deref(), Some("reader"));
    Ok(())
}

#[tokio::test]
async fn clickhouse_empty_body_is_empty_frame() -> Result<()> {
    let (url, _) = spawn_stub(StatusCode::OK, "").await?;
    let frame = clickhouse(url)?.query(&RowFilter::new(0, 1)?).await?;
    assert!(frame.is_empty());
    Ok(())
}

#[tokio::test]
async fn clickhouse_error_status_is_reported() -> Result<()> {
    let (url, _) = spawn_stub(StatusCode::INTERNAL_SERVER_ERROR, "Code: 60. Table does not exist").await?;
    let err = clickhouse(url)?.query(&RowFilter::new(0, 1)?).await.unwrap_err();
    match err {
        SourceError::Query { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("Table does not exist"));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn clickhouse_creates_database_then_table() -> Result<()> {
    let (url, captured) = spawn_stub(StatusCode::OK, "").await?;
    clickhouse(url)?.ensure_schema().await?;

    let c = captured.lock().await;
    assert_eq!(c.bodies.len(), 2);
    assert_eq!(c.bodies[0], "CREATE DATABASE IF NOT EXISTS roas");
    assert!(c.bodies[1].starts_with("CREATE TABLE IF NOT EXISTS roas.cohort_metrics"));
    assert!(c.bodies[1].contains("iaa_roas_d90 Nullable(Float64)"));
    Ok(())
}

#[tokio::test]
async fn clickhouse_insert_streams_csv_with_names() -> Result<()> {
    let (url, captured) = spawn_stub(StatusCode::OK, "").await?;
    let source = clickhouse(url)?;
    let frame = CohortFrame::from_csv_reader(CSV.as_bytes())?;

    assert_eq!(source.insert(&frame).await?, 3);

    let c = captured.lock().await;
    assert_eq!(
        c.params.get("query").map(String::as_str),
        Some("INSERT INTO roas.cohort_metrics FORMAT CSVWithNames")
    );
    assert_eq!(c.user.as_deref(), Some("reader"));
    // the inserted body parses back to the same rows
    let sent = CohortFrame::from_csv_reader(c.body.as_bytes())?;
    assert_eq!(sent, frame);
    assert!(c.body.lines().nth(3).is_some_and(|l| l.ends_with("\\N")));
    Ok(())
}

#[tokio::test]
async fn clickhouse_insert_skips_empty_frames() -> Result<()> {
    let (url, captured) = spawn_stub(StatusCode::OK, "").await?;
    let empty = CohortFrame::with_all_columns(Vec::new());
    assert_eq!(clickhouse(url)?.insert(&empty).await?, 0);
    assert!(captured.lock().await.bodies.is_empty());
    Ok(())
}

#[tokio::test]
async fn clickhouse_insert_reports_rejection() -> Result<()> {
    let (url, _) = spawn_stub(StatusCode::BAD_REQUEST, "Code: 27. Cannot parse input").await?;
    let frame = CohortFrame::from_csv_reader(CSV.as_bytes())?;
    let err = clickhouse(url)?.insert(&frame).await.unwrap_err();
    assert!(matches!(err, SourceError::Query { status: 400, .. }));
    Ok(())
}
