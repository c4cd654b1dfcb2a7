//! Integration tests for instant and range selectors.

use sqlx::SqliteConnection;

use super::common::{compile_at, every_minute, insert_series, query_at, test_db, MINUTE, T0};

const END: i64 = T0 + 10 * MINUTE;

async fn seeded() -> SqliteConnection {
    let mut conn = test_db().await;
    insert_series(
        &mut conn,
        "http_requests_total",
        &[("job", "api"), ("env", "prod")],
        &every_minute(&[1.0, 2.0, 3.0]),
    )
    .await;
    insert_series(
        &mut conn,
        "http_requests_total",
        &[("job", "api"), ("env", "dev")],
        &every_minute(&[10.0, 20.0]),
    )
    .await;
    insert_series(
        &mut conn,
        "http_requests_total",
        &[("job", "db")],
        &every_minute(&[7.0]),
    )
    .await;
    insert_series(
        &mut conn,
        "cpu_usage",
        &[("job", "api"), ("env", "prod")],
        &every_minute(&[0.5]),
    )
    .await;
    conn
}

// ============================================================================
// INSTANT SELECTORS
// ============================================================================

#[tokio::test]
async fn test_instant_selector_returns_latest_sample_per_series() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "http_requests_total", END).await;

    assert_eq!(rows.len(), 3);
    // Rows are ordered by their rendered labels.
    assert_eq!(rows[0].label("env"), Some("dev"));
    assert_eq!(rows[0].value(), 20.0);
    assert_eq!(rows[0].timestamp_ms, Some(T0 + MINUTE));
    assert_eq!(rows[1].label("env"), Some("prod"));
    assert_eq!(rows[1].value(), 3.0);
    assert_eq!(rows[1].timestamp_ms, Some(T0 + 2 * MINUTE));
    assert_eq!(rows[2].label("job"), Some("db"));
    assert_eq!(rows[2].value(), 7.0);
}

#[tokio::test]
async fn test_labels_are_complete_and_sorted() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, r#"cpu_usage{job="api"}"#, END).await;

    assert_eq!(rows.len(), 1);
    let keys: Vec<_> = rows[0].labels.keys().cloned().collect();
    assert_eq!(keys, vec!["env", "job"]);
}

#[tokio::test]
async fn test_equality_matchers() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, r#"http_requests_total{job="api", env="prod"}"#, END).await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value(), 3.0);
}

#[tokio::test]
async fn test_not_equal_excludes_matching_series() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, r#"http_requests_total{env!="dev"}"#, END).await;

    // The series without an env label is kept.
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.label("env") != Some("dev")));
}

#[tokio::test]
async fn test_end_time_limits_latest_sample() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, r#"http_requests_total{env="prod"}"#, T0 + MINUTE).await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value(), 2.0);
}

#[tokio::test]
async fn test_unknown_metric_returns_nothing() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "does_not_exist", END).await;

    assert!(rows.is_empty());
}

// ============================================================================
// RANGE SELECTORS
// ============================================================================

#[tokio::test]
async fn test_range_selector_returns_samples_in_window() {
    let mut conn = seeded().await;

    // Window [T0 + 1m, T0 + 3m] drops the first sample.
    let rows = query_at(
        &mut conn,
        r#"http_requests_total{env="prod"}[2m]"#,
        T0 + 3 * MINUTE,
    )
    .await;

    let values: Vec<_> = rows.iter().map(|row| row.value()).collect();
    assert_eq!(values, vec![2.0, 3.0]);
    assert!(rows.windows(2).all(|w| w[0].timestamp_ms < w[1].timestamp_ms));
}

#[tokio::test]
async fn test_range_selector_defaults_to_latest_sample_in_database() {
    let mut conn = seeded().await;

    let compiled = mql::QueryCompiler::default()
        .compile(r#"http_requests_total{env="prod"}[1m]"#)
        .unwrap();
    let rows = super::common::execute(&mut conn, &compiled).await;

    // The newest sample anywhere is at T0 + 2m, so the window is [T0 + 1m, T0 + 2m].
    assert_eq!(rows.len(), 2);
}

// ============================================================================
// SQL SHAPE
// ============================================================================

#[test]
fn test_selector_values_are_bound() {
    let compiled = compile_at(r#"http_requests_total{job="api", env!="dev"}"#, END);
    let sql = compiled.sql();

    assert!(!sql.contains("http_requests_total"));
    assert!(!sql.contains("'api'"));
    assert!(!sql.contains("'dev'"));
    assert!(sql.contains("NOT IN"));
    assert_eq!(
        compiled.fragment.placeholder_count(),
        compiled.fragment.params().len()
    );
}
