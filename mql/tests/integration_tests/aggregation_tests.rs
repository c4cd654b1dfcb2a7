//! Integration tests for aggregations across series.

use std::collections::HashMap;

use sqlx::SqliteConnection;

use super::common::{compile_at, every_minute, insert_series, query_at, test_db, Sample, MINUTE, T0};

const END: i64 = T0 + 10 * MINUTE;

/// Latest values: api/a=10, api/b=30, api/c=20 (dev), db/d=5.
async fn seeded() -> SqliteConnection {
    let mut conn = test_db().await;
    for (labels, values) in [
        (
            [("job", "api"), ("instance", "a"), ("env", "prod")],
            [1.0, 10.0],
        ),
        (
            [("job", "api"), ("instance", "b"), ("env", "prod")],
            [2.0, 30.0],
        ),
        (
            [("job", "api"), ("instance", "c"), ("env", "dev")],
            [3.0, 20.0],
        ),
        (
            [("job", "db"), ("instance", "d"), ("env", "prod")],
            [4.0, 5.0],
        ),
    ] {
        insert_series(&mut conn, "memory_bytes", &labels, &every_minute(&values)).await;
    }
    conn
}

fn by_job(rows: &[Sample]) -> HashMap<String, f64> {
    rows.iter()
        .map(|row| (row.label("job").unwrap_or_default().to_string(), row.value()))
        .collect()
}

#[tokio::test]
async fn test_sum_by_label() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "sum(memory_bytes) by (job)", END).await;

    let sums = by_job(&rows);
    assert_eq!(sums.len(), 2);
    assert_eq!(sums["api"], 60.0);
    assert_eq!(sums["db"], 5.0);
}

#[tokio::test]
async fn test_aggregation_without_modifier_collapses_everything() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "max(memory_bytes)", END).await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value(), 30.0);
    assert!(rows[0].labels.is_empty());
    assert_eq!(rows[0].timestamp_ms, Some(T0 + MINUTE));
}

#[tokio::test]
async fn test_min_avg_max_ordering() {
    let mut conn = seeded().await;

    let min = by_job(&query_at(&mut conn, "min(memory_bytes) by (job)", END).await);
    let avg = by_job(&query_at(&mut conn, "avg(memory_bytes) by (job)", END).await);
    let max = by_job(&query_at(&mut conn, "max(memory_bytes) by (job)", END).await);

    assert_eq!(min.len(), 2);
    for job in min.keys() {
        assert!(min[job] <= avg[job], "{job}");
        assert!(avg[job] <= max[job], "{job}");
    }
    assert_eq!(avg["api"], 20.0);
}

#[tokio::test]
async fn test_by_keeps_exactly_the_listed_labels() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "sum(memory_bytes) by (job, env)", END).await;

    assert_eq!(rows.len(), 3);
    for row in &rows {
        let keys: Vec<_> = row.labels.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["env", "job"]);
    }
}

#[tokio::test]
async fn test_by_label_missing_on_some_series() {
    let mut conn = seeded().await;
    insert_series(&mut conn, "memory_bytes", &[("job", "cache")], &[(T0, 7.0)]).await;

    let rows = query_at(&mut conn, "sum(memory_bytes) by (instance)", END).await;

    // The series without an instance label forms its own, label-less group.
    assert_eq!(rows.len(), 5);
    let unlabeled: Vec<_> = rows.iter().filter(|row| row.labels.is_empty()).collect();
    assert_eq!(unlabeled.len(), 1);
    assert_eq!(unlabeled[0].value(), 7.0);
}

#[tokio::test]
async fn test_without_removes_listed_labels() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "sum without (instance, env) (memory_bytes)", END).await;

    let sums = by_job(&rows);
    assert_eq!(sums["api"], 60.0);
    assert_eq!(sums["db"], 5.0);
    for row in &rows {
        assert!(!row.labels.contains_key("instance"));
        assert!(!row.labels.contains_key("env"));
    }
}

#[tokio::test]
async fn test_count_is_integer_valued() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "count(memory_bytes) by (env)", END).await;

    let counts: HashMap<_, _> = rows
        .iter()
        .map(|row| (row.label("env").unwrap_or_default().to_string(), row.value()))
        .collect();
    assert_eq!(counts["prod"], 3.0);
    assert_eq!(counts["dev"], 1.0);
    for value in counts.values() {
        assert!(*value >= 0.0);
        assert_eq!(value.fract(), 0.0);
    }
}

#[tokio::test]
async fn test_stdvar() {
    let mut conn = test_db().await;
    for (i, value) in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter().enumerate() {
        let instance = i.to_string();
        insert_series(&mut conn, "load", &[("instance", instance.as_str())], &[(T0, value)]).await;
    }

    let rows = query_at(&mut conn, "stdvar(load)", T0).await;

    assert_eq!(rows.len(), 1);
    assert!((rows[0].value() - 4.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_aggregate_of_rollup() {
    let mut conn = test_db().await;
    insert_series(
        &mut conn,
        "requests_total",
        &[("job", "api"), ("instance", "a")],
        &every_minute(&[0.0, 60.0]),
    )
    .await;
    insert_series(
        &mut conn,
        "requests_total",
        &[("job", "api"), ("instance", "b")],
        &every_minute(&[0.0, 120.0]),
    )
    .await;

    let rows = query_at(&mut conn, "sum(rate(requests_total[5m])) by (job)", T0 + MINUTE).await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].label("job"), Some("api"));
    assert!((rows[0].value() - 3.0).abs() < 1e-9);
}

#[test]
fn test_stddev_uses_square_root() {
    let compiled = compile_at("stddev(load) by (job)", END);
    assert!(compiled.sql().contains("SQRT("));
}
