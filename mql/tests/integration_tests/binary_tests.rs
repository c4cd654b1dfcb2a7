//! Integration tests for binary operators.

use sqlx::SqliteConnection;

use super::common::{every_minute, insert_series, query_at, test_db, MINUTE, T0};

const END: i64 = T0 + 10 * MINUTE;

/// `errors` and `requests` for two jobs, plus `requests` for a third job
/// that has no `errors` series.
async fn seeded() -> SqliteConnection {
    let mut conn = test_db().await;
    insert_series(&mut conn, "errors", &[("job", "api")], &every_minute(&[5.0])).await;
    insert_series(&mut conn, "errors", &[("job", "db")], &every_minute(&[1.0])).await;
    insert_series(&mut conn, "requests", &[("job", "api")], &every_minute(&[50.0])).await;
    insert_series(&mut conn, "requests", &[("job", "db")], &every_minute(&[4.0])).await;
    insert_series(&mut conn, "requests", &[("job", "web")], &every_minute(&[8.0])).await;
    conn
}

// ============================================================================
// SCALARS
// ============================================================================

#[tokio::test]
async fn test_scalar_expressions() {
    let mut conn = test_db().await;

    for (query, expected) in [
        ("2 * 3", 6.0),
        ("7 / 2", 3.5),
        ("7 % 3", 1.0),
        ("-7 % 3", -1.0),
        ("1 + 2 * 3", 7.0),
        ("(1 + 2) * 3", 9.0),
        ("2 > 1", 1.0),
        ("2 == 1", 0.0),
    ] {
        let rows = query_at(&mut conn, query, END).await;
        assert_eq!(rows.len(), 1, "{query}");
        assert_eq!(rows[0].timestamp_ms, None, "{query}");
        assert!(rows[0].labels.is_empty(), "{query}");
        assert!((rows[0].value() - expected).abs() < 1e-9, "{query}");
    }
}

// ============================================================================
// VECTOR AND SCALAR
// ============================================================================

#[tokio::test]
async fn test_vector_scalar_arithmetic() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "requests * 2", END).await;
    let values: Vec<_> = rows.iter().map(|row| row.value()).collect();
    assert_eq!(values, vec![100.0, 8.0, 16.0]);

    let rows = query_at(&mut conn, "100 - requests", END).await;
    let values: Vec<_> = rows.iter().map(|row| row.value()).collect();
    assert_eq!(values, vec![50.0, 96.0, 92.0]);
}

#[tokio::test]
async fn test_comparison_yields_zero_or_one() {
    let mut conn = seeded().await;

    for query in ["requests > 5", "requests <= 8", "requests == 4", "requests != 4", "5 < requests"] {
        let rows = query_at(&mut conn, query, END).await;
        assert_eq!(rows.len(), 3, "{query}");
        assert!(
            rows.iter().all(|row| row.value() == 0.0 || row.value() == 1.0),
            "{query}"
        );
    }

    let rows = query_at(&mut conn, "requests > 5", END).await;
    let flags: Vec<_> = rows.iter().map(|row| row.value()).collect();
    assert_eq!(flags, vec![1.0, 0.0, 1.0]);
}

// ============================================================================
// VECTOR AND VECTOR
// ============================================================================

#[tokio::test]
async fn test_vector_division_matches_label_sets() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "errors / requests", END).await;

    // `web` has no errors series and drops out.
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].label("job"), Some("api"));
    assert!((rows[0].value() - 0.1).abs() < 1e-9);
    assert_eq!(rows[1].label("job"), Some("db"));
    assert!((rows[1].value() - 0.25).abs() < 1e-9);
}

#[tokio::test]
async fn test_vector_comparison() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "errors * 10 >= requests", END).await;

    let flags: Vec<_> = rows.iter().map(|row| row.value()).collect();
    assert_eq!(flags, vec![1.0, 1.0]);
}

#[tokio::test]
async fn test_aggregates_match_on_group_labels() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "sum(errors) by (job) / sum(requests) by (job)", END).await;

    assert_eq!(rows.len(), 2);
    assert!((rows[1].value() - 0.25).abs() < 1e-9);
}

#[tokio::test]
async fn test_range_vectors_match_on_timestamp() {
    let mut conn = test_db().await;
    insert_series(&mut conn, "a", &[("k", "v")], &every_minute(&[1.0, 2.0, 3.0])).await;
    insert_series(&mut conn, "b", &[("k", "v")], &every_minute(&[10.0, 20.0])).await;

    let rows = query_at(&mut conn, "a[5m] + b[5m]", T0 + 2 * MINUTE).await;

    let values: Vec<_> = rows.iter().map(|row| row.value()).collect();
    assert_eq!(values, vec![11.0, 22.0]);
}

// ============================================================================
// SET OPERATORS
// ============================================================================

#[tokio::test]
async fn test_and_keeps_matched_left_rows() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "requests and errors", END).await;

    let jobs: Vec<_> = rows.iter().filter_map(|row| row.label("job")).collect();
    assert_eq!(jobs, vec!["api", "db"]);
    assert_eq!(rows[0].value(), 50.0);
}

#[tokio::test]
async fn test_unless_keeps_unmatched_left_rows() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "requests unless errors", END).await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].label("job"), Some("web"));
}

#[tokio::test]
async fn test_or_prefers_left_side() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, "errors or requests", END).await;

    let pairs: Vec<_> = rows
        .iter()
        .map(|row| (row.label("job").unwrap_or_default(), row.value()))
        .collect();
    assert_eq!(pairs, vec![("api", 5.0), ("db", 1.0), ("web", 8.0)]);
}
