//! Integration tests for rollup functions.

use super::common::{every_minute, insert_series, query_at, test_db, MINUTE, T0};

// ============================================================================
// COUNTERS
// ============================================================================

#[tokio::test]
async fn test_increase_handles_counter_reset() {
    let mut conn = test_db().await;
    insert_series(
        &mut conn,
        "requests_total",
        &[("job", "api")],
        &every_minute(&[100.0, 150.0, 200.0, 50.0, 100.0, 150.0]),
    )
    .await;

    let rows = query_at(&mut conn, "increase(requests_total[10m])", T0 + 5 * MINUTE).await;

    // Five steps of 50, the reset step counting its new value.
    assert_eq!(rows.len(), 1);
    assert!((rows[0].value() - 250.0).abs() < 1e-9);
    assert_eq!(rows[0].timestamp_ms, Some(T0 + 5 * MINUTE));
    assert_eq!(rows[0].label("job"), Some("api"));
}

#[tokio::test]
async fn test_rate_is_increase_per_second() {
    let mut conn = test_db().await;
    insert_series(
        &mut conn,
        "requests_total",
        &[("job", "api")],
        &every_minute(&[100.0, 150.0, 200.0, 50.0, 100.0, 150.0]),
    )
    .await;

    let rows = query_at(&mut conn, "rate(requests_total[10m])", T0 + 5 * MINUTE).await;

    assert_eq!(rows.len(), 1);
    assert!((rows[0].value() - 250.0 / 300.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_rate_and_increase_non_negative_for_monotonic_counters() {
    let mut conn = test_db().await;
    insert_series(
        &mut conn,
        "requests_total",
        &[("job", "a")],
        &every_minute(&[1.0, 5.0, 9.0, 20.0, 21.0]),
    )
    .await;
    insert_series(
        &mut conn,
        "requests_total",
        &[("job", "b")],
        &every_minute(&[0.0, 0.5]),
    )
    .await;

    for window in ["1m", "2m", "5m", "1h"] {
        for func in ["rate", "increase"] {
            let query = format!("{func}(requests_total[{window}])");
            let rows = query_at(&mut conn, &query, T0 + 4 * MINUTE).await;
            assert!(!rows.is_empty(), "{query}");
            assert!(rows.iter().all(|row| row.value() >= 0.0), "{query}");
        }
    }
}

#[tokio::test]
async fn test_single_sample_window_yields_nothing() {
    let mut conn = test_db().await;
    insert_series(
        &mut conn,
        "requests_total",
        &[("job", "api")],
        &every_minute(&[1.0, 2.0, 3.0]),
    )
    .await;

    // Only the sample at T0 + 2m is inside the window.
    let rows = query_at(&mut conn, "rate(requests_total[30s])", T0 + 2 * MINUTE).await;
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_identical_timestamps_do_not_divide_by_zero() {
    let mut conn = test_db().await;
    insert_series(
        &mut conn,
        "requests_total",
        &[("job", "api")],
        &[(T0, 1.0), (T0, 4.0)],
    )
    .await;

    let rows = query_at(&mut conn, "rate(requests_total[5m])", T0).await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value(), 0.0);
}

// ============================================================================
// OVER-TIME AGGREGATES
// ============================================================================

#[tokio::test]
async fn test_over_time_functions() {
    let mut conn = test_db().await;
    insert_series(
        &mut conn,
        "cpu",
        &[("host", "a")],
        &every_minute(&[4.0, 1.0, 3.0, 2.0, 5.0]),
    )
    .await;
    let end = T0 + 4 * MINUTE;

    for (query, expected) in [
        ("avg_over_time(cpu[10m])", 3.0),
        ("sum_over_time(cpu[10m])", 15.0),
        ("min_over_time(cpu[10m])", 1.0),
        ("max_over_time(cpu[10m])", 5.0),
        ("count_over_time(cpu[10m])", 5.0),
        // Only the last three samples: 3, 2, 5.
        ("avg_over_time(cpu[2m])", 10.0 / 3.0),
        ("count_over_time(cpu[2m])", 3.0),
    ] {
        let rows = query_at(&mut conn, query, end).await;
        assert_eq!(rows.len(), 1, "{query}");
        assert!((rows[0].value() - expected).abs() < 1e-9, "{query}");
        assert_eq!(rows[0].timestamp_ms, Some(end), "{query}");
    }
}

#[tokio::test]
async fn test_rollups_are_per_series() {
    let mut conn = test_db().await;
    insert_series(&mut conn, "cpu", &[("host", "a")], &every_minute(&[1.0, 3.0])).await;
    insert_series(&mut conn, "cpu", &[("host", "b")], &every_minute(&[10.0, 30.0])).await;

    let rows = query_at(&mut conn, "max_over_time(cpu[5m])", T0 + MINUTE).await;

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].label("host"), Some("a"));
    assert_eq!(rows[0].value(), 3.0);
    assert_eq!(rows[1].label("host"), Some("b"));
    assert_eq!(rows[1].value(), 30.0);
}

#[tokio::test]
async fn test_quantile_over_time() {
    let mut conn = test_db().await;
    insert_series(
        &mut conn,
        "latency",
        &[("route", "/")],
        &every_minute(&[5.0, 1.0, 4.0, 2.0, 3.0]),
    )
    .await;
    let end = T0 + 4 * MINUTE;

    for (query, expected) in [
        ("quantile_over_time(0, latency[10m])", 1.0),
        ("quantile_over_time(0.5, latency[10m])", 3.0),
        ("quantile_over_time(1, latency[10m])", 5.0),
    ] {
        let rows = query_at(&mut conn, query, end).await;
        assert_eq!(rows.len(), 1, "{query}");
        assert_eq!(rows[0].value(), expected, "{query}");
    }
}

#[tokio::test]
async fn test_quantile_of_single_sample() {
    let mut conn = test_db().await;
    insert_series(&mut conn, "latency", &[], &[(T0, 42.0)]).await;

    let rows = query_at(&mut conn, "quantile_over_time(0.99, latency[1m])", T0).await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value(), 42.0);
    assert!(rows[0].labels.is_empty());
}
