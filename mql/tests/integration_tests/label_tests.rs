//! Integration tests for label manipulation functions.

use sqlx::SqliteConnection;

use super::common::{compile_at, every_minute, insert_series, query_at, test_db, MINUTE, T0};
use mql::SqlParam;

const END: i64 = T0 + 10 * MINUTE;

async fn seeded() -> SqliteConnection {
    let mut conn = test_db().await;
    insert_series(
        &mut conn,
        "up",
        &[("job", "api"), ("instance", "host-1:9090")],
        &every_minute(&[1.0]),
    )
    .await;
    insert_series(
        &mut conn,
        "up",
        &[("job", "db"), ("instance", "host-2:5432")],
        &every_minute(&[0.0]),
    )
    .await;
    conn
}

#[tokio::test]
async fn test_label_set_adds_label_in_sorted_position() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, r#"label_set(up, "env", "prod")"#, END).await;

    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.label("env"), Some("prod"));
        let keys: Vec<_> = row.labels.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["env", "instance", "job"]);
    }
    assert_eq!(rows[0].value(), 1.0);
}

#[tokio::test]
async fn test_label_set_overwrites_and_empty_removes() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, r#"label_set(up, "job", "other")"#, END).await;
    assert!(rows.iter().all(|row| row.label("job") == Some("other")));

    let rows = query_at(&mut conn, r#"label_set(up, "job", "")"#, END).await;
    assert!(rows.iter().all(|row| !row.labels.contains_key("job")));
}

#[tokio::test]
async fn test_label_del_and_keep() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, r#"label_del(up, "instance")"#, END).await;
    for row in &rows {
        let keys: Vec<_> = row.labels.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["job"]);
    }

    let rows = query_at(&mut conn, r#"label_keep(up, "instance", "missing")"#, END).await;
    for row in &rows {
        let keys: Vec<_> = row.labels.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["instance"]);
    }
}

#[tokio::test]
async fn test_label_copy_and_move() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, r#"label_copy(up, "job", "service")"#, END).await;
    assert_eq!(rows[0].label("job"), Some("api"));
    assert_eq!(rows[0].label("service"), Some("api"));

    let rows = query_at(&mut conn, r#"label_move(up, "job", "service")"#, END).await;
    assert_eq!(rows[0].label("job"), None);
    assert_eq!(rows[0].label("service"), Some("api"));

    // A missing source leaves the labels untouched.
    let rows = query_at(&mut conn, r#"label_copy(up, "missing", "service")"#, END).await;
    assert_eq!(rows[0].labels.len(), 2);
}

#[tokio::test]
async fn test_label_move_onto_itself_is_a_no_op() {
    let mut conn = seeded().await;

    let rows = query_at(&mut conn, r#"label_move(up, "job", "job")"#, END).await;

    assert_eq!(rows[0].label("job"), Some("api"));
}

#[tokio::test]
async fn test_relabeled_series_can_be_aggregated() {
    let mut conn = seeded().await;

    let rows = query_at(
        &mut conn,
        r#"sum(label_set(up, "team", "core")) by (team)"#,
        END,
    )
    .await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].label("team"), Some("core"));
    assert_eq!(rows[0].value(), 1.0);
}

#[test]
fn test_label_replace_binds_anchored_pattern() {
    let compiled = compile_at(
        r#"label_replace(up, "host", "$1", "instance", "(.*):\\d+")"#,
        END,
    );

    assert!(compiled.requires_regex);
    assert!(compiled.sql().contains("regex_replace(?, ?"));
    let params = compiled.fragment.params();
    assert!(params.contains(&SqlParam::Text(r"^(?:(.*):\d+)$".to_string())));
    assert!(params.contains(&SqlParam::Text("$1".to_string())));
    assert!(params.contains(&SqlParam::Text("$.instance".to_string())));
    assert!(params.contains(&SqlParam::Text("$.host".to_string())));
}
