//! Selector compilation.
//!
//! A selector becomes a join from `sample_value` through `metric_instance` to
//! `sample_name`, with one label-set subquery per matcher. Negative matchers
//! exclude whole label sets through `NOT IN`, so a series is dropped when any
//! of its labels matches, never just the matching membership row.

use super::{check_identifier, Node, ValueKind};
use crate::config::CompileOptions;
use crate::error::{MqlError, Result};
use crate::fragment::SqlFragment;
use crate::pattern;
use crate::query::{Duration, LabelMatcher, MatchOp, Selector};
use crate::schema::{
    LABEL_KEY, LABEL_SET_MEMBERSHIP, LABEL_VALUE, METRIC_INSTANCE, SAMPLE_NAME, SAMPLE_VALUE,
};

/// Compiles a selector on its own: the latest sample per series, or every
/// sample inside the window for range selectors.
pub(crate) fn compile(selector: &Selector, options: &CompileOptions) -> Result<Node> {
    let regex = selector.matchers.iter().any(|m| m.op.is_regex());
    let node = match selector.window {
        Some(window) => Node::vector(
            window_samples(selector, window, options)?,
            ValueKind::RangeVector,
        ),
        None => Node::vector(latest_samples(selector, options)?, ValueKind::InstantVector),
    };
    Ok(node.with_regex(regex))
}

/// Every sample of the selected series inside `[end - window, end]`.
pub(crate) fn window_samples(
    selector: &Selector,
    window: Duration,
    options: &CompileOptions,
) -> Result<SqlFragment> {
    if window.as_millis() <= 0 {
        return Err(MqlError::semantic(format!(
            "range window for {} must be greater than zero",
            selector.metric
        )));
    }

    let fragment = SqlFragment::raw("WITH time_window AS (\n")
        .append(time_window(window, options)?.indent(2))
        .push_sql("\n)\n")
        .append(series_select(selector)?)
        .push_sql(&format!(
            "\nCROSS JOIN time_window tw\nWHERE {sn}.sample = ",
            sn = SAMPLE_NAME.alias
        ))
        .push_param(selector.metric.as_str())
        .append(matcher_predicates(&selector.matchers)?)
        .push_sql(&format!(
            "\n  AND {sv}.timestamp_ms >= tw.min_ts\n  AND {sv}.timestamp_ms <= tw.max_ts",
            sv = SAMPLE_VALUE.alias
        ));
    Ok(fragment)
}

/// The most recent sample of each selected series.
fn latest_samples(selector: &Selector, options: &CompileOptions) -> Result<SqlFragment> {
    let mut latest = SqlFragment::raw(format!(
        "\n  AND {sv}.timestamp_ms = (\n    SELECT MAX(latest.timestamp_ms)\n    FROM {sv_table} latest\n    WHERE latest.metric_instance_id = {sv}.metric_instance_id",
        sv = SAMPLE_VALUE.alias,
        sv_table = SAMPLE_VALUE.name
    ));
    if let Some(end) = options.end_time_ms {
        latest = latest
            .push_sql("\n      AND latest.timestamp_ms <= ")
            .push_param(end);
    }
    latest = latest.push_sql(")");

    let fragment = series_select(selector)?
        .push_sql(&format!("\nWHERE {sn}.sample = ", sn = SAMPLE_NAME.alias))
        .push_param(selector.metric.as_str())
        .append(matcher_predicates(&selector.matchers)?)
        .append(latest);
    Ok(fragment)
}

/// Window bounds: `max_ts` is the pinned end time or the latest sample in
/// the table, `min_ts` lies one window earlier.
fn time_window(window: Duration, options: &CompileOptions) -> Result<SqlFragment> {
    let fragment = match options.end_time_ms {
        Some(end) => {
            let start = end.checked_sub(window.as_millis()).ok_or_else(|| {
                MqlError::semantic(format!("range window {window} reaches before the epoch range"))
            })?;
            SqlFragment::raw("SELECT ")
                .push_param(end)
                .push_sql(" AS max_ts, ")
                .push_param(start)
                .push_sql(" AS min_ts")
        }
        None => SqlFragment::raw("SELECT MAX(timestamp_ms) AS max_ts, MAX(timestamp_ms) - ")
            .push_param(window.as_millis())
            .push_sql(&format!(" AS min_ts\nFROM {}", SAMPLE_VALUE.name)),
    };
    Ok(fragment)
}

/// `SELECT` list and joins shared by instant and range selectors.
fn series_select(selector: &Selector) -> Result<SqlFragment> {
    check_identifier("metric name", &selector.metric)?;

    Ok(SqlFragment::raw(format!(
        "SELECT\n  {mi}.label_set_id AS label_set_id,\n  {sv}.timestamp_ms AS timestamp_ms,\n  {sv}.value AS value,\n  {labels} AS labels\nFROM {sv_table} {sv}\nJOIN {mi_table} {mi} ON {mi}.id = {sv}.metric_instance_id\nJOIN {sn_table} {sn} ON {sn}.id = {mi}.sample_name_id",
        mi = METRIC_INSTANCE.alias,
        sv = SAMPLE_VALUE.alias,
        sn = SAMPLE_NAME.alias,
        labels = series_labels(),
        sv_table = SAMPLE_VALUE.name,
        mi_table = METRIC_INSTANCE.name,
        sn_table = SAMPLE_NAME.name,
    )))
}

/// Canonical JSON object of a series' labels, keys sorted.
fn series_labels() -> String {
    format!(
        "COALESCE((\n    SELECT json_group_object({lk}.name, {lv}.value ORDER BY {lk}.name)\n    {joins}\n    WHERE {lsm}.label_set_id = {mi}.label_set_id), '{{}}')",
        lk = LABEL_KEY.alias,
        lv = LABEL_VALUE.alias,
        lsm = LABEL_SET_MEMBERSHIP.alias,
        mi = METRIC_INSTANCE.alias,
        joins = membership_joins().replace('\n', "\n    "),
    )
}

fn membership_joins() -> String {
    format!(
        "FROM {lsm_table} {lsm}\nJOIN {lk_table} {lk} ON {lk}.id = {lsm}.label_key_id\nJOIN {lv_table} {lv} ON {lv}.id = {lsm}.label_value_id",
        lsm_table = LABEL_SET_MEMBERSHIP.name,
        lsm = LABEL_SET_MEMBERSHIP.alias,
        lk_table = LABEL_KEY.name,
        lk = LABEL_KEY.alias,
        lv_table = LABEL_VALUE.name,
        lv = LABEL_VALUE.alias,
    )
}

fn matcher_predicates(matchers: &[LabelMatcher]) -> Result<SqlFragment> {
    let predicates = matchers
        .iter()
        .map(matcher_predicate)
        .collect::<Result<Vec<_>>>()?;
    Ok(SqlFragment::concat(predicates))
}

/// `AND label_set_id [NOT] IN (label sets where the label matches)`.
fn matcher_predicate(matcher: &LabelMatcher) -> Result<SqlFragment> {
    check_identifier("label name", &matcher.label)?;

    let (comparison, value) = match matcher.op {
        MatchOp::Equal | MatchOp::NotEqual => ("=", matcher.value.clone()),
        MatchOp::RegexMatch | MatchOp::RegexNotMatch => {
            let anchored = pattern::anchored(&matcher.value);
            pattern::validate_pattern(&anchored)?;
            ("REGEXP", anchored)
        }
    };
    let membership = if matcher.op.is_negative() { "NOT IN" } else { "IN" };

    let fragment = SqlFragment::raw(format!(
        "\n  AND {mi}.label_set_id {membership} (\n    SELECT {lsm}.label_set_id\n    {joins}\n    WHERE {lk}.name = ",
        mi = METRIC_INSTANCE.alias,
        lsm = LABEL_SET_MEMBERSHIP.alias,
        lk = LABEL_KEY.alias,
        joins = membership_joins().replace('\n', "\n    "),
    ))
    .push_param(matcher.label.as_str())
    .push_sql(&format!(" AND {lv}.value {comparison} ", lv = LABEL_VALUE.alias))
    .push_param(value)
    .push_sql(")");
    Ok(fragment)
}
