//! Rollup functions: one output sample per series, computed over the window.
//!
//! Only samples inside the window are considered; there is no look-back to
//! the last sample before it. The output timestamp is the latest sample time
//! of the series inside the window.

use super::{selector, Node, ValueKind};
use crate::config::CompileOptions;
use crate::error::{MqlError, Result};
use crate::fragment::SqlFragment;
use crate::query::{Expr, RollupFunc, RollupFunction};

pub(crate) fn compile(rollup: &RollupFunction, options: &CompileOptions) -> Result<Node> {
    let func = rollup.func;
    let Some(selector) = rollup.child.as_selector() else {
        return Err(MqlError::semantic(format!(
            "rollup function {func} requires a range selector argument, e.g. {func}(metric[5m]), got {}",
            rollup.child
        )));
    };
    let Some(window) = rollup.window else {
        return Err(MqlError::semantic(format!(
            "rollup function {func} requires a time range, e.g. {func}({}[5m])",
            selector.metric
        )));
    };

    let samples = selector::window_samples(selector, window, options)?;
    let body = match func {
        RollupFunc::Rate | RollupFunc::Increase => counter_delta(func),
        RollupFunc::QuantileOverTime => percentile(SqlFragment::param(quantile(rollup)?)),
        RollupFunc::AvgOverTime => over_time("AVG(value)"),
        RollupFunc::SumOverTime => over_time("SUM(value)"),
        RollupFunc::MinOverTime => over_time("MIN(value)"),
        RollupFunc::MaxOverTime => over_time("MAX(value)"),
        RollupFunc::CountOverTime => over_time("COUNT(value)"),
    };

    let fragment = SqlFragment::raw("WITH samples AS (\n")
        .append(samples.indent(2))
        .push_sql("\n)")
        .append(body);

    let regex = selector.matchers.iter().any(|m| m.op.is_regex());
    Ok(Node::vector(fragment, ValueKind::InstantVector).with_regex(regex))
}

/// The quantile argument, which must be a literal between 0 and 1.
fn quantile(rollup: &RollupFunction) -> Result<f64> {
    let func = rollup.func;
    let Some(arg) = rollup.quantile.as_deref() else {
        return Err(MqlError::semantic(format!(
            "{func} requires a quantile argument, e.g. {func}(0.95, metric[5m])"
        )));
    };
    let Expr::Number(literal) = arg else {
        return Err(MqlError::semantic(format!(
            "{func} quantile must be a number literal, got {arg}"
        )));
    };
    if !(0.0..=1.0).contains(&literal.value) {
        return Err(MqlError::semantic(format!(
            "{func} quantile must be between 0 and 1, got {}",
            literal.value
        )));
    }
    Ok(literal.value)
}

/// `*_over_time` aggregates over the whole window.
fn over_time(aggregate: &str) -> SqlFragment {
    SqlFragment::raw(format!(
        "\nSELECT label_set_id, MAX(timestamp_ms) AS timestamp_ms, {aggregate} AS value, labels\nFROM samples\nGROUP BY label_set_id, labels"
    ))
}

/// `rate` and `increase`.
///
/// Each sample is paired with its predecessor. A decrease is a counter reset,
/// so the step contributes the new value rather than a negative delta.
/// `rate` divides by the time between the first and last sample of the
/// window; steps between identical timestamps contribute nothing.
fn counter_delta(func: RollupFunc) -> SqlFragment {
    let (delta, value) = if func == RollupFunc::Rate {
        (
            "CASE WHEN timestamp_ms = prev_ts THEN 0.0 WHEN value < prev_value THEN value ELSE value - prev_value END",
            "CASE WHEN MAX(timestamp_ms) > MIN(prev_ts) THEN SUM(delta) / ((MAX(timestamp_ms) - MIN(prev_ts)) / 1000.0) ELSE 0.0 END",
        )
    } else {
        (
            "CASE WHEN value < prev_value THEN value ELSE value - prev_value END",
            "SUM(delta)",
        )
    };

    SqlFragment::raw(format!(
        ",
steps AS (
  SELECT
    label_set_id,
    labels,
    timestamp_ms,
    value,
    LAG(value) OVER series AS prev_value,
    LAG(timestamp_ms) OVER series AS prev_ts
  FROM samples
  WINDOW series AS (PARTITION BY label_set_id ORDER BY timestamp_ms)
),
deltas AS (
  SELECT label_set_id, labels, timestamp_ms, prev_ts, {delta} AS delta
  FROM steps
  WHERE prev_value IS NOT NULL
)
SELECT label_set_id, MAX(timestamp_ms) AS timestamp_ms, {value} AS value, labels
FROM deltas
GROUP BY label_set_id, labels"
    ))
}

/// `quantile_over_time`: the smallest value whose percent rank reaches the
/// quantile. A lone sample answers every quantile.
fn percentile(quantile: SqlFragment) -> SqlFragment {
    SqlFragment::raw(
        ",
ranked AS (
  SELECT
    label_set_id,
    labels,
    timestamp_ms,
    value,
    PERCENT_RANK() OVER (PARTITION BY label_set_id ORDER BY value) AS percentile
  FROM samples
)
SELECT
  label_set_id,
  MAX(timestamp_ms) AS timestamp_ms,
  COALESCE(MIN(CASE WHEN percentile >= ",
    )
    .append(quantile)
    .push_sql(
        " THEN value END), MAX(value)) AS value,
  labels
FROM ranked
GROUP BY label_set_id, labels",
    )
}
