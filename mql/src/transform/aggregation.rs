//! Aggregations across series.
//!
//! Series are grouped by a projection of their label object: the `by` labels
//! for `by`, everything but the listed labels for `without`, and the empty
//! object when no modifier is given. The projection becomes the output
//! labels, and the output `label_set_id` is `NULL` because a group no longer
//! corresponds to a stored label set.

use super::{check_identifier, drop_labels, keep_labels, sorted_labels, with_input};
use super::{Node, Transformer, ValueKind};
use crate::error::{MqlError, Result};
use crate::fragment::SqlFragment;
use crate::query::{AggregateOp, Aggregation, Grouping};

pub(crate) fn compile(transformer: &Transformer<'_>, aggregation: &Aggregation) -> Result<Node> {
    let op = aggregation.op;
    let child = transformer.node(&aggregation.child)?;
    match child.kind {
        ValueKind::InstantVector => {}
        ValueKind::RangeVector => {
            return Err(MqlError::semantic(format!(
                "{op} cannot aggregate a range vector; wrap it in a rollup function, e.g. {op}(rate(metric[5m]))"
            )))
        }
        ValueKind::Scalar => {
            return Err(MqlError::semantic(format!(
                "{op} expects a series argument, got a scalar"
            )))
        }
    }

    let group_labels = group_labels(aggregation.grouping.as_ref())?;
    let fragment = with_input(child.fragment)
        .push_sql("SELECT\n  NULL AS label_set_id,\n  MAX(timestamp_ms) AS timestamp_ms,\n  ")
        .push_sql(aggregate(op))
        .push_sql(" AS value,\n  ")
        .append(group_labels)
        .push_sql(" AS labels\nFROM input\nGROUP BY 4");

    Ok(Node::vector(fragment, ValueKind::InstantVector).with_regex(child.regex))
}

fn group_labels(grouping: Option<&Grouping>) -> Result<SqlFragment> {
    let Some(grouping) = grouping else {
        return Ok(SqlFragment::raw("'{}'"));
    };
    for label in grouping.labels() {
        check_identifier("grouping label", label)?;
    }
    let labels = sorted_labels(grouping.labels());

    Ok(match grouping {
        Grouping::By(_) => keep_labels(&labels),
        Grouping::Without(_) => drop_labels(&labels),
    })
}

fn aggregate(op: AggregateOp) -> &'static str {
    match op {
        AggregateOp::Sum => "SUM(value)",
        AggregateOp::Avg => "AVG(value)",
        AggregateOp::Min => "MIN(value)",
        AggregateOp::Max => "MAX(value)",
        AggregateOp::Count => "COUNT(value)",
        AggregateOp::Stdvar => "MAX(AVG(value * value) - AVG(value) * AVG(value), 0.0)",
        AggregateOp::Stddev => "SQRT(MAX(AVG(value * value) - AVG(value) * AVG(value), 0.0))",
    }
}
