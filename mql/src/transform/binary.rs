//! Binary operators.
//!
//! Scalars combine into a scalar expression. A vector and a scalar apply the
//! operator to every sample. Two vectors are matched series by series: rows
//! pair up when they share `label_set_id` and labels, and range vectors also
//! pair on timestamp. Comparisons yield `1` or `0` instead of filtering.

use super::{map_values, Node, Transformer, ValueKind};
use crate::error::{MqlError, Result};
use crate::fragment::SqlFragment;
use crate::query::{BinaryOp, BinaryOperator};

pub(crate) fn compile(transformer: &Transformer<'_>, binary: &BinaryOp) -> Result<Node> {
    let op = binary.op;
    let left = transformer.node(&binary.left)?;
    let right = transformer.node(&binary.right)?;
    let regex = left.regex || right.regex;

    let node = match (left.kind, right.kind) {
        (ValueKind::Scalar, ValueKind::Scalar) => {
            if op.is_set() {
                return Err(set_operands_error(op));
            }
            Node::scalar(apply(op, left.fragment, right.fragment))
        }
        (kind, ValueKind::Scalar) => {
            if op.is_set() {
                return Err(set_operands_error(op));
            }
            let value = apply(op, SqlFragment::raw("value"), right.fragment);
            Node::vector(map_values(left.fragment, value), kind)
        }
        (ValueKind::Scalar, kind) => {
            if op.is_set() {
                return Err(set_operands_error(op));
            }
            // Scalar parameters follow the vector's: the CTE comes first.
            let value = apply(op, left.fragment, SqlFragment::raw("value"));
            Node::vector(map_values(right.fragment, value), kind)
        }
        (left_kind, right_kind) if left_kind == right_kind => {
            let range = left_kind == ValueKind::RangeVector;
            let fragment = if op.is_set() {
                set_operation(op, left.fragment, right.fragment, range)
            } else {
                vector_match(op, left.fragment, right.fragment, range)
            };
            Node::vector(fragment, left_kind)
        }
        (left_kind, right_kind) => {
            return Err(MqlError::semantic(format!(
                "operator '{op}' cannot combine a {left_kind} with a {right_kind}"
            )))
        }
    };
    Ok(node.with_regex(regex))
}

fn set_operands_error(op: BinaryOperator) -> MqlError {
    MqlError::semantic(format!("operator '{op}' requires series on both sides"))
}

/// The SQL expression for `left op right`. Set operators never reach here.
fn apply(op: BinaryOperator, left: SqlFragment, right: SqlFragment) -> SqlFragment {
    match op {
        BinaryOperator::Div => SqlFragment::raw("(CAST(")
            .append(left)
            .push_sql(" AS REAL) / ")
            .append(right)
            .push_sql(")"),
        // Truncated remainder, matching `%` on floats.
        BinaryOperator::Mod => SqlFragment::raw("(")
            .append(left.clone())
            .push_sql(" - ")
            .append(right.clone())
            .push_sql(" * CAST(CAST(")
            .append(left)
            .push_sql(" AS REAL) / ")
            .append(right)
            .push_sql(" AS INTEGER))"),
        BinaryOperator::Eq => compare(left, "=", right),
        BinaryOperator::NotEq => compare(left, "!=", right),
        BinaryOperator::Lt => compare(left, "<", right),
        BinaryOperator::LtEq => compare(left, "<=", right),
        BinaryOperator::Gt => compare(left, ">", right),
        BinaryOperator::GtEq => compare(left, ">=", right),
        _ => SqlFragment::raw("(")
            .append(left)
            .push_sql(&format!(" {op} "))
            .append(right)
            .push_sql(")"),
    }
}

fn compare(left: SqlFragment, symbol: &str, right: SqlFragment) -> SqlFragment {
    SqlFragment::raw("(CASE WHEN ")
        .append(left)
        .push_sql(&format!(" {symbol} "))
        .append(right)
        .push_sql(" THEN 1 ELSE 0 END)")
}

fn both_sides(left: SqlFragment, right: SqlFragment) -> SqlFragment {
    SqlFragment::raw("WITH lhs AS (\n")
        .append(left)
        .push_sql("\n),\nrhs AS (\n")
        .append(right)
        .push_sql("\n)\n")
}

/// Row pairing condition between `a` and `b`.
fn same_series(a: &str, b: &str, range: bool) -> String {
    let mut condition =
        format!("{b}.label_set_id IS {a}.label_set_id AND {b}.labels = {a}.labels");
    if range {
        condition.push_str(&format!(" AND {b}.timestamp_ms = {a}.timestamp_ms"));
    }
    condition
}

/// Arithmetic and comparison between two vectors; the left side's labels
/// and timestamps are kept.
fn vector_match(
    op: BinaryOperator,
    left: SqlFragment,
    right: SqlFragment,
    range: bool,
) -> SqlFragment {
    let value = apply(op, SqlFragment::raw("lhs.value"), SqlFragment::raw("rhs.value"));
    both_sides(left, right)
        .push_sql("SELECT lhs.label_set_id AS label_set_id, lhs.timestamp_ms AS timestamp_ms, ")
        .append(value)
        .push_sql(&format!(
            " AS value, lhs.labels AS labels\nFROM lhs\nJOIN rhs ON {}",
            same_series("lhs", "rhs", range)
        ))
}

/// `and`, `or` and `unless`, which select whole rows instead of combining
/// values.
fn set_operation(
    op: BinaryOperator,
    left: SqlFragment,
    right: SqlFragment,
    range: bool,
) -> SqlFragment {
    let columns = "label_set_id, timestamp_ms, value, labels";
    let rhs_match = format!(
        "SELECT 1 FROM rhs WHERE {}",
        same_series("lhs", "rhs", range)
    );
    let body = match op {
        BinaryOperator::And => {
            format!("SELECT {columns}\nFROM lhs\nWHERE EXISTS ({rhs_match})")
        }
        BinaryOperator::Unless => {
            format!("SELECT {columns}\nFROM lhs\nWHERE NOT EXISTS ({rhs_match})")
        }
        _ => format!(
            "SELECT {columns}\nFROM lhs\nUNION ALL\nSELECT {columns}\nFROM rhs\nWHERE NOT EXISTS (SELECT 1 FROM lhs WHERE {})",
            same_series("rhs", "lhs", range)
        ),
    };
    both_sides(left, right).push_sql(&body)
}
