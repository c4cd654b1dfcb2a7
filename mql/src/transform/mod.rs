//! Expression tree to SQL compilation.
//!
//! Every vector node compiles to a `SELECT` producing four columns:
//!
//! | column         | meaning                                               |
//! |----------------|-------------------------------------------------------|
//! | `label_set_id` | label set of the source series, `NULL` after grouping |
//! | `timestamp_ms` | sample time in epoch milliseconds                     |
//! | `value`        | sample value                                          |
//! | `labels`       | canonical JSON object of the series' labels           |
//!
//! Parent nodes wrap their children as common table expressions, so the
//! generated statement nests the same way the expression does. Scalar nodes
//! compile to a bare value expression instead.
//!
//! Every value that came from the query text is bound through a `?`
//! placeholder; the SQL text itself only holds compiler-owned keywords,
//! table names and column names.

mod aggregation;
mod binary;
mod functions;
mod labels;
mod rollup;
mod selector;

use crate::config::CompileOptions;
use crate::error::{MqlError, Result};
use crate::fragment::SqlFragment;
use crate::query::Expr;
use serde::Serialize;

/// Result type of a compiled expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// A single number, e.g. `2` or `2 * 3`.
    Scalar,
    /// One sample per series.
    InstantVector,
    /// Every sample per series inside a window.
    RangeVector,
}

impl ValueKind {
    /// Returns `true` for instant and range vectors.
    #[must_use]
    pub fn is_vector(self) -> bool {
        !matches!(self, Self::Scalar)
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::InstantVector => write!(f, "instant vector"),
            Self::RangeVector => write!(f, "range vector"),
        }
    }
}

/// A compiled query ready to be executed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    /// The statement and its bound values.
    ///
    /// Rows carry `timestamp_ms`, `value` and `labels`, ordered by labels
    /// then timestamp. Scalar queries return one row with a `NULL`
    /// timestamp and `{}` labels.
    pub fragment: SqlFragment,
    /// Result type of the root expression.
    pub kind: ValueKind,
    /// `true` when the statement calls `regexp` or `regex_replace`.
    pub requires_regex: bool,
}

impl CompiledQuery {
    /// Returns the SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.fragment.sql()
    }
}

/// A compiled subexpression.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    /// A four-column `SELECT` for vectors, a value expression for scalars.
    pub(crate) fragment: SqlFragment,
    pub(crate) kind: ValueKind,
    pub(crate) regex: bool,
}

impl Node {
    pub(crate) fn vector(fragment: SqlFragment, kind: ValueKind) -> Self {
        Self {
            fragment,
            kind,
            regex: false,
        }
    }

    pub(crate) fn scalar(fragment: SqlFragment) -> Self {
        Self {
            fragment,
            kind: ValueKind::Scalar,
            regex: false,
        }
    }

    /// Marks the node as needing regex functions when `regex` is set.
    pub(crate) fn with_regex(mut self, regex: bool) -> Self {
        self.regex |= regex;
        self
    }
}

/// Compiles expression trees against the storage schema.
pub(crate) struct Transformer<'a> {
    options: &'a CompileOptions,
}

impl<'a> Transformer<'a> {
    pub(crate) fn new(options: &'a CompileOptions) -> Self {
        Self { options }
    }

    /// Compiles `expr` into a complete, ordered statement.
    pub(crate) fn compile(&self, expr: &Expr) -> Result<CompiledQuery> {
        let node = self.node(expr)?;

        let fragment = match node.kind {
            ValueKind::Scalar => SqlFragment::raw("SELECT NULL AS timestamp_ms, CAST(")
                .append(node.fragment)
                .push_sql(" AS REAL) AS value, '{}' AS labels"),
            ValueKind::InstantVector | ValueKind::RangeVector => {
                SqlFragment::raw("WITH result AS (\n")
                    .append(node.fragment.indent(2))
                    .push_sql(
                        "\n)\nSELECT timestamp_ms, CAST(value AS REAL) AS value, labels\nFROM result\nORDER BY labels, timestamp_ms",
                    )
            }
        };

        Ok(CompiledQuery {
            fragment,
            kind: node.kind,
            requires_regex: node.regex,
        })
    }

    /// Compiles one subexpression.
    pub(crate) fn node(&self, expr: &Expr) -> Result<Node> {
        let node = match expr {
            Expr::Selector(selector) => selector::compile(selector, self.options)?,
            Expr::Rollup(rollup) => rollup::compile(rollup, self.options)?,
            Expr::Aggregation(aggregation) => aggregation::compile(self, aggregation)?,
            Expr::Binary(binary) => binary::compile(self, binary)?,
            Expr::Transform(call) => functions::compile(self, call)?,
            Expr::Label(call) => labels::compile(self, call)?,
            Expr::Number(literal) => number(literal.value)?,
        };

        tracing::debug!(
            kind = %node.kind,
            params = node.fragment.params().len(),
            "Compiled {}",
            node_name(expr)
        );
        Ok(node)
    }
}

fn node_name(expr: &Expr) -> &'static str {
    match expr {
        Expr::Selector(_) => "selector",
        Expr::Rollup(_) => "rollup",
        Expr::Aggregation(_) => "aggregation",
        Expr::Binary(_) => "binary operation",
        Expr::Transform(_) => "function call",
        Expr::Label(_) => "label function",
        Expr::Number(_) => "number",
    }
}

fn number(value: f64) -> Result<Node> {
    if !value.is_finite() {
        return Err(MqlError::semantic(format!(
            "number {value} cannot be represented in SQL"
        )));
    }
    Ok(Node::scalar(SqlFragment::param(value)))
}

// ============================================================================
// Shared SQL helpers
// ============================================================================

/// Checks that `name` is a plain identifier (`[a-zA-Z_][a-zA-Z0-9_]*`).
pub(crate) fn check_identifier(what: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(MqlError::semantic(format!(
            "invalid {what} {name:?}: must match [a-zA-Z_][a-zA-Z0-9_]*"
        )))
    }
}

/// JSON path of a top-level label, bound as a parameter.
pub(crate) fn label_path(label: &str) -> SqlFragment {
    SqlFragment::param(format!("$.{label}"))
}

/// Projects the named labels out of the `labels` column.
///
/// Missing labels are dropped rather than kept as JSON `null`, and keys come
/// out in the order given, so callers pass them sorted.
pub(crate) fn keep_labels(labels: &[String]) -> SqlFragment {
    if labels.is_empty() {
        return SqlFragment::raw("'{}'");
    }
    let pairs = labels.iter().map(|label| {
        SqlFragment::param(label.as_str())
            .push_sql(", json_extract(labels, ")
            .append(label_path(label))
            .push_sql(")")
    });
    SqlFragment::raw("json_patch('{}', json_object(")
        .append(SqlFragment::join(pairs, ", "))
        .push_sql("))")
}

/// Removes the named labels from the `labels` column.
pub(crate) fn drop_labels(labels: &[String]) -> SqlFragment {
    if labels.is_empty() {
        return SqlFragment::raw("labels");
    }
    SqlFragment::raw("json_remove(labels, ")
        .append(SqlFragment::join(
            labels.iter().map(|label| label_path(label)),
            ", ",
        ))
        .push_sql(")")
}

/// Rebuilds a JSON label object with its keys sorted.
pub(crate) fn canonical_labels(labels: SqlFragment) -> SqlFragment {
    SqlFragment::raw(
        "COALESCE((SELECT json_group_object(kv.key, kv.value ORDER BY kv.key) FROM json_each(",
    )
    .append(labels)
    .push_sql(") AS kv), '{}')")
}

/// `WITH input AS (<child>) SELECT ... FROM input` with `value` replaced.
pub(crate) fn map_values(child: SqlFragment, value: SqlFragment) -> SqlFragment {
    with_input(child)
        .push_sql("SELECT label_set_id, timestamp_ms, ")
        .append(value)
        .push_sql(" AS value, labels\nFROM input")
}

/// Opens a statement that reads `child` through a CTE named `input`.
pub(crate) fn with_input(child: SqlFragment) -> SqlFragment {
    SqlFragment::raw("WITH input AS (\n")
        .append(child)
        .push_sql("\n)\n")
}

/// Sorted, deduplicated copy of `labels`.
pub(crate) fn sorted_labels(labels: &[String]) -> Vec<String> {
    let mut labels = labels.to_vec();
    labels.sort();
    labels.dedup();
    labels
}
