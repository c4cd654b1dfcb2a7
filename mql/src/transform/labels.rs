//! Label manipulation functions.
//!
//! Each call rewrites the `labels` column of its input through JSON1
//! functions and finishes by rebuilding the object with sorted keys, so
//! rewritten series still compare equal to untouched ones with the same
//! labels. Values are never changed.

use super::{canonical_labels, check_identifier, drop_labels, keep_labels, label_path};
use super::{sorted_labels, Node, Transformer, ValueKind};
use crate::error::{MqlError, Result};
use crate::fragment::SqlFragment;
use crate::pattern;
use crate::query::{LabelFunc, LabelFunction};

pub(crate) fn compile(transformer: &Transformer<'_>, call: &LabelFunction) -> Result<Node> {
    let func = call.func;
    let input = transformer.node(&call.child)?;
    if input.kind == ValueKind::Scalar {
        return Err(MqlError::semantic(format!(
            "{func} expects a series as its first argument, got a scalar"
        )));
    }
    check_arguments(call)?;

    let args = &call.args;
    let (fragment, regex) = match func {
        LabelFunc::Set => {
            let rewrite = if args[1].is_empty() {
                drop_labels(&args[..1])
            } else {
                SqlFragment::raw("json_set(labels, ")
                    .append(label_path(&args[0]))
                    .push_sql(", ")
                    .push_param(args[1].as_str())
                    .push_sql(")")
            };
            (rewrite_labels(input.fragment, vec![rewrite]), false)
        }
        LabelFunc::Del => (
            rewrite_labels(input.fragment, vec![drop_labels(&sorted_labels(args))]),
            false,
        ),
        LabelFunc::Keep => (
            rewrite_labels(input.fragment, vec![keep_labels(&sorted_labels(args))]),
            false,
        ),
        LabelFunc::Copy | LabelFunc::Move => {
            let steps = args
                .chunks(2)
                .filter(|pair| func == LabelFunc::Copy || pair[0] != pair[1])
                .map(|pair| copy_label(&pair[0], &pair[1], func == LabelFunc::Move))
                .collect();
            (rewrite_labels(input.fragment, steps), false)
        }
        LabelFunc::Replace => (
            replace_label(input.fragment, &args[0], &args[1], &args[2], &args[3]),
            true,
        ),
    };

    Ok(Node::vector(fragment, input.kind).with_regex(input.regex || regex))
}

/// Validates argument counts, label names and patterns.
fn check_arguments(call: &LabelFunction) -> Result<()> {
    let func = call.func;
    let args = &call.args;
    let (valid, usage) = match func {
        LabelFunc::Set => (args.len() == 2, "label_set(series, \"label\", \"value\")"),
        LabelFunc::Del => (!args.is_empty(), "label_del(series, \"label\", ...)"),
        LabelFunc::Keep => (!args.is_empty(), "label_keep(series, \"label\", ...)"),
        LabelFunc::Copy => (
            !args.is_empty() && args.len() % 2 == 0,
            "label_copy(series, \"src\", \"dst\", ...)",
        ),
        LabelFunc::Move => (
            !args.is_empty() && args.len() % 2 == 0,
            "label_move(series, \"src\", \"dst\", ...)",
        ),
        LabelFunc::Replace => (
            args.len() == 4,
            "label_replace(series, \"dst\", \"replacement\", \"src\", \"regex\")",
        ),
    };
    if !valid {
        return Err(MqlError::semantic(format!(
            "{func} got {} string arguments; usage: {usage}",
            args.len()
        )));
    }

    // Positions holding label names; the rest are values or patterns.
    let names: Vec<&String> = match func {
        LabelFunc::Set => vec![&args[0]],
        LabelFunc::Replace => vec![&args[0], &args[2]],
        _ => args.iter().collect(),
    };
    for name in names {
        check_identifier("label name", name)?;
    }

    if func == LabelFunc::Replace {
        pattern::validate_pattern(&pattern::anchored(&args[3]))?;
    }
    Ok(())
}

/// Chains label rewrites, each reading the previous step's `labels`.
fn rewrite_labels(input: SqlFragment, rewrites: Vec<SqlFragment>) -> SqlFragment {
    let mut fragment = SqlFragment::raw("WITH step0 AS (\n")
        .append(input)
        .push_sql("\n)");
    let mut last = 0;
    for (i, rewrite) in rewrites.into_iter().enumerate() {
        fragment = fragment
            .push_sql(&format!(
                ",\nstep{} AS (\n  SELECT label_set_id, timestamp_ms, value, ",
                i + 1
            ))
            .append(rewrite)
            .push_sql(&format!(" AS labels\n  FROM step{i}\n)"));
        last = i + 1;
    }
    fragment
        .push_sql("\nSELECT label_set_id, timestamp_ms, value, ")
        .append(canonical_labels(SqlFragment::raw("labels")))
        .push_sql(&format!(" AS labels\nFROM step{last}"))
}

/// Copies `src` to `dst` when `src` is present, removing `src` for moves.
fn copy_label(src: &str, dst: &str, remove: bool) -> SqlFragment {
    let mut copied = SqlFragment::raw("json_set(labels, ")
        .append(label_path(dst))
        .push_sql(", json_extract(labels, ")
        .append(label_path(src))
        .push_sql("))");
    if remove {
        copied = SqlFragment::raw("json_remove(")
            .append(copied)
            .push_sql(", ")
            .append(label_path(src))
            .push_sql(")");
    }
    SqlFragment::raw("CASE WHEN json_extract(labels, ")
        .append(label_path(src))
        .push_sql(") IS NULL THEN labels ELSE ")
        .append(copied)
        .push_sql(" END")
}

/// `label_replace`: when the anchored `regex` matches the value of `src`
/// (missing labels read as empty), `dst` is set to the expanded
/// `replacement`, or removed if that expands to the empty string. Otherwise
/// labels are left unchanged.
fn replace_label(
    input: SqlFragment,
    dst: &str,
    replacement: &str,
    src: &str,
    regex: &str,
) -> SqlFragment {
    SqlFragment::raw("WITH input AS (\n")
        .append(input)
        .push_sql(&format!(
            "\n),\nreplaced AS (\n  SELECT label_set_id, timestamp_ms, value, labels, {}(",
            pattern::REGEX_REPLACE_FUNCTION
        ))
        .push_param(pattern::anchored(regex))
        .push_sql(", ")
        .push_param(replacement)
        .push_sql(", COALESCE(json_extract(labels, ")
        .append(label_path(src))
        .push_sql("), '')) AS replacement\n  FROM input\n)\n")
        .push_sql("SELECT label_set_id, timestamp_ms, value,\n  CASE\n    WHEN replacement IS NULL THEN labels\n    WHEN replacement = '' THEN json_remove(labels, ")
        .append(label_path(dst))
        .push_sql(")\n    ELSE ")
        .append(canonical_labels(
            SqlFragment::raw("json_set(labels, ")
                .append(label_path(dst))
                .push_sql(", replacement)"),
        ))
        .push_sql("\n  END AS labels\nFROM replaced")
}
