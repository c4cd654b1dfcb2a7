//! Element-wise math functions.

use super::{map_values, Node, Transformer, ValueKind};
use crate::error::{MqlError, Result};
use crate::fragment::SqlFragment;
use crate::query::{TransformFunc, TransformFunction};

pub(crate) fn compile(transformer: &Transformer<'_>, call: &TransformFunction) -> Result<Node> {
    let func = call.func;
    let (min, max) = arity(func);
    let count = call.args.len();
    if count < min || count > max {
        let expected = if min == max {
            format!("{min}")
        } else {
            format!("{min} or {max}")
        };
        return Err(MqlError::semantic(format!(
            "{func} expects {expected} argument{}, got {count}",
            if max == 1 { "" } else { "s" }
        )));
    }

    let mut args = call.args.iter();
    let Some(first) = args.next() else {
        return Err(MqlError::semantic(format!("{func} expects a series argument")));
    };
    let input = transformer.node(first)?;

    let mut extra = Vec::with_capacity(count - 1);
    for arg in args {
        let node = transformer.node(arg)?;
        if node.kind != ValueKind::Scalar {
            return Err(MqlError::semantic(format!(
                "{func} expects scalar arguments after the series, got a {} {arg}",
                node.kind
            )));
        }
        extra.push(node.fragment);
    }

    Ok(match input.kind {
        ValueKind::Scalar => Node::scalar(apply(func, input.fragment, extra)),
        kind => {
            let value = apply(func, SqlFragment::raw("value"), extra);
            Node::vector(map_values(input.fragment, value), kind).with_regex(input.regex)
        }
    })
}

/// Allowed argument counts, series included.
fn arity(func: TransformFunc) -> (usize, usize) {
    match func {
        TransformFunc::Round => (1, 2),
        TransformFunc::ClampMin | TransformFunc::ClampMax => (2, 2),
        TransformFunc::Clamp => (3, 3),
        _ => (1, 1),
    }
}

/// The SQL expression applying `func` to `value`.
fn apply(func: TransformFunc, value: SqlFragment, extra: Vec<SqlFragment>) -> SqlFragment {
    let mut extra = extra.into_iter();
    let unary = |name: &str, value: SqlFragment| {
        SqlFragment::raw(format!("{name}("))
            .append(value)
            .push_sql(")")
    };

    match func {
        TransformFunc::Abs => unary("ABS", value),
        TransformFunc::Ceil => unary("CEIL", value),
        TransformFunc::Floor => unary("FLOOR", value),
        TransformFunc::Ln => unary("LN", value),
        TransformFunc::Log2 => unary("LOG2", value),
        TransformFunc::Log10 => unary("LOG10", value),
        TransformFunc::Sqrt => unary("SQRT", value),
        TransformFunc::Exp => unary("EXP", value),
        TransformFunc::Round => match extra.next() {
            // Nearest multiple of `to`.
            Some(to) => SqlFragment::raw("(ROUND(CAST(")
                .append(value)
                .push_sql(" AS REAL) / ")
                .append(to.clone())
                .push_sql(") * ")
                .append(to)
                .push_sql(")"),
            None => unary("ROUND", value),
        },
        TransformFunc::ClampMin => bound("MAX", value, extra.next()),
        TransformFunc::ClampMax => bound("MIN", value, extra.next()),
        TransformFunc::Clamp => {
            let lower = bound("MAX", value, extra.next());
            bound("MIN", lower, extra.next())
        }
    }
}

/// Two-argument scalar `MIN`/`MAX`. Arity is checked before this runs.
fn bound(name: &str, value: SqlFragment, limit: Option<SqlFragment>) -> SqlFragment {
    match limit {
        Some(limit) => SqlFragment::raw(format!("{name}("))
            .append(value)
            .push_sql(", ")
            .append(limit)
            .push_sql(")"),
        None => value,
    }
}
