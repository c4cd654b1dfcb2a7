//! MetricsQL query language front end.
//!
//! This module provides the lexer, parser and expression tree for MetricsQL,
//! a PromQL-like language for label-dimensioned time series.
//!
//! # Supported Syntax
//!
//! ```text
//! http_requests_total{job="api", code=~"5.."}
//! rate(http_requests_total[5m])
//! sum(rate(http_requests_total[5m])) by (job)
//! max_over_time(cpu_usage[1h]) > 0.9
//! label_replace(up, "host", "$1", "instance", "(.*):.*")
//! ```
//!
//! # Example
//!
//! ```
//! use mql::query::{parse_expr, Expr, ParseMode, RollupFunc};
//!
//! let parsed = parse_expr("rate(http_requests_total[5m])", ParseMode::Strict).unwrap();
//! let Expr::Rollup(rollup) = parsed.expr else { panic!("expected rollup") };
//! assert_eq!(rollup.func, RollupFunc::Rate);
//! assert_eq!(rollup.window.map(|w| w.as_millis()), Some(300_000));
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use parser::{parse_expr, ParseMode, ParsedQuery};
pub(crate) use parser::parse_with_limits;
