//! MetricsQL to SQL compiler.
//!
//! This crate turns MetricsQL queries (a PromQL-like language for
//! label-dimensioned time series) into parameterized SQL statements over a
//! relational sample schema.
//!
//! # Modules
//!
//! - [`query`] - Lexer, parser and expression tree
//! - [`fragment`] - Immutable SQL text with bound parameters
//! - [`schema`] - Table and column names the generated SQL targets
//! - [`pattern`] - Regular expression support for matchers and `label_replace`
//! - [`config`] - Compile options
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```
//! use mql::{QueryCompiler, SqlParam};
//!
//! let compiled = QueryCompiler::default()
//!     .compile(r#"rate(http_requests_total{job="api"}[5m])"#)
//!     .unwrap();
//!
//! // User-supplied values only ever appear as bound parameters.
//! assert!(!compiled.sql().contains("api"));
//! assert!(compiled.fragment.params().contains(&SqlParam::Text("api".to_string())));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod fragment;
pub mod pattern;
pub mod query;
pub mod schema;

mod compiler;
mod transform;

pub use compiler::{parse, validate, validate_with_errors, QueryCompiler};
pub use config::CompileOptions;
pub use error::{MqlError, SyntaxError};
pub use fragment::{SqlFragment, SqlParam};
pub use transform::{CompiledQuery, ValueKind};

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde_json;
