//! Error types for query compilation.
//!
//! Three kinds of failure reach the caller: syntax errors (always positioned),
//! semantic errors found while transforming a well-formed tree, and validation
//! errors for unusable input such as an empty query.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single positioned syntax error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxError {
    /// Human-readable description of the defect.
    pub message: String,
    /// 1-based line of the offending text.
    pub line: usize,
    /// 1-based column (in characters) of the offending text.
    pub column: usize,
    /// Corrective suggestion, when one is known.
    pub hint: Option<String>,
}

impl SyntaxError {
    /// Creates a syntax error without a hint.
    #[must_use]
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            hint: None,
        }
    }

    /// Attaches a corrective hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "syntax error at line {}, column {}: {}",
            self.line, self.column, self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

/// Errors returned by the compiler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MqlError {
    /// The query text is malformed. Holds every defect found, in source order.
    #[error("{}", render_syntax(.0))]
    Syntax(Vec<SyntaxError>),

    /// The query parses but has no meaning (e.g. a rollup without a window).
    #[error("semantic error: {0}")]
    Semantic(String),

    /// The caller supplied unusable input (empty, blank or oversized).
    #[error("validation error: {0}")]
    Validation(String),

    /// The compile options are invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MqlError {
    /// Shorthand for a semantic error.
    pub(crate) fn semantic(message: impl Into<String>) -> Self {
        Self::Semantic(message.into())
    }

    /// Flattens the error into one human-readable line per defect.
    ///
    /// # Examples
    ///
    /// ```
    /// use mql::MqlError;
    ///
    /// let err = MqlError::Validation("query is empty".to_string());
    /// assert_eq!(err.messages(), vec!["validation error: query is empty"]);
    /// ```
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Syntax(errors) => errors.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        }
    }

    /// Returns `true` for syntax errors.
    #[must_use]
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }

    /// Returns `true` for semantic errors.
    #[must_use]
    pub fn is_semantic(&self) -> bool {
        matches!(self, Self::Semantic(_))
    }
}

fn render_syntax(errors: &[SyntaxError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MqlError>;
