//! Compilation entry points.
//!
//! [`QueryCompiler`] runs the whole pipeline: input checks, parsing and SQL
//! generation. The free functions cover the common one-shot cases with
//! default options.

use crate::config::CompileOptions;
use crate::error::{MqlError, Result};
use crate::query::{parse_with_limits, ParseMode};
use crate::transform::{CompiledQuery, Transformer};

/// Compiles MetricsQL queries with a fixed set of options.
///
/// A compiler holds no mutable state and can be shared across threads.
///
/// # Example
///
/// ```
/// use mql::{CompileOptions, QueryCompiler, ValueKind};
///
/// let compiler = QueryCompiler::new(CompileOptions::new().with_end_time_ms(1_700_000_000_000));
/// let compiled = compiler.compile("sum(rate(http_requests_total[5m])) by (job)").unwrap();
///
/// assert_eq!(compiled.kind, ValueKind::InstantVector);
/// assert!(!compiled.sql().contains("http_requests_total"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryCompiler {
    options: CompileOptions,
}

impl QueryCompiler {
    /// Creates a compiler using `options`.
    #[must_use]
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Returns the compile options.
    #[must_use]
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compiles `text` into a parameterized SQL statement.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [`MqlError::Config`] if the options are invalid
    /// - [`MqlError::Validation`] if the query is empty, blank or too long
    /// - [`MqlError::Syntax`] with every syntax error found (strict mode, or
    ///   when nothing could be recovered)
    /// - [`MqlError::Semantic`] if the query parses but cannot be compiled
    pub fn compile(&self, text: &str) -> Result<CompiledQuery> {
        self.options.check()?;

        if text.len() > self.options.max_query_length {
            return Err(MqlError::Validation(format!(
                "query is {} bytes long, the limit is {}",
                text.len(),
                self.options.max_query_length
            )));
        }

        let mode = ParseMode::from_strict(self.options.strict);
        let parsed = parse_with_limits(text, mode, self.options.max_depth)?;
        let compiled = Transformer::new(&self.options).compile(&parsed.expr)?;

        tracing::debug!(
            kind = %compiled.kind,
            params = compiled.fragment.params().len(),
            requires_regex = compiled.requires_regex,
            recovered = parsed.diagnostics.len(),
            "Compiled query"
        );
        Ok(compiled)
    }
}

/// Compiles `text` with default options, in strict or lenient mode.
///
/// # Errors
///
/// See [`QueryCompiler::compile`].
///
/// # Example
///
/// ```
/// let compiled = mql::parse(r#"up{job="api"}"#, true).unwrap();
/// assert_eq!(compiled.fragment.params().len(), 3);
///
/// let err = mql::parse("rate(up)", true).unwrap_err();
/// assert!(err.is_semantic());
/// ```
pub fn parse(text: &str, strict: bool) -> Result<CompiledQuery> {
    QueryCompiler::new(CompileOptions::new().with_strict(strict)).compile(text)
}

/// Returns `true` if `text` compiles in strict mode.
#[must_use]
pub fn validate(text: &str) -> bool {
    QueryCompiler::default().compile(text).is_ok()
}

/// Compiles `text` in strict mode and returns every error found, one line
/// per defect. An empty list means the query is valid.
///
/// # Example
///
/// ```
/// assert!(mql::validate_with_errors("rate(up[5m])").is_empty());
///
/// let errors = mql::validate_with_errors("up{job=\"api\"");
/// assert!(errors[0].contains("line 1"));
/// ```
#[must_use]
pub fn validate_with_errors(text: &str) -> Vec<String> {
    match QueryCompiler::default().compile(text) {
        Ok(_) => Vec::new(),
        Err(e) => e.messages(),
    }
}
