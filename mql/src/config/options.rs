//! Compile options.
//!
//! Options can be built in code or loaded from environment variables:
//! - `MQL_STRICT`: `true`/`false`, reject any syntax error (default: true)
//! - `MQL_END_TIME_MS`: fixed window end in epoch milliseconds (default: latest sample)
//! - `MQL_MAX_QUERY_LENGTH`: longest accepted query in bytes (default: 16384)
//! - `MQL_MAX_DEPTH`: deepest accepted expression nesting (default: 128)

use crate::error::MqlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default longest accepted query in bytes.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 16 * 1024;

/// Default deepest accepted expression nesting.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Settings for one compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CompileOptions {
    /// Reject any syntax error instead of compiling a recovered tree.
    pub strict: bool,
    /// Fixed end of every rollup and range window, in epoch milliseconds.
    /// `None` means "the latest sample in the database".
    #[validate(range(min = 0, message = "End time cannot be negative"))]
    pub end_time_ms: Option<i64>,
    /// Longest accepted query text in bytes.
    #[validate(range(min = 1, max = 1_048_576))]
    pub max_query_length: usize,
    /// Deepest accepted expression nesting.
    #[validate(range(min = 1, max = 1024))]
    pub max_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            strict: true,
            end_time_ms: None,
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CompileOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads options from `MQL_*` environment variables, falling back to
    /// defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or if the
    /// resulting options are out of range.
    pub fn from_env() -> Result<Self, MqlError> {
        let defaults = Self::default();

        let strict = env_var("MQL_STRICT")?.unwrap_or(defaults.strict);
        let end_time_ms = env_var("MQL_END_TIME_MS")?;
        let max_query_length =
            env_var("MQL_MAX_QUERY_LENGTH")?.unwrap_or(defaults.max_query_length);
        let max_depth = env_var("MQL_MAX_DEPTH")?.unwrap_or(defaults.max_depth);

        let options = Self {
            strict,
            end_time_ms,
            max_query_length,
            max_depth,
        };
        options.check()?;
        Ok(options)
    }

    /// Sets strict or lenient parsing.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Pins the window end to `end`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use mql::CompileOptions;
    ///
    /// let end = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    /// let options = CompileOptions::new().with_end_time(end);
    /// assert_eq!(options.end_time_ms, Some(1_700_000_000_000));
    /// ```
    #[must_use]
    pub fn with_end_time(self, end: DateTime<Utc>) -> Self {
        self.with_end_time_ms(end.timestamp_millis())
    }

    /// Pins the window end to `end_ms` epoch milliseconds.
    #[must_use]
    pub fn with_end_time_ms(mut self, end_ms: i64) -> Self {
        self.end_time_ms = Some(end_ms);
        self
    }

    /// Sets the longest accepted query text.
    #[must_use]
    pub fn with_max_query_length(mut self, max_query_length: usize) -> Self {
        self.max_query_length = max_query_length;
        self
    }

    /// Sets the deepest accepted expression nesting.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`MqlError::Config`] if:
    /// - The end time is negative
    /// - The query length limit is zero or above 1 MiB
    /// - The depth limit is zero or above 1024
    pub fn check(&self) -> Result<(), MqlError> {
        self.validate()
            .map_err(|e| MqlError::Config(e.to_string().replace('\n', "; ")))
    }
}

fn env_var<T>(name: &str) -> Result<Option<T>, MqlError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| MqlError::Config(format!("{name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}
