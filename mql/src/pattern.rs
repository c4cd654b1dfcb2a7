//! Regular expression support for `=~`, `!~` and `label_replace`.
//!
//! Patterns are full-match: `job=~"api.*"` matches `api-server` but not
//! `my-api`. The compiler binds patterns already anchored (see [`anchored`]),
//! so any `REGEXP` implementation with search semantics still behaves as a
//! full match.
//!
//! The SQL engine has to expose two functions before a query with
//! [`CompiledQuery::requires_regex`](crate::CompiledQuery::requires_regex)
//! set can run:
//!
//! - `regexp(pattern, value)`, which backs the `REGEXP` operator
//!   (see [`regexp`]);
//! - `regex_replace(pattern, replacement, value)` (see [`regex_replace`]).
//!
//! # Example
//!
//! ```
//! use mql::pattern::{anchored, regexp, regex_replace};
//!
//! let pattern = anchored("api-(.*)");
//! assert!(regexp(&pattern, "api-server"));
//! assert!(!regexp(&pattern, "my-api-server"));
//! assert_eq!(regex_replace(&pattern, "$1", "api-server").as_deref(), Some("server"));
//! ```

use crate::error::MqlError;
use lru_time_cache::LruCache;
use regex::{Regex, RegexBuilder};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

/// SQL function backing the `REGEXP` operator.
pub const REGEXP_FUNCTION: &str = "regexp";

/// SQL function used by `label_replace`.
pub const REGEX_REPLACE_FUNCTION: &str = "regex_replace";

const CACHE_CAPACITY: usize = 512;

/// Wraps `pattern` so that it only matches a whole value.
#[must_use]
pub fn anchored(pattern: &str) -> String {
    format!("^(?:{pattern})$")
}

/// Checks that `pattern` is a valid regular expression.
///
/// # Errors
///
/// Returns a semantic error naming the pattern and the parser's complaint.
pub fn validate_pattern(pattern: &str) -> Result<(), MqlError> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| MqlError::semantic(format!("invalid regex {pattern:?}: {e}")))
}

/// Compiles `pattern` as a full-match expression.
///
/// # Errors
///
/// Returns the regex parser's error for invalid patterns.
pub fn compile(pattern: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&anchored(pattern))
        .case_insensitive(case_insensitive)
        .build()
}

/// Implementation of the SQL `regexp(pattern, value)` function.
///
/// Invalid patterns never match.
#[must_use]
pub fn regexp(pattern: &str, value: &str) -> bool {
    cache()
        .get(pattern)
        .is_some_and(|re| re.is_match(value))
}

/// Implementation of the SQL `regex_replace(pattern, replacement, value)`
/// function.
///
/// Returns the expanded replacement (`$1`, `${name}`) when the pattern
/// matches, `None` otherwise.
#[must_use]
pub fn regex_replace(pattern: &str, replacement: &str, value: &str) -> Option<String> {
    let re = cache().get(pattern)?;
    let captures = re.captures(value)?;
    let mut expanded = String::new();
    captures.expand(replacement, &mut expanded);
    Some(expanded)
}

/// Hit/miss counters of the shared pattern cache.
#[must_use]
pub fn cache_stats() -> (u64, u64) {
    let cache = cache();
    (
        cache.requests.load(Ordering::Relaxed),
        cache.misses.load(Ordering::Relaxed),
    )
}

fn cache() -> &'static PatternCache {
    static CACHE: OnceLock<PatternCache> = OnceLock::new();
    CACHE.get_or_init(|| PatternCache::with_capacity(CACHE_CAPACITY))
}

/// Compiled patterns keyed by source text, least recently used evicted
/// first.
struct PatternCache {
    requests: AtomicU64,
    misses: AtomicU64,
    inner: Mutex<LruCache<String, Regex>>,
}

impl PatternCache {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            requests: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            inner: Mutex::new(LruCache::with_capacity(capacity)),
        }
    }

    fn get(&self, pattern: &str) -> Option<Regex> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(re) = inner.get(pattern) {
            return Some(re.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "Invalid regex pattern");
                return None;
            }
        };
        inner.insert(pattern.to_string(), re.clone());
        Some(re)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
