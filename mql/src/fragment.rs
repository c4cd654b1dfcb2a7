//! Parameterized SQL fragments.
//!
//! A [`SqlFragment`] is SQL text with `?` placeholders plus the values bound to
//! them, in the order the placeholders appear. Fragments are values: they
//! only grow by concatenation, so text and parameters can never drift apart.
//!
//! SQL text can only be introduced from inside this crate. Anything that
//! originates in a query string enters a fragment through [`SqlFragment::param`].
//!
//! # Example
//!
//! ```
//! use mql::{SqlFragment, SqlParam};
//!
//! let left = SqlFragment::param("http_requests_total");
//! let right = SqlFragment::param(2.5);
//! let both = left + right;
//!
//! assert_eq!(both.sql(), "??");
//! assert_eq!(both.params().len(), 2);
//! assert_eq!(both.params()[1], SqlParam::Float(2.5));
//! ```

use serde::{Deserialize, Serialize};
use std::ops::Add;

/// A value bound to a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    /// Text value (metric names, label names and values, patterns, JSON paths).
    Text(String),
    /// Integer value (timestamps and window lengths in milliseconds).
    Integer(i64),
    /// Floating point value (numeric literals from the query).
    Float(f64),
}

impl std::fmt::Display for SqlParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(fl) => write!(f, "{fl}"),
        }
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// SQL text with positional placeholders and their bound values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SqlFragment {
    sql: String,
    params: Vec<SqlParam>,
}

impl SqlFragment {
    /// Compiler-owned SQL text without parameters.
    pub(crate) fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// A single `?` placeholder bound to `value`.
    #[must_use]
    pub fn param(value: impl Into<SqlParam>) -> Self {
        Self {
            sql: "?".to_string(),
            params: vec![value.into()],
        }
    }

    /// Returns the SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the bound values in placeholder order.
    #[must_use]
    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    /// Splits the fragment into its text and parameters.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<SqlParam>) {
        (self.sql, self.params)
    }

    /// Returns `true` if the fragment holds no SQL text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Concatenates `other` after `self`.
    #[must_use]
    pub fn append(mut self, other: SqlFragment) -> Self {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params);
        self
    }

    /// Appends compiler-owned SQL text.
    pub(crate) fn push_sql(mut self, sql: &str) -> Self {
        self.sql.push_str(sql);
        self
    }

    /// Appends a placeholder bound to `value`.
    pub(crate) fn push_param(self, value: impl Into<SqlParam>) -> Self {
        self.append(Self::param(value))
    }

    /// Concatenates fragments in order.
    #[must_use]
    pub fn concat(parts: impl IntoIterator<Item = SqlFragment>) -> Self {
        parts
            .into_iter()
            .fold(Self::default(), SqlFragment::append)
    }

    /// Concatenates fragments with a compiler-owned separator between them.
    pub(crate) fn join(parts: impl IntoIterator<Item = SqlFragment>, separator: &str) -> Self {
        let mut joined = Self::default();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                joined = joined.push_sql(separator);
            }
            joined = joined.append(part);
        }
        joined
    }

    /// Indents every non-empty line by `spaces` spaces.
    ///
    /// The compiler applies this to finished statements and fixed-size
    /// leaves only; nested subexpressions are appended as they are.
    #[must_use]
    pub fn indent(&self, spaces: usize) -> Self {
        let pad = " ".repeat(spaces);
        let sql = self
            .sql
            .lines()
            .map(|line| {
                if line.is_empty() {
                    String::new()
                } else {
                    format!("{pad}{line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            sql,
            params: self.params.clone(),
        }
    }

    /// Counts `?` placeholders outside quoted SQL literals.
    ///
    /// For every fragment built by this crate this equals `params().len()`.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        let mut in_literal = false;
        let mut count = 0;
        for c in self.sql.chars() {
            match c {
                '\'' => in_literal = !in_literal,
                '?' if !in_literal => count += 1,
                _ => {}
            }
        }
        count
    }
}

impl Add for SqlFragment {
    type Output = SqlFragment;

    fn add(self, rhs: SqlFragment) -> SqlFragment {
        self.append(rhs)
    }
}

impl std::fmt::Display for SqlFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql)
    }
}
