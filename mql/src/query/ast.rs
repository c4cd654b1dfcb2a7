//! Abstract Syntax Tree definitions for MetricsQL.
//!
//! The tree is a closed set of node kinds. Every node renders back to query
//! text through `Display`, which the parser accepts again.

use crate::pattern;
use serde::{Deserialize, Serialize};

/// A window length in milliseconds (`5m`, `1h30m`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Duration(i64);

impl Duration {
    /// Creates a duration from milliseconds.
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn as_millis(self) -> i64 {
        self.0
    }
}

/// Duration units with their length in milliseconds, largest first.
pub(crate) const DURATION_UNITS: &[(&str, i64)] = &[
    ("y", 365 * 24 * 60 * 60 * 1000),
    ("w", 7 * 24 * 60 * 60 * 1000),
    ("d", 24 * 60 * 60 * 1000),
    ("h", 60 * 60 * 1000),
    ("m", 60 * 1000),
    ("s", 1000),
    ("ms", 1),
];

impl std::fmt::Display for Duration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 == 0 {
            return write!(f, "0s");
        }
        let mut rest = self.0;
        for (unit, millis) in DURATION_UNITS {
            if rest >= *millis {
                write!(f, "{}{unit}", rest / millis)?;
                rest %= millis;
            }
        }
        Ok(())
    }
}

/// Label matcher operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOp {
    /// Equal (=)
    Equal,
    /// Not equal (!=)
    NotEqual,
    /// Regex full match (=~)
    RegexMatch,
    /// Regex full mismatch (!~)
    RegexNotMatch,
}

impl MatchOp {
    /// Returns `true` for operators that exclude matching series.
    #[must_use]
    pub fn is_negative(self) -> bool {
        matches!(self, Self::NotEqual | Self::RegexNotMatch)
    }

    /// Returns `true` for regex operators.
    #[must_use]
    pub fn is_regex(self) -> bool {
        matches!(self, Self::RegexMatch | Self::RegexNotMatch)
    }
}

impl std::fmt::Display for MatchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::RegexMatch => write!(f, "=~"),
            Self::RegexNotMatch => write!(f, "!~"),
        }
    }
}

/// A predicate on one label (e.g. `job="api"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMatcher {
    /// The label key.
    pub label: String,
    /// The match operator.
    pub op: MatchOp,
    /// The literal value or regex pattern.
    pub value: String,
}

impl LabelMatcher {
    /// Creates a new label matcher.
    #[must_use]
    pub fn new(label: impl Into<String>, op: MatchOp, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            op,
            value: value.into(),
        }
    }

    /// Evaluates the matcher against a label value.
    ///
    /// An invalid pattern matches nothing, so `!~` with one matches everything.
    ///
    /// # Examples
    ///
    /// ```
    /// use mql::query::{LabelMatcher, MatchOp};
    ///
    /// let matcher = LabelMatcher::new("status", MatchOp::RegexMatch, "5..");
    /// assert!(matcher.matches("503"));
    /// assert!(!matcher.matches("2503"));
    /// ```
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let positive = match self.op {
            MatchOp::Equal | MatchOp::NotEqual => self.value == candidate,
            MatchOp::RegexMatch | MatchOp::RegexNotMatch => pattern::compile(&self.value, false)
                .is_ok_and(|re| re.is_match(candidate)),
        };
        positive != self.op.is_negative()
    }
}

impl std::fmt::Display for LabelMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{:?}", self.label, self.op, self.value)
    }
}

/// A metric name with optional matchers and window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    /// The metric (sample) name.
    pub metric: String,
    /// Label predicates, all of which must hold.
    pub matchers: Vec<LabelMatcher>,
    /// Range window (`[5m]`), absent for instant selectors.
    pub window: Option<Duration>,
}

impl Selector {
    /// Creates an instant selector without matchers.
    #[must_use]
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            matchers: Vec::new(),
            window: None,
        }
    }

    /// Adds a label matcher.
    #[must_use]
    pub fn with_matcher(mut self, matcher: LabelMatcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Sets the range window.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.metric)?;
        if !self.matchers.is_empty() {
            let matchers: Vec<String> = self.matchers.iter().map(ToString::to_string).collect();
            write!(f, "{{{}}}", matchers.join(", "))?;
        }
        if let Some(window) = self.window {
            write!(f, "[{window}]")?;
        }
        Ok(())
    }
}

/// Aggregation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    /// Sum of values.
    Sum,
    /// Arithmetic mean.
    Avg,
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
    /// Number of series.
    Count,
    /// Population standard deviation.
    Stddev,
    /// Population variance.
    Stdvar,
}

impl AggregateOp {
    /// All aggregation operators.
    pub const ALL: &'static [AggregateOp] = &[
        Self::Sum,
        Self::Avg,
        Self::Min,
        Self::Max,
        Self::Count,
        Self::Stddev,
        Self::Stdvar,
    ];

    /// Looks up an operator by its query-language name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }

    /// Returns the query-language name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
            Self::Stddev => "stddev",
            Self::Stdvar => "stdvar",
        }
    }
}

impl std::fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// `by`/`without` modifier of an aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    /// Keep only the listed labels.
    By(Vec<String>),
    /// Keep every label except the listed ones.
    Without(Vec<String>),
}

impl Grouping {
    /// Returns the listed label names.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        match self {
            Self::By(labels) | Self::Without(labels) => labels,
        }
    }
}

impl std::fmt::Display for Grouping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::By(labels) => write!(f, "by ({})", labels.join(", ")),
            Self::Without(labels) => write!(f, "without ({})", labels.join(", ")),
        }
    }
}

/// An aggregation across series, e.g. `sum(x) by (job)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// The aggregation operator.
    pub op: AggregateOp,
    /// The aggregated expression.
    pub child: Box<Expr>,
    /// Optional grouping modifier.
    pub grouping: Option<Grouping>,
}

/// Rollup functions, which reduce a window of samples per series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupFunc {
    /// Per-second increase, counter-reset aware.
    Rate,
    /// Total increase, counter-reset aware.
    Increase,
    /// Mean over the window.
    AvgOverTime,
    /// Sum over the window.
    SumOverTime,
    /// Minimum over the window.
    MinOverTime,
    /// Maximum over the window.
    MaxOverTime,
    /// Number of samples in the window.
    CountOverTime,
    /// Quantile of the window's values.
    QuantileOverTime,
}

impl RollupFunc {
    /// All rollup functions.
    pub const ALL: &'static [RollupFunc] = &[
        Self::Rate,
        Self::Increase,
        Self::AvgOverTime,
        Self::SumOverTime,
        Self::MinOverTime,
        Self::MaxOverTime,
        Self::CountOverTime,
        Self::QuantileOverTime,
    ];

    /// Looks up a function by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|func| func.name() == name)
    }

    /// Returns the query-language name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Rate => "rate",
            Self::Increase => "increase",
            Self::AvgOverTime => "avg_over_time",
            Self::SumOverTime => "sum_over_time",
            Self::MinOverTime => "min_over_time",
            Self::MaxOverTime => "max_over_time",
            Self::CountOverTime => "count_over_time",
            Self::QuantileOverTime => "quantile_over_time",
        }
    }

    /// Returns `true` if the function takes a leading quantile argument.
    #[must_use]
    pub fn takes_quantile(self) -> bool {
        matches!(self, Self::QuantileOverTime)
    }
}

impl std::fmt::Display for RollupFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A rollup call, e.g. `rate(x[5m])`.
///
/// The window of the range-selector argument is lifted onto the call; the
/// child selector itself carries no window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupFunction {
    /// The rollup function.
    pub func: RollupFunc,
    /// The series being rolled up.
    pub child: Box<Expr>,
    /// Window length, absent when the argument had none.
    pub window: Option<Duration>,
    /// Leading quantile argument of `quantile_over_time`.
    pub quantile: Option<Box<Expr>>,
}

/// Element-wise math functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformFunc {
    /// Absolute value.
    Abs,
    /// Round up.
    Ceil,
    /// Round down.
    Floor,
    /// Round to nearest (optionally to a multiple).
    Round,
    /// Natural logarithm.
    Ln,
    /// Base-2 logarithm.
    Log2,
    /// Base-10 logarithm.
    Log10,
    /// Square root.
    Sqrt,
    /// Exponential.
    Exp,
    /// Lower bound.
    ClampMin,
    /// Upper bound.
    ClampMax,
    /// Lower and upper bound.
    Clamp,
}

impl TransformFunc {
    /// All transform functions.
    pub const ALL: &'static [TransformFunc] = &[
        Self::Abs,
        Self::Ceil,
        Self::Floor,
        Self::Round,
        Self::Ln,
        Self::Log2,
        Self::Log10,
        Self::Sqrt,
        Self::Exp,
        Self::ClampMin,
        Self::ClampMax,
        Self::Clamp,
    ];

    /// Looks up a function by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|func| func.name() == name)
    }

    /// Returns the query-language name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Ceil => "ceil",
            Self::Floor => "floor",
            Self::Round => "round",
            Self::Ln => "ln",
            Self::Log2 => "log2",
            Self::Log10 => "log10",
            Self::Sqrt => "sqrt",
            Self::Exp => "exp",
            Self::ClampMin => "clamp_min",
            Self::ClampMax => "clamp_max",
            Self::Clamp => "clamp",
        }
    }
}

impl std::fmt::Display for TransformFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A math function call, e.g. `abs(x)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformFunction {
    /// The function.
    pub func: TransformFunc,
    /// Arguments in call order.
    pub args: Vec<Expr>,
}

/// Label manipulation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelFunc {
    /// `label_set(x, "key", "value")`
    Set,
    /// `label_del(x, "key", ...)`
    Del,
    /// `label_keep(x, "key", ...)`
    Keep,
    /// `label_copy(x, "src", "dst", ...)`
    Copy,
    /// `label_move(x, "src", "dst", ...)`
    Move,
    /// `label_replace(x, "dst", "replacement", "src", "regex")`
    Replace,
}

impl LabelFunc {
    /// All label functions.
    pub const ALL: &'static [LabelFunc] = &[
        Self::Set,
        Self::Del,
        Self::Keep,
        Self::Copy,
        Self::Move,
        Self::Replace,
    ];

    /// Looks up a function by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|func| func.name() == name)
    }

    /// Returns the query-language name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Set => "label_set",
            Self::Del => "label_del",
            Self::Keep => "label_keep",
            Self::Copy => "label_copy",
            Self::Move => "label_move",
            Self::Replace => "label_replace",
        }
    }
}

impl std::fmt::Display for LabelFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A label manipulation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelFunction {
    /// The function.
    pub func: LabelFunc,
    /// The series whose labels are rewritten.
    pub child: Box<Expr>,
    /// String arguments after the series.
    pub args: Vec<String>,
}

/// Binary operators, arithmetic, comparison and set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Sub,
    /// Multiplication (*)
    Mul,
    /// Division (/)
    Div,
    /// Remainder (%)
    Mod,
    /// Equal (==)
    Eq,
    /// Not equal (!=)
    NotEq,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    LtEq,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    GtEq,
    /// Intersection (and)
    And,
    /// Union (or)
    Or,
    /// Complement (unless)
    Unless,
}

impl BinaryOperator {
    /// Binding strength; higher binds tighter.
    #[must_use]
    pub fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And | Self::Unless => 2,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => 3,
            Self::Add | Self::Sub => 4,
            Self::Mul | Self::Div | Self::Mod => 5,
        }
    }

    /// Returns `true` for comparison operators.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        self.precedence() == 3
    }

    /// Returns `true` for `and`, `or` and `unless`.
    #[must_use]
    pub fn is_set(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Unless)
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "and",
            Self::Or => "or",
            Self::Unless => "unless",
        };
        write!(f, "{symbol}")
    }
}

/// A binary expression, e.g. `a / b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryOp {
    /// The operator.
    pub op: BinaryOperator,
    /// Left operand.
    pub left: Box<Expr>,
    /// Right operand.
    pub right: Box<Expr>,
}

/// A numeric literal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumberLiteral {
    /// The literal value.
    pub value: f64,
}

/// A MetricsQL expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    /// Metric selector.
    Selector(Selector),
    /// Aggregation across series.
    Aggregation(Aggregation),
    /// Rollup over a window.
    Rollup(RollupFunction),
    /// Math function.
    Transform(TransformFunction),
    /// Label manipulation.
    Label(LabelFunction),
    /// Binary operation.
    Binary(BinaryOp),
    /// Number literal.
    Number(NumberLiteral),
}

impl Expr {
    /// Returns the selector if this expression is one.
    #[must_use]
    pub fn as_selector(&self) -> Option<&Selector> {
        match self {
            Self::Selector(selector) => Some(selector),
            _ => None,
        }
    }

    /// Returns the literal value if this expression is a number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(literal) => Some(literal.value),
            _ => None,
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Selector(selector) => write!(f, "{selector}"),
            Self::Aggregation(agg) => {
                write!(f, "{}({})", agg.op, agg.child)?;
                if let Some(grouping) = &agg.grouping {
                    write!(f, " {grouping}")?;
                }
                Ok(())
            }
            Self::Rollup(rollup) => {
                write!(f, "{}(", rollup.func)?;
                if let Some(quantile) = &rollup.quantile {
                    write!(f, "{quantile}, ")?;
                }
                write!(f, "{}", rollup.child)?;
                if let Some(window) = rollup.window {
                    write!(f, "[{window}]")?;
                }
                write!(f, ")")
            }
            Self::Transform(call) => {
                let args: Vec<String> = call.args.iter().map(ToString::to_string).collect();
                write!(f, "{}({})", call.func, args.join(", "))
            }
            Self::Label(call) => {
                write!(f, "{}({}", call.func, call.child)?;
                for arg in &call.args {
                    write!(f, ", {arg:?}")?;
                }
                write!(f, ")")
            }
            Self::Binary(binary) => write!(f, "({} {} {})", binary.left, binary.op, binary.right),
            Self::Number(literal) => write!(f, "{}", literal.value),
        }
    }
}
