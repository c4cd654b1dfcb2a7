//! MetricsQL parser.
//!
//! Recursive descent with precedence climbing over the token stream produced
//! by the lexer. Parses queries like:
//! - `http_requests_total{job="api", code=~"5.."}`
//! - `rate(http_requests_total[5m])`
//! - `sum(rate(http_requests_total[5m])) by (job)`
//! - `(errors_total + timeouts_total) / 2`
//!
//! Errors inside a matcher list, a function argument list or a grouping list
//! are recorded and the parser skips to the next `,` or closing bracket, so a
//! single run reports every independent defect.

use super::ast::{
    AggregateOp, Aggregation, BinaryOp, BinaryOperator, Duration, Expr, Grouping, LabelFunc,
    LabelFunction, LabelMatcher, MatchOp, NumberLiteral, RollupFunc, RollupFunction, Selector,
    TransformFunc, TransformFunction,
};
use super::lexer::{tokenize, Span, Token, TokenKind};
use crate::config::DEFAULT_MAX_DEPTH;
use crate::error::{MqlError, SyntaxError};
use serde::Serialize;

/// How syntax errors are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Any syntax error fails the parse.
    #[default]
    Strict,
    /// A tree recovered around the errors is returned with the errors as
    /// diagnostics, when recovery produced one.
    Lenient,
}

impl ParseMode {
    /// Maps a `strict` flag onto a mode.
    #[must_use]
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

/// A parsed expression and the errors recovered from while parsing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedQuery {
    /// The expression tree.
    pub expr: Expr,
    /// Syntax errors skipped in lenient mode. Always empty in strict mode.
    pub diagnostics: Vec<SyntaxError>,
}

/// Parses MetricsQL text into an expression tree.
///
/// # Errors
///
/// Returns an error if:
/// - The query is empty or blank ([`MqlError::Validation`])
/// - The query has syntax errors and `mode` is strict, or no tree could be
///   recovered ([`MqlError::Syntax`], every error found)
///
/// # Examples
///
/// ```
/// use mql::query::{parse_expr, Expr, ParseMode};
///
/// let parsed = parse_expr("sum(rate(http_requests_total[5m])) by (job)", ParseMode::Strict).unwrap();
/// assert!(matches!(parsed.expr, Expr::Aggregation(_)));
///
/// let err = parse_expr("metric{", ParseMode::Strict).unwrap_err();
/// assert!(err.is_syntax());
/// ```
pub fn parse_expr(input: &str, mode: ParseMode) -> Result<ParsedQuery, MqlError> {
    parse_with_limits(input, mode, DEFAULT_MAX_DEPTH)
}

/// Parses with an explicit nesting limit.
pub(crate) fn parse_with_limits(
    input: &str,
    mode: ParseMode,
    max_depth: usize,
) -> Result<ParsedQuery, MqlError> {
    if input.trim().is_empty() {
        return Err(MqlError::Validation("query is empty".to_string()));
    }

    let (tokens, lex_errors) = tokenize(input);
    let mut parser = Parser::new(tokens, max_depth);
    parser.errors = lex_errors;

    let expr = parser.parse_query();
    let mut errors = parser.errors;
    errors.sort_by_key(|e| (e.line, e.column));

    match (expr, mode) {
        (Some(expr), _) if errors.is_empty() => Ok(ParsedQuery {
            expr,
            diagnostics: Vec::new(),
        }),
        (Some(expr), ParseMode::Lenient) => {
            for error in &errors {
                tracing::warn!(line = error.line, column = error.column, error = %error.message, "Recovered from syntax error");
            }
            Ok(ParsedQuery {
                expr,
                diagnostics: errors,
            })
        }
        _ => Err(MqlError::Syntax(errors)),
    }
}

/// Marker for a failed production; the error is already recorded.
struct Abort;

type PResult<T> = Result<T, Abort>;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>, max_depth: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            depth: 0,
            max_depth,
        }
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn peek(&self) -> &Token {
        // tokenize always ends the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_nth(&self, n: usize) -> &TokenKind {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&mut self, span: Span, message: impl Into<String>, hint: Option<&str>) -> Abort {
        let mut error = span.error(message);
        if let Some(hint) = hint {
            error = error.with_hint(hint);
        }
        self.errors.push(error);
        Abort
    }

    fn expect(&mut self, kind: &TokenKind, context: &str, hint: &str) -> PResult<Span> {
        let token = self.peek().clone();
        if token.kind == *kind {
            self.advance();
            return Ok(token.span);
        }
        Err(self.error(
            token.span,
            format!("expected {kind} {context}, found {}", token.kind),
            Some(hint),
        ))
    }

    /// Skips to the next `,` or `close` at the current nesting level without
    /// consuming it.
    fn synchronize(&mut self, close: &TokenKind) {
        let mut nesting = 0usize;
        loop {
            let kind = self.peek_kind().clone();
            match kind {
                TokenKind::Eof => return,
                TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => nesting += 1,
                TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => {
                    if nesting == 0 {
                        if kind == *close {
                            return;
                        }
                    } else {
                        nesting -= 1;
                    }
                }
                TokenKind::Comma if nesting == 0 => return,
                _ => {}
            }
            self.advance();
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_query(&mut self) -> Option<Expr> {
        let expr = self.parse_expr(0).ok()?;
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Eof => {}
            TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => {
                self.error(
                    token.span,
                    format!("unexpected {}", token.kind),
                    Some("remove it or add the matching opening bracket"),
                );
            }
            TokenKind::Assign => {
                self.error(
                    token.span,
                    "unexpected '=' in expression",
                    Some("use '==' to compare values"),
                );
            }
            other => {
                self.error(
                    token.span,
                    format!("unexpected {other} after a complete expression"),
                    Some("an operator or a closing bracket may be missing"),
                );
            }
        }
        Some(expr)
    }

    /// Takes one nesting level, failing once `max_depth` is exceeded.
    ///
    /// Every level of the resulting tree takes at least one level here, so
    /// the tree height stays within the limit.
    fn descend(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            let span = self.peek().span;
            self.depth -= 1;
            return Err(self.error(
                span,
                format!("expression nests deeper than {} levels", self.max_depth),
                Some("split the query into simpler expressions"),
            ));
        }
        Ok(())
    }

    fn parse_expr(&mut self, min_precedence: u8) -> PResult<Expr> {
        self.descend()?;
        let result = self.parse_binary(min_precedence);
        self.depth -= 1;
        result
    }

    fn parse_binary(&mut self, min_precedence: u8) -> PResult<Expr> {
        let left = self.parse_unary()?;
        let depth = self.depth;
        let result = self.fold_binary(left, min_precedence);
        self.depth = depth;
        result
    }

    /// Folds left-associative operators into `left`, one level per operator.
    fn fold_binary(&mut self, mut left: Expr, min_precedence: u8) -> PResult<Expr> {
        while let Some(op) = self.peek_binary_op() {
            if op.precedence() < min_precedence {
                break;
            }
            self.descend()?;
            self.advance();
            let right = self.parse_expr(op.precedence() + 1)?;
            left = Expr::Binary(BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn peek_binary_op(&self) -> Option<BinaryOperator> {
        let op = match self.peek_kind() {
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Sub,
            TokenKind::Star => BinaryOperator::Mul,
            TokenKind::Slash => BinaryOperator::Div,
            TokenKind::Percent => BinaryOperator::Mod,
            TokenKind::EqEq => BinaryOperator::Eq,
            TokenKind::NotEq => BinaryOperator::NotEq,
            TokenKind::Lt => BinaryOperator::Lt,
            TokenKind::LtEq => BinaryOperator::LtEq,
            TokenKind::Gt => BinaryOperator::Gt,
            TokenKind::GtEq => BinaryOperator::GtEq,
            TokenKind::Ident(word) => match word.as_str() {
                "and" => BinaryOperator::And,
                "or" => BinaryOperator::Or,
                "unless" => BinaryOperator::Unless,
                _ => return None,
            },
            _ => return None,
        };
        Some(op)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        match self.peek_kind() {
            TokenKind::Minus => {
                self.descend()?;
                self.advance();
                let operand = self.parse_unary();
                self.depth -= 1;
                Ok(match operand? {
                    Expr::Number(NumberLiteral { value }) => {
                        Expr::Number(NumberLiteral { value: -value })
                    }
                    other => Expr::Binary(BinaryOp {
                        op: BinaryOperator::Sub,
                        left: Box::new(Expr::Number(NumberLiteral { value: 0.0 })),
                        right: Box::new(other),
                    }),
                })
            }
            TokenKind::Plus => {
                self.descend()?;
                self.advance();
                let operand = self.parse_unary();
                self.depth -= 1;
                operand
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::Number(NumberLiteral { value }))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr(0)?;
                self.expect(
                    &TokenKind::RParen,
                    "to close '('",
                    "add a closing ')'",
                )?;
                Ok(expr)
            }
            TokenKind::Ident(name) => self.parse_identifier_expr(&name, token.span),
            TokenKind::LBrace => Err(self.error(
                token.span,
                "selector is missing a metric name",
                Some("put the metric name before the matchers, e.g. up{job=\"api\"}"),
            )),
            TokenKind::Str(_) => Err(self.error(
                token.span,
                "string literals are only allowed as label values and label function arguments",
                None,
            )),
            TokenKind::Duration(d) => Err(self.error(
                token.span,
                format!("unexpected duration {d}"),
                Some("durations belong in a range selector, e.g. metric[5m]"),
            )),
            TokenKind::Eof => {
                let context = self.previous_token_text();
                Err(self.error(
                    token.span,
                    format!("expected an expression{context}, found end of input"),
                    Some("the query ends too early"),
                ))
            }
            other => {
                let context = self.previous_token_text();
                Err(self.error(
                    token.span,
                    format!("expected an expression{context}, found {other}"),
                    None,
                ))
            }
        }
    }

    fn previous_token_text(&self) -> String {
        if self.pos == 0 {
            String::new()
        } else {
            format!(" after {}", self.tokens[self.pos - 1].kind)
        }
    }

    fn parse_identifier_expr(&mut self, name: &str, span: Span) -> PResult<Expr> {
        let next = self.peek_nth(1).clone();

        if let Some(op) = AggregateOp::from_name(name) {
            let is_modifier = matches!(&next, TokenKind::Ident(word) if word == "by" || word == "without");
            if next == TokenKind::LParen || is_modifier {
                self.advance();
                return self.parse_aggregation(op, span);
            }
        }

        if next == TokenKind::LParen {
            self.advance();
            return self.parse_call(name, span);
        }

        if matches!(name, "and" | "or" | "unless" | "by" | "without") {
            return Err(self.error(
                span,
                format!("expected an expression, found keyword '{name}'"),
                None,
            ));
        }

        self.advance();
        self.parse_selector(name.to_string())
    }

    // ========================================================================
    // Selectors
    // ========================================================================

    fn parse_selector(&mut self, metric: String) -> PResult<Expr> {
        let mut selector = Selector::new(metric);

        if self.at(&TokenKind::LBrace) {
            let open = self.advance().span;
            selector.matchers = self.parse_matchers(open)?;
        }

        if self.at(&TokenKind::LBracket) {
            self.advance();
            selector.window = Some(self.parse_window()?);
        }

        Ok(Expr::Selector(selector))
    }

    fn parse_matchers(&mut self, open: Span) -> PResult<Vec<LabelMatcher>> {
        let mut matchers = Vec::new();

        loop {
            if self.eat(&TokenKind::RBrace) {
                return Ok(matchers);
            }
            if self.at(&TokenKind::Eof) {
                let span = self.peek().span;
                self.error(
                    span,
                    format!(
                        "unterminated label matcher list opened at line {}, column {}",
                        open.line, open.column
                    ),
                    Some("add a closing '}' after the last matcher"),
                );
                return Ok(matchers);
            }

            match self.parse_matcher() {
                Ok(matcher) => matchers.push(matcher),
                Err(Abort) => self.synchronize(&TokenKind::RBrace),
            }

            match self.peek_kind() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RBrace | TokenKind::Eof => {}
                other => {
                    let message = format!("expected ',' or '}}' after a label matcher, found {other}");
                    let span = self.peek().span;
                    self.error(span, message, Some("separate matchers with commas"));
                    self.synchronize(&TokenKind::RBrace);
                    self.eat(&TokenKind::Comma);
                }
            }
        }
    }

    fn parse_matcher(&mut self) -> PResult<LabelMatcher> {
        let token = self.advance();
        let label = match token.kind {
            TokenKind::Ident(label) => label,
            TokenKind::LBrace => {
                return Err(self.error(
                    token.span,
                    "unexpected '{' inside a label matcher list",
                    Some("braces cannot be nested; write metric{label=\"value\"} and quote values containing braces"),
                ))
            }
            other => {
                return Err(self.error(
                    token.span,
                    format!("expected a label name, found {other}"),
                    Some("label names match [a-zA-Z_][a-zA-Z0-9_]*"),
                ))
            }
        };

        let token = self.advance();
        let op = match token.kind {
            TokenKind::Assign => MatchOp::Equal,
            TokenKind::NotEq => MatchOp::NotEqual,
            TokenKind::RegexMatch => MatchOp::RegexMatch,
            TokenKind::RegexNotMatch => MatchOp::RegexNotMatch,
            TokenKind::EqEq => {
                return Err(self.error(
                    token.span,
                    format!("'==' is not a label matcher operator in '{label}=='"),
                    Some("use '=' inside braces, e.g. job=\"api\""),
                ))
            }
            other => {
                return Err(self.error(
                    token.span,
                    format!("expected a matcher operator after '{label}', found {other}"),
                    Some("label matchers use =, !=, =~ or !~"),
                ))
            }
        };

        let token = self.peek().clone();
        match token.kind {
            TokenKind::Str(value) => {
                self.advance();
                Ok(LabelMatcher { label, op, value })
            }
            TokenKind::Ident(word) => {
                self.advance();
                Err(self.error(
                    token.span,
                    format!("label value must be a quoted string, found '{word}'"),
                    Some(&format!("write {label}{op}\"{word}\"")),
                ))
            }
            TokenKind::Number(n) => {
                self.advance();
                Err(self.error(
                    token.span,
                    format!("label value must be a quoted string, found {n}"),
                    Some(&format!("write {label}{op}\"{n}\"")),
                ))
            }
            other => Err(self.error(
                token.span,
                format!("missing label value after '{label}{op}', found {other}"),
                Some(&format!("write {label}{op}\"value\"")),
            )),
        }
    }

    fn parse_window(&mut self) -> PResult<Duration> {
        let token = self.peek().clone();
        let window = match token.kind {
            TokenKind::Duration(d) => {
                self.advance();
                d
            }
            TokenKind::Number(n) => {
                self.advance();
                self.error(
                    token.span,
                    format!("range window {n} has no unit"),
                    Some("add a unit, e.g. [5m]"),
                );
                self.eat(&TokenKind::RBracket);
                return Err(Abort);
            }
            TokenKind::RBracket => {
                self.advance();
                return Err(self.error(
                    token.span,
                    "empty range window",
                    Some("put a duration between the brackets, e.g. [5m]"),
                ));
            }
            other => {
                return Err(self.error(
                    token.span,
                    format!("expected a duration in range window, found {other}"),
                    Some("write a duration such as [30s], [5m] or [1h]"),
                ))
            }
        };
        self.expect(
            &TokenKind::RBracket,
            "to close the range window",
            "add a closing ']' after the duration",
        )?;
        Ok(window)
    }

    // ========================================================================
    // Aggregations
    // ========================================================================

    fn parse_aggregation(&mut self, op: AggregateOp, span: Span) -> PResult<Expr> {
        let mut grouping = self.parse_grouping()?;

        let args = self.parse_arguments(op.name())?;
        if args.len() != 1 {
            return Err(self.error(
                span,
                format!("{op} expects exactly 1 argument, got {}", args.len()),
                Some("parameterized aggregations such as topk are not supported"),
            ));
        }

        if grouping.is_none() {
            grouping = self.parse_grouping()?;
        }

        let child = args.into_iter().next().ok_or(Abort)?;
        Ok(Expr::Aggregation(Aggregation {
            op,
            child: Box::new(child),
            grouping,
        }))
    }

    fn parse_grouping(&mut self) -> PResult<Option<Grouping>> {
        let (span, without) = match self.peek() {
            Token {
                kind: TokenKind::Ident(word),
                span,
            } if word == "by" => (*span, false),
            Token {
                kind: TokenKind::Ident(word),
                span,
            } if word == "without" => (*span, true),
            _ => return Ok(None),
        };
        self.advance();
        let keyword = if without { "without" } else { "by" };

        let next = self.peek().clone();
        if next.kind != TokenKind::LParen {
            return Err(self.error(
                next.span,
                format!("expected '(' after '{keyword}', found {}", next.kind),
                Some(&format!("list grouping labels like {keyword} (job, instance)")),
            ));
        }
        self.advance();

        let mut labels = Vec::new();
        loop {
            if self.eat(&TokenKind::RParen) {
                break;
            }
            let token = self.advance();
            match token.kind {
                TokenKind::Ident(label) => labels.push(label),
                TokenKind::Eof => {
                    return Err(self.error(
                        token.span,
                        format!("unterminated label list after '{keyword}' at line {}, column {}", span.line, span.column),
                        Some("add a closing ')'"),
                    ))
                }
                other => {
                    self.error(
                        token.span,
                        format!("expected a label name in '{keyword}' list, found {other}"),
                        Some("grouping labels are bare names, e.g. by (job)"),
                    );
                    self.synchronize(&TokenKind::RParen);
                }
            }
            if !self.eat(&TokenKind::Comma) && !self.at(&TokenKind::RParen) {
                let token = self.peek().clone();
                if token.kind == TokenKind::Eof {
                    continue;
                }
                self.error(
                    token.span,
                    format!("expected ',' or ')' in '{keyword}' list, found {}", token.kind),
                    None,
                );
                self.synchronize(&TokenKind::RParen);
                self.eat(&TokenKind::Comma);
            }
        }

        Ok(Some(if without {
            Grouping::Without(labels)
        } else {
            Grouping::By(labels)
        }))
    }

    // ========================================================================
    // Function calls
    // ========================================================================

    fn parse_call(&mut self, name: &str, span: Span) -> PResult<Expr> {
        if let Some(func) = RollupFunc::from_name(name) {
            let args = self.parse_arguments(name)?;
            return self.build_rollup(func, args, span);
        }

        if let Some(func) = TransformFunc::from_name(name) {
            let args = self.parse_arguments(name)?;
            return Ok(Expr::Transform(TransformFunction { func, args }));
        }

        if let Some(func) = LabelFunc::from_name(name) {
            return self.parse_label_call(func, span);
        }

        // Skip the argument list so errors inside it are still reported.
        let _ = self.parse_arguments(name);
        Err(self.error(
            span,
            format!("unknown function '{name}'"),
            Some(&supported_functions_hint()),
        ))
    }

    fn parse_arguments(&mut self, name: &str) -> PResult<Vec<Expr>> {
        let open = self.expect(
            &TokenKind::LParen,
            &format!("after '{name}'"),
            "function arguments are wrapped in parentheses",
        )?;

        let mut args = Vec::new();
        let mut failed = false;
        loop {
            if self.eat(&TokenKind::RParen) {
                break;
            }
            if self.at(&TokenKind::Eof) {
                let span = self.peek().span;
                return Err(self.error(
                    span,
                    format!(
                        "unterminated argument list of '{name}' opened at line {}, column {}",
                        open.line, open.column
                    ),
                    Some("add a closing ')'"),
                ));
            }

            match self.parse_expr(0) {
                Ok(arg) => args.push(arg),
                Err(Abort) => {
                    failed = true;
                    self.synchronize(&TokenKind::RParen);
                }
            }

            if !self.eat(&TokenKind::Comma) && !self.at(&TokenKind::RParen) {
                let token = self.peek().clone();
                if token.kind == TokenKind::Eof {
                    continue;
                }
                self.error(
                    token.span,
                    format!("expected ',' or ')' in arguments of '{name}', found {}", token.kind),
                    Some("an operator or a comma may be missing"),
                );
                failed = true;
                self.synchronize(&TokenKind::RParen);
                self.eat(&TokenKind::Comma);
            }
        }

        if failed {
            Err(Abort)
        } else {
            Ok(args)
        }
    }

    fn build_rollup(&mut self, func: RollupFunc, args: Vec<Expr>, span: Span) -> PResult<Expr> {
        let mut args = args.into_iter();
        let (quantile, child) = match (func.takes_quantile(), args.len()) {
            (true, 2) => (args.next().map(Box::new), args.next()),
            (_, 1) => (None, args.next()),
            (true, n) => {
                return Err(self.error(
                    span,
                    format!("{func} expects 2 arguments (quantile, range selector), got {n}"),
                    Some("write quantile_over_time(0.95, metric[5m])"),
                ))
            }
            (false, n) => {
                return Err(self.error(
                    span,
                    format!("{func} expects exactly 1 argument, got {n}"),
                    Some(&format!("write {func}(metric[5m])")),
                ))
            }
        };
        let mut child = child.ok_or(Abort)?;

        let window = match &mut child {
            Expr::Selector(selector) => selector.window.take(),
            _ => None,
        };

        Ok(Expr::Rollup(RollupFunction {
            func,
            child: Box::new(child),
            window,
            quantile,
        }))
    }

    fn parse_label_call(&mut self, func: LabelFunc, span: Span) -> PResult<Expr> {
        self.expect(
            &TokenKind::LParen,
            &format!("after '{func}'"),
            "function arguments are wrapped in parentheses",
        )?;

        if self.eat(&TokenKind::RParen) {
            return Err(self.error(
                span,
                format!("{func} expects a series as its first argument"),
                None,
            ));
        }

        let child = match self.parse_expr(0) {
            Ok(child) => Some(child),
            Err(Abort) => {
                self.synchronize(&TokenKind::RParen);
                None
            }
        };

        let mut args = Vec::new();
        let mut failed = child.is_none();
        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::RParen => break,
                TokenKind::Comma => {}
                TokenKind::Eof => {
                    return Err(self.error(
                        token.span,
                        format!("unterminated argument list of '{func}'"),
                        Some("add a closing ')'"),
                    ))
                }
                other => {
                    self.error(
                        token.span,
                        format!("expected ',' or ')' in arguments of '{func}', found {other}"),
                        None,
                    );
                    failed = true;
                    self.synchronize(&TokenKind::RParen);
                    continue;
                }
            }

            let token = self.peek().clone();
            match token.kind {
                TokenKind::Str(arg) => {
                    self.advance();
                    args.push(arg);
                }
                other => {
                    self.error(
                        token.span,
                        format!("{func} arguments after the series must be quoted strings, found {other}"),
                        Some("quote label names and values, e.g. label_set(up, \"env\", \"prod\")"),
                    );
                    failed = true;
                    self.synchronize(&TokenKind::RParen);
                }
            }
        }

        match child {
            Some(child) if !failed => Ok(Expr::Label(LabelFunction {
                func,
                child: Box::new(child),
                args,
            })),
            _ => Err(Abort),
        }
    }
}

fn supported_functions_hint() -> String {
    let mut names: Vec<&str> = AggregateOp::ALL.iter().map(|op| op.name()).collect();
    names.extend(RollupFunc::ALL.iter().map(|f| f.name()));
    names.extend(TransformFunc::ALL.iter().map(|f| f.name()));
    names.extend(LabelFunc::ALL.iter().map(|f| f.name()));
    format!("supported functions: {}", names.join(", "))
}
