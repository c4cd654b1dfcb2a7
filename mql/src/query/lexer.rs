//! MetricsQL tokenizer using nom.
//!
//! Turns query text into positioned tokens. Lexing does not stop at the first
//! defect: every bad token is recorded as a [`SyntaxError`] and scanning
//! resumes after it, so the parser can report several problems at once.

use super::ast::{Duration, DURATION_UNITS};
use crate::error::SyntaxError;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, not_line_ending, one_of},
    combinator::{opt, recognize, value},
    multi::{many0_count, many1},
    IResult, Parser,
};

/// Position of a token in the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    /// 1-based line.
    pub line: usize,
    /// 1-based column in characters.
    pub column: usize,
}

impl Span {
    /// Creates a positioned error at this span.
    pub fn error(self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.line, self.column)
    }
}

/// Token kinds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(f64),
    Duration(Duration),
    Str(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Assign,
    EqEq,
    NotEq,
    RegexMatch,
    RegexNotMatch,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "'{name}'"),
            Self::Number(n) => write!(f, "number {n}"),
            Self::Duration(d) => write!(f, "duration {d}"),
            Self::Str(s) => write!(f, "string {s:?}"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::LBrace => write!(f, "'{{'"),
            Self::RBrace => write!(f, "'}}'"),
            Self::LBracket => write!(f, "'['"),
            Self::RBracket => write!(f, "']'"),
            Self::Comma => write!(f, "','"),
            Self::Assign => write!(f, "'='"),
            Self::EqEq => write!(f, "'=='"),
            Self::NotEq => write!(f, "'!='"),
            Self::RegexMatch => write!(f, "'=~'"),
            Self::RegexNotMatch => write!(f, "'!~'"),
            Self::Lt => write!(f, "'<'"),
            Self::LtEq => write!(f, "'<='"),
            Self::Gt => write!(f, "'>'"),
            Self::GtEq => write!(f, "'>='"),
            Self::Plus => write!(f, "'+'"),
            Self::Minus => write!(f, "'-'"),
            Self::Star => write!(f, "'*'"),
            Self::Slash => write!(f, "'/'"),
            Self::Percent => write!(f, "'%'"),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

/// A token with its position.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Splits `input` into tokens, always ending with [`TokenKind::Eof`].
pub(crate) fn tokenize(input: &str) -> (Vec<Token>, Vec<SyntaxError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut cursor = Cursor::new(input);

    loop {
        cursor.skip_trivia();
        let span = cursor.span();
        let rest = cursor.rest();

        if rest.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                span,
            });
            break;
        }

        match scan_token(rest) {
            Ok((remaining, kind)) => {
                cursor.advance(rest.len() - remaining.len());
                tokens.push(Token { kind, span });
            }
            Err(LexError { message, hint, len }) => {
                let mut error = span.error(message);
                if let Some(hint) = hint {
                    error = error.with_hint(hint);
                }
                errors.push(error);
                cursor.advance(len.max(1));
            }
        }
    }

    (tokens, errors)
}

// ============================================================================
// Cursor
// ============================================================================

struct Cursor<'a> {
    input: &'a str,
    offset: usize,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.offset..]
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            column: self.column,
        }
    }

    /// Moves forward `len` bytes, rounded up to a character boundary.
    fn advance(&mut self, len: usize) {
        let mut end = (self.offset + len).min(self.input.len());
        while !self.input.is_char_boundary(end) {
            end += 1;
        }
        for c in self.input[self.offset..end].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset = end;
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            let skipped = match trivia(rest) {
                Ok((remaining, ())) => rest.len() - remaining.len(),
                Err(_) => 0,
            };
            if skipped == 0 {
                break;
            }
            self.advance(skipped);
        }
    }
}

fn trivia(input: &str) -> IResult<&str, ()> {
    let (input, _) = multispace0(input)?;
    let (input, _) = opt((char('#'), not_line_ending)).parse(input)?;
    Ok((input, ()))
}

// ============================================================================
// Token scanners
// ============================================================================

struct LexError {
    message: String,
    hint: Option<String>,
    len: usize,
}

fn scan_token(input: &str) -> Result<(&str, TokenKind), LexError> {
    let Some(first) = input.chars().next() else {
        return Ok((input, TokenKind::Eof));
    };

    if matches!(first, '"' | '\'' | '`') {
        return scan_string(input, first);
    }

    if first.is_ascii_digit() {
        return scan_number_or_duration(input);
    }

    if let Ok((rest, name)) = identifier(input) {
        return Ok((rest, TokenKind::Ident(name.to_string())));
    }

    if let Ok((rest, kind)) = symbol(input) {
        return Ok((rest, kind));
    }

    let hint = match first {
        ';' => Some("statements cannot be chained; submit a single expression"),
        '!' => Some("use '!=' or '!~' for negative label matchers"),
        '@' => Some("the '@' modifier is not supported"),
        _ => None,
    };
    Err(LexError {
        message: format!("unexpected character '{first}'"),
        hint: hint.map(str::to_string),
        len: first.len_utf8(),
    })
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize((
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize((
        digit1,
        opt((char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)
}

fn duration_unit(input: &str) -> IResult<&str, i64> {
    alt((
        value(1, tag("ms")),
        value(DURATION_UNITS[5].1, tag("s")),
        value(DURATION_UNITS[4].1, tag("m")),
        value(DURATION_UNITS[3].1, tag("h")),
        value(DURATION_UNITS[2].1, tag("d")),
        value(DURATION_UNITS[1].1, tag("w")),
        value(DURATION_UNITS[0].1, tag("y")),
    ))
    .parse(input)
}

fn duration_parts(input: &str) -> IResult<&str, Vec<(&str, i64)>> {
    many1((digit1, duration_unit)).parse(input)
}

/// Parses a complete duration literal such as `1h30m` into milliseconds.
fn parse_duration(text: &str) -> Option<Duration> {
    let (rest, parts) = duration_parts(text).ok()?;
    if !rest.is_empty() {
        return None;
    }
    let mut total: i64 = 0;
    for (digits, unit) in parts {
        let amount: i64 = digits.parse().ok()?;
        total = total.checked_add(amount.checked_mul(unit)?)?;
    }
    Some(Duration::from_millis(total))
}

fn scan_number_or_duration(input: &str) -> Result<(&str, TokenKind), LexError> {
    let (after_number, text) = number(input).map_err(|_| LexError {
        message: "malformed number".to_string(),
        hint: None,
        len: 1,
    })?;

    let glued: IResult<&str, &str> =
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_')(after_number);
    let tail = glued.map(|(_, tail)| tail).unwrap_or_default();
    if tail.is_empty() {
        let value = text.parse::<f64>().map_err(|e| LexError {
            message: format!("malformed number '{text}': {e}"),
            hint: None,
            len: text.len(),
        })?;
        return Ok((after_number, TokenKind::Number(value)));
    }

    let word = &input[..text.len() + tail.len()];
    if let Some(duration) = parse_duration(word) {
        return Ok((&input[word.len()..], TokenKind::Duration(duration)));
    }

    let looks_like_duration = word
        .chars()
        .all(|c| c.is_ascii_digit() || "msthdwy".contains(c));
    if looks_like_duration || (tail.len() <= 2 && tail.chars().all(|c| c.is_ascii_alphabetic())) {
        Err(LexError {
            message: format!("invalid duration '{word}'"),
            hint: Some("durations use the units ms, s, m, h, d, w, y, e.g. 5m or 1h30m".to_string()),
            len: word.len(),
        })
    } else {
        Err(LexError {
            message: format!("invalid identifier '{word}': names must start with a letter or underscore"),
            hint: Some("metric and label names match [a-zA-Z_][a-zA-Z0-9_]*".to_string()),
            len: word.len(),
        })
    }
}

fn scan_string(input: &str, quote: char) -> Result<(&str, TokenKind), LexError> {
    let mut out = String::new();
    let mut chars = input.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        if c == quote {
            let end = i + c.len_utf8();
            return Ok((&input[end..], TokenKind::Str(out)));
        }
        if c == '\\' && quote != '`' {
            let Some((j, escaped)) = chars.next() else {
                break;
            };
            let resolved = match escaped {
                '\\' => '\\',
                '"' => '"',
                '\'' => '\'',
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => {
                    return Err(LexError {
                        message: format!("unknown escape sequence '\\{other}' in string literal"),
                        hint: Some("escape a literal backslash as '\\\\'".to_string()),
                        len: j + other.len_utf8(),
                    })
                }
            };
            out.push(resolved);
            continue;
        }
        out.push(c);
    }

    Err(LexError {
        message: "unterminated string literal".to_string(),
        hint: Some(format!("close the string with a matching {quote}")),
        len: input.len(),
    })
}

fn symbol(input: &str) -> IResult<&str, TokenKind> {
    alt((operator, punctuation)).parse(input)
}

fn operator(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::RegexMatch, tag("=~")),
        value(TokenKind::RegexNotMatch, tag("!~")),
        value(TokenKind::EqEq, tag("==")),
        value(TokenKind::NotEq, tag("!=")),
        value(TokenKind::LtEq, tag("<=")),
        value(TokenKind::GtEq, tag(">=")),
        value(TokenKind::Assign, tag("=")),
        value(TokenKind::Lt, tag("<")),
        value(TokenKind::Gt, tag(">")),
        value(TokenKind::Plus, tag("+")),
        value(TokenKind::Minus, tag("-")),
        value(TokenKind::Star, tag("*")),
        value(TokenKind::Slash, tag("/")),
        value(TokenKind::Percent, tag("%")),
    ))
    .parse(input)
}

fn punctuation(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::LBrace, char('{')),
        value(TokenKind::RBrace, char('}')),
        value(TokenKind::LBracket, char('[')),
        value(TokenKind::RBracket, char(']')),
        value(TokenKind::Comma, char(',')),
    ))
    .parse(input)
}
