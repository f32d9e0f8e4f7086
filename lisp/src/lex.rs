use log::warn;
use logos::Logos;

use crate::ast::Value;
use crate::error::{Error, Result};

#[derive(Logos, Debug, PartialEq, Clone, Copy)]
pub enum RawToken {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("'")]
    Quote,

    /// `#` and the character after it, whatever that is.
    #[regex(r"#[^\n]?")]
    Hash,
    /// Anything up to the next whitespace or single-character delimiter.
    #[regex(r"[^ \t\n\r\f()';#][^ \t\n\r\f()']*")]
    Candidate,

    #[error]
    #[regex(r"[ \t\n\r\f]+", logos::skip)]
    #[regex(r";[^\n]*", logos::skip)]
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    Quote,
    Dot,
    Bool(bool),
    Nil,
    Int(i64),
    Float(f64),
    Symbol(String),
}

impl Token {
    /// The value of an atom token; `None` for delimiters.
    pub fn to_atom(&self) -> Option<Value> {
        match self {
            Token::Bool(b) => Some(Value::Bool(*b)),
            Token::Nil => Some(Value::Nil),
            Token::Int(n) => Some(Value::Int(*n)),
            Token::Float(x) => Some(Value::Float(*x)),
            Token::Symbol(s) => Some(Value::sym(s)),
            _ => None,
        }
    }
}

const SYMBOL_STARTS: &str = "!$%&*/:<=>?@^_~";
const SYMBOL_INNERS: &str = "+-.";
const NUMERAL_STARTS: &str = "+-.";

fn is_symbol_start(c: char) -> bool {
    c.is_ascii_alphabetic() || SYMBOL_STARTS.contains(c)
}

fn is_symbol_inner(c: char) -> bool {
    is_symbol_start(c) || c.is_ascii_digit() || SYMBOL_INNERS.contains(c)
}

pub fn valid_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if is_symbol_start(c) => chars.all(is_symbol_inner),
        _ => false,
    }
}

/// Classify a candidate lexeme. `Ok(None)` means the text is not a token.
fn classify(text: &str) -> Result<Option<Token>> {
    if text == "." {
        return Ok(Some(Token::Dot));
    }
    if text == "+" || text == "-" {
        return Ok(Some(Token::Symbol(text.to_string())));
    }
    let lower = text.to_ascii_lowercase();
    if lower == "true" {
        return Ok(Some(Token::Bool(true)));
    }
    if lower == "false" {
        return Ok(Some(Token::Bool(false)));
    }
    if text == "nil" {
        return Ok(Some(Token::Nil));
    }
    let first = text.chars().next().unwrap_or(' ');
    if first.is_ascii_digit() || NUMERAL_STARTS.contains(first) {
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Some(Token::Int(n)));
        }
        return match text.parse::<f64>() {
            Ok(x) => Ok(Some(Token::Float(x))),
            Err(_) => Err(Error::Lexical(format!("invalid numeral: {}", text))),
        };
    }
    if valid_symbol(text) {
        return Ok(Some(Token::Symbol(text.to_string())));
    }
    Ok(None)
}

fn warn_invalid(line: &str, text: &str, column: usize) {
    warn!("invalid token: {}\n    {}\n    {}^", text, line, " ".repeat(column));
}

/// The tokens on `line`, excluding comments and whitespace. Invalid tokens
/// are reported as warnings and skipped; a malformed numeral is an error.
pub fn tokenize_line(line: &str) -> Result<Vec<Token>> {
    let mut lexer = RawToken::lexer(line);
    let mut tokens = Vec::new();
    while let Some(raw) = lexer.next() {
        let text = lexer.slice();
        let column = lexer.span().start;
        let token = match raw {
            RawToken::LParen => Some(Token::LParen),
            RawToken::RParen => Some(Token::RParen),
            RawToken::Quote => Some(Token::Quote),
            RawToken::Hash => match text {
                "#t" => Some(Token::Bool(true)),
                "#f" => Some(Token::Bool(false)),
                _ => None,
            },
            RawToken::Candidate => classify(text)?,
            RawToken::Error => None,
        };
        match token {
            Some(token) => tokens.push(token),
            None => warn_invalid(line, text, column),
        }
    }
    Ok(tokens)
}

/// Lazily tokenize each line produced by `lines`.
pub fn tokenize_lines<I, S>(lines: I) -> impl Iterator<Item = Result<Vec<Token>>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines.into_iter().map(|line| tokenize_line(line.as_ref()))
}
