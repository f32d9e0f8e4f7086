use crate::ast::Value;
use crate::error::{Error, Result};
use crate::lex::{tokenize_lines, Token};

/// A pull-based token stream. `current` peeks, `pop` consumes; both return
/// `None` once input is exhausted.
pub trait TokenSource {
    fn current(&mut self) -> Result<Option<&Token>>;
    fn pop(&mut self) -> Result<Option<Token>>;
}

/// Serves tokens from an iterator of tokenized lines, pulling a new line only
/// when the current one runs out.
pub struct Buffer<I> {
    lines: I,
    tokens: Vec<Token>,
    pos: usize,
}

impl<I> Buffer<I>
where
    I: Iterator<Item = Result<Vec<Token>>>,
{
    pub fn new(lines: I) -> Self {
        Buffer { lines, tokens: Vec::new(), pos: 0 }
    }

    /// Advance to a line that still has tokens. A line that failed to
    /// tokenize is reported once and then left behind.
    fn fill(&mut self) -> Result<bool> {
        while self.pos >= self.tokens.len() {
            match self.lines.next() {
                None => return Ok(false),
                Some(line) => {
                    self.tokens = Vec::new();
                    self.pos = 0;
                    self.tokens = line?;
                }
            }
        }
        Ok(true)
    }
}

impl<I> TokenSource for Buffer<I>
where
    I: Iterator<Item = Result<Vec<Token>>>,
{
    fn current(&mut self) -> Result<Option<&Token>> {
        if self.fill()? {
            Ok(self.tokens.get(self.pos))
        } else {
            Ok(None)
        }
    }

    fn pop(&mut self) -> Result<Option<Token>> {
        if !self.fill()? {
            return Ok(None);
        }
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        Ok(Some(token))
    }
}

fn unexpected_eof() -> Error {
    Error::Syntax("unexpected end of file".to_string())
}

/// Read the next expression from `source`, or `Value::Eof` if no tokens remain.
pub fn read<S: TokenSource>(source: &mut S) -> Result<Value> {
    let token = match source.pop()? {
        None => return Ok(Value::Eof),
        Some(token) => token,
    };
    if let Some(atom) = token.to_atom() {
        return Ok(atom);
    }
    match token {
        Token::Quote => {
            let quoted = read_required(source)?;
            Ok(Value::list([Value::sym("quote"), quoted]))
        }
        Token::LParen => read_tail(source),
        Token::RParen => Err(Error::Syntax("unexpected token: )".to_string())),
        _ => Err(Error::Syntax("unexpected token: .".to_string())),
    }
}

/// Like `read`, but running out of input is an error.
fn read_required<S: TokenSource>(source: &mut S) -> Result<Value> {
    match read(source)? {
        Value::Eof => Err(unexpected_eof()),
        value => Ok(value),
    }
}

/// The rest of a list whose opening parenthesis has been consumed.
fn read_tail<S: TokenSource>(source: &mut S) -> Result<Value> {
    let mut items = Vec::new();
    loop {
        match source.current()? {
            None => return Err(unexpected_eof()),
            Some(Token::RParen) => {
                source.pop()?;
                return Ok(Value::list(items));
            }
            Some(Token::Dot) => {
                source.pop()?;
                if items.is_empty() {
                    return Err(Error::Syntax("unexpected token: .".to_string()));
                }
                let mut rest = read_until_close(source)?;
                return match rest.len() {
                    1 => Ok(Value::list_with_tail(items, rest.remove(0))),
                    0 => Err(Error::Syntax("expected an element after dot".to_string())),
                    _ => Err(Error::Syntax("too many elements in pair".to_string())),
                };
            }
            Some(_) => items.push(read_required(source)?),
        }
    }
}

/// Expressions up to and including the next close parenthesis.
fn read_until_close<S: TokenSource>(source: &mut S) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    loop {
        match source.current()? {
            None => return Err(unexpected_eof()),
            Some(Token::RParen) => {
                source.pop()?;
                return Ok(items);
            }
            Some(_) => items.push(read_required(source)?),
        }
    }
}

/// Read a single string `line` as one expression.
pub fn read_line(line: &str) -> Result<Value> {
    read(&mut Buffer::new(tokenize_lines([line])))
}

/// Iterates over the expressions in a token source until end of input.
pub struct Reader<S> {
    source: S,
}

impl<S: TokenSource> Reader<S> {
    pub fn new(source: S) -> Self {
        Reader { source }
    }
}

impl<S: TokenSource> Iterator for Reader<S> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        match read(&mut self.source) {
            Ok(Value::Eof) => None,
            other => Some(other),
        }
    }
}

/// Every expression in `input`, which may span several lines.
pub fn read_all(input: &str) -> Result<Vec<Value>> {
    Reader::new(Buffer::new(tokenize_lines(input.lines()))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    #[test]
    fn test_parse() {
        let programs =
            ["(+ 1 2)", "12", "(+ 1 (+ 2 3))", "'x", "(1 . 2)", "(a b . c)", "()", "nil"];
        let expected = [
            Value::list([Value::sym("+"), int(1), int(2)]),
            int(12),
            Value::list([
                Value::sym("+"),
                int(1),
                Value::list([Value::sym("+"), int(2), int(3)]),
            ]),
            Value::list([Value::sym("quote"), Value::sym("x")]),
            Value::cons(int(1), int(2)),
            Value::list_with_tail([Value::sym("a"), Value::sym("b")], Value::sym("c")),
            Value::Nil,
            Value::Nil,
        ];

        programs.into_iter().zip(expected).for_each(|(program, expected)| {
            assert_eq!(read_line(program), Ok(expected), "{}", program);
        });
    }

    #[test]
    fn test_parse_across_lines() {
        let mut buffer = Buffer::new(tokenize_lines(["(1", "2 .", "'(3 4))", "4"]));
        let first = read(&mut buffer).unwrap();
        assert_eq!(first.to_string(), "(1 2 quote (3 4))");
        assert_eq!(read(&mut buffer), Ok(int(4)));
        assert_eq!(read(&mut buffer), Ok(Value::Eof));
        assert_eq!(read(&mut buffer), Ok(Value::Eof));
    }

    #[test]
    fn test_syntax_errors() {
        let test_cases = [
            ("(1 2", "unexpected end of file"),
            ("( . 1)", "unexpected token: ."),
            ("(1 . 2 3)", "too many elements in pair"),
            ("(1 . )", "expected an element after dot"),
            (")", "unexpected token: )"),
            (".", "unexpected token: ."),
            ("'", "unexpected end of file"),
            ("(1 . 2", "unexpected end of file"),
        ];
        for (program, message) in test_cases {
            assert_eq!(read_line(program), Err(Error::Syntax(message.to_string())), "{}", program);
        }
    }

    #[test]
    fn test_recover_after_error() {
        let mut buffer = Buffer::new(tokenize_lines(["(1 . 2 3) 5", "(+ 1 2x)", "6"]));
        assert!(matches!(read(&mut buffer), Err(Error::Syntax(_))));
        assert_eq!(read(&mut buffer), Ok(int(5)));
        assert!(matches!(read(&mut buffer), Err(Error::Lexical(_))));
        assert_eq!(read(&mut buffer), Ok(int(6)));
    }

    #[test]
    fn test_read_all() {
        let values = read_all("(define x 1)\n; comment\nx 'y").unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[2].to_string(), "(quote y)");
    }
}
