//! Errors raised while reading or evaluating Scheme source.

use derive_more::Display;

/// Every failure the interpreter reports. Each variant is a distinct kind the
/// read-eval loop can recover from; none of them abort the session.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum Error {
    /// A malformed numeral or token.
    #[display(fmt = "{}", _0)]
    Lexical(String),
    /// Malformed list or pair structure in the token stream.
    #[display(fmt = "{}", _0)]
    Syntax(String),
    #[display(fmt = "unknown identifier: {}", _0)]
    Unbound(String),
    /// Wrong operand count for a special form, or wrong argument count for a call.
    #[display(fmt = "{}", _0)]
    Arity(String),
    #[display(fmt = "{}", _0)]
    Type(String),
    /// Structurally invalid special form (bad formals, bad bindings, misplaced `else`).
    #[display(fmt = "{}", _0)]
    MalformedForm(String),
    #[display(fmt = "{}", _0)]
    Eval(String),
    #[display(fmt = "{} is not supported", _0)]
    Unsupported(String),
    /// Raised by the `error` primitive.
    #[display(fmt = "{}", _0)]
    Raised(String),
    #[display(fmt = "{}", _0)]
    Io(String),
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
