//! Scheme values. Expressions read from source are ordinary values, so the
//! same type serves as both AST and runtime data.

use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

use crate::closure::{Closure, Primitive, Procedure};
use crate::error::{Error, Result};
use crate::symtab::{Symbol, ToSymbol};

#[derive(Clone, Debug)]
pub enum Value {
    /// The empty list.
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Symbol(Symbol),
    Pair(Rc<Pair>),
    Procedure(Procedure),
    /// The result of forms with no meaningful value, such as `define`.
    Unspecified,
    /// Returned by the reader when input is exhausted.
    Eof,
}

/// A cons cell. A proper list is a chain of pairs ending in `Value::Nil`.
#[derive(Debug)]
pub struct Pair {
    pub first: Value,
    pub second: Value,
}

impl Drop for Pair {
    fn drop(&mut self) {
        // Unlink long tails iteratively so dropping a long list does not recurse.
        let mut next = std::mem::replace(&mut self.second, Value::Nil);
        while let Value::Pair(rc) = next {
            match Rc::try_unwrap(rc) {
                Ok(mut pair) => next = std::mem::replace(&mut pair.second, Value::Nil),
                Err(_) => break,
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Nil, Nil) | (Unspecified, Unspecified) | (Eof, Eof) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (Symbol(a), Symbol(b)) => a == b,
            (Pair(a), Pair(b)) => Rc::ptr_eq(a, b) || (a.first == b.first && a.second == b.second),
            (Procedure(a), Procedure(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Value {
    pub fn sym(name: &str) -> Value {
        Value::Symbol(name.to_symbol())
    }

    pub fn cons(first: Value, second: Value) -> Value {
        Value::Pair(Rc::new(Pair { first, second }))
    }

    /// A proper list of `items`.
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        Value::list_with_tail(items, Value::Nil)
    }

    /// A list of `items` terminated by `tail` instead of the empty list.
    pub fn list_with_tail<I>(items: I, tail: Value) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items.into_iter().rev().fold(tail, |acc, item| Value::cons(item, acc))
    }

    pub fn primitive(primitive: Primitive) -> Value {
        Value::Procedure(Procedure::Primitive(Rc::new(primitive)))
    }

    pub fn closure(closure: Closure) -> Value {
        Value::Procedure(Procedure::Closure(Rc::new(closure)))
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        if let Value::Symbol(s) = self {
            Some(s)
        } else {
            None
        }
    }

    pub fn as_pair(&self) -> Option<&Pair> {
        if let Value::Pair(p) = self {
            Some(p)
        } else {
            None
        }
    }

    pub fn is_symbol_named(&self, name: &str) -> bool {
        self.as_symbol().map_or(false, |s| s.name() == name)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Numbers, booleans, symbols and the empty list.
    pub fn is_atom(&self) -> bool {
        matches!(
            self,
            Value::Nil | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Symbol(_)
        )
    }

    /// Everything except `#f` counts as true.
    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    /// Whether `self` is the empty list or a pair chain ending in it.
    /// Assumes no cycles.
    pub fn is_list(&self) -> bool {
        let mut value = self;
        loop {
            match value {
                Value::Nil => return true,
                Value::Pair(pair) => value = &pair.second,
                _ => return false,
            }
        }
    }

    pub fn len(&self) -> Result<usize> {
        let mut n = 0;
        let mut value = self;
        loop {
            match value {
                Value::Nil => return Ok(n),
                Value::Pair(pair) => {
                    n += 1;
                    value = &pair.second;
                }
                _ => return Err(Error::Type("length attempted on improper list".to_string())),
            }
        }
    }

    /// The elements of a list, stopping at the first non-pair tail.
    pub fn iter(&self) -> ListIter<'_> {
        ListIter { current: self }
    }

    /// The elements of a proper list, or a type error for anything else.
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        if !self.is_list() {
            return Err(Error::Type(format!("ill-formed list: {}", self)));
        }
        Ok(self.iter().cloned().collect())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Symbol(_) => "symbol",
            Value::Pair(_) => "pair",
            Value::Procedure(Procedure::Primitive(_)) => "primitive",
            Value::Procedure(Procedure::Closure(_)) => "lambda",
            Value::Unspecified => "unspecified",
            Value::Eof => "eof",
        }
    }
}

pub struct ListIter<'a> {
    current: &'a Value,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current {
            Value::Pair(pair) => {
                self.current = &pair.second;
                Some(&pair.first)
            }
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "()"),
            Value::Bool(true) => write!(f, "#t"),
            Value::Bool(false) => write!(f, "#f"),
            Value::Int(n) => write!(f, "{}", n),
            // Signed so the reader takes them as numerals rather than symbols.
            Value::Float(x) if x.is_nan() => write!(f, "+nan"),
            Value::Float(x) if x.is_infinite() => {
                write!(f, "{}inf", if *x > 0.0 { "+" } else { "-" })
            }
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::Pair(pair) => {
                write!(f, "({}", pair.first)?;
                let mut rest = &pair.second;
                while let Value::Pair(next) = rest {
                    write!(f, " {}", next.first)?;
                    rest = &next.second;
                }
                if !matches!(rest, Value::Nil) {
                    write!(f, " . {}", rest)?;
                }
                write!(f, ")")
            }
            Value::Procedure(p) => write!(f, "{}", p),
            Value::Unspecified => Ok(()),
            Value::Eof => write!(f, "<EOF>"),
        }
    }
}
