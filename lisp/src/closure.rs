use std::collections::BTreeSet;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

use crate::ast::Value;
use crate::error::{Error, Result};
use crate::symtab::{Env, Symbol};

/// Anything that can be applied to arguments.
#[derive(Clone)]
pub enum Procedure {
    Primitive(Rc<Primitive>),
    Closure(Rc<Closure>),
}

impl Procedure {
    pub fn ptr_eq(&self, other: &Procedure) -> bool {
        match (self, other) {
            (Procedure::Primitive(a), Procedure::Primitive(b)) => Rc::ptr_eq(a, b),
            (Procedure::Closure(a), Procedure::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Display for Procedure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Primitive(p) => write!(f, "#[primitive {}]", p.name),
            Procedure::Closure(c) => write!(f, "(lambda {} {})", c.formals, c.body),
        }
    }
}

impl Debug for Procedure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Primitive(p) => write!(f, "Primitive({})", p.name),
            Procedure::Closure(c) => write!(f, "Closure({}, {}, {:?})", c.formals, c.body, c.env),
        }
    }
}

/// Accepted argument counts of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

impl Arity {
    pub fn validate(&self, name: &str, got: usize) -> Result<()> {
        let ok = match *self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Range(min, max) => (min..=max).contains(&got),
        };
        if ok {
            return Ok(());
        }
        let expected = match *self {
            Arity::Exact(n) => format!("{}", n),
            Arity::AtLeast(n) => format!("at least {}", n),
            Arity::Range(min, max) => format!("{} to {}", min, max),
        };
        Err(Error::Arity(format!("{} expected {} arguments, got {}", name, expected, got)))
    }
}

/// The native half of a primitive. `WithEnv` functions also receive the
/// environment the call was made from.
#[derive(Clone, Copy)]
pub enum NativeFn {
    Plain(fn(&[Value]) -> Result<Value>),
    WithEnv(fn(&[Value], &Env) -> Result<Value>),
}

/// A procedure implemented in Rust.
pub struct Primitive {
    name: &'static str,
    arity: Arity,
    func: NativeFn,
}

impl Primitive {
    pub fn new(name: &'static str, arity: Arity, func: fn(&[Value]) -> Result<Value>) -> Self {
        Primitive { name, arity, func: NativeFn::Plain(func) }
    }

    pub fn with_env(
        name: &'static str,
        arity: Arity,
        func: fn(&[Value], &Env) -> Result<Value>,
    ) -> Self {
        Primitive { name, arity, func: NativeFn::WithEnv(func) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn uses_env(&self) -> bool {
        matches!(self.func, NativeFn::WithEnv(_))
    }

    pub fn call(&self, args: &[Value], env: &Env) -> Result<Value> {
        self.arity.validate(self.name, args.len())?;
        match self.func {
            NativeFn::Plain(f) => f(args),
            NativeFn::WithEnv(f) => f(args, env),
        }
    }
}

/// A user procedure created by `lambda` or `define`. A body of several
/// expressions is stored wrapped in `begin`.
pub struct Closure {
    pub formals: Value,
    pub body: Value,
    pub env: Env,
}

impl Closure {
    /// Fails if `formals` is not a valid parameter pattern.
    pub fn new(formals: Value, body: Value, env: Env) -> Result<Self> {
        check_formals(&formals)?;
        Ok(Closure { formals, body, env })
    }
}

/// Check that `formals` is `rest`, `(s1 ... sn)` or `(s1 ... sn . rest)`,
/// where every name is a distinct symbol.
pub fn check_formals(formals: &Value) -> Result<()> {
    let mut seen = BTreeSet::new();
    let mut formals = formals;
    while let Value::Pair(pair) = formals {
        check_formal(&pair.first, &mut seen)?;
        formals = &pair.second;
    }
    match formals {
        Value::Nil => Ok(()),
        tail => check_formal(tail, &mut seen),
    }
}

fn check_formal(value: &Value, seen: &mut BTreeSet<Symbol>) -> Result<()> {
    match value {
        Value::Symbol(sym) => {
            if seen.insert(sym.clone()) {
                Ok(())
            } else {
                let message = format!("formal arguments cannot have the same name: {}", sym);
                Err(Error::MalformedForm(message))
            }
        }
        Value::Int(_) | Value::Float(_) => {
            Err(Error::MalformedForm(format!("formal arguments cannot be number: {}", value)))
        }
        Value::Pair(_) => {
            Err(Error::MalformedForm(format!("formal arguments cannot be pair: {}", value)))
        }
        other => Err(Error::MalformedForm(format!("formal arguments must be symbols: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::read_line;

    #[test]
    fn test_check_formals() {
        for ok in ["(a b c)", "(a b . c)", "a", "()"] {
            assert_eq!(check_formals(&read_line(ok).unwrap()), Ok(()), "{}", ok);
        }
        for bad in ["(a a)", "(a b . a)", "(1 b)", "(a (b))", "(a . 2)", "(#t)", "3"] {
            assert!(
                matches!(check_formals(&read_line(bad).unwrap()), Err(Error::MalformedForm(_))),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_arity() {
        assert_eq!(Arity::Exact(2).validate("cons", 2), Ok(()));
        assert_eq!(Arity::AtLeast(1).validate("-", 3), Ok(()));
        assert_eq!(Arity::Range(0, 1).validate("error", 1), Ok(()));
        assert_eq!(
            Arity::Exact(1).validate("car", 2),
            Err(Error::Arity("car expected 1 arguments, got 2".to_string()))
        );
        assert!(matches!(Arity::AtLeast(1).validate("-", 0), Err(Error::Arity(_))));
    }

    #[test]
    fn test_primitive_call() {
        fn first(args: &[Value]) -> Result<Value> {
            Ok(args[0].clone())
        }
        fn frame_is_root(_: &[Value], env: &Env) -> Result<Value> {
            Ok(Value::Bool(env.is_root()))
        }
        let env = Env::new();
        let plain = Primitive::new("first", Arity::Exact(1), first);
        let aware = Primitive::with_env("root?", Arity::Exact(0), frame_is_root);
        assert!(!plain.uses_env());
        assert!(aware.uses_env());
        assert_eq!(plain.call(&[Value::Int(7)], &env), Ok(Value::Int(7)));
        assert_eq!(aware.call(&[], &env.fork()), Ok(Value::Bool(false)));
        assert!(matches!(plain.call(&[], &env), Err(Error::Arity(_))));
    }
}
