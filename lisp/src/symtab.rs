use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

use log::debug;

use crate::ast::Value;
use crate::closure::Primitive;
use crate::error::{Error, Result};

/// A case-sensitive symbol name. Clones share one allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Symbol(Rc<str>);

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(Rc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

pub trait ToSymbol {
    fn to_symbol(&self) -> Symbol;
}

impl ToSymbol for &str {
    fn to_symbol(&self) -> Symbol {
        Symbol::new(self)
    }
}

impl ToSymbol for String {
    fn to_symbol(&self) -> Symbol {
        Symbol::new(self)
    }
}

/// One lexical scope. Frames are shared between the call that created them
/// and every closure that captured them.
pub struct Frame {
    store: RefCell<BTreeMap<Symbol, Value>>,
    parent: Option<Env>,
}

/// A handle to a frame and, through its parent links, the whole scope chain.
/// Forking is constant time and never affects the parent.
#[derive(Clone)]
pub struct Env(Rc<Frame>);

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    /// A root frame with no parent.
    pub fn new() -> Self {
        Env(Rc::new(Frame {
            store: RefCell::new(BTreeMap::new()),
            parent: None,
        }))
    }

    /// An empty frame whose parent is `self`.
    pub fn fork(&self) -> Self {
        Env(Rc::new(Frame {
            store: RefCell::new(BTreeMap::new()),
            parent: Some(self.clone()),
        }))
    }

    pub fn parent(&self) -> Option<&Env> {
        self.0.parent.as_ref()
    }

    /// Check if current scope is top level.
    pub fn is_root(&self) -> bool {
        self.0.parent.is_none()
    }

    pub fn ptr_eq(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The frame at or above `self` that binds `sym`.
    pub fn find(&self, sym: &Symbol) -> Option<&Env> {
        let mut env = self;
        loop {
            if env.0.store.borrow().contains_key(sym) {
                return Some(env);
            }
            env = env.parent()?;
        }
    }

    /// Get the value bound to `sym`, searching outward to the root.
    pub fn lookup(&self, sym: &Symbol) -> Result<Value> {
        self.find(sym)
            .and_then(|env| env.0.store.borrow().get(sym).cloned())
            .ok_or_else(|| Error::Unbound(sym.to_string()))
    }

    /// Bind `sym` in this frame only, shadowing any outer binding.
    pub fn define(&self, sym: Symbol, value: Value) {
        debug!("define {}", sym);
        self.0.store.borrow_mut().insert(sym, value);
    }

    pub fn register(&self, primitive: Primitive) {
        let name = primitive.name().to_symbol();
        self.define(name, Value::primitive(primitive));
    }

    /// The root of the parent chain.
    pub fn global_frame(&self) -> Env {
        let mut env = self;
        while let Some(parent) = env.parent() {
            env = parent;
        }
        env.clone()
    }

    /// A new child frame binding `formals` to `args`.
    ///
    /// `formals` is a proper list of symbols, which requires exactly as many
    /// arguments, or an improper list / lone symbol whose tail symbol collects
    /// the remaining arguments as a (possibly empty) list.
    pub fn bind_call_frame(&self, formals: &Value, args: &[Value]) -> Result<Env> {
        let frame = self.fork();
        let mut formals = formals;
        let mut rest = args;
        let mut required = 0;
        loop {
            match formals {
                Value::Pair(pair) => {
                    let sym = pair.first.as_symbol().ok_or_else(|| {
                        let message = format!("formal arguments must be symbols: {}", pair.first);
                        Error::MalformedForm(message)
                    })?;
                    required += 1;
                    match rest.split_first() {
                        Some((value, tail)) => {
                            frame.define(sym.clone(), value.clone());
                            rest = tail;
                        }
                        None => {
                            // Count the remaining formals for the message.
                            let (fixed, variadic) = count_formals(formals);
                            return Err(arity_mismatch(required - 1 + fixed, variadic, args.len()));
                        }
                    }
                    formals = &pair.second;
                }
                Value::Nil if rest.is_empty() => return Ok(frame),
                Value::Nil => return Err(arity_mismatch(required, false, args.len())),
                Value::Symbol(sym) => {
                    frame.define(sym.clone(), Value::list(rest.iter().cloned()));
                    return Ok(frame);
                }
                other => {
                    return Err(Error::MalformedForm(format!(
                        "formal arguments must be symbols: {}",
                        other
                    )))
                }
            }
        }
    }
}

fn count_formals(mut formals: &Value) -> (usize, bool) {
    let mut fixed = 0;
    while let Value::Pair(pair) = formals {
        fixed += 1;
        formals = &pair.second;
    }
    (fixed, formals.as_symbol().is_some())
}

fn arity_mismatch(required: usize, variadic: bool, got: usize) -> Error {
    if variadic {
        Error::Arity(format!("expected at least {} arguments, got {}", required, got))
    } else {
        Error::Arity(format!("expected {} arguments, got {}", required, got))
    }
}

impl Debug for Env {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.parent() {
            None => write!(f, "<Global Frame>"),
            Some(parent) => {
                let store = self.0.store.borrow();
                let bindings: Vec<String> =
                    store.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "<{{{}}} -> {:?}>", bindings.join(", "), parent)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::read_line;

    fn int_list(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    #[test]
    fn test_lookup_and_shadowing() {
        let global = Env::new();
        global.define("x".to_symbol(), Value::Int(1));
        let child = global.fork();
        assert_eq!(child.lookup(&"x".to_symbol()), Ok(Value::Int(1)));

        child.define("x".to_symbol(), Value::Int(2));
        assert_eq!(child.lookup(&"x".to_symbol()), Ok(Value::Int(2)));
        assert_eq!(global.lookup(&"x".to_symbol()), Ok(Value::Int(1)));

        assert!(matches!(child.lookup(&"y".to_symbol()), Err(Error::Unbound(name)) if name == "y"));
        assert!(child.global_frame().ptr_eq(&global));
        assert!(!child.is_root());
    }

    #[test]
    fn test_bind_call_frame() {
        let global = Env::new();
        let test_cases = [
            ("(a b c)", vec![1, 2, 3], "<{a: 1, b: 2, c: 3} -> <Global Frame>>"),
            ("(a . b)", vec![1, 2, 3], "<{a: 1, b: (2 3)} -> <Global Frame>>"),
            ("(a b . c)", vec![1, 2, 3, 4], "<{a: 1, b: 2, c: (3 4)} -> <Global Frame>>"),
            ("(a b . c)", vec![1, 2], "<{a: 1, b: 2, c: ()} -> <Global Frame>>"),
            ("rest", vec![1, 2], "<{rest: (1 2)} -> <Global Frame>>"),
            ("()", vec![], "<{} -> <Global Frame>>"),
        ];
        for (formals, args, expected) in test_cases {
            let formals = read_line(formals).unwrap();
            let frame = global.bind_call_frame(&formals, &int_list(&args)).unwrap();
            assert_eq!(format!("{:?}", frame), expected);
        }
    }

    #[test]
    fn test_bind_call_frame_arity() {
        let global = Env::new();
        let test_cases = [
            ("(a b . c)", vec![1], "expected at least 2 arguments, got 1"),
            ("(a b)", vec![1], "expected 2 arguments, got 1"),
            ("(a b)", vec![1, 2, 3], "expected 2 arguments, got 3"),
            ("()", vec![1], "expected 0 arguments, got 1"),
        ];
        for (formals, args, expected) in test_cases {
            let formals = read_line(formals).unwrap();
            let err = global.bind_call_frame(&formals, &int_list(&args)).unwrap_err();
            assert_eq!(err, Error::Arity(expected.to_string()));
        }
    }
}
