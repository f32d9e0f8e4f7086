//! The native procedures bound into the global frame.
//!
//! Each entry declares its arity; argument counts are checked before the
//! native function runs, so functions here may index `args` directly.

use std::io::Write;
use std::rc::Rc;

use crate::ast::{Pair, Value};
use crate::closure::{Arity, Primitive, Procedure};
use crate::error::{Error, Result};

/// The primitive table installed by `create_global_env`.
pub fn builtins() -> Vec<Primitive> {
    use Arity::*;
    vec![
        Primitive::new("boolean?", Exact(1), |args| {
            Ok(Value::Bool(matches!(args[0], Value::Bool(_))))
        }),
        Primitive::new("not", Exact(1), |args| Ok(Value::Bool(!args[0].is_true()))),
        Primitive::new("eq?", Exact(2), |args| Ok(Value::Bool(is_eq(&args[0], &args[1])))),
        Primitive::new("pair?", Exact(1), |args| Ok(Value::Bool(is_pair(&args[0])))),
        Primitive::new("null?", Exact(1), |args| Ok(Value::Bool(matches!(args[0], Value::Nil)))),
        Primitive::new("list?", Exact(1), |args| Ok(Value::Bool(args[0].is_list()))),
        Primitive::new("symbol?", Exact(1), |args| Ok(Value::Bool(args[0].as_symbol().is_some()))),
        Primitive::new("number?", Exact(1), |args| Ok(Value::Bool(args[0].is_number()))),
        Primitive::new("integer?", Exact(1), |args| Ok(Value::Bool(is_integer(&args[0])))),
        Primitive::new("atom?", Exact(1), |args| Ok(Value::Bool(args[0].is_atom()))),
        Primitive::new("eof?", Exact(1), |args| Ok(Value::Bool(matches!(args[0], Value::Eof)))),
        Primitive::new("length", Exact(1), length),
        Primitive::new("cons", Exact(2), |args| Ok(Value::cons(args[0].clone(), args[1].clone()))),
        Primitive::new("car", Exact(1), |args| Ok(pair_arg(args, 0, "car")?.first.clone())),
        Primitive::new("cdr", Exact(1), |args| Ok(pair_arg(args, 0, "cdr")?.second.clone())),
        Primitive::new("list", AtLeast(0), |args| Ok(Value::list(args.iter().cloned()))),
        Primitive::new("append", AtLeast(0), append),
        Primitive::new("+", AtLeast(0), |args| {
            arith(Value::Int(0), args, i64::checked_add, |a, b| a + b)
        }),
        Primitive::new("-", AtLeast(1), sub),
        Primitive::new("*", AtLeast(0), |args| {
            arith(Value::Int(1), args, i64::checked_mul, |a, b| a * b)
        }),
        Primitive::new("/", Exact(2), div),
        Primitive::new("quotient", Exact(2), quotient),
        Primitive::new("modulo", Exact(2), modulo),
        Primitive::new("remainder", Exact(2), remainder),
        Primitive::new("floor", Exact(1), |args| round_with(args, "floor", f64::floor)),
        Primitive::new("ceil", Exact(1), |args| round_with(args, "ceil", f64::ceil)),
        Primitive::new("=", Exact(2), |args| compare(args, |o| o == std::cmp::Ordering::Equal)),
        Primitive::new("<", Exact(2), |args| compare(args, |o| o == std::cmp::Ordering::Less)),
        Primitive::new(">", Exact(2), |args| compare(args, |o| o == std::cmp::Ordering::Greater)),
        Primitive::new("<=", Exact(2), |args| compare(args, |o| o != std::cmp::Ordering::Greater)),
        Primitive::new(">=", Exact(2), |args| compare(args, |o| o != std::cmp::Ordering::Less)),
        Primitive::new("display", Exact(1), display),
        Primitive::new("newline", Exact(0), newline),
        Primitive::new("error", Range(0, 1), error),
        Primitive::new("exit", Exact(0), exit),
    ]
}

/// Returns `val`, or a type error naming argument `k` of `name`.
pub fn check_type<'a>(
    val: &'a Value,
    predicate: fn(&Value) -> bool,
    k: usize,
    name: &str,
) -> Result<&'a Value> {
    if predicate(val) {
        Ok(val)
    } else {
        Err(Error::Type(format!(
            "argument {} of {} has wrong type ({})",
            k,
            name,
            val.type_name()
        )))
    }
}

fn is_pair(val: &Value) -> bool {
    matches!(val, Value::Pair(_))
}

fn is_integer(val: &Value) -> bool {
    match val {
        Value::Int(_) => true,
        Value::Float(x) => x.fract() == 0.0,
        _ => false,
    }
}

fn pair_arg<'a>(args: &'a [Value], k: usize, name: &str) -> Result<&'a Pair> {
    check_type(&args[k], is_pair, k, name)?;
    args[k]
        .as_pair()
        .ok_or_else(|| Error::Type(format!("argument {} of {} is not a pair", k, name)))
}

/// Identity for pairs and procedures, value equality for atoms.
fn is_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Pair(x), Value::Pair(y)) => Rc::ptr_eq(x, y),
        (Value::Procedure(x), Value::Procedure(y)) => Procedure::ptr_eq(x, y),
        _ => a == b,
    }
}

fn length(args: &[Value]) -> Result<Value> {
    let list = check_type(&args[0], Value::is_list, 0, "length")?;
    Ok(Value::Int(list.len()? as i64))
}

/// Copies every argument but the last, which becomes the shared tail.
fn append(args: &[Value]) -> Result<Value> {
    let (last, init) = match args.split_last() {
        None => return Ok(Value::Nil),
        Some(split) => split,
    };
    let mut items = Vec::new();
    for (k, arg) in init.iter().enumerate() {
        check_type(arg, Value::is_list, k, "append")?;
        items.extend(arg.iter().cloned());
    }
    Ok(Value::list_with_tail(items, last.clone()))
}

fn check_nums(vals: &[Value]) -> Result<()> {
    match vals.iter().enumerate().find(|(_, v)| !v.is_number()) {
        Some((i, v)) => Err(Error::Type(format!("operand {} ({}) is not a number", i, v))),
        None => Ok(()),
    }
}

fn as_f64(val: &Value) -> f64 {
    match val {
        Value::Int(n) => *n as f64,
        Value::Float(x) => *x,
        _ => f64::NAN,
    }
}

/// Integral floats become integers.
fn normalize(val: Value) -> Value {
    match val {
        Value::Float(x) if x.fract() == 0.0 && x.abs() < 9.2e18 => Value::Int(x as i64),
        other => other,
    }
}

/// Fold `vals` into `init`. Integer operations that overflow are redone in
/// floating point.
fn arith(
    init: Value,
    vals: &[Value],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    check_nums(vals)?;
    let mut acc = init;
    for val in vals {
        acc = match (&acc, val) {
            (Value::Int(a), Value::Int(b)) => match int_op(*a, *b) {
                Some(n) => Value::Int(n),
                None => Value::Float(float_op(*a as f64, *b as f64)),
            },
            (a, b) => Value::Float(float_op(as_f64(a), as_f64(b))),
        };
    }
    Ok(normalize(acc))
}

fn sub(args: &[Value]) -> Result<Value> {
    if args.len() == 1 {
        return arith(Value::Int(0), args, i64::checked_sub, |a, b| a - b);
    }
    check_nums(args)?;
    arith(args[0].clone(), &args[1..], i64::checked_sub, |a, b| a - b)
}

fn check_divisor(args: &[Value]) -> Result<()> {
    check_nums(args)?;
    if as_f64(&args[1]) == 0.0 {
        return Err(Error::Eval("division by zero".to_string()));
    }
    Ok(())
}

fn div(args: &[Value]) -> Result<Value> {
    check_divisor(args)?;
    Ok(normalize(Value::Float(as_f64(&args[0]) / as_f64(&args[1]))))
}

fn quotient(args: &[Value]) -> Result<Value> {
    check_divisor(args)?;
    arith(
        args[0].clone(),
        &args[1..],
        |a, b| {
            let q = a.checked_div(b)?;
            if a % b != 0 && (a < 0) != (b < 0) {
                Some(q - 1)
            } else {
                Some(q)
            }
        },
        |a, b| (a / b).floor(),
    )
}

/// The result takes the sign of the divisor.
fn modulo(args: &[Value]) -> Result<Value> {
    check_divisor(args)?;
    arith(
        args[0].clone(),
        &args[1..],
        |a, b| {
            let r = a.checked_rem(b)?;
            if r != 0 && (r < 0) != (b < 0) {
                Some(r + b)
            } else {
                Some(r)
            }
        },
        |a, b| {
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        },
    )
}

/// The result takes the sign of the dividend.
fn remainder(args: &[Value]) -> Result<Value> {
    check_divisor(args)?;
    arith(args[0].clone(), &args[1..], i64::checked_rem, |a, b| a % b)
}

fn round_with(args: &[Value], name: &str, op: fn(f64) -> f64) -> Result<Value> {
    check_type(&args[0], Value::is_number, 0, name)?;
    match &args[0] {
        Value::Float(x) => Ok(normalize(Value::Float(op(*x)))),
        other => Ok(other.clone()),
    }
}

fn compare(args: &[Value], test: fn(std::cmp::Ordering) -> bool) -> Result<Value> {
    check_nums(args)?;
    let ordering = match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (a, b) => as_f64(a).partial_cmp(&as_f64(b)),
    };
    Ok(Value::Bool(ordering.map_or(false, test)))
}

fn display(args: &[Value]) -> Result<Value> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", args[0])?;
    stdout.flush()?;
    Ok(Value::Unspecified)
}

fn newline(_: &[Value]) -> Result<Value> {
    let mut stdout = std::io::stdout();
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(Value::Unspecified)
}

fn exit(_: &[Value]) -> Result<Value> {
    std::process::exit(0)
}

fn error(args: &[Value]) -> Result<Value> {
    let message = args.first().map(|msg| msg.to_string()).unwrap_or_default();
    Err(Error::Raised(message))
}
