//! Evaluation of expressions: the Eval/Apply core.

use std::cell::Cell;

use log::trace;

use crate::ast::Value;
use crate::closure::{Arity, Primitive, Procedure};
use crate::error::{Error, Result};
use crate::forms;
use crate::primitives;
use crate::repl;
use crate::symtab::Env;

/// What a special form or an application hands back to the evaluator: a
/// finished value, or an expression to keep evaluating in tail position.
pub enum Step {
    Done(Value),
    Continue(Value, Env),
}

pub type SpecialForm = fn(&Value, &Env) -> Result<Step>;

/// The handler for `head`, if it names a special form. Keywords are
/// recognized by name regardless of any binding in scope.
fn special_form(head: &Value) -> Option<SpecialForm> {
    let name = head.as_symbol()?.name();
    let handler: SpecialForm = match name {
        "and" => forms::do_and_form,
        "or" => forms::do_or_form,
        "if" => forms::do_if_form,
        "cond" => forms::do_cond_form,
        "begin" => forms::do_begin_form,
        "case" => forms::do_case_form,
        "lambda" => forms::do_lambda_form,
        "define" => forms::do_define_form,
        "quote" => forms::do_quote_form,
        "let" => forms::do_let_form,
        "let*" => forms::do_let_star_form,
        _ => return None,
    };
    Some(handler)
}

/// How many `eval` calls may be nested before evaluation fails. Tail calls
/// do not nest, so this only bounds non-tail recursion.
pub const MAX_DEPTH: usize = 10_000;

thread_local! {
    static DEPTH: Cell<usize> = Cell::new(0);
}

/// Counts one level of `eval` nesting on the current thread for as long as
/// it is alive.
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<DepthGuard> {
        DEPTH.with(|depth| {
            if depth.get() >= MAX_DEPTH {
                return Err(Error::Eval("maximum recursion depth exceeded".to_string()));
            }
            depth.set(depth.get() + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// Evaluate `expr` in `env`.
///
/// Forms whose last action is evaluating a sub-expression loop here instead
/// of recursing, so tail calls run in constant stack space. Nesting deeper
/// than `MAX_DEPTH` is an `Error::Eval`.
pub fn eval(expr: &Value, env: &Env) -> Result<Value> {
    let _guard = DepthGuard::enter()?;
    let mut expr = expr.clone();
    let mut env = env.clone();
    loop {
        let (first, rest) = match &expr {
            Value::Unspecified => {
                return Err(Error::Eval("cannot evaluate an undefined expression".to_string()))
            }
            Value::Symbol(sym) => return env.lookup(sym),
            atom if atom.is_atom() => return Ok(atom.clone()),
            Value::Pair(pair) if expr.is_list() => (pair.first.clone(), pair.second.clone()),
            _ => return Err(Error::MalformedForm(format!("malformed list: {}", expr))),
        };

        let step = match special_form(&first) {
            Some(handler) => handler(&rest, &env)?,
            None => {
                let procedure = eval(&first, &env)?;
                let args = rest
                    .iter()
                    .map(|operand| eval(operand, &env))
                    .collect::<Result<Vec<_>>>()?;
                apply_step(&procedure, &args, &env)?
            }
        };

        match step {
            Step::Done(value) => return Ok(value),
            Step::Continue(next_expr, next_env) => {
                expr = next_expr;
                env = next_env;
            }
        }
    }
}

/// Apply `procedure` without evaluating a closure body: the body and its
/// call frame come back as a `Step::Continue`.
fn apply_step(procedure: &Value, args: &[Value], env: &Env) -> Result<Step> {
    match procedure {
        Value::Procedure(Procedure::Primitive(primitive)) => {
            Ok(Step::Done(primitive.call(args, env)?))
        }
        Value::Procedure(Procedure::Closure(closure)) => {
            trace!("apply {} to {} arguments", procedure, args.len());
            let frame = closure.env.bind_call_frame(&closure.formals, args)?;
            Ok(Step::Continue(closure.body.clone(), frame))
        }
        other => Err(Error::Type(format!("cannot call: {}", other))),
    }
}

/// Apply `procedure` to already evaluated `args`. A closure's body runs in a
/// frame extending its captured environment; `env` is only passed on to
/// environment-aware primitives.
pub fn apply(procedure: &Value, args: &[Value], env: &Env) -> Result<Value> {
    match apply_step(procedure, args, env)? {
        Step::Done(value) => Ok(value),
        Step::Continue(body, frame) => eval(&body, &frame),
    }
}

fn eval_primitive(args: &[Value], env: &Env) -> Result<Value> {
    eval(&args[0], env)
}

fn apply_primitive(args: &[Value], env: &Env) -> Result<Value> {
    let list = primitives::check_type(&args[1], Value::is_list, 1, "apply")?;
    apply(&args[0], &list.to_vec()?, env)
}

fn load_primitive(args: &[Value], env: &Env) -> Result<Value> {
    let name = primitives::check_type(&args[0], |v| v.as_symbol().is_some(), 0, "load")?;
    repl::load(&name.to_string(), &env.global_frame())?;
    Ok(Value::Unspecified)
}

/// A single root frame holding `eval`, `apply`, `load` and the primitive library.
pub fn create_global_env() -> Env {
    let env = Env::new();
    env.register(Primitive::with_env("eval", Arity::Exact(1), eval_primitive));
    env.register(Primitive::with_env("apply", Arity::Exact(2), apply_primitive));
    env.register(Primitive::with_env("load", Arity::Exact(1), load_primitive));
    for primitive in primitives::builtins() {
        env.register(primitive);
    }
    env
}
