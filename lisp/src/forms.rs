//! Special forms. Each handler receives the unevaluated operand list.
//! Handlers whose final action is evaluating a sub-expression return it as a
//! `Step::Continue` so the evaluator can run it in tail position.

use crate::ast::Value;
use crate::closure::{check_formals, Closure};
use crate::error::{Error, Result};
use crate::interpret::{eval, Step};
use crate::symtab::{Env, Symbol};

/// Check `expr` is a proper list whose length is at least `min` and no more
/// than `max`. Returns the length.
pub fn check_form(expr: &Value, min: usize, max: Option<usize>) -> Result<usize> {
    if !expr.is_list() {
        return Err(Error::MalformedForm(format!("badly formed expression: {}", expr)));
    }
    let len = expr.len()?;
    if len < min {
        return Err(Error::Arity("too few operands in form".to_string()));
    }
    if max.map_or(false, |max| len > max) {
        return Err(Error::Arity("too many operands in form".to_string()));
    }
    Ok(len)
}

fn begin_wrapped(body: &Value) -> Value {
    Value::cons(Value::sym("begin"), body.clone())
}

/// Evaluate all but the last of `body` for effect; the last is left for the
/// evaluator.
fn eval_body(body: &Value, env: Env) -> Result<Step> {
    let exprs = body.to_vec()?;
    match exprs.split_last() {
        None => Err(Error::Arity("too few operands in form".to_string())),
        Some((last, init)) => {
            for expr in init {
                eval(expr, &env)?;
            }
            Ok(Step::Continue(last.clone(), env))
        }
    }
}

pub fn do_and_form(operands: &Value, env: &Env) -> Result<Step> {
    check_form(operands, 0, None)?;
    for operand in operands.iter() {
        if !eval(operand, env)?.is_true() {
            return Ok(Step::Done(Value::Bool(false)));
        }
    }
    Ok(Step::Done(Value::Bool(true)))
}

pub fn do_or_form(operands: &Value, env: &Env) -> Result<Step> {
    check_form(operands, 0, None)?;
    for operand in operands.iter() {
        if eval(operand, env)?.is_true() {
            return Ok(Step::Done(Value::Bool(true)));
        }
    }
    Ok(Step::Done(Value::Bool(false)))
}

pub fn do_if_form(operands: &Value, env: &Env) -> Result<Step> {
    check_form(operands, 3, Some(3))?;
    let parts = operands.to_vec()?;
    let branch = if eval(&parts[0], env)?.is_true() { &parts[1] } else { &parts[2] };
    Ok(Step::Continue(branch.clone(), env.clone()))
}

pub fn do_cond_form(operands: &Value, env: &Env) -> Result<Step> {
    let clauses = operands.to_vec()?;
    for (i, clause) in clauses.iter().enumerate() {
        check_form(clause, 1, None)?;
        let (test, body) = match clause.as_pair() {
            Some(pair) => (&pair.first, &pair.second),
            None => {
                let message = format!("badly formed cond clause: {}", clause);
                return Err(Error::MalformedForm(message));
            }
        };
        let matched = if test.is_symbol_named("else") {
            if i + 1 < clauses.len() {
                return Err(Error::MalformedForm("else must be last".to_string()));
            }
            if matches!(body, Value::Nil) {
                return Err(Error::MalformedForm("badly formed else clause".to_string()));
            }
            true
        } else {
            eval(test, env)?.is_true()
        };
        if matched {
            return Ok(match body.len()? {
                0 => Step::Done(Value::Bool(true)),
                1 => Step::Continue(body.iter().next().cloned().unwrap_or(Value::Nil), env.clone()),
                _ => Step::Continue(begin_wrapped(body), env.clone()),
            });
        }
    }
    Ok(Step::Done(Value::Unspecified))
}

pub fn do_begin_form(operands: &Value, env: &Env) -> Result<Step> {
    check_form(operands, 1, None)?;
    eval_body(operands, env.clone())
}

pub fn do_case_form(_operands: &Value, _env: &Env) -> Result<Step> {
    Err(Error::Unsupported("case".to_string()))
}

/// A closure over `env` with `formals` and one or more `body` expressions.
fn make_lambda(formals: &Value, body: &Value, env: &Env) -> Result<Value> {
    let body = match body.len()? {
        1 => body.iter().next().cloned().unwrap_or(Value::Nil),
        _ => begin_wrapped(body),
    };
    Ok(Value::closure(Closure::new(formals.clone(), body, env.clone())?))
}

pub fn do_lambda_form(operands: &Value, env: &Env) -> Result<Step> {
    check_form(operands, 2, None)?;
    let (formals, body) = split(operands)?;
    Ok(Step::Done(make_lambda(formals, body, env)?))
}

pub fn do_define_form(operands: &Value, env: &Env) -> Result<Step> {
    check_form(operands, 2, None)?;
    let (target, rest) = split(operands)?;
    match target {
        // (define (name . formals) body ...)
        Value::Pair(signature) => {
            let name = signature.first.as_symbol().ok_or_else(|| {
                Error::MalformedForm(format!("bad procedure name in define: {}", signature.first))
            })?;
            let procedure = make_lambda(&signature.second, rest, env)?;
            env.define(name.clone(), procedure);
        }
        // (define name expr)
        Value::Symbol(name) => {
            check_form(operands, 2, Some(2))?;
            let (value_expr, _) = split(rest)?;
            let value = eval(value_expr, env)?;
            env.define(name.clone(), value);
        }
        other => return Err(Error::MalformedForm(format!("bad argument to define: {}", other))),
    }
    Ok(Step::Done(Value::Unspecified))
}

pub fn do_quote_form(operands: &Value, _env: &Env) -> Result<Step> {
    check_form(operands, 1, Some(1))?;
    Ok(Step::Done(split(operands)?.0.clone()))
}

fn parse_binding(binding: &Value) -> Result<(Symbol, Value)> {
    let bad = || Error::MalformedForm(format!("bad binding in let form: {}", binding));
    if !binding.is_list() || binding.len()? != 2 {
        return Err(bad());
    }
    let (name, rest) = split(binding)?;
    let name = name.as_symbol().ok_or_else(bad)?;
    Ok((name.clone(), split(rest)?.0.clone()))
}

fn bindings_of(operands: &Value) -> Result<(Vec<(Symbol, Value)>, &Value)> {
    check_form(operands, 2, None)?;
    let (bindings, body) = split(operands)?;
    if !bindings.is_list() {
        return Err(Error::MalformedForm("bad bindings list in let form".to_string()));
    }
    let bindings = bindings.iter().map(parse_binding).collect::<Result<Vec<_>>>()?;
    Ok((bindings, body))
}

/// Every binding is evaluated in the current environment; none of them see
/// each other.
pub fn do_let_form(operands: &Value, env: &Env) -> Result<Step> {
    let (bindings, body) = bindings_of(operands)?;
    let names: Vec<Value> = bindings.iter().map(|(name, _)| Value::Symbol(name.clone())).collect();
    let names = Value::list(names);
    check_formals(&names)?;
    let values = bindings
        .iter()
        .map(|(_, expr)| eval(expr, env))
        .collect::<Result<Vec<_>>>()?;
    let frame = env.bind_call_frame(&names, &values)?;
    eval_body(body, frame)
}

/// Each binding gets a frame of its own, extending the previous binding's
/// frame, so an expression sees the bindings before it and none after.
pub fn do_let_star_form(operands: &Value, env: &Env) -> Result<Step> {
    let (bindings, body) = bindings_of(operands)?;
    let mut scope = env.clone();
    for (name, expr) in bindings {
        let value = eval(&expr, &scope)?;
        scope = scope.fork();
        scope.define(name, value);
    }
    // The body always runs in a new frame, even when there are no bindings.
    let frame = if scope.ptr_eq(env) { env.fork() } else { scope };
    eval_body(body, frame)
}

fn split(list: &Value) -> Result<(&Value, &Value)> {
    list.as_pair()
        .map(|pair| (&pair.first, &pair.second))
        .ok_or_else(|| Error::MalformedForm(format!("badly formed expression: {}", list)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret::create_global_env;
    use crate::parse::read_line;

    fn operands(program: &str) -> Value {
        read_line(program).unwrap()
    }

    #[test]
    fn test_check_form() {
        assert_eq!(check_form(&operands("(1 2)"), 1, None), Ok(2));
        assert_eq!(check_form(&operands("()"), 0, Some(0)), Ok(0));
        let too_few = Error::Arity("too few operands in form".to_string());
        assert_eq!(check_form(&operands("(1)"), 2, None), Err(too_few));
        assert_eq!(
            check_form(&operands("(1 2 3)"), 1, Some(2)),
            Err(Error::Arity("too many operands in form".to_string()))
        );
        assert!(matches!(check_form(&operands("(1 . 2)"), 1, None), Err(Error::MalformedForm(_))));
    }

    #[test]
    fn test_if_hands_back_branch_unevaluated() {
        let env = create_global_env();
        match do_if_form(&operands("(#f (error 'no) (+ 1 2))"), &env).unwrap() {
            Step::Continue(expr, next_env) => {
                assert_eq!(expr.to_string(), "(+ 1 2)");
                assert!(next_env.ptr_eq(&env));
            }
            Step::Done(v) => panic!("expected tail expression, got {}", v),
        }
    }

    #[test]
    fn test_cond_multi_expression_body_becomes_begin() {
        let env = create_global_env();
        match do_cond_form(&operands("((#t 1 2))"), &env).unwrap() {
            Step::Continue(expr, _) => assert_eq!(expr.to_string(), "(begin 1 2)"),
            Step::Done(v) => panic!("expected tail expression, got {}", v),
        }
    }

    #[test]
    fn test_let_continues_in_new_frame() {
        let env = create_global_env();
        match do_let_form(&operands("(((x 1)) (display-nothing) x)"), &env) {
            Err(Error::Unbound(name)) => assert_eq!(name, "display-nothing"),
            _ => panic!("body expressions before the last should be evaluated"),
        }
        match do_let_form(&operands("(((x 1)) x)"), &env).unwrap() {
            Step::Continue(expr, frame) => {
                assert_eq!(expr.to_string(), "x");
                assert_eq!(format!("{:?}", frame), "<{x: 1} -> <Global Frame>>");
            }
            Step::Done(v) => panic!("expected tail expression, got {}", v),
        }
    }

    #[test]
    fn test_let_star_frame_per_binding() {
        let env = create_global_env();
        let test_cases = [
            ("(((x 1) (y 2)) y)", "<{y: 2} -> <{x: 1} -> <Global Frame>>>"),
            ("(() 1)", "<{} -> <Global Frame>>"),
        ];
        for (program, expected) in test_cases {
            match do_let_star_form(&operands(program), &env).unwrap() {
                Step::Continue(_, frame) => assert_eq!(format!("{:?}", frame), expected),
                Step::Done(v) => panic!("expected tail expression, got {}", v),
            }
        }
    }

    #[test]
    fn test_lambda_wraps_body() {
        let env = create_global_env();
        match do_lambda_form(&operands("((x) (display x) (+ x 1))"), &env).unwrap() {
            Step::Done(closure) => {
                assert_eq!(closure.to_string(), "(lambda (x) (begin (display x) (+ x 1)))")
            }
            Step::Continue(..) => panic!("lambda should produce a value"),
        }
    }
}
