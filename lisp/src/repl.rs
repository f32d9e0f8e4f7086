//! The read-eval-print loop and file loading.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::panic;
use std::thread;

use log::debug;

use crate::ast::Value;
use crate::error::{Error, Result};
use crate::interpret::eval;
use crate::lex::{tokenize_line, Token};
use crate::parse::{read, Buffer, TokenSource};
use crate::symtab::Env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplOptions {
    /// Printed before each read. When unset, values are not printed either.
    pub prompt: Option<String>,
    /// Print each expression as it is read.
    pub echo: bool,
}

impl Default for ReplOptions {
    fn default() -> Self {
        ReplOptions { prompt: Some("scm> ".to_string()), echo: false }
    }
}

/// Native stack for threads that evaluate user code. Large enough for
/// `MAX_DEPTH` nested evaluations.
pub const STACK_SIZE: usize = 256 * 1024 * 1024;

/// Run `f` on a new thread with a `STACK_SIZE` stack and wait for it.
pub fn run_with_large_stack<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = thread::Builder::new()
        .name("minischeme".to_string())
        .stack_size(STACK_SIZE)
        .spawn(f)?;
    match handle.join() {
        Ok(value) => Ok(value),
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// A token source over the lines of `reader`.
pub fn buffer_from_reader<R: BufRead>(
    reader: R,
) -> Buffer<impl Iterator<Item = Result<Vec<Token>>>> {
    Buffer::new(
        reader
            .lines()
            .map(|line| line.map_err(Error::from).and_then(|line| tokenize_line(&line))),
    )
}

fn report<E: Write>(err: &mut E, error: &Error) -> Result<()> {
    let message = error.to_string();
    if message.is_empty() {
        writeln!(err, "Error")?;
    } else {
        writeln!(err, "Error: {}", message)?;
    }
    err.flush()?;
    Ok(())
}

/// Read and evaluate forms from `source` until end of input. Errors in a form
/// are written to `err` and the loop moves on to the next form; only a
/// failure to read the input or write output ends it early.
pub fn read_eval_print<S, W, E>(
    source: &mut S,
    out: &mut W,
    err: &mut E,
    env: &Env,
    options: &ReplOptions,
) -> Result<()>
where
    S: TokenSource,
    W: Write,
    E: Write,
{
    loop {
        if let Some(prompt) = &options.prompt {
            write!(out, "{}", prompt)?;
            out.flush()?;
        }
        let expr = match read(source) {
            Ok(Value::Eof) => return Ok(()),
            Ok(expr) => expr,
            Err(e @ Error::Io(_)) => return Err(e),
            Err(e) => {
                report(err, &e)?;
                continue;
            }
        };
        if options.echo {
            writeln!(out, "{}", expr)?;
        }
        match eval(&expr, env) {
            Ok(Value::Unspecified) => {},
            Ok(value) => {
                if options.prompt.is_some() {
                    writeln!(out, "{}", value)?;
                }
            }
            Err(e) => report(err, &e)?,
        }
    }
}

fn open_source(name: &str) -> Result<File> {
    match File::open(name) {
        Ok(file) => Ok(file),
        Err(e) if name.ends_with(".scm") => Err(e.into()),
        Err(_) => Ok(File::open(format!("{}.scm", name))?),
    }
}

/// Evaluate the file `name`, or `name.scm`, in `env`.
pub fn load(name: &str, env: &Env) -> Result<()> {
    let file = open_source(name)?;
    debug!("loading {}", name);
    let mut source = buffer_from_reader(BufReader::new(file));
    let options = ReplOptions { prompt: Some(String::new()), echo: false };
    read_eval_print(&mut source, &mut io::stdout(), &mut io::stderr(), env, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret::create_global_env;
    use crate::parse::read_line;
    use std::io::Cursor;

    fn session(input: &str, options: &ReplOptions) -> (String, String) {
        let env = create_global_env();
        let mut source = buffer_from_reader(Cursor::new(input.to_string()));
        let mut out = Vec::new();
        let mut err = Vec::new();
        read_eval_print(&mut source, &mut out, &mut err, &env, options).unwrap();
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn test_prints_values() {
        let options = ReplOptions { prompt: Some(String::new()), echo: false };
        let (out, err) = session("(define x 2)\n(* x 21)\n'(a . b)\n", &options);
        assert_eq!(out, "42\n(a . b)\n");
        assert_eq!(err, "");
    }

    #[test]
    fn test_errors_do_not_end_session() {
        let options = ReplOptions { prompt: Some(String::new()), echo: false };
        let input = "(car 1)\n)\n(+ 1 2x)\n(error)\n(error 'boom)\nundefined\n(+ 1 1)\n";
        let (out, err) = session(input, &options);
        assert_eq!(out, "2\n");
        assert_eq!(
            err,
            "Error: argument 0 of car has wrong type (integer)\n\
             Error: unexpected token: )\n\
             Error: invalid numeral: 2x\n\
             Error\n\
             Error: boom\n\
             Error: unknown identifier: undefined\n"
        );
    }

    #[test]
    fn test_session_survives_deep_recursion() {
        let input = "(define (sum n) (if (= n 0) 0 (+ n (sum (- n 1)))))\n\
                     (sum 50000)\n\
                     (sum 10)\n\
                     (+ 1 1)\n";
        let (out, err) = run_with_large_stack(move || {
            session(input, &ReplOptions { prompt: Some(String::new()), echo: false })
        })
        .unwrap();
        assert_eq!(out, "55\n2\n");
        assert_eq!(err, "Error: maximum recursion depth exceeded\n");
    }

    #[test]
    fn test_large_stack_passes_result_back() {
        assert_eq!(run_with_large_stack(|| 6 * 7).unwrap(), 42);
    }

    #[test]
    fn test_prompt_and_echo() {
        let options = ReplOptions { prompt: Some("scm> ".to_string()), echo: true };
        let (out, _) = session("(+ 1\n 2)\n", &options);
        assert_eq!(out, "scm> (+ 1 2)\n3\nscm> ");

        let options = ReplOptions { prompt: None, echo: false };
        let (out, _) = session("(+ 1 2)\n", &options);
        assert_eq!(out, "");
    }

    #[test]
    fn test_unterminated_form_at_end_of_input() {
        let options = ReplOptions::default();
        let (_, err) = session("(+ 1", &options);
        assert_eq!(err, "Error: unexpected end of file\n");
    }

    #[test]
    fn test_load() {
        let dir = std::env::temp_dir().join(format!("minischeme-load-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("lib.scm");
        std::fs::write(&path, "(define (triple x) (* 3 x))\n").unwrap();

        let env = create_global_env();
        let stem = dir.join("lib");
        load(stem.to_str().unwrap(), &env).unwrap();
        let value = eval(&read_line("(triple 5)").unwrap(), &env).unwrap();
        assert_eq!(value, Value::Int(15));

        // Through the evaluator, from a nested frame: definitions land in the global frame.
        std::fs::write(&path, "(define (quadruple x) (* 4 x))\n").unwrap();
        let nested = env.fork();
        let program = read_line(&format!("(load '{})", stem.to_str().unwrap())).unwrap();
        assert_eq!(eval(&program, &nested), Ok(Value::Unspecified));
        let value = eval(&read_line("(quadruple 5)").unwrap(), &env).unwrap();
        assert_eq!(value, Value::Int(20));

        let missing = dir.join("missing.scm");
        assert!(matches!(load(missing.to_str().unwrap(), &env), Err(Error::Io(_))));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
