use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process;

use minischeme::interpret::create_global_env;
use minischeme::repl::{buffer_from_reader, read_eval_print, run_with_large_stack, ReplOptions};

struct Options {
    repl: ReplOptions,
    filename: Option<PathBuf>,
}

fn parse() -> Result<Options, String> {
    let mut args = pico_args::Arguments::from_env();

    if args.contains(["-h", "--help"]) {
        println!("Usage: minischeme [options] [input file]");
        println!("Options:");
        println!("  -h, --help: Print this help message");
        println!("  --no-prompt: Do not print a prompt or the values of expressions");
        println!("  --echo: Print each expression as it is read (default when reading a file)");
        process::exit(0);
    }

    let no_prompt = args.contains("--no-prompt");
    let echo = args.contains("--echo");
    let filename = args.opt_free_from_str::<PathBuf>().map_err(|e| e.to_string())?;

    let remaining = args.finish();
    if !remaining.is_empty() {
        return Err(format!("unexpected arguments: {:?}", remaining));
    }

    Ok(Options {
        repl: ReplOptions {
            prompt: if no_prompt { None } else { Some("scm> ".to_string()) },
            echo: echo || filename.is_some(),
        },
        filename,
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let options = match parse() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    let outcome = run_with_large_stack(move || run(&options));
    if let Err(e) = outcome.and_then(|result| result) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(options: &Options) -> minischeme::error::Result<()> {
    let env = create_global_env();
    let mut out = io::stdout();
    let mut err = io::stderr();
    match &options.filename {
        Some(path) => match File::open(path) {
            Ok(file) => {
                let mut source = buffer_from_reader(BufReader::new(file));
                read_eval_print(&mut source, &mut out, &mut err, &env, &options.repl)
            }
            Err(e) => {
                eprintln!("could not open {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => {
            let stdin = io::stdin();
            let mut source = buffer_from_reader(stdin.lock());
            read_eval_print(&mut source, &mut out, &mut err, &env, &options.repl)
        }
    }
}
