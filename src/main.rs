/// reval - evaluator CLI
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::thread;

use reval::backend::config::{EvalConfig, EVAL_STACK_SIZE};
use reval::interpreter::Interpreter;
use reval::repl;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("reval v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    reval [OPTIONS] [INPUT]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help             Print this help message");
    eprintln!("    -v, --version          Print version information");
    eprintln!("    -e, --eval <CODE>      Evaluate CODE and print the result");
    eprintln!("    -c, --config <FILE>    Read settings from FILE (default: ./reval.toml)");
    eprintln!("    --trace                Log every evaluation step (needs RUST_LOG=trace)");
    eprintln!("    --repl                 Start interactive REPL");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    <INPUT>                Source file to evaluate (use '-' for stdin)");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("    reval script.r");
    eprintln!("    reval -e \"1 + 2 * 3\"");
    eprintln!("    RUST_LOG=reval=debug reval --repl");
}

struct Options {
    input: Option<String>,
    code: Option<String>,
    config: Option<PathBuf>,
    trace: bool,
    repl_mode: bool,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();

    let mut options = Options {
        input: None,
        code: None,
        config: None,
        trace: false,
        repl_mode: false,
    };
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                println!("reval {}", VERSION);
                process::exit(0);
            }
            "-e" | "--eval" => {
                i += 1;
                let code = args.get(i).ok_or("Missing code after --eval")?;
                options.code = Some(code.clone());
            }
            "-c" | "--config" => {
                i += 1;
                let path = args.get(i).ok_or("Missing file after --config")?;
                options.config = Some(PathBuf::from(path));
            }
            "--trace" => options.trace = true,
            "--repl" => options.repl_mode = true,
            arg if arg.starts_with('-') && arg != "-" => {
                return Err(format!("Unknown option: {}", arg));
            }
            arg => {
                if options.input.is_some() {
                    return Err("Multiple input files specified".to_string());
                }
                options.input = Some(arg.to_string());
            }
        }
        i += 1;
    }

    Ok(options)
}

fn read_input(input: &str) -> Result<String, String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        Ok(buffer)
    } else {
        let path = Path::new(input);
        if !path.exists() {
            return Err(format!("Input file not found: {}", input));
        }
        fs::read_to_string(path).map_err(|e| format!("Failed to read file '{}': {}", input, e))
    }
}

fn load_config(options: &Options) -> Result<EvalConfig, String> {
    let mut config = match &options.config {
        Some(path) => EvalConfig::load(path),
        None => EvalConfig::discover(),
    }
    .map_err(|e| e.to_string())?;
    if options.trace {
        config.trace_steps = true;
    }
    Ok(config)
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // deep recursion in scripts recurses in the evaluator too
    let worker = thread::Builder::new()
        .name("reval-eval".to_string())
        .stack_size(EVAL_STACK_SIZE)
        .spawn(run)
        .unwrap_or_else(|e| fail(e));
    if worker.join().is_err() {
        process::exit(1);
    }
}

fn run() {
    let options = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    let config = load_config(&options).unwrap_or_else(|e| fail(e));
    let mut interp = Interpreter::with_config(config).unwrap_or_else(|e| fail(e));

    if options.repl_mode || (options.input.is_none() && options.code.is_none()) {
        if let Err(e) = repl::run(&mut interp) {
            fail(e);
        }
        return;
    }

    let source = match (&options.code, &options.input) {
        (Some(code), _) => code.clone(),
        (None, Some(input)) => read_input(input).unwrap_or_else(|e| fail(e)),
        (None, None) => return,
    };

    let result = interp.eval_text(&source);
    match repl::render_result(&result) {
        Some(text) if result.is_err() => fail(text.trim_start_matches("** ")),
        Some(text) if options.code.is_some() => println!("{}", text),
        _ => {}
    }
}
