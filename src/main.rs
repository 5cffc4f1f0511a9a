use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tinylisp::evaluator::EvalConfig;
use tinylisp::parser::ParseConfig;
use tinylisp::{DEFAULT_MAX_EVAL_DEPTH, DEFAULT_MAX_PARSE_DEPTH, RunConfig, run_with};

/// Run a tinylisp program and print its final value.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Program to run
    #[arg(default_value = "code.rkt")]
    file: PathBuf,

    /// Maximum number of nested evaluation steps [default: scaled to --stack-mb]
    #[arg(long)]
    max_depth: Option<usize>,

    /// Maximum list nesting accepted by the parser
    #[arg(long, default_value_t = DEFAULT_MAX_PARSE_DEPTH)]
    max_parse_depth: usize,

    /// Stack size of the evaluation thread, in MiB
    #[arg(long, default_value_t = 256)]
    stack_mb: usize,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Evaluation depth that fits in one MiB of stack; the library default fits in two
const EVAL_DEPTH_PER_STACK_MIB: usize = DEFAULT_MAX_EVAL_DEPTH / 2;

fn eval_depth_for_stack(stack_mb: usize) -> usize {
    stack_mb.saturating_mul(EVAL_DEPTH_PER_STACK_MIB)
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("tinylisp=debug"),
        _ => EnvFilter::new("tinylisp=trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_program(source: &str, config: &RunConfig) -> Result<(), String> {
    let value = run_with(source, config, io::stdout()).map_err(|e| e.to_string())?;
    println!("{value}");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let source = match fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to read '{}': {e}", args.file.display());
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(file = %args.file.display(), bytes = source.len(), "loaded program");

    let config = RunConfig {
        parse: ParseConfig {
            max_depth: args.max_parse_depth,
        },
        eval: EvalConfig {
            max_depth: args
                .max_depth
                .unwrap_or_else(|| eval_depth_for_stack(args.stack_mb)),
        },
    };
    let Some(stack_size) = args.stack_mb.checked_mul(1024 * 1024) else {
        eprintln!("invalid --stack-mb: {}", args.stack_mb);
        return ExitCode::FAILURE;
    };
    if config.eval.max_depth > eval_depth_for_stack(args.stack_mb) {
        tracing::warn!(
            max_depth = config.eval.max_depth,
            stack_mb = args.stack_mb,
            "--max-depth may overflow the evaluation stack; raise --stack-mb as well"
        );
    }
    tracing::debug!(max_depth = config.eval.max_depth, stack_mb = args.stack_mb, "limits");

    // Deep recursion needs more stack than the main thread offers
    let result = thread::Builder::new()
        .name("tinylisp-eval".to_owned())
        .stack_size(stack_size)
        .spawn(move || run_program(&source, &config))
        .map_err(|e| format!("failed to start evaluation thread: {e}"))
        .and_then(|handle| {
            handle
                .join()
                .map_err(|_| "evaluation thread panicked".to_owned())?
        });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
