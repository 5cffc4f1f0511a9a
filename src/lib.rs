//! tinylisp - a minimal tree-walking interpreter for a small Lisp dialect
//!
//! This crate turns source text into a nested expression tree and evaluates it against a
//! chain of lexical scopes. It is meant to be embedded by a host that loads one program,
//! runs it to completion and prints the final result.
//!
//! ```
//! let mut out = Vec::new();
//! let value = tinylisp::run_with_output(
//!     "(begin (define (square x) (* x x)) (display (square 4)) (let ((a 1) (b 2)) (+ a b)))",
//!     &mut out,
//! )?;
//! assert_eq!(out, b"16.0\n");
//! assert_eq!(value.to_string(), "3.0");
//! # Ok::<(), tinylisp::Error>(())
//! ```
//!
//! ## Pipeline
//!
//! - `lexer`: pads structural punctuation and splits the text into tokens
//! - `parser`: pops tokens off a reversed stack and builds an [`ast::Expr`] tree
//! - `env`: shared, parent-linked scopes used for lexical lookup
//! - `evaluator`: the recursive evaluator with its special forms
//! - `builtinops`: the primitive operators installed into the root scope
//!
//! ## Semantics worth knowing
//!
//! - Numbers are `f64`; there are no strings and no booleans.
//! - Falsy values are `Unit`, `0` and the empty list. Comparisons return `1.0` or `0.0`.
//! - Closures capture their defining scope by reference, so later `define`s in that
//!   scope are visible when the closure runs.
//! - Arity is checked strictly for both builtins and closures.
//! - There is no tail-call elimination; recursion depth is bounded by
//!   [`DEFAULT_MAX_EVAL_DEPTH`] (configurable through [`evaluator::EvalConfig`]). Raise
//!   the limit only together with the stack size of the thread that evaluates.

use std::fmt;
use std::io::{self, Write};

use crate::ast::Value;
use crate::builtinops::Arity;
use crate::evaluator::{EvalConfig, Evaluator, create_global_env};
use crate::parser::{ParseConfig, parse_program_with_config};

/// Default nesting limit for the parser, well below what the host stack can take
pub const DEFAULT_MAX_PARSE_DEPTH: usize = 1024;

/// Default limit on nested `eval` calls.
/// Sized to fit the smallest stack a host is likely to call from (2 MiB for spawned
/// threads, unoptimized builds included). Each user-level call costs one to three levels,
/// so deeper recursion needs a bigger stack and a matching [`evaluator::EvalConfig`].
pub const DEFAULT_MAX_EVAL_DEPTH: usize = 256;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// The parser was invoked on an empty token stack (empty or blank source)
    EmptyInput,
    /// Tokens ran out before a list was closed or after a quote
    UnexpectedEndOfInput,
    /// A list was closed with the other kind of bracket, e.g. `[a b)`
    MismatchedDelimiter,
    /// A closing bracket appeared where an expression was expected
    UnexpectedCloser,
    /// Extra tokens after the single top-level expression
    TrailingContent,
    /// Nesting exceeded the configured parse depth
    TooDeeplyNested,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// The problematic token, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, found: Option<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            found,
        }
    }

    /// Create a ParseError with a kind and message but no offending token
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None)
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    EvalError(String),
    TypeError(String),
    UndefinedVariable(String),
    ArityError {
        /// Special form or function that rejected the call
        form: String,
        expected: Arity,
        got: usize,
    },
}

impl Error {
    pub fn arity_error(form: impl Into<String>, expected: Arity, got: usize) -> Self {
        Error::ArityError {
            form: form.into(),
            expected,
            got,
        }
    }

    /// The parse error kind, if this is a parse error
    pub fn parse_kind(&self) -> Option<ParseErrorKind> {
        match self {
            Error::ParseError(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::ParseError(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                Ok(())
            }
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::UndefinedVariable(name) => write!(f, "Undefined variable: {name}"),
            Error::ArityError {
                form,
                expected,
                got,
            } => write!(
                f,
                "ArityError: {form} expected {expected} arguments, got {got}"
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Limits for a complete parse-and-evaluate run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunConfig {
    pub parse: ParseConfig,
    pub eval: EvalConfig,
}

/// Parse and evaluate a program in a fresh global environment, writing `display`
/// output to stdout.
pub fn run(source: &str) -> Result<Value, Error> {
    run_with(source, &RunConfig::default(), io::stdout())
}

/// Like [`run`], but `display` output goes to `out`.
pub fn run_with_output<W: Write>(source: &str, out: W) -> Result<Value, Error> {
    run_with(source, &RunConfig::default(), out)
}

/// Parse and evaluate a program with explicit limits.
pub fn run_with<W: Write>(source: &str, config: &RunConfig, out: W) -> Result<Value, Error> {
    let expr = parse_program_with_config(source, &config.parse)?;
    tracing::debug!(nodes = expr.node_count(), "parsed program");

    let env = create_global_env();
    let mut evaluator = Evaluator::with_config(out, config.eval);
    evaluator.eval(&expr, &env)
}

pub mod ast;
pub mod builtinops;
pub mod env;
pub mod evaluator;
pub mod lexer;
pub mod parser;
