//! Recursive evaluator.
//!
//! An atom evaluates to a number when it is a number literal and to its binding otherwise.
//! A list whose head is one of the special-form keywords is handled structurally, with its
//! operands unevaluated; any other non-empty list is a function application. Special-form
//! keywords are recognized by spelling alone, so they cannot be shadowed by `define`.
//!
//! Evaluation depth is counted per nested `eval` and bounded by [`EvalConfig::max_depth`],
//! so runaway recursion is reported as an error instead of exhausting the host stack. The
//! default limit fits a 2 MiB thread stack; a larger limit needs a correspondingly larger
//! stack.

use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::{Closure, Expr, Value};
use crate::builtinops::{Arity, get_builtin_ops};
use crate::env::Environment;
use crate::{DEFAULT_MAX_EVAL_DEPTH, Error};

/// Evaluator limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Maximum number of nested `eval` calls
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: DEFAULT_MAX_EVAL_DEPTH,
        }
    }
}

/// Keywords handled structurally rather than by application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecialForm {
    Quote,
    Variable,
    Begin,
    Display,
    If,
    Define,
    Let,
    Lambda,
}

impl SpecialForm {
    fn from_keyword(keyword: &str) -> Option<Self> {
        let form = match keyword {
            "quote" => SpecialForm::Quote,
            "variable" => SpecialForm::Variable,
            "begin" => SpecialForm::Begin,
            "display" => SpecialForm::Display,
            "if" => SpecialForm::If,
            "define" => SpecialForm::Define,
            "let" => SpecialForm::Let,
            "lambda" => SpecialForm::Lambda,
            _ => return None,
        };
        Some(form)
    }
}

const CONTEXT_MARKER: &str = "\n  Context: ";

/// Tree-walking evaluator owning the sink that `display` writes to
pub struct Evaluator<W: Write> {
    out: W,
    config: EvalConfig,
}

impl<W: Write> Evaluator<W> {
    pub fn new(out: W) -> Self {
        Self::with_config(out, EvalConfig::default())
    }

    pub fn with_config(out: W, config: EvalConfig) -> Self {
        Evaluator { out, config }
    }

    pub fn config(&self) -> EvalConfig {
        self.config
    }

    /// The output sink, e.g. to inspect captured `display` output
    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Evaluate an expression in `env`
    pub fn eval(&mut self, expr: &Expr, env: &Environment) -> Result<Value, Error> {
        self.eval_with_depth_tracking(expr, env, 0)
    }

    /// Evaluate an expression with depth tracking to prevent stack overflow
    fn eval_with_depth_tracking(
        &mut self,
        expr: &Expr,
        env: &Environment,
        depth: usize,
    ) -> Result<Value, Error> {
        if depth >= self.config.max_depth {
            return Err(Error::EvalError(format!(
                "Evaluation depth limit exceeded (max: {})",
                self.config.max_depth
            )));
        }
        match expr {
            Expr::Atom(text) => match expr.as_number() {
                Some(n) => Ok(Value::Number(n)),
                None => env.lookup(text),
            },
            Expr::List(elements) => self
                .eval_list(elements, env, depth)
                .map_err(|err| add_context(err, expr)),
        }
    }

    fn eval_list(
        &mut self,
        elements: &[Expr],
        env: &Environment,
        depth: usize,
    ) -> Result<Value, Error> {
        match elements {
            [] => Err(Error::EvalError("Cannot evaluate empty list".to_owned())),

            [func_expr, arg_exprs @ ..] => {
                if let Expr::Atom(keyword) = func_expr
                    && let Some(form) = SpecialForm::from_keyword(keyword)
                {
                    return self.eval_special_form(form, arg_exprs, env, depth);
                }

                // Function application: head first, then arguments left to right
                let func = self.eval_with_depth_tracking(func_expr, env, depth + 1)?;
                let args = self.eval_args(arg_exprs, env, depth)?;
                self.apply(func_expr, &func, &args, depth)
            }
        }
    }

    /// Special forms get their operands unevaluated
    fn eval_special_form(
        &mut self,
        form: SpecialForm,
        args: &[Expr],
        env: &Environment,
        depth: usize,
    ) -> Result<Value, Error> {
        match form {
            SpecialForm::Quote => eval_quote(args),
            SpecialForm::Variable => eval_variable(args, env),
            SpecialForm::Begin => self.eval_begin(args, env, depth),
            SpecialForm::Display => self.eval_display(args, env, depth),
            SpecialForm::If => self.eval_if(args, env, depth),
            SpecialForm::Define => self.eval_define(args, env, depth),
            SpecialForm::Let => self.eval_let(args, env, depth),
            SpecialForm::Lambda => eval_lambda(args, env),
        }
    }

    fn eval_args(
        &mut self,
        args: &[Expr],
        env: &Environment,
        depth: usize,
    ) -> Result<Vec<Value>, Error> {
        args.iter()
            .map(|arg| self.eval_with_depth_tracking(arg, env, depth + 1))
            .collect()
    }

    fn apply(
        &mut self,
        func_expr: &Expr,
        func: &Value,
        args: &[Value],
        depth: usize,
    ) -> Result<Value, Error> {
        match func {
            Value::Builtin(op) => op.call(args),
            Value::Closure(closure) => {
                if closure.params.len() != args.len() {
                    return Err(Error::arity_error(
                        func_expr.to_string(),
                        Arity::Exact(closure.params.len()),
                        args.len(),
                    ));
                }
                tracing::trace!(function = %func_expr, args = args.len(), depth, "calling closure");

                let call_env = Environment::with_parent(&closure.env);
                for (param, arg) in closure.params.iter().zip(args) {
                    call_env.define(param.as_str(), arg.clone());
                }
                self.eval_with_depth_tracking(&closure.body, &call_env, depth + 1)
            }
            other => Err(Error::TypeError(format!(
                "Cannot apply non-function: {other}"
            ))),
        }
    }

    fn eval_begin(&mut self, args: &[Expr], env: &Environment, depth: usize) -> Result<Value, Error> {
        let Some((last, init)) = args.split_last() else {
            return Err(Error::arity_error("begin", Arity::AtLeast(1), 0));
        };
        for expr in init {
            self.eval_with_depth_tracking(expr, env, depth + 1)?;
        }
        self.eval_with_depth_tracking(last, env, depth + 1)
    }

    /// Write the evaluated operands, space separated, followed by a newline
    fn eval_display(
        &mut self,
        args: &[Expr],
        env: &Environment,
        depth: usize,
    ) -> Result<Value, Error> {
        let values = self.eval_args(args, env, depth)?;
        let line = values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(self.out, "{line}")
            .and_then(|()| self.out.flush())
            .map_err(|e| Error::EvalError(format!("display: failed to write output: {e}")))?;
        Ok(Value::Unit)
    }

    fn eval_if(&mut self, args: &[Expr], env: &Environment, depth: usize) -> Result<Value, Error> {
        let (condition_expr, then_expr, else_expr) = match args {
            [c, t] => (c, t, None),
            [c, t, e] => (c, t, Some(e)),
            _ => return Err(Error::arity_error("if", Arity::Range(2, 3), args.len())),
        };

        let condition = self.eval_with_depth_tracking(condition_expr, env, depth + 1)?;
        if condition.is_truthy() {
            self.eval_with_depth_tracking(then_expr, env, depth + 1)
        } else if let Some(else_expr) = else_expr {
            self.eval_with_depth_tracking(else_expr, env, depth + 1)
        } else {
            Ok(Value::Unit)
        }
    }

    /// `(define name E)` binds a value, `(define (f p...) Body)` binds a closure
    fn eval_define(
        &mut self,
        args: &[Expr],
        env: &Environment,
        depth: usize,
    ) -> Result<Value, Error> {
        match args {
            [Expr::Atom(name), expr] => {
                let value = self.eval_with_depth_tracking(expr, env, depth + 1)?;
                tracing::trace!(name = %name, value = %value, "define");
                env.define(name.as_str(), value);
                Ok(Value::Unit)
            }
            [Expr::List(signature), body] => match signature.as_slice() {
                [Expr::Atom(name), params @ ..] => {
                    let closure = make_closure(params, body, env)?;
                    tracing::trace!(name = %name, "define function");
                    env.define(name.as_str(), closure);
                    Ok(Value::Unit)
                }
                _ => Err(Error::TypeError(
                    "define requires a function name as the first element of the signature"
                        .to_owned(),
                )),
            },
            _ => Err(Error::arity_error("define", Arity::Exact(2), args.len())),
        }
    }

    /// Bindings are all evaluated in the enclosing scope before any of them is visible
    fn eval_let(&mut self, args: &[Expr], env: &Environment, depth: usize) -> Result<Value, Error> {
        let [bindings_expr, body @ ..] = args else {
            return Err(Error::arity_error("let", Arity::AtLeast(2), 0));
        };
        if body.is_empty() {
            return Err(Error::arity_error("let", Arity::AtLeast(2), args.len()));
        }
        let Expr::List(bindings) = bindings_expr else {
            return Err(Error::TypeError(format!(
                "let bindings must be a list, got {bindings_expr}"
            )));
        };

        let mut values = Vec::with_capacity(bindings.len());
        for binding in bindings {
            match binding {
                Expr::List(pair) => match pair.as_slice() {
                    [Expr::Atom(name), value_expr] => {
                        if values.iter().any(|(bound, _)| *bound == name.as_str()) {
                            return Err(Error::EvalError(format!(
                                "Duplicate binding name: {name}"
                            )));
                        }
                        let value = self.eval_with_depth_tracking(value_expr, env, depth + 1)?;
                        values.push((name.as_str(), value));
                    }
                    _ => {
                        return Err(Error::TypeError(format!(
                            "let binding must be (name expression), got {binding}"
                        )));
                    }
                },
                Expr::Atom(_) => {
                    return Err(Error::TypeError(format!(
                        "let binding must be (name expression), got {binding}"
                    )));
                }
            }
        }

        let let_env = Environment::with_parent(env);
        for (name, value) in values {
            let_env.define(name, value);
        }
        self.eval_begin(body, &let_env, depth)
    }
}

/// Helper function to add expression context to errors.
/// Only the innermost list gets a context line; outer frames leave it alone.
fn add_context(error: Error, expr: &Expr) -> Error {
    let context = format!("{CONTEXT_MARKER}while evaluating: {expr}");
    match error {
        Error::EvalError(msg) if !msg.contains(CONTEXT_MARKER) => {
            Error::EvalError(format!("{msg}{context}"))
        }
        Error::TypeError(msg) if !msg.contains(CONTEXT_MARKER) => {
            Error::TypeError(format!("{msg}{context}"))
        }
        // Undefined variables and arity errors already name what failed
        other => other,
    }
}

fn eval_quote(args: &[Expr]) -> Result<Value, Error> {
    match args {
        [expr] => Ok(Value::from_quoted(expr)),
        _ => Err(Error::arity_error("quote", Arity::Exact(1), args.len())),
    }
}

/// Explicit lookup; a numeric name is looked up like any other
fn eval_variable(args: &[Expr], env: &Environment) -> Result<Value, Error> {
    match args {
        [Expr::Atom(name)] => env.lookup(name),
        [other] => Err(Error::TypeError(format!(
            "variable requires a name, got {other}"
        ))),
        _ => Err(Error::arity_error("variable", Arity::Exact(1), args.len())),
    }
}

fn eval_lambda(args: &[Expr], env: &Environment) -> Result<Value, Error> {
    match args {
        [Expr::List(params), body] => make_closure(params, body, env),
        [_, _] => Err(Error::TypeError(
            "lambda parameters must be a list".to_owned(),
        )),
        _ => Err(Error::arity_error("lambda", Arity::Exact(2), args.len())),
    }
}

fn make_closure(params: &[Expr], body: &Expr, env: &Environment) -> Result<Value, Error> {
    let mut names: Vec<String> = Vec::with_capacity(params.len());
    for param in params {
        match param {
            Expr::Atom(name) => {
                if names.contains(name) {
                    return Err(Error::EvalError(format!(
                        "Duplicate parameter name: {name}"
                    )));
                }
                names.push(name.clone());
            }
            Expr::List(_) => {
                return Err(Error::TypeError(format!(
                    "parameters must be names, got {param}"
                )));
            }
        }
    }

    Ok(Value::Closure(Rc::new(Closure {
        params: names,
        body: body.clone(),
        env: env.clone(),
    })))
}

/// Evaluate an expression, writing `display` output to stdout
pub fn eval(expr: &Expr, env: &Environment) -> Result<Value, Error> {
    Evaluator::new(io::stdout()).eval(expr, env)
}

/// Create a global environment with the built-in functions installed
pub fn create_global_env() -> Environment {
    let env = Environment::new();
    for op in get_builtin_ops() {
        env.define(op.name, Value::Builtin(*op));
    }
    env
}
