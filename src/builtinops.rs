//! Built-in operations registry.
//!
//! The root environment is populated from a single static table of [`BuiltinOp`]s.
//! Every builtin has the same erased signature, `fn(&[Value]) -> Result<Value, Error>`,
//! and declares the number of arguments it accepts; the count is validated before the
//! function runs, so the implementations can destructure their slice directly.
//!
//! ## Functions vs Special Forms
//!
//! - **Functions** (this module): receive already evaluated arguments, e.g. `+`, `car`
//! - **Special forms** (the evaluator): receive unevaluated syntax, e.g. `if`, `let`
//!
//! ## Error Handling
//!
//! - **Arity**: a call with the wrong number of arguments is an `ArityError`
//! - **Types**: arithmetic and ordering reject non-numbers with a `TypeError`
//! - **Division**: dividing by zero is an `EvalError`, not an infinity
//!
//! ## Adding New Operations
//!
//! 1. Implement `fn(args: &[Value]) -> Result<Value, Error>`
//! 2. Add an entry to `BUILTIN_OPS` with its name and arity
//! 3. Add cases to the table-driven tests below

use std::fmt;

use crate::Error;
use crate::ast::{NumberType, Value};

/// Canonical builtin function signature used by the evaluator
pub type BuiltinFn = fn(&[Value]) -> Result<Value, Error>;

/// Number of arguments accepted by a function or special form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive range
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(self, got: usize) -> bool {
        match self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Range(min, max) => (min..=max).contains(&got),
        }
    }

    /// Check an argument count, naming `form` in the error
    pub fn validate(self, form: &str, got: usize) -> Result<(), Error> {
        if self.accepts(got) {
            Ok(())
        } else {
            Err(Error::arity_error(form, self, got))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "{min} to {max}"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone, Copy)]
pub struct BuiltinOp {
    /// Name the operation is bound to in the root environment
    pub name: &'static str,
    pub arity: Arity,
    pub func: BuiltinFn,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        // Operations are identified by name, not by function pointer
        self.name == other.name
    }
}

impl BuiltinOp {
    /// Validate the argument count and run the operation
    pub fn call(&self, args: &[Value]) -> Result<Value, Error> {
        self.arity.validate(self.name, args.len())?;
        (self.func)(args)
    }
}

//
// Builtin Function Implementations
//

fn expect_number(op: &str, value: &Value) -> Result<NumberType, Error> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(Error::TypeError(format!(
            "{op} requires numbers, got {} {other}",
            other.type_name()
        ))),
    }
}

// Variadic left folds; the registry guarantees at least one argument
macro_rules! numeric_fold {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            let mut iter = args.iter();
            let Some(first) = iter.next() else {
                return Err(Error::arity_error($op_str, Arity::AtLeast(1), 0));
            };
            let mut acc = expect_number($op_str, first)?;
            for arg in iter {
                acc = acc $op expect_number($op_str, arg)?;
            }
            Ok(Value::Number(acc))
        }
    };
}

numeric_fold!(builtin_add, +, "+");
numeric_fold!(builtin_mul, *, "*");

// Strictly binary numeric comparisons
macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            match args {
                [a, b] => {
                    let a = expect_number($op_str, a)?;
                    let b = expect_number($op_str, b)?;
                    Ok(Value::from(a $op b))
                }
                _ => Err(Error::arity_error($op_str, Arity::Exact(2), args.len())),
            }
        }
    };
}

numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_gt, >, ">");

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    match args {
        [a, b] => Ok(Value::Number(expect_number("-", a)? - expect_number("-", b)?)),
        _ => Err(Error::arity_error("-", Arity::Exact(2), args.len())),
    }
}

fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    match args {
        [a, b] => {
            let dividend = expect_number("/", a)?;
            let divisor = expect_number("/", b)?;
            if divisor == 0.0 {
                return Err(Error::EvalError("division by zero".into()));
            }
            Ok(Value::Number(dividend / divisor))
        }
        _ => Err(Error::arity_error("/", Arity::Exact(2), args.len())),
    }
}

/// Structural equality over any two values
fn builtin_eq(args: &[Value]) -> Result<Value, Error> {
    match args {
        [a, b] => Ok(Value::from(a == b)),
        _ => Err(Error::arity_error("=", Arity::Exact(2), args.len())),
    }
}

fn builtin_car(args: &[Value]) -> Result<Value, Error> {
    match args {
        [Value::Pair(car, _)] => Ok((**car).clone()),
        [Value::List(items)] => items
            .first()
            .cloned()
            .ok_or_else(|| Error::TypeError("car of empty list".into())),
        [other] => Err(Error::TypeError(format!(
            "car requires a pair or list, got {} {other}",
            other.type_name()
        ))),
        _ => Err(Error::arity_error("car", Arity::Exact(1), args.len())),
    }
}

fn builtin_cdr(args: &[Value]) -> Result<Value, Error> {
    match args {
        [Value::Pair(_, cdr)] => Ok((**cdr).clone()),
        [Value::List(items)] => match items.split_first() {
            Some((_, rest)) => Ok(Value::List(rest.to_vec())),
            None => Err(Error::TypeError("cdr of empty list".into())),
        },
        [other] => Err(Error::TypeError(format!(
            "cdr requires a pair or list, got {} {other}",
            other.type_name()
        ))),
        _ => Err(Error::arity_error("cdr", Arity::Exact(1), args.len())),
    }
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    match args {
        [car, cdr] => Ok(Value::Pair(Box::new(car.clone()), Box::new(cdr.clone()))),
        _ => Err(Error::arity_error("cons", Arity::Exact(2), args.len())),
    }
}

/// Global registry of all built-in operations.
static BUILTIN_OPS: [BuiltinOp; 10] = [
    // Arithmetic operations
    BuiltinOp {
        name: "+",
        arity: Arity::AtLeast(1),
        func: builtin_add,
    },
    BuiltinOp {
        name: "-",
        arity: Arity::Exact(2),
        func: builtin_sub,
    },
    BuiltinOp {
        name: "*",
        arity: Arity::AtLeast(1),
        func: builtin_mul,
    },
    BuiltinOp {
        name: "/",
        arity: Arity::Exact(2),
        func: builtin_div,
    },
    // Pair operations
    BuiltinOp {
        name: "car",
        arity: Arity::Exact(1),
        func: builtin_car,
    },
    BuiltinOp {
        name: "cdr",
        arity: Arity::Exact(1),
        func: builtin_cdr,
    },
    BuiltinOp {
        name: "cons",
        arity: Arity::Exact(2),
        func: builtin_cons,
    },
    // Comparison operations
    BuiltinOp {
        name: "<",
        arity: Arity::Exact(2),
        func: builtin_lt,
    },
    BuiltinOp {
        name: ">",
        arity: Arity::Exact(2),
        func: builtin_gt,
    },
    BuiltinOp {
        name: "=",
        arity: Arity::Exact(2),
        func: builtin_eq,
    },
];

/// Get all builtin operations (for internal use by evaluator)
pub(crate) fn get_builtin_ops() -> &'static [BuiltinOp] {
    &BUILTIN_OPS
}

/// Find a builtin operation by name
pub fn find_builtin_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_OPS.iter().find(|op| op.name == name)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, clippy::expect_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{sym, val};

    /// Micro-helper for success cases in comprehensive tests
    fn success<T: Into<Value>>(value: T) -> Option<Value> {
        Some(val(value))
    }

    fn pair<A: Into<Value>, D: Into<Value>>(car: A, cdr: D) -> Value {
        Value::Pair(Box::new(car.into()), Box::new(cdr.into()))
    }

    /// Invoke a builtin through the registry, arity check included
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        find_builtin_op(name).expect("builtin not found").call(args)
    }

    #[test]
    fn test_builtin_ops_registry() {
        let names: Vec<&str> = get_builtin_ops().iter().map(|op| op.name).collect();
        assert_eq!(
            names,
            vec!["+", "-", "*", "/", "car", "cdr", "cons", "<", ">", "="]
        );

        let cons = find_builtin_op("cons").unwrap();
        assert_eq!(cons.arity, Arity::Exact(2));
        assert_eq!(find_builtin_op("+").unwrap().arity, Arity::AtLeast(1));
        assert!(find_builtin_op("list").is_none());
        assert!(find_builtin_op("display").is_none()); // special form, not a builtin
    }

    #[test]
    fn test_arity() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(3));
        assert!(Arity::AtLeast(1).accepts(5));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert!(Arity::Range(2, 3).accepts(3));
        assert!(!Arity::Range(2, 3).accepts(4));

        assert_eq!(
            Arity::Exact(2).validate("cons", 3),
            Err(Error::arity_error("cons", Arity::Exact(2), 3))
        );
        assert_eq!(format!("{}", Arity::Range(2, 3)), "2 to 3");
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Vec<Value>, Option<Value>);

        let test_cases: Vec<TestCase> = vec![
            // =================================================================
            // ARITHMETIC
            // =================================================================
            ("+", vec![val(1), val(2), val(3)], success(6)),
            ("+", vec![val(42)], success(42)),
            ("+", vec![val(0.5), val(0.25)], success(0.75)),
            ("+", vec![], None),
            ("+", vec![val(1), sym("a")], None),
            ("-", vec![val(10), val(4)], success(6)),
            ("-", vec![val(4), val(10)], success(-6)),
            // Strictly binary, no unary negation
            ("-", vec![val(10)], None),
            ("-", vec![val(10), val(1), val(1)], None),
            ("*", vec![val(2), val(3), val(4)], success(24)),
            ("*", vec![val(7)], success(7)),
            ("*", vec![], None),
            ("*", vec![Value::Unit, val(2)], None),
            ("/", vec![val(9), val(3)], success(3)),
            ("/", vec![val(1), val(4)], success(0.25)),
            ("/", vec![val(1), val(0)], None),
            ("/", vec![val(1)], None),
            // =================================================================
            // COMPARISON
            // =================================================================
            ("<", vec![val(1), val(2)], success(true)),
            ("<", vec![val(2), val(1)], success(false)),
            (">", vec![val(3), val(2)], success(true)),
            (">", vec![val(2), val(2)], success(false)),
            ("<", vec![val(1), val(2), val(3)], None),
            (">", vec![sym("a"), val(2)], None),
            ("=", vec![val(2), val(2)], success(true)),
            ("=", vec![val(2), val(3)], success(false)),
            ("=", vec![sym("a"), sym("a")], success(true)),
            ("=", vec![sym("a"), val(1)], success(false)),
            ("=", vec![pair(1, 2), pair(1, 2)], success(true)),
            ("=", vec![val(vec![val(1)]), val(vec![val(1)])], success(true)),
            ("=", vec![val(1)], None),
            // =================================================================
            // PAIRS AND LISTS
            // =================================================================
            ("cons", vec![val(3), val(5)], Some(pair(3, 5))),
            ("cons", vec![val(3)], None),
            ("cons", vec![val(1), val(2), val(3)], None),
            ("car", vec![pair(3, 5)], success(3)),
            ("cdr", vec![pair(3, 5)], success(5)),
            ("car", vec![val(vec![sym("a"), sym("b")])], Some(sym("a"))),
            ("cdr", vec![val(vec![sym("a"), sym("b")])], Some(val(vec![sym("b")]))),
            ("cdr", vec![val(vec![sym("a")])], Some(Value::List(vec![]))),
            ("car", vec![Value::List(vec![])], None),
            ("cdr", vec![Value::List(vec![])], None),
            ("car", vec![val(1)], None),
            ("cdr", vec![sym("x")], None),
            ("car", vec![], None),
            ("car", vec![pair(1, 2), pair(3, 4)], None),
            // Nested pairs
            ("car", vec![pair(pair(1, 2), 3)], Some(pair(1, 2))),
        ];

        for (i, (name, args, expected)) in test_cases.iter().enumerate() {
            let result = call_builtin(name, args);
            match (result, expected) {
                (Ok(actual), Some(expected)) => assert_eq!(
                    actual,
                    *expected,
                    "Builtin test #{} ({name} {args:?})",
                    i + 1
                ),
                (Err(_), None) => {}
                (Ok(actual), None) => panic!(
                    "Builtin test #{} ({name} {args:?}): expected error, got {actual:?}",
                    i + 1
                ),
                (Err(err), Some(expected)) => panic!(
                    "Builtin test #{} ({name} {args:?}): expected {expected:?}, got error {err}",
                    i + 1
                ),
            }
        }
    }

    #[test]
    fn test_builtin_error_kinds() {
        assert!(matches!(
            call_builtin("cons", &[val(1)]),
            Err(Error::ArityError { ref form, expected: Arity::Exact(2), got: 1 }) if form == "cons"
        ));
        assert!(matches!(
            call_builtin("+", &[val(1), sym("a")]),
            Err(Error::TypeError(msg)) if msg.contains("+ requires numbers")
        ));
        assert!(matches!(
            call_builtin("/", &[val(1), val(0)]),
            Err(Error::EvalError(msg)) if msg.contains("division by zero")
        ));
    }
}
