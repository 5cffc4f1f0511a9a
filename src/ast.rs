//! This module defines the expression tree produced by the parser ([`Expr`]) and the
//! runtime values produced by the evaluator ([`Value`]). Expressions are either atoms or
//! lists; an atom is read as a number literal when it matches the decimal-float grammar
//! and as a symbol otherwise. Values cover numbers, symbols, pairs, lists, closures,
//! builtins and unit. Helper functions such as [`atom`] and [`list`] keep tree
//! construction readable in tests.

use std::fmt;
use std::rc::Rc;

use nom::combinator::all_consuming;
use nom::number::complete::double;
use nom::{IResult, Parser};

use crate::builtinops::BuiltinOp;
use crate::env::Environment;

/// Type alias for number values in interpreter
pub type NumberType = f64;

/// Recognize a whole token as a decimal float (`1`, `-2.5`, `.5`, `1e3`, `inf`, `nan`)
fn number_literal(input: &str) -> IResult<&str, NumberType> {
    all_consuming(double::<&str, nom::error::Error<&str>>).parse(input)
}

/// Parse a token as a number literal, or `None` if it is a symbol
pub(crate) fn parse_number(token: &str) -> Option<NumberType> {
    number_literal(token).ok().map(|(_, n)| n)
}

/// Node of the expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A token: number literal or symbol name
    Atom(String),
    /// Literal list, special form or application, depending on the head
    List(Vec<Expr>),
}

impl Expr {
    /// The atom's text, if this is an atom
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Expr::Atom(s) => Some(s),
            Expr::List(_) => None,
        }
    }

    /// The atom's numeric value, if this atom is a number literal
    pub fn as_number(&self) -> Option<NumberType> {
        self.as_atom().and_then(parse_number)
    }

    /// Total number of nodes in the tree, including this one
    pub fn node_count(&self) -> usize {
        match self {
            Expr::Atom(_) => 1,
            Expr::List(items) => 1 + items.iter().map(Expr::node_count).sum::<usize>(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Atom(s) => write!(f, "{s}"),
            Expr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Helper for building atoms in code and tests
pub fn atom<S: AsRef<str>>(text: S) -> Expr {
    Expr::Atom(text.as_ref().to_owned())
}

/// Helper for building list nodes in code and tests
pub fn list<I: IntoIterator<Item = Expr>>(items: I) -> Expr {
    Expr::List(items.into_iter().collect())
}

/// A user-defined function: parameters, one body expression, and the scope it closes over
pub struct Closure {
    pub params: Vec<String>,
    pub body: Expr,
    pub env: Environment,
}

/// Runtime value in interpreter
#[derive(Clone)]
pub enum Value {
    Number(NumberType),
    /// Symbols produced by `quote`
    Symbol(String),
    /// Result of `cons`
    Pair(Box<Value>, Box<Value>),
    /// Quoted lists and list tails from `cdr`
    List(Vec<Value>),
    Closure(Rc<Closure>),
    Builtin(BuiltinOp),
    /// Result of `define`, `display` and a one-armed `if` whose test failed
    Unit,
}

impl Value {
    /// Truthiness used by `if`: `Unit`, zero and the empty list are false, everything
    /// else (NaN included) is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Unit => false,
            Value::Number(n) => *n != 0.0,
            Value::List(items) => !items.is_empty(),
            Value::Symbol(_) | Value::Pair(..) | Value::Closure(_) | Value::Builtin(_) => true,
        }
    }

    /// Convert a quoted expression. A top-level number literal still becomes a number;
    /// everything inside a quoted list is taken verbatim as symbols and lists.
    pub fn from_quoted(expr: &Expr) -> Value {
        match expr {
            Expr::Atom(text) => match parse_number(text) {
                Some(n) => Value::Number(n),
                None => Value::Symbol(text.clone()),
            },
            Expr::List(_) => Value::verbatim(expr),
        }
    }

    fn verbatim(expr: &Expr) -> Value {
        match expr {
            Expr::Atom(text) => Value::Symbol(text.clone()),
            Expr::List(items) => Value::List(items.iter().map(Value::verbatim).collect()),
        }
    }

    /// Short type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Symbol(_) => "symbol",
            Value::Pair(..) => "pair",
            Value::List(_) => "list",
            Value::Closure(_) => "closure",
            Value::Builtin(_) => "builtin",
            Value::Unit => "unit",
        }
    }
}

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(NumberType::from(n))
    }
}

/// Comparison results: there is no boolean type, so true is `1` and false is `0`
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Helper for building symbol values in tests
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper for building values in tests
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n:?})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Pair(car, cdr) => write!(f, "Pair({car:?}, {cdr:?})"),
            Value::List(items) => {
                write!(f, "List(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            // The captured scope is left out: it may contain this very closure
            Value::Closure(c) => write!(f, "Closure(params={:?}, body={})", c.params, c.body),
            Value::Builtin(op) => write!(f, "Builtin({})", op.name),
            Value::Unit => write!(f, "Unit"),
        }
    }
}

/// Shortest round-trip spelling: whole numbers keep a trailing `.0`, exponents carry a
/// sign and at least two digits (`1e+20`, `1e-05`), NaN prints as `nan`.
fn format_number(n: NumberType) -> String {
    if n.is_nan() {
        return "nan".to_owned();
    }
    // Debug switches to exponent form below 1e-4 and from 1e16 up
    let text = format!("{n:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Pair(car, cdr) => write!(f, "({car} . {cdr})"),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Value::Closure(c) => write!(f, "#<closure ({})>", c.params.join(" ")),
            Value::Builtin(op) => write!(f, "#<builtin {}>", op.name),
            Value::Unit => write!(f, "None"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Pair(a1, d1), Value::Pair(a2, d2)) => a1 == a2 && d1 == d2,
            (Value::List(a), Value::List(b)) => a == b,
            // Closures are equal only to themselves
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            (Value::Unit, Value::Unit) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_literals() {
        let test_cases: Vec<(&str, Option<f64>)> = vec![
            ("42", Some(42.0)),
            ("-5", Some(-5.0)),
            ("+7", Some(7.0)),
            ("2.5", Some(2.5)),
            (".5", Some(0.5)),
            ("1.", Some(1.0)),
            ("1e3", Some(1000.0)),
            ("-1.5E-2", Some(-0.015)),
            ("inf", Some(f64::INFINITY)),
            // Symbols
            ("abc", None),
            ("+", None),
            ("-", None),
            ("1e", None),
            ("1x", None),
            ("x1", None),
            ("1.2.3", None),
            ("", None),
        ];

        for (i, (token, expected)) in test_cases.iter().enumerate() {
            assert_eq!(
                parse_number(token),
                *expected,
                "Number test #{} ({token:?})",
                i + 1
            );
        }

        assert!(parse_number("nan").is_some_and(f64::is_nan));
    }

    #[test]
    fn test_truthiness() {
        let truthy = vec![
            val(1),
            val(-0.5),
            val(f64::NAN),
            sym("x"),
            val(vec![val(0)]),
            Value::Pair(Box::new(val(0)), Box::new(Value::Unit)),
        ];
        let falsy = vec![Value::Unit, val(0), val(-0.0), Value::List(vec![])];

        for v in truthy {
            assert!(v.is_truthy(), "{v:?} should be truthy");
        }
        for v in falsy {
            assert!(!v.is_truthy(), "{v:?} should be falsy");
        }
    }

    #[test]
    fn test_from_quoted() {
        assert_eq!(Value::from_quoted(&atom("abc")), sym("abc"));
        assert_eq!(Value::from_quoted(&atom("12")), val(12));
        // Inside a list, atoms are kept verbatim
        assert_eq!(
            Value::from_quoted(&list([atom("a"), atom("1"), list([atom("b")])])),
            Value::List(vec![sym("a"), sym("1"), Value::List(vec![sym("b")])])
        );
        assert_eq!(Value::from_quoted(&list([])), Value::List(vec![]));
    }

    #[test]
    fn test_display() {
        let test_cases = vec![
            (val(6), "6.0"),
            (val(2.5), "2.5"),
            (val(-3), "-3.0"),
            (sym("abc"), "abc"),
            (Value::Pair(Box::new(val(3)), Box::new(val(5))), "(3.0 . 5.0)"),
            (val(vec![val(1), val(2)]), "(1.0 2.0)"),
            (Value::List(vec![]), "()"),
            (Value::Unit, "None"),
            (val(-0.0), "-0.0"),
            (val(0.0001), "0.0001"),
            (val(123_456_789), "123456789.0"),
            (val(1e15), "1000000000000000.0"),
            (val(1e16), "1e+16"),
            (val(1e20), "1e+20"),
            (val(1.5e300), "1.5e+300"),
            (val(1e-5), "1e-05"),
            (val(2.5e-7), "2.5e-07"),
            (val(1e-100), "1e-100"),
            (val(f64::INFINITY), "inf"),
            (val(f64::NEG_INFINITY), "-inf"),
            (val(f64::NAN), "nan"),
            (val(vec![val(1e20), val(f64::NAN)]), "(1e+20 nan)"),
        ];

        for (value, expected) in test_cases {
            assert_eq!(format!("{value}"), expected);
        }

        assert_eq!(
            format!("{}", list([atom("+"), atom("1"), list([atom("f")])])),
            "(+ 1 (f))"
        );
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::Unit, Value::Unit);
        assert_ne!(val(f64::NAN), val(f64::NAN));
        assert_ne!(val(1), sym("1"));
        assert_eq!(
            Value::Pair(Box::new(val(1)), Box::new(sym("a"))),
            Value::Pair(Box::new(val(1)), Box::new(sym("a")))
        );
        assert_ne!(Value::List(vec![]), Value::Unit);
    }

    #[test]
    fn test_node_count() {
        assert_eq!(atom("x").node_count(), 1);
        assert_eq!(list([atom("+"), atom("1"), list([atom("f")])]).node_count(), 5);
    }
}
