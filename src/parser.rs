//! Tokens to expression tree.
//!
//! The parser works on a token *stack*: the token list is reversed once so that popping
//! from the end yields tokens in source order. `(` and `[` open a list that must be closed
//! by the matching `)` or `]`; `'X` expands to `(quote X)`; any other token is an atom.

use crate::ast::Expr;
use crate::lexer::tokenize;
use crate::{DEFAULT_MAX_PARSE_DEPTH, Error, ParseError, ParseErrorKind};

/// Parser limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Maximum list/quote nesting accepted before failing with `TooDeeplyNested`
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            max_depth: DEFAULT_MAX_PARSE_DEPTH,
        }
    }
}

fn closer_for(opener: &str) -> Option<&'static str> {
    match opener {
        "(" => Some(")"),
        "[" => Some("]"),
        _ => None,
    }
}

fn is_closer(token: &str) -> bool {
    token == ")" || token == "]"
}

/// Parse one expression from the end of `tokens`, consuming exactly its tokens.
pub fn parse(tokens: &mut Vec<String>) -> Result<Expr, Error> {
    parse_with_config(tokens, &ParseConfig::default())
}

/// Like [`parse`], with explicit limits
pub fn parse_with_config(tokens: &mut Vec<String>, config: &ParseConfig) -> Result<Expr, Error> {
    if tokens.is_empty() {
        return Err(ParseError::from_message(ParseErrorKind::EmptyInput, "No input to parse").into());
    }
    parse_expr(tokens, config, 0)
}

fn parse_expr(tokens: &mut Vec<String>, config: &ParseConfig, depth: usize) -> Result<Expr, Error> {
    if depth >= config.max_depth {
        return Err(ParseError::from_message(
            ParseErrorKind::TooDeeplyNested,
            format!("Expression too deeply nested (max depth: {})", config.max_depth),
        )
        .into());
    }

    let Some(token) = tokens.pop() else {
        return Err(unexpected_end());
    };

    if let Some(closer) = closer_for(&token) {
        return parse_list(tokens, config, depth, closer);
    }

    if token == "'" {
        let quoted = parse_expr(tokens, config, depth + 1)?;
        return Ok(Expr::List(vec![Expr::Atom("quote".into()), quoted]));
    }

    if is_closer(&token) {
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedCloser,
            format!("Unexpected '{token}' where an expression was expected"),
            Some(token),
        )
        .into());
    }

    Ok(Expr::Atom(token))
}

/// Parse list elements until `closer`; the opener has already been popped
fn parse_list(
    tokens: &mut Vec<String>,
    config: &ParseConfig,
    depth: usize,
    closer: &'static str,
) -> Result<Expr, Error> {
    let mut items = Vec::new();
    loop {
        match tokens.last().map(String::as_str) {
            None => return Err(unexpected_end()),
            Some(next) if next == closer => {
                tokens.pop();
                return Ok(Expr::List(items));
            }
            Some(next) if is_closer(next) => {
                return Err(ParseError::new(
                    ParseErrorKind::MismatchedDelimiter,
                    format!("Expected '{closer}' to close the list, found '{next}'"),
                    Some(next.to_owned()),
                )
                .into());
            }
            Some(_) => items.push(parse_expr(tokens, config, depth + 1)?),
        }
    }
}

fn unexpected_end() -> Error {
    ParseError::from_message(ParseErrorKind::UnexpectedEndOfInput, "Unexpected end of input").into()
}

/// Parse a complete program: exactly one top-level expression.
pub fn parse_program(source: &str) -> Result<Expr, Error> {
    parse_program_with_config(source, &ParseConfig::default())
}

/// Like [`parse_program`], with explicit limits
pub fn parse_program_with_config(source: &str, config: &ParseConfig) -> Result<Expr, Error> {
    let mut tokens = tokenize(source);
    tracing::debug!(tokens = tokens.len(), "tokenized source");
    tokens.reverse();

    let expr = parse_with_config(&mut tokens, config)?;

    if let Some(extra) = tokens.last() {
        return Err(ParseError::new(
            ParseErrorKind::TrailingContent,
            format!(
                "Unexpected remaining input after the top-level expression ({} tokens)",
                tokens.len()
            ),
            Some(extra.clone()),
        )
        .into());
    }
    Ok(expr)
}
