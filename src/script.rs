// src/script.rs

//! Unlock-script extraction
//!
//! Recognizes the narrow call-pattern grammar of Lua unlock scripts and
//! yields the application id plus a depot-id -> decryption-key mapping.
//! Only `addappid` calls matter:
//!
//! - one numeric argument sets the application id (first wins)
//! - three arguments with a numeric first and string third record a key
//! - anything else (free-flag entries, nested expressions) is ignored
//!
//! No I/O and no full Lua AST: the grammar subset is fixed, so a small
//! lexer plus a tagged expression enum is all the recognition needed.

use crate::depot::{DepotId, DepotKeys};
use crate::error::{Error, Result};
use tracing::{info, warn};

/// Callee name that carries app and depot registrations
const REGISTER_CALL: &str = "addappid";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Number(u64),
    Str(String),
    LParen,
    RParen,
    Comma,
    /// Any other punctuation; kept so argument classification can reject it
    Other,
}

/// One argument of a recognized call
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Number(u64),
    Str(String),
    /// Non-literal argument (identifier, nested call, arithmetic, ...)
    Other,
}

/// A call expression with the callee name and classified arguments
#[derive(Debug, Clone, PartialEq, Eq)]
struct Call {
    name: String,
    args: Vec<Expr>,
}

fn lex(src: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '-' => {
                chars.next();
                if chars.peek() == Some(&'-') {
                    // line comment, skip to end of line
                    for c in chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                } else {
                    tokens.push(Token::Other);
                }
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                while let Some(c) = chars.next() {
                    if c == '\\' {
                        if let Some(escaped) = chars.next() {
                            s.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                        }
                    } else if c == quote {
                        break;
                    } else {
                        s.push(c);
                    }
                }
                tokens.push(Token::Str(s));
            }
            '0'..='9' => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match digits.parse::<u64>() {
                    Ok(n) => tokens.push(Token::Number(n)),
                    Err(_) => tokens.push(Token::Other),
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&i) = chars.peek() {
                    if i.is_ascii_alphanumeric() || i == '_' {
                        ident.push(i);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            _ => {
                chars.next();
                tokens.push(Token::Other);
            }
        }
    }
    tokens
}

/// Classify the tokens of one argument: a lone literal stays a literal,
/// everything else collapses to `Expr::Other`.
fn classify_arg(tokens: &[Token]) -> Expr {
    match tokens {
        [Token::Number(n)] => Expr::Number(*n),
        [Token::Str(s)] => Expr::Str(s.clone()),
        _ => Expr::Other,
    }
}

/// Scan the token stream for `name(args...)` call expressions
fn scan_calls(tokens: &[Token]) -> Vec<Call> {
    let mut calls = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let (Token::Ident(name), Some(Token::LParen)) = (&tokens[i], tokens.get(i + 1)) else {
            i += 1;
            continue;
        };

        let mut args: Vec<Expr> = Vec::new();
        let mut current: Vec<Token> = Vec::new();
        let mut depth = 1usize;
        let mut j = i + 2;
        let mut empty_call = true;

        while j < tokens.len() && depth > 0 {
            match &tokens[j] {
                Token::LParen => {
                    depth += 1;
                    current.push(Token::LParen);
                }
                Token::RParen => {
                    depth -= 1;
                    if depth > 0 {
                        current.push(Token::RParen);
                    }
                }
                Token::Comma if depth == 1 => {
                    args.push(classify_arg(&current));
                    current.clear();
                }
                other => {
                    empty_call = false;
                    current.push(other.clone());
                }
            }
            j += 1;
        }

        if !empty_call || !args.is_empty() {
            args.push(classify_arg(&current));
        }
        calls.push(Call {
            name: name.clone(),
            args,
        });
        // resume after the callee so nested calls inside args are also seen
        i += 2;
    }
    calls
}

/// Extract the application id and depot keys from script source text
///
/// Fails with [`Error::MalformedScript`] if no application id is ever
/// established; without it there is nothing to reconcile.
pub fn extract(src: &str) -> Result<(u32, DepotKeys)> {
    let mut app_id: Option<u32> = None;
    let mut depots = DepotKeys::new();

    for call in scan_calls(&lex(src)) {
        if call.name != REGISTER_CALL {
            continue;
        }
        match call.args.as_slice() {
            [Expr::Number(n)] => {
                let Ok(id) = u32::try_from(*n) else {
                    continue;
                };
                if app_id.is_some() {
                    warn!("duplicate app id found in script, skipping {id}");
                    continue;
                }
                app_id = Some(id);
            }
            [Expr::Number(n), _, Expr::Str(key)] => {
                let Ok(id) = u32::try_from(*n) else {
                    continue;
                };
                info!("parsed depot {id}:{key}");
                depots.insert(DepotId(id), key.clone());
            }
            _ => {}
        }
    }

    match app_id {
        Some(id) => Ok((id, depots)),
        None => Err(Error::MalformedScript(
            "script does not specify an app id".to_string(),
        )),
    }
}
