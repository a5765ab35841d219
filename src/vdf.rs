// src/vdf.rs

//! Nested key/value text format
//!
//! Loader and pretty writer for the structured text format used by the
//! application-state descriptor and the persisted client configuration:
//! `"key" "value"` pairs and `"key" { ... }` blocks, tab-indented.
//!
//! Entry order is preserved (a pair list, not a sorted map) so a merged
//! configuration file keeps its original layout.

use std::fmt::Write as _;
use thiserror::Error;

/// Format-level errors
#[derive(Error, Debug)]
pub enum VdfError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),

    #[error("trailing data after top-level block")]
    TrailingData,
}

/// A value: either a string or a nested block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Block(Block),
}

/// An ordered list of key/value entries
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    entries: Vec<(String, Value)>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a string entry
    pub fn push_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), Value::Str(value.into())));
    }

    /// Append a block entry
    pub fn push_block(&mut self, key: impl Into<String>, block: Block) {
        self.entries.push((key.into(), Value::Block(block)));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Nested block lookup by key, mutable
    pub fn get_block_mut(&mut self, key: &str) -> Option<&mut Block> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| match v {
                Value::Block(block) => Some(block),
                Value::Str(_) => None,
            })
    }

    /// Replace the first entry with this key, or append a new one
    pub fn set_block(&mut self, key: &str, block: Block) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, value)) => *value = Value::Block(block),
            None => self.entries.push((key.to_string(), Value::Block(block))),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Str(String),
    Open,
    Close,
}

fn tokenize(text: &str) -> Result<Vec<Token>, VdfError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' => {
                chars.next();
                tokens.push(Token::Open);
            }
            '}' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        None => return Err(VdfError::UnexpectedEof),
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            None => return Err(VdfError::UnexpectedEof),
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(other) => s.push(other),
                        },
                        Some(other) => s.push(other),
                    }
                }
                tokens.push(Token::Str(s));
            }
            _ => {
                // bare token: run of non-whitespace, non-brace characters
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '{' || c == '}' || c == '"' {
                        break;
                    }
                    s.push(c);
                    chars.next();
                }
                tokens.push(Token::Str(s));
            }
        }
    }
    Ok(tokens)
}

/// Parse a document into its top-level block
pub fn parse(text: &str) -> Result<Block, VdfError> {
    let tokens = tokenize(text)?;
    let mut position = 0;
    let block = parse_entries(&tokens, &mut position, false)?;
    if position != tokens.len() {
        return Err(VdfError::TrailingData);
    }
    Ok(block)
}

fn parse_entries(tokens: &[Token], position: &mut usize, nested: bool) -> Result<Block, VdfError> {
    let mut block = Block::new();

    loop {
        match tokens.get(*position) {
            None => {
                if nested {
                    return Err(VdfError::UnexpectedEof);
                }
                return Ok(block);
            }
            Some(Token::Close) => {
                if !nested {
                    return Err(VdfError::UnexpectedToken("}".to_string()));
                }
                *position += 1;
                return Ok(block);
            }
            Some(Token::Open) => {
                return Err(VdfError::UnexpectedToken("{".to_string()));
            }
            Some(Token::Str(key)) => {
                *position += 1;
                match tokens.get(*position) {
                    None => return Err(VdfError::UnexpectedEof),
                    Some(Token::Str(value)) => {
                        *position += 1;
                        block.push_str(key.clone(), value.clone());
                    }
                    Some(Token::Open) => {
                        *position += 1;
                        let inner = parse_entries(tokens, position, true)?;
                        block.push_block(key.clone(), inner);
                    }
                    Some(Token::Close) => {
                        return Err(VdfError::UnexpectedToken("}".to_string()));
                    }
                }
            }
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn dump_block(out: &mut String, block: &Block, indent: usize) {
    let pad = "\t".repeat(indent);
    for (key, value) in block.entries() {
        match value {
            Value::Str(s) => {
                let _ = writeln!(out, "{pad}\"{}\"\t\t\"{}\"", escape(key), escape(s));
            }
            Value::Block(inner) => {
                let _ = writeln!(out, "{pad}\"{}\"", escape(key));
                let _ = writeln!(out, "{pad}{{");
                dump_block(out, inner, indent + 1);
                let _ = writeln!(out, "{pad}}}");
            }
        }
    }
}

/// Pretty-print a document from its top-level block
pub fn dump(block: &Block) -> String {
    let mut out = String::new();
    dump_block(&mut out, block, 0);
    out
}
