//! Core input model
//!
//! The token stream as delivered by an external tokenizer:
//! - Token: kind tag, nesting role, lines, content, attributes
//! - Context flags: bits for ignore-context regions (fences, raw HTML)

pub mod token;

pub use token::{context_flags, Nesting, Token, TokenKind};
