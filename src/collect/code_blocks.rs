//! Code Blocks Collector
//!
//! Fenced and indented code regions with their language, line range and
//! size. The language is the first word of the info string, reduced to a
//! safe identifier.

use serde::Serialize;
use serde_json::Value;

use super::{Collector, Interest};
use crate::config::EngineConfig;
use crate::core::token::{Nesting, Token, TokenKind};
use crate::dispatch::DispatchContext;
use crate::error::CollectorError;
use crate::resource::EntryCap;

const MAX_LANGUAGE_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlockEntry {
    /// `fence` or `code_block`
    pub kind: String,
    pub language: Option<String>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    /// Bytes of code
    pub content_len: usize,
    pub section: Option<usize>,
}

#[derive(Debug, Serialize)]
struct CodeBlocksResult {
    count: usize,
    truncated: bool,
    entries: Vec<CodeBlockEntry>,
}

#[derive(Debug)]
pub struct CodeBlocksCollector {
    cap: EntryCap,
    entries: Vec<CodeBlockEntry>,
}

impl CodeBlocksCollector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            cap: EntryCap::new(config.entry_limit()),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[CodeBlockEntry] {
        &self.entries
    }
}

/// First word of an info string, restricted to identifier characters
pub fn language_of(info: &str) -> Option<String> {
    let word = info.split_whitespace().next()?;
    let word = word.trim_start_matches('{').trim_start_matches('.');
    let language: String = word
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '#' | '_' | '.'))
        .take(MAX_LANGUAGE_LEN)
        .collect::<String>()
        .to_ascii_lowercase();
    (!language.is_empty()).then_some(language)
}

impl Collector for CodeBlocksCollector {
    fn name(&self) -> &str {
        "code_blocks"
    }

    fn interest(&self) -> Interest {
        Interest::new([TokenKind::Fence, TokenKind::CodeBlock])
    }

    fn should_process(&self, ctx: &DispatchContext<'_>) -> bool {
        !self.cap.is_truncated() && ctx.token().is_some_and(|t| t.nesting != Nesting::Close)
    }

    fn on_token(&mut self, token: &Token, ctx: &DispatchContext<'_>) -> Result<(), CollectorError> {
        if token.nesting == Nesting::Close || !self.cap.try_admit() {
            return Ok(());
        }
        let position = ctx.position();
        let document = ctx.document();

        let own = document.lines(position);
        let range = own
            .and_then(|span| document.fence_at(span.start))
            .filter(|fence| fence.position == position);
        let (start_line, end_line, info) = match range {
            Some(fence) => (Some(fence.start_line), Some(fence.end_line), fence.info.clone()),
            None => (own.map(|s| s.start), own.map(|s| s.end), token.info.clone()),
        };

        let content_len = match token.nesting {
            Nesting::SelfContained => token.content_str().len(),
            _ => document.text_len(position),
        };

        self.entries.push(CodeBlockEntry {
            kind: token.kind.as_str().to_string(),
            language: info.as_deref().and_then(language_of),
            start_line,
            end_line,
            content_len,
            section: start_line.and_then(|l| ctx.section_index_at(l)),
        });
        Ok(())
    }

    fn finalize(&mut self) -> Result<Value, CollectorError> {
        let entries = std::mem::take(&mut self.entries);
        Ok(serde_json::to_value(CodeBlocksResult {
            count: entries.len(),
            truncated: self.cap.is_truncated(),
            entries,
        })?)
    }
}
