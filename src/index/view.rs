//! Indexed Document
//!
//! Owns the token stream together with its structural and section indices.
//! Built once; everything exposed here is a read-only query, which is what
//! collectors see through the dispatch context.

use serde::{Deserialize, Serialize};

use super::builder::IndexBuilder;
use super::sections::{heading_title, Section, SectionIndex};
use super::span::{LineSpan, DEFAULT_MAX_LINE};
use super::structural::{FenceRange, StructuralIndex};
use crate::core::token::Token;
use crate::resource::{TextBuffer, DEFAULT_MAX_TEXT_BYTES};

/// Most tokens [`Document::text_between`] looks at
pub const TEXT_SCAN_LIMIT: usize = 4096;

/// Options for building a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Upper bound applied to every line number from the tokenizer
    pub max_line: u32,
    /// Final line of the document; derived from the tokens when absent
    pub last_line: Option<u32>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            max_line: DEFAULT_MAX_LINE,
            last_line: None,
        }
    }
}

/// A token stream with all of its indices
#[derive(Debug)]
pub struct Document {
    tokens: Vec<Token>,
    index: StructuralIndex,
    sections: SectionIndex,
    last_line: u32,
}

impl Document {
    /// Index `tokens` with default options
    pub fn build(tokens: Vec<Token>) -> Self {
        Self::build_with(tokens, IndexOptions::default())
    }

    /// Index `tokens`, clamping lines and closing sections as configured
    pub fn build_with(tokens: Vec<Token>, options: IndexOptions) -> Self {
        let index = IndexBuilder::with_max_line(&tokens, options.max_line).build();
        let last_line = options
            .last_line
            .map(|line| line.min(options.max_line))
            .unwrap_or_else(|| index.last_line());
        let sections = SectionIndex::build(&tokens, &index, last_line);
        Self {
            tokens,
            index,
            sections,
            last_line,
        }
    }

    #[inline]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    #[inline]
    pub fn token(&self, pos: u32) -> Option<&Token> {
        self.tokens.get(pos as usize)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[inline]
    pub fn index(&self) -> &StructuralIndex {
        &self.index
    }

    #[inline]
    pub fn sections(&self) -> &SectionIndex {
        &self.sections
    }

    /// Final line of the document
    #[inline]
    pub fn last_line(&self) -> u32 {
        self.last_line
    }

    /// Clamped line span of a token
    #[inline]
    pub fn lines(&self, pos: u32) -> Option<LineSpan> {
        self.index.lines(pos)
    }

    #[inline]
    pub fn parent(&self, pos: u32) -> Option<u32> {
        self.index.parent(pos)
    }

    #[inline]
    pub fn pair(&self, pos: u32) -> Option<u32> {
        self.index.pair(pos)
    }

    /// Direct children of an open token, in stream order
    #[inline]
    pub fn children(&self, pos: u32) -> &[u32] {
        self.index.children(pos)
    }

    #[inline]
    pub fn section_of(&self, line: u32) -> Option<&Section> {
        self.sections.section_of(line)
    }

    #[inline]
    pub fn fence_at(&self, line: u32) -> Option<&FenceRange> {
        self.index.fence_at(line)
    }

    /// Nearest line span for a token: its own, else its closest ancestor's
    ///
    /// Inline tokens rarely carry lines; their block parent does.
    pub fn effective_lines(&self, pos: u32) -> Option<LineSpan> {
        let mut current = Some(pos);
        while let Some(p) = current {
            if let Some(span) = self.index.lines(p) {
                return Some(span);
            }
            current = self.index.parent(p);
        }
        None
    }

    /// Visible text between an open token and its close
    ///
    /// Falls back to the token's own content when it has no partner. Looks
    /// at no more than [`TEXT_SCAN_LIMIT`] tokens and keeps at most
    /// `DEFAULT_MAX_TEXT_BYTES`.
    pub fn text_between(&self, open: u32) -> String {
        let Some(token) = self.token(open) else {
            return String::new();
        };
        let mut text = TextBuffer::new(DEFAULT_MAX_TEXT_BYTES);
        match self.index.pair(open) {
            Some(close) if close > open => {
                let inner = &self.tokens[open as usize + 1..close as usize];
                for t in inner.iter().take(TEXT_SCAN_LIMIT) {
                    if text.is_truncated() {
                        break;
                    }
                    if t.kind.is_text_bearing() {
                        text.push(t.content_str());
                    }
                }
            }
            _ => text.push(token.content_str()),
        }
        text.take()
    }

    /// Bytes of text between an open token and its close
    #[inline]
    pub fn text_len(&self, open: u32) -> usize {
        self.index.text_len(open)
    }

    /// Title of a heading: its gathered text, else its own content
    #[inline]
    pub fn heading_title(&self, pos: u32) -> String {
        heading_title(&self.tokens, &self.index, pos)
    }
}
