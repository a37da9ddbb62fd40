//! Token model
//!
//! Tokens arrive from an external tokenizer as one flat, ordered sequence.
//! Nesting is expressed through [`Nesting`] roles rather than a tree: an
//! `Open` token starts a region that the next `Close` of the same kind ends.
//! Nothing here validates the stream; unmatched roles are tolerated by the
//! index builder.

use serde::{Deserialize, Serialize};

use crate::index::span::LineSpan;

/// Flags for ignore-context regions
///
/// A token kind that opens one of these regions sets the matching bit in the
/// dispatch engine's active mask until the region closes.
pub mod context_flags {
    /// Fenced code block
    pub const FENCE: u8 = 0x01;
    /// Indented code block
    pub const CODE_BLOCK: u8 = 0x02;
    /// Raw HTML block
    pub const RAW_HTML: u8 = 0x04;
    /// Any code region
    pub const CODE: u8 = FENCE | CODE_BLOCK;
    /// No region
    pub const NONE: u8 = 0;
}

/// Kind tag of a token
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Heading,
    Paragraph,
    BlockQuote,
    BulletList,
    OrderedList,
    ListItem,
    Table,
    TableRow,
    TableCell,
    Inline,
    Link,
    Image,
    Emphasis,
    Strong,
    Text,
    CodeInline,
    SoftBreak,
    HardBreak,
    Fence,
    CodeBlock,
    HtmlBlock,
    HtmlInline,
    Rule,
    /// Anything the tokenizer emits that has no dedicated variant
    Other(String),
}

impl TokenKind {
    /// Stable name used in reports and logs
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::BlockQuote => "block_quote",
            Self::BulletList => "bullet_list",
            Self::OrderedList => "ordered_list",
            Self::ListItem => "list_item",
            Self::Table => "table",
            Self::TableRow => "table_row",
            Self::TableCell => "table_cell",
            Self::Inline => "inline",
            Self::Link => "link",
            Self::Image => "image",
            Self::Emphasis => "emphasis",
            Self::Strong => "strong",
            Self::Text => "text",
            Self::CodeInline => "code_inline",
            Self::SoftBreak => "soft_break",
            Self::HardBreak => "hard_break",
            Self::Fence => "fence",
            Self::CodeBlock => "code_block",
            Self::HtmlBlock => "html_block",
            Self::HtmlInline => "html_inline",
            Self::Rule => "rule",
            Self::Other(name) => name,
        }
    }

    /// Tokens whose content contributes to visible text
    #[inline]
    pub fn is_text_bearing(&self) -> bool {
        matches!(self, Self::Text | Self::CodeInline)
    }

    /// Code regions recorded in the fence index
    #[inline]
    pub fn is_code_region(&self) -> bool {
        matches!(self, Self::Fence | Self::CodeBlock)
    }

    /// Ignore-context bit this kind opens, if any
    #[inline]
    pub fn context_flag(&self) -> u8 {
        match self {
            Self::Fence => context_flags::FENCE,
            Self::CodeBlock => context_flags::CODE_BLOCK,
            Self::HtmlBlock => context_flags::RAW_HTML,
            _ => context_flags::NONE,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nesting role of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nesting {
    Open,
    Close,
    SelfContained,
}

impl Nesting {
    /// Map the common `1 / -1 / 0` tokenizer convention
    #[inline]
    pub fn from_level(level: i8) -> Self {
        match level {
            l if l > 0 => Self::Open,
            l if l < 0 => Self::Close,
            _ => Self::SelfContained,
        }
    }
}

/// A single token of the input stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub nesting: Nesting,
    /// Source lines, as reported by the tokenizer (not yet clamped)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<LineSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,
    /// Info string of fenced blocks (language and options)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    /// Heading depth (1..=6) for heading tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u8>,
}

impl Token {
    pub fn new(kind: TokenKind, nesting: Nesting) -> Self {
        Self {
            kind,
            nesting,
            lines: None,
            content: None,
            attrs: Vec::new(),
            info: None,
            depth: None,
        }
    }

    pub fn open(kind: TokenKind) -> Self {
        Self::new(kind, Nesting::Open)
    }

    pub fn close(kind: TokenKind) -> Self {
        Self::new(kind, Nesting::Close)
    }

    pub fn leaf(kind: TokenKind) -> Self {
        Self::new(kind, Nesting::SelfContained)
    }

    /// Text token with content
    pub fn text(content: impl Into<String>) -> Self {
        Self::leaf(TokenKind::Text).with_content(content)
    }

    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.lines = Some(LineSpan::new(start, end));
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn with_depth(mut self, depth: u8) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Look up an attribute value by name (first match wins)
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Heading depth clamped to 1..=6
    #[inline]
    pub fn heading_depth(&self) -> u8 {
        self.depth.unwrap_or(1).clamp(1, 6)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.nesting == Nesting::Open
    }

    #[inline]
    pub fn is_close(&self) -> bool {
        self.nesting == Nesting::Close
    }

    /// Content as `&str`, empty when absent
    #[inline]
    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}
