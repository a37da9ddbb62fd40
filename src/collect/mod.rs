//! Collectors
//!
//! A collector subscribes to token kinds, accumulates private state while
//! the engine walks the stream, and produces one JSON result at the end.
//! Collectors never see each other; the only shared state is the read-only
//! document behind [`DispatchContext`].
//!
//! Built-in collectors:
//! - [`LinksCollector`]: validated link targets with text and section
//! - [`HeadingsCollector`]: headings with anchor slugs
//! - [`CodeBlocksCollector`]: fenced and indented code regions
//! - [`SectionsCollector`]: the section hierarchy

pub mod code_blocks;
pub mod headings;
pub mod links;
pub mod sections;

pub use code_blocks::CodeBlocksCollector;
pub use headings::HeadingsCollector;
pub use links::LinksCollector;
pub use sections::SectionsCollector;

use serde_json::Value;

use crate::config::EngineConfig;
use crate::core::token::{context_flags, Token, TokenKind};
use crate::dispatch::DispatchContext;
use crate::error::CollectorError;

/// Token kinds a collector wants, and the regions it must not act in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub kinds: Vec<TokenKind>,
    /// Ignore-context bits; tokens dispatched while any of them is active
    /// are not routed to the collector
    pub ignore: u8,
}

impl Interest {
    pub fn new(kinds: impl IntoIterator<Item = TokenKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            ignore: context_flags::NONE,
        }
    }

    pub fn ignoring(mut self, flags: u8) -> Self {
        self.ignore |= flags;
        self
    }
}

/// A pluggable extraction component
///
/// Callbacks run either inline or on a supervised worker thread, hence
/// `Send`. An error or panic from any callback retires the collector for
/// the rest of the pass.
pub trait Collector: Send {
    /// Unique name; keys the collector's result in the report
    fn name(&self) -> &str;

    /// Kinds and ignore mask, read once when the routing table is built
    fn interest(&self) -> Interest;

    /// Cheap pre-filter checked before every callback
    fn should_process(&self, _ctx: &DispatchContext<'_>) -> bool {
        true
    }

    fn on_token(&mut self, token: &Token, ctx: &DispatchContext<'_>) -> Result<(), CollectorError>;

    /// Produce the result; called once after the last token
    fn finalize(&mut self) -> Result<Value, CollectorError>;
}

/// The built-in collectors configured from `config`
pub fn default_collectors(config: &EngineConfig) -> Vec<Box<dyn Collector>> {
    let mut collectors: Vec<Box<dyn Collector>> = Vec::with_capacity(4);
    collectors.push(Box::new(LinksCollector::new(config)));
    collectors.push(Box::new(HeadingsCollector::new(config)));
    collectors.push(Box::new(CodeBlocksCollector::new(config)));
    collectors.push(Box::new(SectionsCollector::new(config)));
    collectors
}
