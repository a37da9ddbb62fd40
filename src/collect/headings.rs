//! Headings Collector
//!
//! One entry per heading with an anchor slug. Slugs are lower-case ASCII
//! alphanumerics joined by `-`; repeated slugs get a `-N` suffix in
//! document order.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::{Collector, Interest};
use crate::config::EngineConfig;
use crate::core::token::{Nesting, Token, TokenKind};
use crate::dispatch::DispatchContext;
use crate::error::CollectorError;
use crate::fault::shorten;
use crate::resource::EntryCap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadingEntry {
    pub depth: u8,
    pub title: String,
    pub slug: String,
    pub line: Option<u32>,
    pub section: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HeadingsResult {
    count: usize,
    truncated: bool,
    entries: Vec<HeadingEntry>,
}

#[derive(Debug)]
pub struct HeadingsCollector {
    cap: EntryCap,
    max_text_bytes: usize,
    seen: HashMap<String, usize>,
    entries: Vec<HeadingEntry>,
}

impl HeadingsCollector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            cap: EntryCap::new(config.entry_limit()),
            max_text_bytes: config.max_text_bytes,
            seen: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[HeadingEntry] {
        &self.entries
    }

    fn unique_slug(&mut self, title: &str) -> String {
        let base = slugify(title);
        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{}-{}", base, *count - 1)
        }
    }
}

/// Anchor slug for a heading title
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("section");
    }
    slug
}

impl Collector for HeadingsCollector {
    fn name(&self) -> &str {
        "headings"
    }

    fn interest(&self) -> Interest {
        Interest::new([TokenKind::Heading])
    }

    fn should_process(&self, ctx: &DispatchContext<'_>) -> bool {
        !self.cap.is_truncated() && ctx.token().is_some_and(|t| t.nesting != Nesting::Close)
    }

    fn on_token(&mut self, token: &Token, ctx: &DispatchContext<'_>) -> Result<(), CollectorError> {
        if token.nesting == Nesting::Close || !self.cap.try_admit() {
            return Ok(());
        }
        let title = shorten(&ctx.document().heading_title(ctx.position()), self.max_text_bytes);
        let slug = self.unique_slug(&title);
        let line = ctx.lines().map(|span| span.start);
        self.entries.push(HeadingEntry {
            depth: token.heading_depth(),
            slug,
            title,
            line,
            section: line.and_then(|l| ctx.section_index_at(l)),
        });
        Ok(())
    }

    fn finalize(&mut self) -> Result<Value, CollectorError> {
        let entries = std::mem::take(&mut self.entries);
        Ok(serde_json::to_value(HeadingsResult {
            count: entries.len(),
            truncated: self.cap.is_truncated(),
            entries,
        })?)
    }
}
