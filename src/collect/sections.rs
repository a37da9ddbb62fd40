//! Sections Collector
//!
//! Reports the section hierarchy as seen by the section index, one entry per
//! indexed heading.

use serde_json::{json, Value};

use super::{Collector, Interest};
use crate::config::EngineConfig;
use crate::core::token::{Nesting, Token, TokenKind};
use crate::dispatch::DispatchContext;
use crate::error::CollectorError;
use crate::index::Section;
use crate::resource::EntryCap;

#[derive(Debug)]
pub struct SectionsCollector {
    cap: EntryCap,
    entries: Vec<Section>,
}

impl SectionsCollector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            cap: EntryCap::new(config.entry_limit()),
            entries: Vec::new(),
        }
    }
}

impl Collector for SectionsCollector {
    fn name(&self) -> &str {
        "sections"
    }

    fn interest(&self) -> Interest {
        Interest::new([TokenKind::Heading])
    }

    fn should_process(&self, ctx: &DispatchContext<'_>) -> bool {
        !self.cap.is_truncated() && ctx.token().is_some_and(|t| t.nesting == Nesting::Open)
    }

    fn on_token(&mut self, token: &Token, ctx: &DispatchContext<'_>) -> Result<(), CollectorError> {
        if token.nesting != Nesting::Open {
            return Ok(());
        }
        // headings skipped by the index (no lines, out of order) have no section
        let Some(section) = ctx
            .section()
            .filter(|section| section.position == ctx.position())
        else {
            return Ok(());
        };
        if self.cap.try_admit() {
            self.entries.push(section.clone());
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<Value, CollectorError> {
        let entries = std::mem::take(&mut self.entries);
        Ok(json!({
            "count": entries.len(),
            "truncated": self.cap.is_truncated(),
            "entries": entries,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::TokenKind as K;
    use crate::index::Document;

    #[test]
    fn test_reports_indexed_sections() {
        let doc = Document::build(vec![
            Token::open(K::Heading).with_depth(1).with_lines(0, 0),
            Token::text("Top"),
            Token::close(K::Heading),
            Token::open(K::Heading).with_depth(2).with_lines(4, 4),
            Token::text("Nested"),
            Token::close(K::Heading),
            // no line span, not indexed
            Token::open(K::Heading).with_depth(2),
            Token::close(K::Heading),
            Token::leaf(K::Rule).with_lines(9, 9),
        ]);

        let mut collector = SectionsCollector::new(&EngineConfig::default());
        for (pos, token) in doc.tokens().iter().enumerate() {
            if token.kind != K::Heading {
                continue;
            }
            let ctx = DispatchContext::new(&doc, "sections", pos as u32, 0);
            if collector.should_process(&ctx) {
                collector.on_token(token, &ctx).unwrap();
            }
        }

        let result = collector.finalize().unwrap();
        assert_eq!(result["count"], 2);
        assert_eq!(result["entries"][0]["end_line"], 3);
        assert_eq!(result["entries"][1]["parent"], 0);
        assert_eq!(result["entries"][1]["scope_end"], 9);
    }
}
