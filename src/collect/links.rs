//! Links Collector
//!
//! Builds one entry per link: validated target, visible text, title, line
//! and containing section. Text fragments between a link's open and close
//! are appended to a reusable buffer and copied out once per link.
//!
//! Nested links are not valid markup; an inner link contributes its text to
//! the outer one and is otherwise ignored.

use serde::Serialize;
use serde_json::Value;

use super::{Collector, Interest};
use crate::config::EngineConfig;
use crate::core::token::{context_flags, Nesting, Token, TokenKind};
use crate::dispatch::DispatchContext;
use crate::error::CollectorError;
use crate::resource::{EntryCap, TextBuffer};
use crate::security::UrlValidator;

/// One accepted link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkEntry {
    pub target: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub line: Option<u32>,
    /// Index into the section index
    pub section: Option<usize>,
    pub relative: bool,
    /// Position of the link's open token
    pub position: u32,
}

#[derive(Debug, Serialize)]
struct LinksResult {
    count: usize,
    truncated: bool,
    rejected: usize,
    entries: Vec<LinkEntry>,
}

#[derive(Debug)]
struct PendingLink {
    target: String,
    title: Option<String>,
    position: u32,
    line: Option<u32>,
}

/// Collects validated links
#[derive(Debug)]
pub struct LinksCollector {
    validator: UrlValidator,
    cap: EntryCap,
    text: TextBuffer,
    pending: Option<PendingLink>,
    /// Open links, counting the pending one
    depth: u32,
    entries: Vec<LinkEntry>,
    rejected: usize,
}

impl LinksCollector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            validator: UrlValidator::from_profile(config.profile),
            cap: EntryCap::new(config.entry_limit()),
            text: TextBuffer::new(config.max_text_bytes),
            pending: None,
            depth: 0,
            entries: Vec::new(),
            rejected: 0,
        }
    }

    /// Accepted entries so far
    pub fn entries(&self) -> &[LinkEntry] {
        &self.entries
    }

    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.cap.is_truncated()
    }

    fn begin(&mut self, token: &Token, ctx: &DispatchContext<'_>) {
        self.text.clear();
        self.pending = Some(PendingLink {
            target: token.attr("href").unwrap_or("").to_string(),
            title: token.attr("title").map(str::to_string),
            position: ctx.position(),
            line: ctx.lines().map(|span| span.start),
        });
    }

    fn complete(&mut self, ctx: &DispatchContext<'_>) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let text = self.text.take();

        let valid = match self.validator.validate(&pending.target) {
            Ok(valid) => valid,
            Err(reason) => {
                self.rejected += 1;
                ctx.reject_at(pending.position, &pending.target, reason);
                return;
            }
        };
        if !self.cap.try_admit() {
            return;
        }

        let section = pending.line.and_then(|line| ctx.section_index_at(line));
        self.entries.push(LinkEntry {
            relative: valid.is_relative(),
            target: valid.target,
            text,
            title: pending.title,
            line: pending.line,
            section,
            position: pending.position,
        });
    }
}

impl Collector for LinksCollector {
    fn name(&self) -> &str {
        "links"
    }

    fn interest(&self) -> Interest {
        Interest::new([TokenKind::Link, TokenKind::Text, TokenKind::CodeInline])
            .ignoring(context_flags::CODE)
    }

    fn should_process(&self, ctx: &DispatchContext<'_>) -> bool {
        if self.cap.is_truncated() {
            return false;
        }
        match ctx.token() {
            Some(token) if token.kind.is_text_bearing() => self.pending.is_some(),
            _ => true,
        }
    }

    fn on_token(&mut self, token: &Token, ctx: &DispatchContext<'_>) -> Result<(), CollectorError> {
        match (&token.kind, token.nesting) {
            (TokenKind::Link, Nesting::Open) => {
                if self.depth == 0 {
                    self.begin(token, ctx);
                }
                self.depth += 1;
            }
            (TokenKind::Link, Nesting::Close) => {
                // stray closes with nothing open are ignored
                if self.depth == 0 {
                    return Ok(());
                }
                self.depth -= 1;
                if self.depth == 0 {
                    self.complete(ctx);
                }
            }
            (TokenKind::Link, Nesting::SelfContained) => {
                if self.depth == 0 {
                    self.begin(token, ctx);
                    let text = match token.content.as_deref() {
                        Some(content) if !content.is_empty() => content,
                        _ => token.attr("href").unwrap_or(""),
                    };
                    self.text.push(text);
                    self.complete(ctx);
                }
            }
            (kind, _) if kind.is_text_bearing() => {
                if self.pending.is_some() {
                    self.text.push(token.content_str());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<Value, CollectorError> {
        // a link left open at end of stream is dropped
        self.pending = None;
        let entries = std::mem::take(&mut self.entries);
        let result = LinksResult {
            count: entries.len(),
            truncated: self.cap.is_truncated(),
            rejected: self.rejected,
            entries,
        };
        Ok(serde_json::to_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::TokenKind as K;
    use crate::index::Document;
    use crate::resource::SecurityProfile;

    fn link(href: &str, text: &str, line: u32) -> Vec<Token> {
        vec![
            Token::open(K::Paragraph).with_lines(line, line),
            Token::open(K::Link).with_attr("href", href),
            Token::text(text),
            Token::close(K::Link),
            Token::close(K::Paragraph),
        ]
    }

    /// Feed every routed token straight to the collector
    fn run(collector: &mut LinksCollector, doc: &Document) -> Vec<crate::fault::SecurityRejection> {
        let interest = collector.interest();
        let mut rejections = Vec::new();
        for (pos, token) in doc.tokens().iter().enumerate() {
            if !interest.kinds.contains(&token.kind) {
                continue;
            }
            let ctx = DispatchContext::new(doc, "links", pos as u32, 0);
            if collector.should_process(&ctx) {
                collector.on_token(token, &ctx).unwrap();
            }
            rejections.extend(ctx.into_rejections());
        }
        rejections
    }

    #[test]
    fn test_collects_text_and_section() {
        let mut tokens = vec![
            Token::open(K::Heading).with_depth(1).with_lines(0, 0),
            Token::text("Intro"),
            Token::close(K::Heading),
        ];
        tokens.extend(link("https://example.com/a", "the docs", 2));
        let doc = Document::build(tokens);

        let mut collector = LinksCollector::new(&EngineConfig::default());
        assert!(run(&mut collector, &doc).is_empty());

        let entries = collector.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target, "https://example.com/a");
        assert_eq!(entries[0].text, "the docs");
        assert_eq!(entries[0].line, Some(2));
        assert_eq!(entries[0].section, Some(0));
        assert!(!entries[0].relative);
    }

    #[test]
    fn test_rejected_targets_are_dropped() {
        let mut tokens = link("javascript:alert(1)", "click", 0);
        tokens.extend(link("//evil.example/x", "evil", 1));
        tokens.extend(link("docs/intro.md", "intro", 2));
        let doc = Document::build(tokens);

        let mut collector = LinksCollector::new(&EngineConfig::default());
        let rejections = run(&mut collector, &doc);

        assert_eq!(rejections.len(), 2);
        assert_eq!(rejections[0].target, "javascript:alert(1)");
        // reported at the link open, not its close
        assert_eq!(rejections[0].position, 1);
        assert_eq!(rejections[1].position, 6);
        assert_eq!(collector.entries().len(), 1);
        assert_eq!(collector.entries()[0].position, 11);
        assert!(collector.entries()[0].relative);

        let result = collector.finalize().unwrap();
        assert_eq!(result["rejected"], 2);
        assert_eq!(result["count"], 1);
    }

    #[test]
    fn test_cap_truncates() {
        let mut tokens = Vec::new();
        for line in 0..5 {
            tokens.extend(link("https://example.com", "x", line));
        }
        let doc = Document::build(tokens);
        let config = EngineConfig {
            max_entries: Some(3),
            ..EngineConfig::default()
        };

        let mut collector = LinksCollector::new(&config);
        run(&mut collector, &doc);
        assert_eq!(collector.entries().len(), 3);
        assert!(collector.is_truncated());

        let result = collector.finalize().unwrap();
        assert_eq!(result["count"], 3);
        assert_eq!(result["truncated"], true);
    }

    #[test]
    fn test_autolink_and_nested_link() {
        let doc = Document::build(vec![
            Token::open(K::Paragraph).with_lines(0, 0),
            Token::leaf(K::Link).with_attr("href", "https://auto.example"),
            Token::open(K::Link).with_attr("href", "https://outer.example"),
            Token::text("a "),
            Token::open(K::Link).with_attr("href", "https://inner.example"),
            Token::text("b"),
            Token::close(K::Link),
            Token::close(K::Link),
            Token::close(K::Paragraph),
        ]);

        let mut collector = LinksCollector::new(&EngineConfig::default());
        run(&mut collector, &doc);

        let entries = collector.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "https://auto.example");
        assert_eq!(entries[1].target, "https://outer.example");
        assert_eq!(entries[1].text, "a b");
    }

    #[test]
    fn test_strict_profile_rejects_relative() {
        let doc = Document::build(link("docs/intro.md", "intro", 0));
        let mut collector = LinksCollector::new(&EngineConfig::with_profile(SecurityProfile::Strict));
        let rejections = run(&mut collector, &doc);
        assert_eq!(rejections.len(), 1);
        assert!(collector.entries().is_empty());
    }

    #[test]
    fn test_text_is_bounded() {
        let doc = Document::build(link("https://example.com", &"x".repeat(100), 0));
        let config = EngineConfig {
            max_text_bytes: 10,
            ..EngineConfig::default()
        };
        let mut collector = LinksCollector::new(&config);
        run(&mut collector, &doc);
        assert_eq!(collector.entries()[0].text.len(), 10);
    }
}
