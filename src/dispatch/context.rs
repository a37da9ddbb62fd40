//! Dispatch Context
//!
//! What a collector sees for the token it is handed: where the token sits,
//! which ignore regions are active, and read-only queries against the
//! indexed document. Rejected targets are reported back through the
//! context rather than returned, so a callback can reject several targets
//! and still succeed.

use std::cell::RefCell;

use crate::core::token::Token;
use crate::fault::SecurityRejection;
use crate::index::{Document, LineSpan, Section};
use crate::security::RejectReason;

/// Per-callback view of the pass
pub struct DispatchContext<'a> {
    document: &'a Document,
    collector: &'a str,
    position: u32,
    ignore_mask: u8,
    rejections: RefCell<Vec<SecurityRejection>>,
}

impl<'a> DispatchContext<'a> {
    pub fn new(document: &'a Document, collector: &'a str, position: u32, ignore_mask: u8) -> Self {
        Self {
            document,
            collector,
            position,
            ignore_mask,
            rejections: RefCell::new(Vec::new()),
        }
    }

    /// Position of the token being dispatched
    #[inline]
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Ignore-context bits active at this token
    #[inline]
    pub fn ignore_mask(&self) -> u8 {
        self.ignore_mask
    }

    /// Whether any of `flags` is active
    #[inline]
    pub fn in_context(&self, flags: u8) -> bool {
        self.ignore_mask & flags != 0
    }

    /// Name of the collector this context was built for
    #[inline]
    pub fn collector(&self) -> &str {
        self.collector
    }

    #[inline]
    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// The token being dispatched
    #[inline]
    pub fn token(&self) -> Option<&'a Token> {
        self.document.token(self.position)
    }

    /// Line span of the current token, inherited from its block if needed
    #[inline]
    pub fn lines(&self) -> Option<LineSpan> {
        self.document.effective_lines(self.position)
    }

    /// Enclosing open token
    #[inline]
    pub fn parent(&self) -> Option<u32> {
        self.document.parent(self.position)
    }

    /// Matching open or close of the current token
    #[inline]
    pub fn pair(&self) -> Option<u32> {
        self.document.pair(self.position)
    }

    /// Section containing the current token's first line
    pub fn section(&self) -> Option<&'a Section> {
        self.lines()
            .and_then(|span| self.document.section_of(span.start))
    }

    /// Index of the section containing `line`
    #[inline]
    pub fn section_index_at(&self, line: u32) -> Option<usize> {
        self.document.sections().index_of(line)
    }

    /// Visible text between `open` and its close
    #[inline]
    pub fn text_between(&self, open: u32) -> String {
        self.document.text_between(open)
    }

    /// Report a dropped target for the current token
    pub fn reject(&self, target: &str, reason: RejectReason) {
        self.reject_at(self.position, target, reason);
    }

    /// Report a dropped target that came from an earlier token
    pub fn reject_at(&self, position: u32, target: &str, reason: RejectReason) {
        self.rejections.borrow_mut().push(SecurityRejection::new(
            self.collector,
            position,
            target,
            reason,
        ));
    }

    /// Rejections reported during the callback
    pub(crate) fn into_rejections(self) -> Vec<SecurityRejection> {
        self.rejections.into_inner()
    }
}

impl std::fmt::Debug for DispatchContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchContext")
            .field("collector", &self.collector)
            .field("position", &self.position)
            .field("ignore_mask", &self.ignore_mask)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::{context_flags, TokenKind as K};

    fn doc() -> Document {
        Document::build(vec![
            Token::open(K::Heading).with_depth(1).with_lines(0, 0),
            Token::text("Intro"),
            Token::close(K::Heading),
            Token::open(K::Paragraph).with_lines(1, 1),
            Token::open(K::Link).with_attr("href", "//evil"),
            Token::text("x"),
            Token::close(K::Link),
            Token::close(K::Paragraph),
        ])
    }

    #[test]
    fn test_queries_resolve_against_document() {
        let doc = doc();
        let ctx = DispatchContext::new(&doc, "links", 4, context_flags::NONE);
        assert_eq!(ctx.token().map(|t| &t.kind), Some(&K::Link));
        assert_eq!(ctx.parent(), Some(3));
        assert_eq!(ctx.pair(), Some(6));
        assert_eq!(ctx.lines(), Some(LineSpan::new(1, 1)));
        assert_eq!(ctx.section().map(|s| s.title.as_str()), Some("Intro"));
        assert_eq!(ctx.text_between(4), "x");
        assert!(!ctx.in_context(context_flags::CODE));
    }

    #[test]
    fn test_rejections_are_attributed() {
        let doc = doc();
        let ctx = DispatchContext::new(&doc, "links", 4, context_flags::FENCE);
        assert!(ctx.in_context(context_flags::CODE));
        ctx.reject("//evil", RejectReason::ProtocolRelative);

        let rejections = ctx.into_rejections();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].collector, "links");
        assert_eq!(rejections[0].position, 4);
        assert_eq!(rejections[0].reason, RejectReason::ProtocolRelative);
    }
}
