//! Index Builder
//!
//! Builds a StructuralIndex from a token stream in one forward pass.
//!
//! Keeps an explicit stack of open token positions. Every token, whatever
//! its kind, gets its parent from the stack top, so the parent table is
//! total. Closing tokens are matched LIFO against the nearest open of the
//! same kind; a per-kind open counter answers "is there anything to match?"
//! in O(1), which keeps stray closes from rescanning the stack.
//!
//! Heading titles and text byte offsets are gathered on the same pass, so no
//! later query has to rescan the tokens between a pair. A text token counts
//! toward the innermost open heading only.

use std::collections::HashMap;

use super::span::{LineSpan, DEFAULT_MAX_LINE};
use super::structural::{FenceRange, StructuralIndex, MAX_TITLE_BYTES, NO_TOKEN};
use crate::core::token::{context_flags, Nesting, Token, TokenKind};
use crate::fault::{shorten, NestingProblem, StructuralFault};
use crate::resource::TextBuffer;

/// Builder state for constructing a StructuralIndex
pub struct IndexBuilder<'a> {
    /// The index being built
    index: StructuralIndex,
    tokens: &'a [Token],
    /// Stack of open token positions
    stack: Vec<u32>,
    /// Open tokens currently on the stack, per kind
    open_counts: HashMap<TokenKind, u32>,
    /// Open headings with their title so far, innermost last; the buffer
    /// is allocated on the first text token
    headings: Vec<(u32, Option<TextBuffer>)>,
    /// Running total of text-bearing bytes
    text_bytes: usize,
    max_line: u32,
}

impl<'a> IndexBuilder<'a> {
    /// Create a new builder for the given tokens
    pub fn new(tokens: &'a [Token]) -> Self {
        Self::with_max_line(tokens, DEFAULT_MAX_LINE)
    }

    /// Create a builder that clamps line numbers to `max_line`
    pub fn with_max_line(tokens: &'a [Token], max_line: u32) -> Self {
        Self {
            index: StructuralIndex::with_capacity(tokens.len()),
            tokens,
            stack: Vec::with_capacity(32),
            open_counts: HashMap::new(),
            headings: Vec::new(),
            text_bytes: 0,
            max_line,
        }
    }

    /// Index every token and return the finished index
    pub fn build(mut self) -> StructuralIndex {
        let tokens = self.tokens;
        for (pos, token) in tokens.iter().enumerate() {
            self.push_token(pos as u32, token);
        }
        self.finish()
    }

    /// Current parent (stack top)
    #[inline]
    fn current_parent(&self) -> u32 {
        self.stack.last().copied().unwrap_or(NO_TOKEN)
    }

    fn push_token(&mut self, pos: u32, token: &Token) {
        self.index
            .by_kind
            .entry(token.kind.clone())
            .or_default()
            .push(pos);

        let lines = token.lines.map(|span| span.clamped(self.max_line));
        if let Some(span) = lines {
            self.index.last_line = self.index.last_line.max(span.end);
        }
        self.index.lines.push(lines);
        self.index.pairs.push(NO_TOKEN);
        self.index.text_offsets.push(self.text_bytes);

        if token.kind.is_text_bearing() {
            let text = token.content_str();
            self.text_bytes += text.len();
            if let Some((_, title)) = self.headings.last_mut() {
                title
                    .get_or_insert_with(|| TextBuffer::new(MAX_TITLE_BYTES))
                    .push(text);
            }
        }

        match token.nesting {
            Nesting::Open => {
                self.index.parents.push(self.current_parent());
                self.stack.push(pos);
                *self.open_counts.entry(token.kind.clone()).or_insert(0) += 1;
                if token.kind == TokenKind::Heading {
                    self.headings.push((pos, None));
                }
            }
            Nesting::Close => self.close(pos, token),
            Nesting::SelfContained => {
                self.index.parents.push(self.current_parent());
                if token.kind.is_code_region() {
                    if let Some(span) = lines {
                        self.record_fence(pos, span, token.info.clone());
                    }
                }
            }
        }
    }

    /// Handle a closing token
    fn close(&mut self, pos: u32, token: &Token) {
        let has_open = self
            .open_counts
            .get(&token.kind)
            .is_some_and(|&count| count > 0);

        if !has_open {
            self.index.parents.push(self.current_parent());
            self.fault(pos, &token.kind, NestingProblem::UnmatchedClose);
            return;
        }

        // Pop down to the nearest open of the same kind; anything skipped
        // on the way never gets its close.
        let tokens = self.tokens;
        while let Some(open) = self.stack.pop() {
            let open_kind = &tokens[open as usize].kind;
            self.decrement(open_kind);
            if *open_kind == TokenKind::Heading {
                self.end_heading();
            }
            if *open_kind == token.kind {
                self.index.pairs[open as usize] = pos;
                self.index.pairs[pos as usize] = open;
                // Close tokens sit beside their open, not inside it
                let parent = self.index.parents[open as usize];
                self.index.parents.push(parent);
                if token.kind.is_code_region() {
                    self.close_fence(open, pos);
                }
                return;
            }
            self.fault(open, open_kind, NestingProblem::UnmatchedOpen);
            self.cut_region(open, open_kind, pos);
        }

        // Counter said a match existed; keep the table total regardless
        self.index.parents.push(NO_TOKEN);
    }

    fn decrement(&mut self, kind: &TokenKind) {
        if let Some(count) = self.open_counts.get_mut(kind) {
            *count = count.saturating_sub(1);
        }
    }

    /// End an ignore region whose open was popped by the close at `at`
    ///
    /// A code region cut this way still gets a fence range, ending at the
    /// popping close.
    fn cut_region(&mut self, open: u32, kind: &TokenKind, at: u32) {
        if kind.context_flag() != context_flags::NONE {
            self.index.cut_regions.push((at, open));
        }
        if kind.is_code_region() {
            self.close_fence(open, at);
        }
    }

    /// Store the title of the innermost open heading
    fn end_heading(&mut self) {
        if let Some((pos, Some(title))) = self.headings.pop() {
            let title = shorten(title.as_str().trim(), MAX_TITLE_BYTES);
            if !title.is_empty() {
                self.index.titles.insert(pos, title);
            }
        }
    }

    /// Turn a code region open and the close that ended it into a fence range
    fn close_fence(&mut self, open: u32, close: u32) {
        let start = self
            .index
            .lines(open)
            .or_else(|| self.index.lines(close))
            .map(|s| s.start);
        let end = self
            .index
            .lines(close)
            .or_else(|| self.index.lines(open))
            .map(|s| s.end);
        if let (Some(start), Some(end)) = (start, end) {
            let info = self.tokens[open as usize].info.clone();
            self.record_fence(open, LineSpan::new(start, end), info);
        }
    }

    fn record_fence(&mut self, pos: u32, span: LineSpan, info: Option<String>) {
        self.index.fences.push(FenceRange {
            position: pos,
            start_line: span.start,
            end_line: span.end,
            info,
        });
    }

    fn fault(&mut self, position: u32, kind: &TokenKind, problem: NestingProblem) {
        self.index.faults.push(StructuralFault {
            position,
            kind: kind.clone(),
            problem,
        });
    }

    /// Finish building and return the index
    pub fn finish(mut self) -> StructuralIndex {
        // Whatever is still open never closed. An unterminated code region
        // runs to the end of the document.
        while !self.headings.is_empty() {
            self.end_heading();
        }
        self.index.text_offsets.push(self.text_bytes);

        let remaining = std::mem::take(&mut self.stack);
        for open in remaining {
            let kind = self.tokens[open as usize].kind.clone();
            if kind.is_code_region() {
                if let Some(span) = self.index.lines(open) {
                    let end = self.index.last_line.max(span.end);
                    let info = self.tokens[open as usize].info.clone();
                    self.record_fence(open, LineSpan::new(span.start, end), info);
                }
            }
            self.fault(open, &kind, NestingProblem::UnmatchedOpen);
        }

        self.index.fences.sort_by_key(|f| (f.start_line, f.position));
        self.index.faults.sort_by_key(|f| f.position);
        self.index.build_children_from_parents();
        self.index.shrink_to_fit();

        tracing::debug!(
            tokens = self.index.len(),
            kinds = self.index.by_kind.len(),
            fences = self.index.fences.len(),
            faults = self.index.faults.len(),
            last_line = self.index.last_line,
            "structural index built"
        );

        self.index
    }
}

/// Build a StructuralIndex with the default line clamp
pub fn build_index(tokens: &[Token]) -> StructuralIndex {
    IndexBuilder::new(tokens).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::TokenKind as K;

    fn paragraph_with_link() -> Vec<Token> {
        vec![
            Token::open(K::Paragraph).with_lines(0, 0),
            Token::open(K::Link).with_attr("href", "https://example.com"),
            Token::text("example"),
            Token::close(K::Link),
            Token::close(K::Paragraph),
        ]
    }

    #[test]
    fn test_build_simple() {
        let tokens = paragraph_with_link();
        let index = build_index(&tokens);

        assert_eq!(index.len(), 5);
        assert_eq!(index.positions(&K::Link), &[1, 3]);
        assert_eq!(index.pair(0), Some(4));
        assert_eq!(index.pair(4), Some(0));
        assert_eq!(index.pair(1), Some(3));
        assert!(index.faults().is_empty());
    }

    #[test]
    fn test_parents_cover_every_token() {
        let tokens = paragraph_with_link();
        let index = build_index(&tokens);

        assert!(index.is_top_level(0));
        assert_eq!(index.parent(1), Some(0));
        assert_eq!(index.parent(2), Some(1));
        // Close sits beside its open
        assert_eq!(index.parent(3), Some(0));
        assert!(index.is_top_level(4));
        assert_eq!(index.children(0), &[1, 3]);
        assert_eq!(index.children(1), &[2]);
    }

    #[test]
    fn test_unmatched_close_is_recorded() {
        let tokens = vec![
            Token::open(K::Paragraph),
            Token::close(K::Link),
            Token::close(K::Paragraph),
        ];
        let index = build_index(&tokens);

        assert_eq!(index.pair(0), Some(2));
        assert_eq!(index.pair(1), None);
        assert_eq!(index.parent(1), Some(0));
        assert_eq!(index.faults().len(), 1);
        assert_eq!(index.faults()[0].problem, NestingProblem::UnmatchedClose);
        assert_eq!(index.faults()[0].position, 1);
    }

    #[test]
    fn test_unmatched_open_is_skipped_by_outer_close() {
        let tokens = vec![
            Token::open(K::Paragraph),
            Token::open(K::Emphasis),
            Token::text("dangling"),
            Token::close(K::Paragraph),
        ];
        let index = build_index(&tokens);

        assert_eq!(index.pair(0), Some(3));
        assert_eq!(index.pair(1), None);
        assert_eq!(index.parent(2), Some(1));
        assert_eq!(index.faults().len(), 1);
        assert_eq!(index.faults()[0].problem, NestingProblem::UnmatchedOpen);
        assert_eq!(index.faults()[0].position, 1);
    }

    #[test]
    fn test_open_left_at_end_of_stream() {
        let tokens = vec![Token::open(K::BlockQuote), Token::text("x")];
        let index = build_index(&tokens);

        assert_eq!(index.faults().len(), 1);
        assert_eq!(index.faults()[0].problem, NestingProblem::UnmatchedOpen);
        assert_eq!(index.parent(1), Some(0));
    }

    #[test]
    fn test_fences_from_leaf_and_pair() {
        let tokens = vec![
            Token::leaf(K::Fence)
                .with_lines(2, 5)
                .with_info("rust")
                .with_content("fn main() {}\n"),
            Token::open(K::CodeBlock).with_lines(8, 8),
            Token::text("indented"),
            Token::close(K::CodeBlock).with_lines(10, 10),
        ];
        let index = build_index(&tokens);

        assert_eq!(index.fences().len(), 2);
        assert_eq!(index.fences()[0].start_line, 2);
        assert_eq!(index.fences()[0].end_line, 5);
        assert_eq!(index.fences()[0].info.as_deref(), Some("rust"));
        assert_eq!(index.fences()[1].start_line, 8);
        assert_eq!(index.fences()[1].end_line, 10);
        assert_eq!(index.fence_at(4).map(|f| f.position), Some(0));
        assert_eq!(index.fence_at(9).map(|f| f.position), Some(1));
        assert!(index.fence_at(6).is_none());
    }

    #[test]
    fn test_unterminated_fence_runs_to_last_line() {
        let tokens = vec![
            Token::open(K::Fence).with_lines(3, 3),
            Token::text("code").with_lines(4, 40),
        ];
        let index = build_index(&tokens);

        assert_eq!(index.fences().len(), 1);
        assert_eq!(index.fences()[0].end_line, 40);
    }

    #[test]
    fn test_fence_cut_by_outer_close() {
        let tokens = vec![
            Token::open(K::Paragraph).with_lines(0, 0),
            Token::open(K::Fence).with_lines(1, 1),
            Token::close(K::Paragraph).with_lines(2, 2),
            Token::close(K::Fence).with_lines(3, 3),
            Token::open(K::Paragraph).with_lines(10, 10),
            Token::close(K::Paragraph),
        ];
        let index = build_index(&tokens);

        assert_eq!(index.fences().len(), 1);
        assert_eq!(index.fences()[0].position, 1);
        assert_eq!(index.fences()[0].span(), LineSpan::new(1, 2));
        assert!(index.fence_at(10).is_none());
        assert_eq!(index.regions_cut_at(2).collect::<Vec<_>>(), vec![1]);
        assert_eq!(index.regions_cut_at(3).count(), 0);
        // the skipped open and the stray close
        assert_eq!(index.faults().len(), 2);
    }

    #[test]
    fn test_titles_and_text_offsets() {
        let tokens = vec![
            Token::open(K::Heading).with_depth(1).with_lines(0, 0),
            Token::text(" Getting "),
            Token::open(K::Emphasis),
            Token::text("started"),
            Token::close(K::Emphasis),
            Token::close(K::Heading),
            Token::open(K::Fence).with_lines(2, 4),
            Token::text("let x = 1;\n"),
            Token::close(K::Fence),
            Token::open(K::Heading).with_depth(2).with_lines(6, 6),
            Token::close(K::Heading),
        ];
        let index = build_index(&tokens);

        assert_eq!(index.title(0), Some("Getting started"));
        assert_eq!(index.title(9), None);
        assert_eq!(index.text_len(0), " Getting started".len());
        assert_eq!(index.text_len(6), "let x = 1;\n".len());
        assert_eq!(index.text_len(5), 0);
    }

    #[test]
    fn test_nested_heading_text_goes_to_innermost() {
        let depth = 2_000;
        let mut tokens = Vec::with_capacity(depth * 3);
        for _ in 0..depth {
            tokens.push(Token::open(K::Heading));
        }
        tokens.push(Token::text("deep"));
        for _ in 0..depth {
            tokens.push(Token::close(K::Heading));
        }
        let index = build_index(&tokens);

        assert_eq!(index.title(depth as u32 - 1), Some("deep"));
        assert_eq!(index.title(0), None);
        assert_eq!(index.text_len(0), 4);
    }

    #[test]
    fn test_extreme_lines_are_clamped() {
        let tokens = vec![Token::text("x").with_lines(u32::MAX, u32::MAX)];
        let index = IndexBuilder::with_max_line(&tokens, 1_000).build();

        assert_eq!(index.last_line(), 1_000);
        assert_eq!(index.lines(0), Some(LineSpan::line(1_000)));
    }

    #[test]
    fn test_empty_stream() {
        let index = build_index(&[]);
        assert!(index.is_empty());
        assert_eq!(index.last_line(), 0);
        assert!(index.children(0).is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_kind() -> impl Strategy<Value = TokenKind> {
            prop_oneof![
                Just(K::Paragraph),
                Just(K::Link),
                Just(K::Heading),
                Just(K::Fence),
                Just(K::Text),
                Just(K::Emphasis),
            ]
        }

        fn arb_token() -> impl Strategy<Value = Token> {
            (
                arb_kind(),
                -1i8..=1,
                proptest::option::of((any::<u32>(), any::<u32>())),
            )
                .prop_map(|(kind, level, lines)| {
                    let mut token = Token::new(kind, Nesting::from_level(level));
                    if let Some((s, e)) = lines {
                        token = token.with_lines(s, e);
                    }
                    token
                })
        }

        proptest! {
            #[test]
            fn buckets_partition_positions(tokens in proptest::collection::vec(arb_token(), 0..200)) {
                let index = build_index(&tokens);
                let mut seen = vec![0u32; tokens.len()];
                for (kind, positions) in index.buckets() {
                    for &pos in positions {
                        prop_assert_eq!(&tokens[pos as usize].kind, kind);
                        seen[pos as usize] += 1;
                    }
                }
                prop_assert!(seen.iter().all(|&c| c == 1));
            }

            #[test]
            fn pairs_are_symmetric(tokens in proptest::collection::vec(arb_token(), 0..200)) {
                let index = build_index(&tokens);
                for pos in 0..tokens.len() as u32 {
                    if let Some(other) = index.pair(pos) {
                        prop_assert_eq!(index.pair(other), Some(pos));
                        prop_assert_eq!(&tokens[pos as usize].kind, &tokens[other as usize].kind);
                    }
                }
            }

            #[test]
            fn parent_table_is_total(tokens in proptest::collection::vec(arb_token(), 0..200)) {
                let index = build_index(&tokens);
                prop_assert_eq!(index.len(), tokens.len());
                for pos in 0..tokens.len() as u32 {
                    match index.parent(pos) {
                        Some(parent) => {
                            prop_assert!(parent < pos);
                            prop_assert!(tokens[parent as usize].is_open());
                        }
                        None => prop_assert!(index.is_top_level(pos)),
                    }
                }
                prop_assert!(index.last_line() <= DEFAULT_MAX_LINE);
            }
        }
    }
}
