//! Section Index
//!
//! Heading-rooted line ranges with binary-search lookup.
//!
//! A section runs from its heading line up to the line before the next
//! heading of any depth, so ranges never overlap. Each section also keeps a
//! `scope_end`: the line before the next heading of equal or shallower depth,
//! i.e. the extent of the heading together with its subsections. Scope ends
//! and parent links come from a depth stack, and titles were gathered by the
//! index builder, which keeps the build O(H) for H headings.

use serde::Serialize;

use super::structural::{StructuralIndex, MAX_TITLE_BYTES};
use crate::core::token::{Nesting, Token, TokenKind};
use crate::fault::shorten;

/// A heading-rooted line range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Heading depth (1..=6)
    pub depth: u8,
    pub start_line: u32,
    /// Last line before the next heading (inclusive)
    pub end_line: u32,
    /// Last line before the next heading of equal or shallower depth
    pub scope_end: u32,
    pub title: String,
    /// Position of the heading token
    pub position: u32,
    /// Index of the nearest shallower section
    pub parent: Option<usize>,
}

impl Section {
    #[inline]
    pub fn contains(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// Sorted, non-overlapping section ranges
#[derive(Debug, Default, Clone)]
pub struct SectionIndex {
    sections: Vec<Section>,
    /// Start lines, parallel to `sections`, for binary search
    starts: Vec<u32>,
}

impl SectionIndex {
    /// Build from the heading bucket of an already built structural index
    ///
    /// `last_line` closes the sections still open at end of stream.
    pub fn build(tokens: &[Token], index: &StructuralIndex, last_line: u32) -> Self {
        let headings = index.positions(&TokenKind::Heading);
        let mut sections: Vec<Section> = Vec::with_capacity(headings.len() / 2 + 1);
        let mut open: Vec<usize> = Vec::with_capacity(6);

        for &pos in headings {
            let token = &tokens[pos as usize];
            if token.nesting == Nesting::Close {
                continue;
            }
            let Some(span) = index.lines(pos) else {
                tracing::debug!(position = pos, "heading without line span skipped");
                continue;
            };
            let start = span.start;

            if let Some(prev) = sections.last_mut() {
                if start <= prev.start_line {
                    tracing::debug!(
                        position = pos,
                        line = start,
                        "heading out of line order skipped"
                    );
                    continue;
                }
                prev.end_line = start - 1;
            }

            let depth = token.heading_depth();
            while let Some(&top) = open.last() {
                if sections[top].depth < depth {
                    break;
                }
                let section = &mut sections[top];
                section.scope_end = (start - 1).max(section.start_line);
                open.pop();
            }

            let end = last_line.max(start);
            sections.push(Section {
                depth,
                start_line: start,
                end_line: end,
                scope_end: end,
                title: heading_title(tokens, index, pos),
                position: pos,
                parent: open.last().copied(),
            });
            open.push(sections.len() - 1);
        }

        let starts = sections.iter().map(|s| s.start_line).collect();
        Self { sections, starts }
    }

    /// All sections ordered by start line
    #[inline]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Section> {
        self.sections.get(idx)
    }

    /// Index of the section containing `line`
    ///
    /// `None` before the first heading and past the last line.
    pub fn index_of(&self, line: u32) -> Option<usize> {
        let idx = self.starts.partition_point(|&start| start <= line);
        if idx == 0 {
            return None;
        }
        let candidate = idx - 1;
        self.sections[candidate]
            .contains(line)
            .then_some(candidate)
    }

    /// Section containing `line`
    #[inline]
    pub fn section_of(&self, line: u32) -> Option<&Section> {
        self.index_of(line).map(|idx| &self.sections[idx])
    }

    /// Heading trail from the outermost section down to the one containing `line`
    pub fn path(&self, line: u32) -> Vec<&Section> {
        let mut trail = Vec::new();
        let mut next = self.index_of(line);
        while let Some(idx) = next {
            let section = &self.sections[idx];
            trail.push(section);
            next = section.parent;
        }
        trail.reverse();
        trail
    }
}

/// Title gathered by the index builder, else the heading token's own content
pub(crate) fn heading_title(tokens: &[Token], index: &StructuralIndex, pos: u32) -> String {
    match index.title(pos) {
        Some(title) => title.to_string(),
        None => tokens
            .get(pos as usize)
            .map(|token| shorten(token.content_str().trim(), MAX_TITLE_BYTES))
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::TokenKind as K;
    use crate::index::builder::build_index;

    fn heading(depth: u8, line: u32, title: &str) -> Vec<Token> {
        vec![
            Token::open(K::Heading).with_depth(depth).with_lines(line, line),
            Token::text(title),
            Token::close(K::Heading),
        ]
    }

    fn sample() -> (Vec<Token>, SectionIndex) {
        let mut tokens = Vec::new();
        tokens.extend(heading(1, 0, "Intro"));
        tokens.extend(heading(2, 5, "Setup"));
        tokens.extend(heading(2, 10, "Usage"));
        tokens.extend(heading(1, 20, "Reference"));
        tokens.push(Token::leaf(K::Rule).with_lines(30, 30));
        let index = build_index(&tokens);
        let sections = SectionIndex::build(&tokens, &index, index.last_line());
        (tokens, sections)
    }

    #[test]
    fn test_ranges_follow_next_heading() {
        let (_, sections) = sample();
        let ranges: Vec<_> = sections
            .sections()
            .iter()
            .map(|s| (s.depth, s.start_line, s.end_line))
            .collect();
        assert_eq!(ranges, vec![(1, 0, 4), (2, 5, 9), (2, 10, 19), (1, 20, 30)]);
    }

    #[test]
    fn test_scope_and_parents() {
        let (_, sections) = sample();
        let s = sections.sections();
        assert_eq!(s[0].scope_end, 19);
        assert_eq!(s[1].scope_end, 9);
        assert_eq!(s[2].scope_end, 19);
        assert_eq!(s[3].scope_end, 30);
        assert_eq!(s[0].parent, None);
        assert_eq!(s[1].parent, Some(0));
        assert_eq!(s[2].parent, Some(0));
        assert_eq!(s[3].parent, None);
        assert_eq!(s[2].title, "Usage");
    }

    #[test]
    fn test_ranges_cover_document_without_overlap() {
        let (_, sections) = sample();
        let s = sections.sections();
        assert_eq!(s[0].start_line, 0);
        for pair in s.windows(2) {
            assert_eq!(pair[0].end_line + 1, pair[1].start_line);
        }
        assert_eq!(s[s.len() - 1].end_line, 30);
    }

    #[test]
    fn test_section_of_boundaries() {
        let (_, sections) = sample();
        assert_eq!(sections.index_of(4), Some(0));
        assert_eq!(sections.index_of(5), Some(1));
        assert_eq!(sections.index_of(9), Some(1));
        assert_eq!(sections.index_of(10), Some(2));
        assert_eq!(sections.index_of(30), Some(3));
        assert_eq!(sections.index_of(31), None);
    }

    #[test]
    fn test_line_before_first_heading() {
        let mut tokens = vec![Token::open(K::Paragraph).with_lines(0, 2), Token::close(K::Paragraph)];
        tokens.extend(heading(1, 3, "Late"));
        let index = build_index(&tokens);
        let sections = SectionIndex::build(&tokens, &index, 8);

        assert!(sections.section_of(0).is_none());
        assert!(sections.section_of(2).is_none());
        assert_eq!(sections.section_of(3).map(|s| s.title.as_str()), Some("Late"));
        assert_eq!(sections.section_of(8).map(|s| s.end_line), Some(8));
    }

    #[test]
    fn test_path_to_nested_line() {
        let (_, sections) = sample();
        let trail: Vec<_> = sections.path(12).iter().map(|s| s.title.as_str()).collect();
        assert_eq!(trail, vec!["Intro", "Usage"]);
        assert!(sections.path(31).is_empty());
    }

    #[test]
    fn test_out_of_order_heading_is_skipped() {
        let mut tokens = heading(1, 10, "Second");
        tokens.extend(heading(1, 4, "Earlier"));
        let index = build_index(&tokens);
        let sections = SectionIndex::build(&tokens, &index, 20);

        assert_eq!(sections.len(), 1);
        assert_eq!(sections.sections()[0].end_line, 20);
    }

    #[test]
    fn test_nested_headings_build_in_linear_time() {
        let count = 20_000u32;
        let mut tokens = Vec::with_capacity(count as usize * 2);
        for line in 0..count {
            tokens.push(Token::open(K::Heading).with_depth(1).with_lines(line, line));
        }
        for _ in 0..count {
            tokens.push(Token::close(K::Heading));
        }
        let index = build_index(&tokens);

        let started = std::time::Instant::now();
        let sections = SectionIndex::build(&tokens, &index, index.last_line());
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert_eq!(sections.len(), count as usize);
        assert!(sections.sections().iter().all(|s| s.title.is_empty()));
    }

    #[test]
    fn test_no_headings() {
        let tokens = vec![Token::text("plain").with_lines(0, 3)];
        let index = build_index(&tokens);
        let sections = SectionIndex::build(&tokens, &index, index.last_line());
        assert!(sections.is_empty());
        assert!(sections.section_of(0).is_none());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sections_are_sorted_and_disjoint(
                headings in proptest::collection::vec((1u8..=6, 0u32..500), 0..60)
            ) {
                let mut tokens = Vec::new();
                for (depth, line) in &headings {
                    tokens.extend(heading(*depth, *line, "h"));
                }
                let index = build_index(&tokens);
                let last = index.last_line();
                let sections = SectionIndex::build(&tokens, &index, last);

                for s in sections.sections() {
                    prop_assert!(s.start_line <= s.end_line);
                    prop_assert!(s.end_line <= s.scope_end);
                    prop_assert!(s.scope_end <= last);
                    prop_assert_eq!(sections.section_of(s.start_line), Some(s));
                    if let Some(parent) = s.parent {
                        prop_assert!(sections.sections()[parent].depth < s.depth);
                    }
                }
                for pair in sections.sections().windows(2) {
                    prop_assert_eq!(pair[0].end_line + 1, pair[1].start_line);
                }
            }
        }
    }
}
