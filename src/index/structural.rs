//! Structural Index - Main index structure
//!
//! Per-token tables addressed by token position. All tables are filled in a
//! single forward pass by [`IndexBuilder`](super::builder::IndexBuilder) and
//! are read-only afterwards.

use std::collections::HashMap;

use super::span::LineSpan;
use crate::core::token::TokenKind;
use crate::fault::StructuralFault;

/// Sentinel value for "no token"
pub const NO_TOKEN: u32 = u32::MAX;

/// Longest heading title kept in the index
pub const MAX_TITLE_BYTES: usize = 1024;

/// A fenced or indented code region
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FenceRange {
    /// Position of the opening (or self-contained) token
    pub position: u32,
    pub start_line: u32,
    pub end_line: u32,
    pub info: Option<String>,
}

impl FenceRange {
    #[inline]
    pub fn span(&self) -> LineSpan {
        LineSpan::new(self.start_line, self.end_line)
    }
}

/// The structural index of a token stream
///
/// Memory layout:
/// - `parents`, `pairs`, `lines` hold one entry per token
/// - `by_kind` buckets hold every position exactly once
/// - children are stored flat, referenced by `(start, count)` per token
#[derive(Debug, Default)]
pub struct StructuralIndex {
    /// Token positions grouped by kind, in document order
    pub(crate) by_kind: HashMap<TokenKind, Vec<u32>>,
    /// Matching partner for each token (NO_TOKEN when unmatched or leaf)
    pub(crate) pairs: Vec<u32>,
    /// Nearest enclosing open token (NO_TOKEN at top level)
    pub(crate) parents: Vec<u32>,
    /// Clamped line spans
    pub(crate) lines: Vec<Option<LineSpan>>,
    /// Fenced regions ordered by start line
    pub(crate) fences: Vec<FenceRange>,
    /// Nesting problems found while building
    pub(crate) faults: Vec<StructuralFault>,
    /// (closing position, open position) for ignore regions whose open was
    /// popped by a close of another kind, in stream order
    pub(crate) cut_regions: Vec<(u32, u32)>,
    /// Text-bearing bytes before each position, plus a trailing total
    pub(crate) text_offsets: Vec<usize>,
    /// Heading titles gathered while building, by open position
    pub(crate) titles: HashMap<u32, String>,
    /// (start, count) into children_data for each token
    children_ranges: Vec<(u32, u32)>,
    children_data: Vec<u32>,
    /// Highest clamped line seen
    pub(crate) last_line: u32,
}

impl StructuralIndex {
    /// Create with estimated capacity
    pub fn with_capacity(tokens: usize) -> Self {
        Self {
            by_kind: HashMap::with_capacity(16),
            pairs: Vec::with_capacity(tokens),
            parents: Vec::with_capacity(tokens),
            lines: Vec::with_capacity(tokens),
            fences: Vec::new(),
            faults: Vec::new(),
            cut_regions: Vec::new(),
            text_offsets: Vec::with_capacity(tokens + 1),
            titles: HashMap::new(),
            children_ranges: Vec::new(),
            children_data: Vec::new(),
            last_line: 0,
        }
    }

    /// Number of indexed tokens
    #[inline]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Positions of every token of `kind`, in document order
    #[inline]
    pub fn positions(&self, kind: &TokenKind) -> &[u32] {
        self.by_kind.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over all non-empty kind buckets
    pub fn buckets(&self) -> impl Iterator<Item = (&TokenKind, &[u32])> + '_ {
        self.by_kind.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Matching close for an open token, or open for a close token
    #[inline]
    pub fn pair(&self, pos: u32) -> Option<u32> {
        match self.pairs.get(pos as usize) {
            Some(&p) if p != NO_TOKEN => Some(p),
            _ => None,
        }
    }

    /// Nearest enclosing open token
    #[inline]
    pub fn parent(&self, pos: u32) -> Option<u32> {
        match self.parents.get(pos as usize) {
            Some(&p) if p != NO_TOKEN => Some(p),
            _ => None,
        }
    }

    /// Check whether `pos` is an indexed top-level token
    #[inline]
    pub fn is_top_level(&self, pos: u32) -> bool {
        self.parents.get(pos as usize) == Some(&NO_TOKEN)
    }

    /// Clamped line span of a token
    #[inline]
    pub fn lines(&self, pos: u32) -> Option<LineSpan> {
        self.lines.get(pos as usize).copied().flatten()
    }

    /// Fenced regions in document order
    #[inline]
    pub fn fences(&self) -> &[FenceRange] {
        &self.fences
    }

    /// Fenced region containing `line`
    pub fn fence_at(&self, line: u32) -> Option<&FenceRange> {
        let idx = self.fences.partition_point(|f| f.start_line <= line);
        self.fences[..idx]
            .iter()
            .rev()
            .find(|f| f.span().contains(line))
    }

    /// Nesting problems found while building
    #[inline]
    pub fn faults(&self) -> &[StructuralFault] {
        &self.faults
    }

    /// Open positions of the ignore regions ended early by the close at `pos`
    pub fn regions_cut_at(&self, pos: u32) -> impl Iterator<Item = u32> + '_ {
        let from = self.cut_regions.partition_point(|&(at, _)| at < pos);
        self.cut_regions[from..]
            .iter()
            .take_while(move |&&(at, _)| at == pos)
            .map(|&(_, open)| open)
    }

    /// Bytes of text-bearing content strictly between an open and its close
    ///
    /// Zero for tokens without a later partner.
    pub fn text_len(&self, open: u32) -> usize {
        match self.pair(open) {
            Some(close) if close > open => {
                let from = self.text_offsets.get(open as usize + 1).copied().unwrap_or(0);
                let to = self.text_offsets.get(close as usize).copied().unwrap_or(from);
                to - from
            }
            _ => 0,
        }
    }

    /// Title text of a heading open, trimmed and capped at [`MAX_TITLE_BYTES`]
    #[inline]
    pub fn title(&self, pos: u32) -> Option<&str> {
        self.titles.get(&pos).map(String::as_str)
    }

    /// Highest line number seen in any token
    #[inline]
    pub fn last_line(&self) -> u32 {
        self.last_line
    }

    /// Direct children of a token, in document order
    pub fn children(&self, pos: u32) -> &[u32] {
        match self.children_ranges.get(pos as usize) {
            Some(&(start, count)) => {
                let start = start as usize;
                &self.children_data[start..start + count as usize]
            }
            None => &[],
        }
    }

    /// Release over-allocated capacity
    pub(crate) fn shrink_to_fit(&mut self) {
        self.pairs.shrink_to_fit();
        self.parents.shrink_to_fit();
        self.lines.shrink_to_fit();
        self.fences.shrink_to_fit();
        self.faults.shrink_to_fit();
        self.cut_regions.shrink_to_fit();
        self.text_offsets.shrink_to_fit();
        self.titles.shrink_to_fit();
        for bucket in self.by_kind.values_mut() {
            bucket.shrink_to_fit();
        }
    }

    /// Build children from parent links
    ///
    /// Counting pass, prefix sums, then placement. Positions are visited in
    /// increasing order, so each child list comes out in document order
    /// without sorting.
    pub(crate) fn build_children_from_parents(&mut self) {
        let n = self.parents.len();
        if n == 0 {
            return;
        }

        let mut counts = vec![0u32; n];
        for &parent in &self.parents {
            if parent != NO_TOKEN && (parent as usize) < n {
                counts[parent as usize] += 1;
            }
        }

        let total: u32 = counts.iter().sum();
        self.children_ranges = Vec::with_capacity(n);
        let mut offset = 0u32;
        for &count in &counts {
            self.children_ranges.push((offset, count));
            offset += count;
        }

        self.children_data = vec![NO_TOKEN; total as usize];
        let mut placed = vec![0u32; n];
        for (pos, &parent) in self.parents.iter().enumerate() {
            if parent != NO_TOKEN && (parent as usize) < n {
                let p = parent as usize;
                let slot = self.children_ranges[p].0 + placed[p];
                self.children_data[slot as usize] = pos as u32;
                placed[p] += 1;
            }
        }
    }
}
