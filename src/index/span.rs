//! Line spans
//!
//! Inclusive `(start, end)` line ranges attached to tokens, sections and
//! fenced regions. Every span taken from tokenizer output passes through
//! [`LineSpan::clamped`] before the index uses it, so crafted values such as
//! `u32::MAX` cannot drive allocation or overflow arithmetic downstream.

use serde::{Deserialize, Serialize};

/// Default upper bound for line numbers accepted from a tokenizer.
pub const DEFAULT_MAX_LINE: u32 = 10_000_000;

/// An inclusive range of zero-based line numbers.
///
/// Size: 8 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LineSpan {
    /// First line (inclusive)
    pub start: u32,
    /// Last line (inclusive)
    pub end: u32,
}

impl LineSpan {
    /// Create a span, swapping the bounds if they arrive reversed
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// A span covering a single line
    #[inline]
    pub const fn line(line: u32) -> Self {
        Self {
            start: line,
            end: line,
        }
    }

    /// Clamp both bounds to `max_line`
    #[inline]
    pub fn clamped(self, max_line: u32) -> Self {
        Self::new(self.start.min(max_line), self.end.min(max_line))
    }

    /// Check whether `line` falls inside the span
    #[inline]
    pub const fn contains(&self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }

    /// Number of lines covered, saturating at `u32::MAX`
    ///
    /// Spans that bypassed `new` (deserialized, reversed) count as one line.
    #[inline]
    pub const fn line_count(&self) -> u32 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }
}
