//! Resource guards
//!
//! Caps that bound what a single document can make a collector accumulate:
//! security profiles with their per-collector entry limits, the entry cap
//! itself, and a reusable text buffer with a byte ceiling.

use serde::{Deserialize, Serialize};

/// Named bundle of URL rules and per-document caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityProfile {
    Strict,
    #[default]
    Moderate,
    Permissive,
}

impl SecurityProfile {
    /// URL schemes accepted for absolute targets (lower-case)
    pub fn allowed_schemes(self) -> &'static [&'static str] {
        match self {
            Self::Strict => &["https", "mailto"],
            Self::Moderate => &["http", "https", "mailto", "tel"],
            Self::Permissive => &["http", "https", "mailto", "tel", "ftp"],
        }
    }

    /// Whether scheme-less (relative) targets are accepted
    pub fn allows_relative(self) -> bool {
        !matches!(self, Self::Strict)
    }

    /// Default cap on accepted entries per collector per document
    pub fn max_entries(self) -> usize {
        match self {
            Self::Strict => 1_000,
            Self::Moderate => 10_000,
            Self::Permissive => 50_000,
        }
    }
}

impl std::fmt::Display for SecurityProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Moderate => write!(f, "moderate"),
            Self::Permissive => write!(f, "permissive"),
        }
    }
}

/// Hard cap on accumulated entries
///
/// Once an admission is refused the cap stays truncated for the rest of
/// the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryCap {
    limit: usize,
    accepted: usize,
    truncated: bool,
}

impl EntryCap {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            accepted: 0,
            truncated: false,
        }
    }

    /// Claim a slot for one more entry
    pub fn try_admit(&mut self) -> bool {
        if self.truncated {
            return false;
        }
        if self.accepted >= self.limit {
            self.truncated = true;
            tracing::debug!(limit = self.limit, "entry cap reached");
            return false;
        }
        self.accepted += 1;
        true
    }

    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    #[inline]
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Default ceiling for one accumulated text value
pub const DEFAULT_MAX_TEXT_BYTES: usize = 64 * 1024;

/// Reusable text accumulator with a byte ceiling
///
/// Fragments are appended in place and copied out once per entry; the
/// allocation is kept across entries.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    buf: String,
    max_bytes: usize,
    truncated: bool,
}

impl TextBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buf: String::with_capacity(max_bytes.min(256)),
            max_bytes,
            truncated: false,
        }
    }

    /// Append a fragment, cutting at a char boundary when full
    pub fn push(&mut self, fragment: &str) {
        let room = self.max_bytes.saturating_sub(self.buf.len());
        if fragment.len() <= room {
            self.buf.push_str(fragment);
            return;
        }
        let mut end = room;
        while !fragment.is_char_boundary(end) {
            end -= 1;
        }
        self.buf.push_str(&fragment[..end]);
        self.truncated = true;
    }

    /// Copy out the accumulated text and reset for the next entry
    pub fn take(&mut self) -> String {
        let text = self.buf.clone();
        self.clear();
        text
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.truncated = false;
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Whether the current entry lost text to the ceiling
    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TEXT_BYTES)
    }
}
