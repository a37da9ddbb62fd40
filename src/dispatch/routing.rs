//! Routing and ignore tracking
//!
//! Interests are resolved once into a kind → slots table, so the per-token
//! cost is one hash lookup plus the interested collectors. Ignore regions
//! are tracked with a counter per context bit: nested regions of the same
//! kind keep the bit set until the outermost one closes.

use std::collections::HashMap;

use crate::collect::Interest;
use crate::core::token::{Nesting, Token, TokenKind};

/// kind → collector slots, in registration order
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: HashMap<TokenKind, Vec<usize>>,
}

impl RoutingTable {
    /// Build from the interests of every registered collector
    ///
    /// Slot numbers are the positions in `interests`.
    pub fn build(interests: &[Interest]) -> Self {
        let mut routes: HashMap<TokenKind, Vec<usize>> = HashMap::new();
        for (slot, interest) in interests.iter().enumerate() {
            for kind in &interest.kinds {
                let slots = routes.entry(kind.clone()).or_default();
                // a collector listing a kind twice is still called once
                if slots.last() != Some(&slot) {
                    slots.push(slot);
                }
            }
        }
        tracing::debug!(
            kinds = routes.len(),
            collectors = interests.len(),
            "routing table built"
        );
        Self { routes }
    }

    /// Slots interested in `kind`
    #[inline]
    pub fn route(&self, kind: &TokenKind) -> &[usize] {
        self.routes.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }
}

/// Active ignore-context bitmask
#[derive(Debug, Default, Clone)]
pub struct IgnoreTracker {
    depth: [u32; 8],
    mask: u8,
}

impl IgnoreTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Set bits for a region opened by `token`, before it is dispatched
    ///
    /// Self-contained region tokens set their bits for that token only.
    #[inline]
    pub fn enter(&mut self, token: &Token) {
        let flag = token.kind.context_flag();
        if flag == 0 || token.nesting == Nesting::Close {
            return;
        }
        for bit in 0..8 {
            if flag & (1 << bit) != 0 {
                self.depth[bit] += 1;
            }
        }
        self.mask |= flag;
    }

    /// Clear bits for a region closed by `token`, after it is dispatched
    ///
    /// `matched` is false for close tokens without an open partner, which
    /// must not end a region they never started.
    #[inline]
    pub fn leave(&mut self, token: &Token, matched: bool) {
        let flag = token.kind.context_flag();
        if flag == 0 || token.nesting == Nesting::Open {
            return;
        }
        if token.nesting == Nesting::Close && !matched {
            return;
        }
        self.release(flag);
    }

    /// Clear bits for a region whose open was popped by a close of another
    /// kind; its own close, if any, arrives unmatched later
    #[inline]
    pub fn cut(&mut self, kind: &TokenKind) {
        self.release(kind.context_flag());
    }

    fn release(&mut self, flag: u8) {
        for bit in 0..8 {
            if flag & (1 << bit) != 0 {
                self.depth[bit] = self.depth[bit].saturating_sub(1);
                if self.depth[bit] == 0 {
                    self.mask &= !(1 << bit);
                }
            }
        }
    }
}
