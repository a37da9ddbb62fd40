//! Fault records
//!
//! Everything that goes wrong during a pass without stopping it ends up here:
//! nesting problems found while indexing, collectors that fail or overrun
//! their budget, and targets rejected by the URL validator. Faults are
//! collected into the pass report in the order they occur.

use serde::Serialize;

use crate::core::token::TokenKind;
use crate::security::RejectReason;

/// Longest target echoed back in a rejection record
const MAX_ECHOED_TARGET: usize = 256;

/// A non-fatal problem recorded during a pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fault {
    Structural(StructuralFault),
    Collector(CollectorFault),
    SecurityRejection(SecurityRejection),
}

impl Fault {
    /// Collector the fault is attributed to, if any
    pub fn collector(&self) -> Option<&str> {
        match self {
            Self::Structural(_) => None,
            Self::Collector(f) => Some(&f.collector),
            Self::SecurityRejection(r) => Some(&r.collector),
        }
    }

    /// Token position the fault is attributed to, if any
    pub fn position(&self) -> Option<u32> {
        match self {
            Self::Structural(f) => Some(f.position),
            Self::Collector(f) => f.position,
            Self::SecurityRejection(r) => Some(r.position),
        }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structural(s) => write!(
                f,
                "{} {} at token {}",
                s.problem, s.kind, s.position
            ),
            Self::Collector(c) => match c.position {
                Some(pos) => write!(f, "collector '{}' {} at token {}", c.collector, c.kind, pos),
                None => write!(f, "collector '{}' {} during finalize", c.collector, c.kind),
            },
            Self::SecurityRejection(r) => write!(
                f,
                "collector '{}' rejected target at token {}: {}",
                r.collector, r.position, r.reason
            ),
        }
    }
}

/// Which side of a pair is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NestingProblem {
    UnmatchedOpen,
    UnmatchedClose,
}

impl std::fmt::Display for NestingProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnmatchedOpen => write!(f, "unmatched open"),
            Self::UnmatchedClose => write!(f, "unmatched close"),
        }
    }
}

/// Unmatched open or close token, tolerated by the index builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuralFault {
    pub position: u32,
    pub kind: TokenKind,
    pub problem: NestingProblem,
}

/// How a collector callback failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaultKind {
    /// The callback returned an error
    Error { message: String },
    /// The callback panicked
    Panic { message: String },
    /// The callback did not return within its budget
    Timeout { budget_ms: u64 },
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error { message } => write!(f, "failed: {}", message),
            Self::Panic { message } => write!(f, "panicked: {}", message),
            Self::Timeout { budget_ms } => write!(f, "exceeded its {}ms budget", budget_ms),
        }
    }
}

/// Failure isolated to one collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectorFault {
    pub collector: String,
    /// Token being dispatched, `None` when the failure happened in finalize
    pub position: Option<u32>,
    pub kind: FaultKind,
}

/// Target dropped by the URL validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityRejection {
    pub collector: String,
    pub position: u32,
    /// Offending target, shortened for reporting
    pub target: String,
    pub reason: RejectReason,
}

impl SecurityRejection {
    pub fn new(collector: &str, position: u32, target: &str, reason: RejectReason) -> Self {
        Self {
            collector: collector.to_string(),
            position,
            target: shorten(target, MAX_ECHOED_TARGET),
            reason,
        }
    }
}

/// Cut `s` to at most `max` bytes on a char boundary
pub(crate) fn shorten(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
