//! Pass Report
//!
//! The immutable outcome of one dispatch pass: each collector's finalized
//! result keyed by name, and every fault in the order it occurred.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::fault::{CollectorFault, Fault, SecurityRejection, StructuralFault};

/// Counters for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    /// Tokens walked
    pub tokens: usize,
    /// Collector callbacks invoked
    pub callbacks: usize,
    /// Collectors excluded after a fault
    pub retired: usize,
    pub elapsed_ms: u64,
}

/// Results and faults of a finished pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassReport {
    pub results: BTreeMap<String, Value>,
    pub faults: Vec<Fault>,
    pub stats: PassStats,
}

impl PassReport {
    /// Finalized result of the named collector
    #[inline]
    pub fn result(&self, collector: &str) -> Option<&Value> {
        self.results.get(collector)
    }

    pub fn structural_faults(&self) -> impl Iterator<Item = &StructuralFault> {
        self.faults.iter().filter_map(|f| match f {
            Fault::Structural(s) => Some(s),
            _ => None,
        })
    }

    pub fn collector_faults(&self) -> impl Iterator<Item = &CollectorFault> {
        self.faults.iter().filter_map(|f| match f {
            Fault::Collector(c) => Some(c),
            _ => None,
        })
    }

    pub fn rejections(&self) -> impl Iterator<Item = &SecurityRejection> {
        self.faults.iter().filter_map(|f| match f {
            Fault::SecurityRejection(r) => Some(r),
            _ => None,
        })
    }

    #[inline]
    pub fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::TokenKind;
    use crate::fault::{FaultKind, NestingProblem};
    use crate::security::RejectReason;

    #[test]
    fn test_fault_views() {
        let report = PassReport {
            results: BTreeMap::from([("links".to_string(), serde_json::json!({"count": 0}))]),
            faults: vec![
                Fault::Structural(StructuralFault {
                    position: 0,
                    kind: TokenKind::Paragraph,
                    problem: NestingProblem::UnmatchedOpen,
                }),
                Fault::SecurityRejection(SecurityRejection::new(
                    "links",
                    3,
                    "javascript:x",
                    RejectReason::DisallowedScheme {
                        scheme: "javascript".into(),
                    },
                )),
                Fault::Collector(CollectorFault {
                    collector: "headings".into(),
                    position: None,
                    kind: FaultKind::Error {
                        message: "x".into(),
                    },
                }),
            ],
            stats: PassStats::default(),
        };

        assert_eq!(report.structural_faults().count(), 1);
        assert_eq!(report.rejections().count(), 1);
        assert_eq!(report.collector_faults().next().map(|c| c.collector.as_str()), Some("headings"));
        assert_eq!(report.result("links").map(|v| v["count"].clone()), Some(0.into()));

        let json: Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["faults"][1]["type"], "security_rejection");
        assert_eq!(json["faults"][1]["reason"]["reason"], "disallowed_scheme");
    }
}
