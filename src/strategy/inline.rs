//! Inline Strategy
//!
//! Callbacks run on the dispatching thread. Errors and panics are isolated;
//! a callback that never returns blocks the pass, so this strategy is only
//! used when no callback budget is configured.

use std::sync::Arc;

use serde_json::Value;

use super::Offer;
use crate::collect::Collector;
use crate::fault::FaultKind;
use crate::index::Document;

pub struct InlineRunner {
    name: String,
    collector: Box<dyn Collector>,
    document: Arc<Document>,
}

impl InlineRunner {
    pub fn new(name: String, collector: Box<dyn Collector>, document: Arc<Document>) -> Self {
        Self {
            name,
            collector,
            document,
        }
    }

    pub(crate) fn offer(&mut self, position: u32, ignore_mask: u8) -> Offer {
        super::invoke(
            self.collector.as_mut(),
            &self.document,
            &self.name,
            position,
            ignore_mask,
        )
    }

    pub(crate) fn finish(mut self) -> Result<Value, FaultKind> {
        super::finalize(self.collector.as_mut())
    }
}
