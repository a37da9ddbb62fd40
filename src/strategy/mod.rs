//! Execution Strategies
//!
//! How collector callbacks are run:
//! - Inline: on the dispatching thread, panics caught (no timeout)
//! - Supervised: one worker thread per collector driven in lock-step over
//!   channels, each callback bounded by a wall-clock budget
//! - Parallel: many documents at once with Rayon, one engine per document

pub mod inline;
pub mod parallel;
pub mod supervised;

pub use parallel::{extract_batch, extract_batch_with};

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::collect::Collector;
use crate::dispatch::DispatchContext;
use crate::error::DispatchError;
use crate::fault::{FaultKind, SecurityRejection};
use crate::index::Document;
use inline::InlineRunner;
use supervised::SupervisedRunner;

/// Outcome of offering one token to a collector
pub(crate) type Offer = Result<Vec<SecurityRejection>, FaultKind>;

/// A registered collector, ready to receive tokens
pub(crate) enum Runner {
    Inline(InlineRunner),
    Supervised(SupervisedRunner),
}

impl Runner {
    /// Supervised when a budget is given, inline otherwise
    pub(crate) fn start(
        name: String,
        collector: Box<dyn Collector>,
        document: Arc<Document>,
        budget: Option<Duration>,
    ) -> Result<Self, DispatchError> {
        match budget {
            Some(budget) => {
                SupervisedRunner::spawn(name, collector, document, budget).map(Self::Supervised)
            }
            None => Ok(Self::Inline(InlineRunner::new(name, collector, document))),
        }
    }

    pub(crate) fn offer(&mut self, position: u32, ignore_mask: u8) -> Offer {
        match self {
            Self::Inline(runner) => runner.offer(position, ignore_mask),
            Self::Supervised(runner) => runner.offer(position, ignore_mask),
        }
    }

    pub(crate) fn finish(self) -> Result<Value, FaultKind> {
        match self {
            Self::Inline(runner) => runner.finish(),
            Self::Supervised(runner) => runner.finish(),
        }
    }
}

/// Run `should_process` and `on_token` for one token, catching panics
pub(crate) fn invoke(
    collector: &mut dyn Collector,
    document: &Document,
    name: &str,
    position: u32,
    ignore_mask: u8,
) -> Offer {
    let Some(token) = document.token(position) else {
        return Ok(Vec::new());
    };
    let ctx = DispatchContext::new(document, name, position, ignore_mask);
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        if !collector.should_process(&ctx) {
            return Ok(());
        }
        collector.on_token(token, &ctx)
    }));
    match outcome {
        Ok(Ok(())) => Ok(ctx.into_rejections()),
        Ok(Err(e)) => Err(FaultKind::Error {
            message: e.to_string(),
        }),
        Err(payload) => Err(FaultKind::Panic {
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Run `finalize`, catching panics
pub(crate) fn finalize(collector: &mut dyn Collector) -> Result<Value, FaultKind> {
    match catch_unwind(AssertUnwindSafe(|| collector.finalize())) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(FaultKind::Error {
            message: e.to_string(),
        }),
        Err(payload) => Err(FaultKind::Panic {
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload = catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload = catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");
    }
}
