//! Dispatch Engine
//!
//! Walks the token stream once and routes each token to the collectors
//! interested in its kind:
//!
//! ```text
//! Engine
//! ├── Arc<Document>     read-only tokens and indices
//! ├── registry          collectors, in registration order
//! └── dispatch_all()
//!     ├── RoutingTable  kind -> slots, built once
//!     ├── IgnoreTracker active ignore-context bitmask
//!     ├── Runner/slot   inline or supervised callbacks
//!     └── PassReport    results + faults, stored once
//! ```
//!
//! A pass runs at most once per engine. The state moves
//! `NotStarted -> Dispatching -> Finalized`, or to `Aborted` on a strict
//! abort or cancellation; any later call is rejected without touching the
//! stored report.

pub mod context;
pub mod report;
pub mod routing;

pub use context::DispatchContext;
pub use report::{PassReport, PassStats};
pub use routing::{IgnoreTracker, RoutingTable};

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use crate::collect::{Collector, Interest};
use crate::config::EngineConfig;
use crate::core::token::{Nesting, Token};
use crate::error::DispatchError;
use crate::fault::{CollectorFault, Fault, FaultKind};
use crate::index::Document;
use crate::strategy::Runner;

/// Lifecycle of an engine's single pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatchState {
    NotStarted = 0,
    Dispatching = 1,
    Finalized = 2,
    Aborted = 3,
}

impl DispatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Dispatching,
            2 => Self::Finalized,
            _ => Self::Aborted,
        }
    }
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Finalized => write!(f, "finalized"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Cooperative cancellation flag, checked between tokens
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A collector plus its resolved interest
struct Slot {
    name: String,
    interest: Interest,
    /// `None` once the collector has been retired
    runner: Option<Runner>,
}

/// Single-pass extraction engine for one document
pub struct Engine {
    document: Arc<Document>,
    config: EngineConfig,
    registry: Mutex<Vec<Box<dyn Collector>>>,
    state: AtomicU8,
    cancel: CancelHandle,
    report: OnceLock<PassReport>,
}

impl Engine {
    /// Index `tokens` and create an engine with no collectors
    pub fn new(tokens: Vec<Token>, config: EngineConfig) -> Result<Self, DispatchError> {
        config.validate()?;
        let document = Document::build_with(tokens, config.index_options());
        Self::from_document(Arc::new(document), config)
    }

    /// Engine over an already indexed document
    ///
    /// The config's index options are not applied; the document was built
    /// with its own.
    pub fn from_document(document: Arc<Document>, config: EngineConfig) -> Result<Self, DispatchError> {
        config.validate()?;
        Ok(Self {
            document,
            config,
            registry: Mutex::new(Vec::new()),
            state: AtomicU8::new(DispatchState::NotStarted as u8),
            cancel: CancelHandle::new(),
            report: OnceLock::new(),
        })
    }

    /// Add a collector; names must be unique
    pub fn register(&mut self, collector: Box<dyn Collector>) -> Result<(), DispatchError> {
        if self.state() != DispatchState::NotStarted {
            return Err(DispatchError::RegistrationClosed);
        }
        let registry = self
            .registry
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if registry.iter().any(|c| c.name() == collector.name()) {
            return Err(DispatchError::DuplicateCollector(collector.name().to_string()));
        }
        registry.push(collector);
        Ok(())
    }

    #[inline]
    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> DispatchState {
        DispatchState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Handle that cancels the pass from any thread
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Report of the finished pass, if it finished
    #[inline]
    pub fn report(&self) -> Option<&PassReport> {
        self.report.get()
    }

    /// Run the single pass
    ///
    /// Fails with `Reentrant` if a pass is running or has already ended.
    pub fn dispatch_all(&self) -> Result<&PassReport, DispatchError> {
        if let Err(current) = self.state.compare_exchange(
            DispatchState::NotStarted as u8,
            DispatchState::Dispatching as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(DispatchError::Reentrant {
                state: DispatchState::from_u8(current),
            });
        }

        // teardown: the registry is emptied for good
        let collectors = std::mem::take(
            &mut *self.registry.lock().unwrap_or_else(PoisonError::into_inner),
        );

        match self.run(collectors) {
            Ok(report) => {
                let report = self.report.get_or_init(|| report);
                self.state
                    .store(DispatchState::Finalized as u8, Ordering::Release);
                Ok(report)
            }
            Err(e) => {
                self.state
                    .store(DispatchState::Aborted as u8, Ordering::Release);
                if let DispatchError::Cancelled { reason } = &e {
                    tracing::warn!(%reason, "pass cancelled");
                }
                Err(e)
            }
        }
    }

    fn run(&self, collectors: Vec<Box<dyn Collector>>) -> Result<PassReport, DispatchError> {
        let started = Instant::now();
        let deadline = self.config.pass_budget().map(|budget| started + budget);
        let budget = self.config.callback_timeout();

        let mut slots = Vec::with_capacity(collectors.len());
        for collector in collectors {
            let name = collector.name().to_string();
            let interest = collector.interest();
            let runner = Runner::start(name.clone(), collector, Arc::clone(&self.document), budget)?;
            slots.push(Slot {
                name,
                interest,
                runner: Some(runner),
            });
        }

        let interests: Vec<Interest> = slots.iter().map(|s| s.interest.clone()).collect();
        let mut routing = RoutingTable::build(&interests);
        let mut tracker = IgnoreTracker::new();
        let mut report = PassReport::default();

        // structural faults are recorded but never escalate
        report.faults.extend(
            self.document
                .index()
                .faults()
                .iter()
                .cloned()
                .map(Fault::Structural),
        );

        for (pos, token) in self.document.tokens().iter().enumerate() {
            self.check_cancelled(deadline)?;
            let pos = pos as u32;

            tracker.enter(token);
            let mask = tracker.mask();
            for &idx in routing.route(&token.kind) {
                let slot = &mut slots[idx];
                if slot.interest.ignore & mask != 0 {
                    continue;
                }
                let Some(runner) = slot.runner.as_mut() else {
                    continue;
                };
                report.stats.callbacks += 1;
                match runner.offer(pos, mask) {
                    Ok(rejections) => {
                        for rejection in rejections {
                            tracing::warn!(
                                collector = %rejection.collector,
                                position = rejection.position,
                                reason = %rejection.reason,
                                "target rejected"
                            );
                            self.record(&mut report, Fault::SecurityRejection(rejection))?;
                        }
                    }
                    Err(kind) => {
                        slot.runner = None;
                        report.stats.retired += 1;
                        self.collector_fault(&mut report, &slot.name, Some(pos), kind)?;
                    }
                }
            }
            let matched = token.nesting != Nesting::Close || self.document.pair(pos).is_some();
            tracker.leave(token, matched);
            for open in self.document.index().regions_cut_at(pos) {
                if let Some(cut) = self.document.token(open) {
                    tracker.cut(&cut.kind);
                }
            }
            report.stats.tokens += 1;
        }

        self.check_cancelled(deadline)?;
        routing.clear();

        for slot in slots {
            let Some(runner) = slot.runner else {
                continue;
            };
            match runner.finish() {
                Ok(value) => {
                    report.results.insert(slot.name, value);
                }
                Err(kind) => {
                    report.stats.retired += 1;
                    self.collector_fault(&mut report, &slot.name, None, kind)?;
                }
            }
        }

        report.stats.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            tokens = report.stats.tokens,
            callbacks = report.stats.callbacks,
            collectors = report.results.len(),
            faults = report.faults.len(),
            elapsed_ms = report.stats.elapsed_ms,
            "pass finished"
        );
        Ok(report)
    }

    fn check_cancelled(&self, deadline: Option<Instant>) -> Result<(), DispatchError> {
        if self.cancel.is_cancelled() {
            return Err(DispatchError::Cancelled {
                reason: "cancelled by caller".to_string(),
            });
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(DispatchError::Cancelled {
                reason: format!(
                    "pass budget of {}ms exceeded",
                    self.config.pass_budget_ms.unwrap_or_default()
                ),
            });
        }
        Ok(())
    }

    fn collector_fault(
        &self,
        report: &mut PassReport,
        collector: &str,
        position: Option<u32>,
        kind: FaultKind,
    ) -> Result<(), DispatchError> {
        tracing::warn!(collector, ?position, fault = %kind, "collector retired");
        self.record(
            report,
            Fault::Collector(CollectorFault {
                collector: collector.to_string(),
                position,
                kind,
            }),
        )
    }

    /// Append a fault, or abort the pass with it under strict mode
    fn record(&self, report: &mut PassReport, fault: Fault) -> Result<(), DispatchError> {
        if self.config.strict {
            return Err(DispatchError::StrictAbort {
                fault: Box::new(fault),
            });
        }
        report.faults.push(fault);
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("tokens", &self.document.len())
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}
