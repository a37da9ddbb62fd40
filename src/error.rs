//! Error types for extraction passes.

use thiserror::Error;

use crate::dispatch::DispatchState;
use crate::fault::Fault;

/// Pass-level errors returned by the dispatch engine
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch already {state}; an engine runs one pass")]
    Reentrant { state: DispatchState },

    #[error("strict mode abort: {fault}")]
    StrictAbort { fault: Box<Fault> },

    #[error("pass cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("collectors cannot be registered once dispatch has started")]
    RegistrationClosed,

    #[error("a collector named '{0}' is already registered")]
    DuplicateCollector(String),

    #[error("failed to start worker for collector '{collector}': {source}")]
    WorkerSpawn {
        collector: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DispatchError {
    /// Returns `true` if the pass was stopped before finishing
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::StrictAbort { .. } | Self::Cancelled { .. })
    }
}

/// Errors returned from collector callbacks
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("{0}")]
    Failed(String),

    #[error("result serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CollectorError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Configuration parsing and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
