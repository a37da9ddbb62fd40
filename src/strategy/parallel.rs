//! Parallel Batch Extraction
//!
//! Uses Rayon to run many independent documents at once. Each document gets
//! its own engine and collector set; results come back in input order.

use rayon::prelude::*;

use crate::collect::{default_collectors, Collector};
use crate::config::EngineConfig;
use crate::core::token::Token;
use crate::dispatch::{Engine, PassReport};
use crate::error::DispatchError;

/// Extract every document with the built-in collectors
pub fn extract_batch(
    documents: Vec<Vec<Token>>,
    config: &EngineConfig,
) -> Vec<Result<PassReport, DispatchError>> {
    extract_batch_with(documents, config, default_collectors)
}

/// Extract every document with collectors built by `factory`
///
/// `factory` is called once per document.
pub fn extract_batch_with<F>(
    documents: Vec<Vec<Token>>,
    config: &EngineConfig,
    factory: F,
) -> Vec<Result<PassReport, DispatchError>>
where
    F: Fn(&EngineConfig) -> Vec<Box<dyn Collector>> + Sync,
{
    documents
        .into_par_iter()
        .map(|tokens| {
            let mut engine = Engine::new(tokens, config.clone())?;
            for collector in factory(config) {
                engine.register(collector)?;
            }
            engine.dispatch_all().cloned()
        })
        .collect()
}
