//! RustyExtract - Single-pass structural extraction over tokenized documents
//!
//! Pipeline:
//! 1. Index: one forward pass builds kind buckets, open/close pairs, parents,
//!    code fence ranges and heading sections
//! 2. Dispatch: one more pass routes each token to the collectors interested
//!    in its kind, with faults isolated per collector
//! 3. Report: each collector's JSON result plus every recorded fault
//!
//! Strategies:
//! - Inline callbacks (no timeout)
//! - Supervised callbacks on worker threads (per-callback timeout)
//! - Parallel batches of documents (Rayon)
//!
//! ```no_run
//! use rustyextract::{extract, EngineConfig, Token, TokenKind};
//!
//! let tokens = vec![
//!     Token::open(TokenKind::Paragraph).with_lines(0, 0),
//!     Token::open(TokenKind::Link).with_attr("href", "https://example.com"),
//!     Token::text("example"),
//!     Token::close(TokenKind::Link),
//!     Token::close(TokenKind::Paragraph),
//! ];
//! let report = extract(tokens, &EngineConfig::default()).unwrap();
//! assert_eq!(report.result("links").unwrap()["count"], 1);
//! ```

pub mod collect;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod fault;
pub mod index;
pub mod resource;
pub mod security;
pub mod strategy;

pub use collect::{default_collectors, Collector, Interest};
pub use config::EngineConfig;
pub use crate::core::{context_flags, Nesting, Token, TokenKind};
pub use dispatch::{CancelHandle, DispatchContext, DispatchState, Engine, PassReport, PassStats};
pub use error::{CollectorError, ConfigError, DispatchError};
pub use fault::{CollectorFault, Fault, FaultKind, SecurityRejection, StructuralFault};
pub use index::{Document, IndexOptions, LineSpan, Section};
pub use resource::SecurityProfile;
pub use strategy::{extract_batch, extract_batch_with};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Convenience API
// ============================================================================

/// Index `tokens` and run the built-in collectors over them
pub fn extract(tokens: Vec<Token>, config: &EngineConfig) -> Result<PassReport, DispatchError> {
    let mut engine = Engine::new(tokens, config.clone())?;
    for collector in default_collectors(config) {
        engine.register(collector)?;
    }
    engine.dispatch_all().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::TokenKind as K;

    fn document() -> Vec<Token> {
        vec![
            Token::open(K::Heading).with_depth(1).with_lines(0, 0),
            Token::text("Getting Started"),
            Token::close(K::Heading),
            Token::open(K::Paragraph).with_lines(2, 2),
            Token::open(K::Link).with_attr("href", "https://example.com/a"),
            Token::text("docs"),
            Token::close(K::Link),
            Token::text(" and "),
            Token::open(K::Link).with_attr("href", "javascript:alert(1)"),
            Token::text("bad"),
            Token::close(K::Link),
            Token::close(K::Paragraph),
            Token::open(K::Heading).with_depth(2).with_lines(4, 4),
            Token::text("Install"),
            Token::close(K::Heading),
            Token::leaf(K::Fence)
                .with_lines(5, 7)
                .with_info("sh")
                .with_content("cargo add rustyextract\n"),
            // stray close, recorded as a structural fault
            Token::close(K::BlockQuote),
        ]
    }

    #[test]
    fn test_extract_end_to_end() {
        let report = extract(document(), &EngineConfig::default()).unwrap();

        let links = report.result("links").unwrap();
        assert_eq!(links["count"], 1);
        assert_eq!(links["entries"][0]["target"], "https://example.com/a");
        assert_eq!(links["entries"][0]["section"], 0);

        let headings = report.result("headings").unwrap();
        assert_eq!(headings["entries"][0]["slug"], "getting-started");
        assert_eq!(headings["entries"][1]["depth"], 2);

        let code = report.result("code_blocks").unwrap();
        assert_eq!(code["entries"][0]["language"], "sh");
        assert_eq!(code["entries"][0]["section"], 1);

        let sections = report.result("sections").unwrap();
        assert_eq!(sections["entries"][0]["end_line"], 3);
        assert_eq!(sections["entries"][1]["end_line"], 7);

        assert_eq!(report.rejections().count(), 1);
        assert_eq!(report.structural_faults().count(), 1);
        assert!(report.collector_faults().next().is_none());
    }

    #[test]
    fn test_extract_is_deterministic() {
        let config = EngineConfig {
            callback_timeout_ms: None,
            ..EngineConfig::default()
        };
        let a = extract(document(), &config).unwrap();
        let b = extract(document(), &EngineConfig::default()).unwrap();
        assert_eq!(a.results, b.results);
        assert_eq!(a.faults, b.faults);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            max_text_bytes: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            extract(document(), &config),
            Err(DispatchError::Config(ConfigError::Invalid { .. }))
        ));
    }
}
