//! Engine configuration
//!
//! Every field has a default, so a config can be built from partial JSON:
//!
//! ```json
//! { "profile": "strict", "callback_timeout_ms": 50 }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::index::span::DEFAULT_MAX_LINE;
use crate::index::IndexOptions;
use crate::resource::{SecurityProfile, DEFAULT_MAX_TEXT_BYTES};

/// Default per-callback wall-clock budget
pub const DEFAULT_CALLBACK_TIMEOUT_MS: u64 = 1_000;

/// Configuration for one extraction pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// URL rules and default entry caps.
    pub profile: SecurityProfile,
    /// Abort the pass on the first collector fault or security rejection.
    pub strict: bool,
    /// Per-callback budget. `None` runs callbacks inline without a timeout.
    pub callback_timeout_ms: Option<u64>,
    /// Overrides the profile's per-collector entry cap.
    pub max_entries: Option<usize>,
    /// Ceiling for one accumulated text value (link text, titles).
    pub max_text_bytes: usize,
    /// Line numbers from the tokenizer are clamped to this value.
    pub max_line: u32,
    /// Final line of the document, when the caller knows it.
    pub last_line: Option<u32>,
    /// Wall-clock budget for the whole pass, checked between tokens.
    pub pass_budget_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile: SecurityProfile::default(),
            strict: false,
            callback_timeout_ms: Some(DEFAULT_CALLBACK_TIMEOUT_MS),
            max_entries: None,
            max_text_bytes: DEFAULT_MAX_TEXT_BYTES,
            max_line: DEFAULT_MAX_LINE,
            last_line: None,
            pass_budget_ms: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Config for the given profile with every other field at its default.
    pub fn with_profile(profile: SecurityProfile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.callback_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "callback_timeout_ms",
                reason: "must be positive; omit it to disable the timeout".into(),
            });
        }
        if self.pass_budget_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "pass_budget_ms",
                reason: "must be positive".into(),
            });
        }
        if self.max_text_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_text_bytes",
                reason: "must be positive".into(),
            });
        }
        if self.max_line == 0 {
            return Err(ConfigError::Invalid {
                field: "max_line",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Entry cap each collector starts with.
    pub fn entry_limit(&self) -> usize {
        self.max_entries
            .unwrap_or_else(|| self.profile.max_entries())
    }

    pub fn callback_timeout(&self) -> Option<Duration> {
        self.callback_timeout_ms.map(Duration::from_millis)
    }

    pub fn pass_budget(&self) -> Option<Duration> {
        self.pass_budget_ms.map(Duration::from_millis)
    }

    /// Index build options derived from this config.
    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            max_line: self.max_line,
            last_line: self.last_line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"profile":"strict","callback_timeout_ms":50}"#)
            .unwrap();
        assert_eq!(config.profile, SecurityProfile::Strict);
        assert_eq!(config.callback_timeout(), Some(Duration::from_millis(50)));
        assert_eq!(config.max_text_bytes, DEFAULT_MAX_TEXT_BYTES);
        assert_eq!(config.entry_limit(), 1_000);
    }

    #[test]
    fn test_null_timeout_disables_supervision() {
        let config = EngineConfig::from_json(r#"{"callback_timeout_ms":null}"#).unwrap();
        assert_eq!(config.callback_timeout(), None);
    }

    #[test]
    fn test_max_entries_override() {
        let config = EngineConfig {
            max_entries: Some(3),
            ..EngineConfig::default()
        };
        assert_eq!(config.entry_limit(), 3);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"callback_timeout_ms":0}"#),
            Err(ConfigError::Invalid {
                field: "callback_timeout_ms",
                ..
            })
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"profile":"paranoid"}"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
