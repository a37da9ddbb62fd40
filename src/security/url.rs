//! Target validation
//!
//! Fail-closed checks for link and image targets. Anything that cannot be
//! classified with certainty is rejected: a dangerous target admitted into
//! downstream automated consumers costs more than a benign one dropped.
//!
//! Order of checks:
//! 1. trim surrounding whitespace; reject empty or oversized values
//! 2. reject control characters and embedded whitespace
//! 3. reject protocol-relative forms (`//host`, `\\host`, `/\host`, `\/host`)
//! 4. split off the scheme (text before a `:` that precedes `/`, `?`, `#`)
//! 5. scheme present: must be a well-formed token on the allow-list, and
//!    absolute network URLs must parse with a host
//! 6. no scheme: relative, accepted only when the policy allows it

use std::num::NonZeroUsize;

use lru::LruCache;
use memchr::{memchr, memchr3};
use serde::Serialize;

use crate::resource::SecurityProfile;

/// Targets longer than this are rejected outright
pub const MAX_TARGET_BYTES: usize = 8 * 1024;

/// Verdict cache size per validator
const CACHE_CAPACITY: usize = 256;

/// Targets longer than this are validated but not cached
const MAX_CACHED_BYTES: usize = 2 * 1024;

/// Schemes whose targets must carry a host
const NETWORK_SCHEMES: &[&str] = &["http", "https", "ftp"];

/// Why a target was rejected
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    Empty,
    TooLong { bytes: usize },
    ControlCharacter,
    ProtocolRelative,
    MalformedScheme,
    DisallowedScheme { scheme: String },
    RelativeNotAllowed,
    Unparseable { detail: String },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty target"),
            Self::TooLong { bytes } => write!(f, "target too long ({} bytes)", bytes),
            Self::ControlCharacter => write!(f, "control character or embedded whitespace"),
            Self::ProtocolRelative => write!(f, "protocol-relative target"),
            Self::MalformedScheme => write!(f, "malformed scheme"),
            Self::DisallowedScheme { scheme } => write!(f, "scheme '{}' not allowed", scheme),
            Self::RelativeNotAllowed => write!(f, "relative target not allowed"),
            Self::Unparseable { detail } => write!(f, "unparseable target: {}", detail),
        }
    }
}

/// An accepted target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidTarget {
    /// Trimmed target
    pub target: String,
    /// Lower-cased scheme, `None` for relative targets
    pub scheme: Option<String>,
}

impl ValidTarget {
    #[inline]
    pub fn is_relative(&self) -> bool {
        self.scheme.is_none()
    }
}

/// Scheme allow-list and relative-target rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPolicy {
    schemes: Vec<String>,
    allow_relative: bool,
}

impl UrlPolicy {
    pub fn new<I, S>(schemes: I, allow_relative: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            schemes: schemes
                .into_iter()
                .map(|s| s.as_ref().to_ascii_lowercase())
                .collect(),
            allow_relative,
        }
    }

    pub fn from_profile(profile: SecurityProfile) -> Self {
        Self::new(profile.allowed_schemes().iter(), profile.allows_relative())
    }

    #[inline]
    pub fn allows_scheme(&self, scheme: &str) -> bool {
        self.schemes.iter().any(|s| s == scheme)
    }

    #[inline]
    pub fn allows_relative(&self) -> bool {
        self.allow_relative
    }

    /// Validate one target against this policy
    pub fn check(&self, raw: &str) -> Result<ValidTarget, RejectReason> {
        let target = raw.trim();
        if target.is_empty() {
            return Err(RejectReason::Empty);
        }
        if target.len() > MAX_TARGET_BYTES {
            return Err(RejectReason::TooLong {
                bytes: target.len(),
            });
        }
        if target.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(RejectReason::ControlCharacter);
        }
        if is_protocol_relative(target) {
            return Err(RejectReason::ProtocolRelative);
        }

        let bytes = target.as_bytes();
        let scheme_end = memchr(b':', bytes)
            .filter(|&colon| memchr3(b'/', b'?', b'#', &bytes[..colon]).is_none());

        let Some(colon) = scheme_end else {
            return if self.allow_relative {
                Ok(ValidTarget {
                    target: target.to_string(),
                    scheme: None,
                })
            } else {
                Err(RejectReason::RelativeNotAllowed)
            };
        };

        let candidate = &target[..colon];
        if !is_scheme_token(candidate) {
            return Err(RejectReason::MalformedScheme);
        }
        let scheme = candidate.to_ascii_lowercase();
        if !self.allows_scheme(&scheme) {
            return Err(RejectReason::DisallowedScheme { scheme });
        }

        let parsed = ::url::Url::parse(target).map_err(|e| RejectReason::Unparseable {
            detail: e.to_string(),
        })?;
        if NETWORK_SCHEMES.contains(&scheme.as_str())
            && parsed.host_str().map_or(true, str::is_empty)
        {
            return Err(RejectReason::Unparseable {
                detail: "missing host".to_string(),
            });
        }

        Ok(ValidTarget {
            target: target.to_string(),
            scheme: Some(scheme),
        })
    }
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self::from_profile(SecurityProfile::default())
    }
}

/// `//host` and the backslash spellings browsers normalize to it
fn is_protocol_relative(target: &str) -> bool {
    let bytes = target.as_bytes();
    matches!(
        (bytes.first(), bytes.get(1)),
        (Some(b'/' | b'\\'), Some(b'/' | b'\\'))
    )
}

/// RFC 3986 scheme: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn is_scheme_token(candidate: &str) -> bool {
    let mut bytes = candidate.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
}

/// Policy plus a bounded verdict cache
///
/// Documents repeat the same targets often; the cache keeps repeated
/// validation cheap while bounding memory.
pub struct UrlValidator {
    policy: UrlPolicy,
    cache: LruCache<String, Result<ValidTarget, RejectReason>>,
}

impl UrlValidator {
    pub fn new(policy: UrlPolicy) -> Self {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            policy,
            cache: LruCache::new(capacity),
        }
    }

    pub fn from_profile(profile: SecurityProfile) -> Self {
        Self::new(UrlPolicy::from_profile(profile))
    }

    #[inline]
    pub fn policy(&self) -> &UrlPolicy {
        &self.policy
    }

    /// Validate `raw`, consulting the cache first
    pub fn validate(&mut self, raw: &str) -> Result<ValidTarget, RejectReason> {
        if raw.len() > MAX_CACHED_BYTES {
            return self.policy.check(raw);
        }
        if let Some(verdict) = self.cache.get(raw) {
            return verdict.clone();
        }
        let verdict = self.policy.check(raw);
        self.cache.put(raw.to_string(), verdict.clone());
        verdict
    }
}

impl std::fmt::Debug for UrlValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlValidator")
            .field("policy", &self.policy)
            .field("cached", &self.cache.len())
            .finish()
    }
}
