//! Security validators
//!
//! Fail-closed validation for values that leave the engine and reach
//! downstream consumers, currently link and image targets.

pub mod url;

pub use self::url::{RejectReason, UrlPolicy, UrlValidator, ValidTarget, MAX_TARGET_BYTES};
