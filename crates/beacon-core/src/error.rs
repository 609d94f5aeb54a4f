//! Error types for the beacon ranging engine.
//!
//! Two layers of errors exist:
//!
//! - [`RangingError`] is the runtime failure observed while ranging. It is
//!   cheap to clone and is what the registry keeps in its `last_error` slot,
//!   so observers can display it next to the detected set.
//! - [`BeaconError`] is the unified error returned by fallible calls
//!   (constraint construction, controller transitions, starting a source).
//!
//! # Example
//!
//! ```rust
//! use beacon_core::error::{BeaconError, Result};
//! use beacon_core::IdentityConstraint;
//!
//! fn parse() -> Result<IdentityConstraint> {
//!     IdentityConstraint::parse("not-a-uuid", 1, 2)
//! }
//!
//! assert!(matches!(parse(), Err(BeaconError::InvalidConstraint { .. })));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controller::ControllerState;

/// A failure observed while ranging.
///
/// These never abort the controller. They are recorded into the registry and
/// surfaced through the snapshot until something overwrites them.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RangingError {
    /// The platform refused ranging authorization. Ranging never begins.
    #[error("Ranging authorization was denied. Grant location access to enable beacon ranging.")]
    AuthorizationDenied,

    /// The ranging source reported a failure.
    #[error("Ranging source failure: {0}")]
    SourceFailure(String),
}

impl RangingError {
    /// Convenience constructor for [`RangingError::SourceFailure`].
    pub fn source_failure(detail: impl Into<String>) -> Self {
        Self::SourceFailure(detail.into())
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AuthorizationDenied => "AUTHORIZATION_DENIED",
            Self::SourceFailure(_) => "SOURCE_FAILURE",
        }
    }
}

/// The unified error type for beacon operations.
#[derive(Debug, Error)]
pub enum BeaconError {
    // =========================================================================
    // IDENTITY ERRORS
    // =========================================================================
    /// An identity constraint could not be constructed.
    #[error("Invalid identity constraint '{input}': {reason}")]
    InvalidConstraint {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    // =========================================================================
    // RANGING ERRORS
    // =========================================================================
    /// Ranging authorization was denied.
    #[error("Ranging authorization was denied")]
    AuthorizationDenied,

    /// The ranging source failed.
    #[error("Ranging source failure: {0}")]
    SourceFailure(String),

    /// A lifecycle operation was requested in a state that does not allow it.
    #[error("Cannot {action} while the controller is {from}")]
    InvalidTransition {
        /// State the controller was in.
        from: ControllerState,
        /// The rejected operation.
        action: &'static str,
    },
}

/// A specialized [`Result`] type for beacon operations.
pub type Result<T> = std::result::Result<T, BeaconError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let err = BeaconError::InvalidTransition {
            from: ControllerState::Stopped,
            action: "start",
        };
        assert_eq!(err.to_string(), "Cannot start while the controller is stopped");
    }

    #[test]
    fn test_ranging_error_codes() {
        assert_eq!(
            RangingError::AuthorizationDenied.error_code(),
            "AUTHORIZATION_DENIED"
        );
        assert_eq!(
            RangingError::source_failure("gone").error_code(),
            "SOURCE_FAILURE"
        );
    }

    #[test]
    fn test_ranging_error_serializes_with_kind_tag() {
        let json = serde_json::to_string(&RangingError::source_failure("denied")).unwrap();
        assert_eq!(json, r#"{"kind":"source_failure","detail":"denied"}"#);

        let json = serde_json::to_string(&RangingError::AuthorizationDenied).unwrap();
        assert_eq!(json, r#"{"kind":"authorization_denied"}"#);
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<BeaconError>();
        assert_sync::<BeaconError>();
        assert_send::<RangingError>();
    }
}
