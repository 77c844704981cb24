//! Error types for authentication flows.
//!
//! Errors never escape an action as a return value. Every failure is turned
//! into the flow's error event and ends up in the flow's state, so callers
//! read outcomes from the state machine, not from a `Result`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Why a remote identity provider call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Connection failed or timed out.
    Network,
    /// Request rate exceeded.
    Throttled,
    /// Provider temporarily unavailable.
    ServiceUnavailable,
    /// Credentials rejected.
    NotAuthorized,
    /// No such user.
    UserNotFound,
    /// Username already registered.
    UsernameExists,
    /// Confirmation or challenge code is wrong.
    CodeMismatch,
    /// Confirmation or challenge code has expired.
    ExpiredCode,
    /// Request rejected as malformed.
    InvalidParameter,
}

impl ProviderErrorKind {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Throttled | Self::ServiceUnavailable
        )
    }

    /// Stable snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Throttled => "throttled",
            Self::ServiceUnavailable => "service_unavailable",
            Self::NotAuthorized => "not_authorized",
            Self::UserNotFound => "user_not_found",
            Self::UsernameExists => "username_exists",
            Self::CodeMismatch => "code_mismatch",
            Self::ExpiredCode => "expired_code",
            Self::InvalidParameter => "invalid_parameter",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed identity provider call.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    /// Failure category
    pub kind: ProviderErrorKind,
    /// Provider-supplied detail
    pub message: String,
}

impl ProviderError {
    /// Create a provider error.
    #[must_use]
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Error taxonomy for authentication flows.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthError {
    /// Missing or invalid configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is wrong
        message: String,
    },

    /// Remote identity provider call failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Flow stopped by explicit cancellation.
    #[error("Flow cancelled")]
    Cancelled,

    /// An event arrived that the flow did not expect.
    #[error("Event `{event}` not expected in state `{state}`")]
    InvalidState {
        /// Stage the flow was in
        state: String,
        /// The unexpected event
        event: String,
    },

    /// Local credential persistence failed.
    #[error("Credential store error: {message}")]
    CredentialStore {
        /// Underlying failure
        message: String,
    },

    /// Internal error (lock poisoning, broken invariants).
    #[error("Internal error: {message}")]
    Internal {
        /// Detail
        message: String,
    },
}

impl AuthError {
    /// Configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Provider error of `kind`.
    #[must_use]
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self::Provider(ProviderError::new(kind, message))
    }

    /// Credential store error.
    #[must_use]
    pub fn credential_store(message: impl Into<String>) -> Self {
        Self::CredentialStore {
            message: message.into(),
        }
    }

    /// Internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the failed operation may succeed if retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(error) => error.kind.is_retryable(),
            _ => false,
        }
    }

    /// Whether the flow was cancelled.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this is a configuration problem.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Stable category label for logs and debug output.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Provider(_) => "provider",
            Self::Cancelled => "cancelled",
            Self::InvalidState { .. } => "invalid_state",
            Self::CredentialStore { .. } => "credential_store",
            Self::Internal { .. } => "internal",
        }
    }
}
