//! Authentication state types.
//!
//! Every flow state is an immutable value: resolvers return a new state and
//! never mutate the one they were given. Sub-flow states (sign-up, sign-in)
//! are embedded in the top-level [`AuthState`] while the sub-flow runs.

use crate::config::AuthConfiguration;
use crate::error::AuthError;
use authflow_core::resolver::FlowState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Sensitive string (password, code, token).
///
/// `Debug` never prints the value; use [`Secret::expose`] where the raw
/// value is actually needed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a sensitive value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Provider-assigned user identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Wrap an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Channel a confirmation code was sent through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMedium {
    /// Email
    Email,
    /// Text message
    Sms,
}

/// Where a confirmation code was delivered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDelivery {
    /// Masked destination, e.g. `a***@example.com`
    pub destination: String,
    /// Delivery channel
    pub medium: DeliveryMedium,
    /// User attribute the code verifies
    pub attribute: String,
}

/// Tokens issued by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    /// Access token
    pub access_token: Secret,
    /// Identity token
    pub id_token: Secret,
    /// Refresh token
    pub refresh_token: Secret,
    /// Access token lifetime
    pub expires_in: Duration,
}

/// An authenticated session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Authenticated user
    pub user_id: UserId,
    /// Username used to sign in
    pub username: String,
    /// Current tokens
    pub tokens: Tokens,
    /// When the tokens were issued
    pub issued_at: DateTime<Utc>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// Build a session from freshly issued tokens.
    #[must_use]
    pub fn issue(user_id: UserId, username: String, tokens: Tokens, now: DateTime<Utc>) -> Self {
        let expires_at = chrono::Duration::from_std(tokens.expires_in)
            .ok()
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            user_id,
            username,
            expires_at,
            issued_at: now,
            tokens,
        }
    }

    /// Whether the access token has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Kind of additional step the provider requires during sign-in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    /// Temporary password must be replaced
    NewPasswordRequired,
    /// Code sent by text message
    SmsCode,
    /// Authenticator app code
    TotpCode,
}

/// A sign-in challenge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// What the provider asks for
    pub kind: ChallengeKind,
    /// Opaque provider session binding the answer to this challenge
    pub session: Secret,
    /// Masked destination for code challenges
    pub destination: Option<String>,
}

/// Sign-up sub-flow state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignUpState {
    /// Nothing submitted yet
    NotStarted,
    /// Registration request in flight
    InitiatingSignUp {
        /// Username being registered
        username: String,
    },
    /// Registered, waiting for the user to enter the code
    AwaitingConfirmation {
        /// Registered username
        username: String,
        /// Assigned user id
        user_id: UserId,
        /// Where the code went
        delivery: CodeDelivery,
    },
    /// Confirmation request in flight
    ConfirmingSignUp {
        /// Registered username
        username: String,
        /// Assigned user id
        user_id: UserId,
    },
    /// Cancel requested; waiting for the cancel action to report
    CancellingSignUp,
    /// Registered and confirmed
    SignedUp {
        /// Registered username
        username: String,
        /// Assigned user id
        user_id: UserId,
    },
    /// Cancelled by the user or a timeout
    Cancelled,
    /// Failed
    Error(AuthError),
}

impl FlowState for SignUpState {
    fn stage(&self) -> &'static str {
        match self {
            Self::NotStarted => "notStarted",
            Self::InitiatingSignUp { .. } => "initiatingSignUp",
            Self::AwaitingConfirmation { .. } => "awaitingConfirmation",
            Self::ConfirmingSignUp { .. } => "confirmingSignUp",
            Self::CancellingSignUp => "cancellingSignUp",
            Self::SignedUp { .. } => "signedUp",
            Self::Cancelled => "cancelled",
            Self::Error(_) => "error",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SignedUp { .. } | Self::Cancelled | Self::Error(_)
        )
    }
}

/// Sign-in sub-flow state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignInState {
    /// Nothing submitted yet
    NotStarted,
    /// Authentication request in flight
    InitiatingSignIn {
        /// Username signing in
        username: String,
    },
    /// Provider asked for an additional step
    AwaitingChallenge {
        /// Username signing in
        username: String,
        /// Outstanding challenge
        challenge: Challenge,
    },
    /// Challenge answer in flight
    RespondingToChallenge {
        /// Username signing in
        username: String,
        /// Challenge being answered
        challenge: Challenge,
    },
    /// Cancel requested; waiting for the cancel action to report
    CancellingSignIn,
    /// Authenticated
    SignedIn(AuthSession),
    /// Cancelled by the user or a timeout
    Cancelled,
    /// Failed
    Error(AuthError),
}

impl FlowState for SignInState {
    fn stage(&self) -> &'static str {
        match self {
            Self::NotStarted => "notStarted",
            Self::InitiatingSignIn { .. } => "initiatingSignIn",
            Self::AwaitingChallenge { .. } => "awaitingChallenge",
            Self::RespondingToChallenge { .. } => "respondingToChallenge",
            Self::CancellingSignIn => "cancellingSignIn",
            Self::SignedIn(_) => "signedIn",
            Self::Cancelled => "cancelled",
            Self::Error(_) => "error",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::SignedIn(_) | Self::Cancelled | Self::Error(_))
    }
}

/// Top-level authentication state.
///
/// Every state past configuration carries the validated configuration, so
/// sub-flows and follow-up operations never look it up elsewhere.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthState {
    /// No configuration applied
    NotConfigured,
    /// Configuration being validated and stored session restored
    Configuring {
        /// Configuration under validation
        configuration: AuthConfiguration,
    },
    /// Configured, nobody signed in
    Idle {
        /// Active configuration
        configuration: AuthConfiguration,
    },
    /// Sign-up sub-flow running
    SigningUp {
        /// Active configuration
        configuration: AuthConfiguration,
        /// Sub-flow state
        flow: SignUpState,
    },
    /// A user finished sign-up
    SignedUp {
        /// Active configuration
        configuration: AuthConfiguration,
        /// Registered username
        username: String,
        /// Assigned user id
        user_id: UserId,
    },
    /// Sign-in sub-flow running
    SigningIn {
        /// Active configuration
        configuration: AuthConfiguration,
        /// Sub-flow state
        flow: SignInState,
    },
    /// A user is signed in
    SignedIn {
        /// Active configuration
        configuration: AuthConfiguration,
        /// Current session
        session: AuthSession,
    },
    /// Token refresh in flight
    RefreshingSession {
        /// Active configuration
        configuration: AuthConfiguration,
        /// Session being refreshed
        session: AuthSession,
    },
    /// Sign-out in flight
    SigningOut {
        /// Active configuration
        configuration: AuthConfiguration,
        /// Session being ended
        session: AuthSession,
    },
    /// Signed out
    SignedOut {
        /// Active configuration
        configuration: AuthConfiguration,
    },
    /// Something failed
    Error {
        /// Configuration, if one was active
        configuration: Option<AuthConfiguration>,
        /// What failed
        error: AuthError,
    },
}

impl AuthState {
    /// Active configuration, if any.
    #[must_use]
    pub const fn configuration(&self) -> Option<&AuthConfiguration> {
        match self {
            Self::NotConfigured => None,
            Self::Configuring { configuration }
            | Self::Idle { configuration }
            | Self::SigningUp { configuration, .. }
            | Self::SignedUp { configuration, .. }
            | Self::SigningIn { configuration, .. }
            | Self::SignedIn { configuration, .. }
            | Self::RefreshingSession { configuration, .. }
            | Self::SigningOut { configuration, .. }
            | Self::SignedOut { configuration } => Some(configuration),
            Self::Error { configuration, .. } => configuration.as_ref(),
        }
    }

    /// Current session, if a user is signed in.
    #[must_use]
    pub const fn session(&self) -> Option<&AuthSession> {
        match self {
            Self::SignedIn { session, .. }
            | Self::RefreshingSession { session, .. }
            | Self::SigningOut { session, .. } => Some(session),
            _ => None,
        }
    }

    /// Error, if the flow failed.
    #[must_use]
    pub const fn error(&self) -> Option<&AuthError> {
        match self {
            Self::Error { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl FlowState for AuthState {
    fn stage(&self) -> &'static str {
        match self {
            Self::NotConfigured => "notConfigured",
            Self::Configuring { .. } => "configuring",
            Self::Idle { .. } => "idle",
            Self::SigningUp { .. } => "signingUp",
            Self::SignedUp { .. } => "signedUp",
            Self::SigningIn { .. } => "signingIn",
            Self::SignedIn { .. } => "signedIn",
            Self::RefreshingSession { .. } => "refreshingSession",
            Self::SigningOut { .. } => "signingOut",
            Self::SignedOut { .. } => "signedOut",
            Self::Error { .. } => "error",
        }
    }

    /// At rest: nothing in flight, waiting for the next user request.
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured
                | Self::Idle { .. }
                | Self::SignedUp { .. }
                | Self::SignedIn { .. }
                | Self::SignedOut { .. }
                | Self::Error { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> Tokens {
        Tokens {
            access_token: Secret::new("access"),
            id_token: Secret::new("id"),
            refresh_token: Secret::new("refresh"),
            expires_in: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret([redacted])");
        assert!(!format!("{:?}", tokens()).contains("\"refresh\""));
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = AuthSession::issue(UserId::new("u-1"), "alice".into(), tokens(), now);
        assert_eq!(session.expires_at - session.issued_at, chrono::Duration::hours(1));
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + chrono::Duration::hours(2)));
    }

    #[test]
    fn test_at_rest_states() {
        let configuration = AuthConfiguration::default();
        assert!(AuthState::NotConfigured.is_terminal());
        assert!(AuthState::Idle { configuration: configuration.clone() }.is_terminal());
        assert!(!AuthState::Configuring { configuration: configuration.clone() }.is_terminal());
        assert!(
            !AuthState::SigningUp {
                configuration,
                flow: SignUpState::CancellingSignUp,
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_configuration_accessor() {
        let configuration = AuthConfiguration::default();
        let state = AuthState::Error {
            configuration: Some(configuration.clone()),
            error: AuthError::Cancelled,
        };
        assert_eq!(state.configuration(), Some(&configuration));
        assert_eq!(AuthState::NotConfigured.configuration(), None);
    }
}
