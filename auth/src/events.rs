//! Authentication events.
//!
//! Events come from two places: the application (requests such as
//! `InitiateSignUp`) and actions (results such as `SignUpSucceeded`). Both
//! travel the same queue and are resolved the same way.

use crate::config::AuthConfiguration;
use crate::error::AuthError;
use crate::state::{AuthSession, Challenge, CodeDelivery, Secret, UserId};
use authflow_core::debug::{DebugDictionary, dictionary};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

fn error_fields(error: &AuthError) -> [(&'static str, Value); 2] {
    [
        ("category", Value::from(error.category())),
        ("message", Value::from(error.to_string())),
    ]
}

fn presence(secret: &Secret) -> Value {
    Value::Bool(!secret.is_empty())
}

/// Sign-up sub-flow events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignUpEvent {
    /// Register a new user.
    InitiateSignUp {
        /// Username to register
        username: String,
        /// Chosen password
        password: Secret,
        /// User attributes (email, phone number)
        attributes: BTreeMap<String, String>,
    },
    /// The provider registered the user.
    SignUpSucceeded {
        /// Assigned user id
        user_id: UserId,
        /// Where the confirmation code went; `None` if already confirmed
        delivery: Option<CodeDelivery>,
    },
    /// Submit the confirmation code.
    ConfirmSignUp {
        /// Code received by the user
        code: Secret,
    },
    /// The provider accepted the code.
    SignUpConfirmed,
    /// Abort the sub-flow (user request or flow timeout).
    CancelSignUp,
    /// The cancel action finished.
    SignUpCancelled,
    /// A sign-up action failed or was aborted.
    Failed(AuthError),
}

impl DebugDictionary for SignUpEvent {
    fn identifier(&self) -> &'static str {
        match self {
            Self::InitiateSignUp { .. } => "InitiateSignUp",
            Self::SignUpSucceeded { .. } => "SignUpSucceeded",
            Self::ConfirmSignUp { .. } => "ConfirmSignUp",
            Self::SignUpConfirmed => "SignUpConfirmed",
            Self::CancelSignUp => "CancelSignUp",
            Self::SignUpCancelled => "SignUpCancelled",
            Self::Failed(_) => "SignUpFailed",
        }
    }

    fn debug_dictionary(&self) -> Map<String, Value> {
        let id = self.identifier();
        match self {
            Self::InitiateSignUp {
                username,
                password,
                attributes,
            } => dictionary(
                id,
                [
                    ("username", Value::from(username.as_str())),
                    ("hasPassword", presence(password)),
                    (
                        "attributes",
                        Value::from(attributes.keys().cloned().collect::<Vec<_>>()),
                    ),
                ],
            ),
            Self::SignUpSucceeded { user_id, delivery } => dictionary(
                id,
                [
                    ("userId", Value::from(user_id.as_str())),
                    (
                        "delivery",
                        delivery
                            .as_ref()
                            .map_or(Value::Null, |d| Value::from(d.destination.as_str())),
                    ),
                ],
            ),
            Self::ConfirmSignUp { code } => dictionary(id, [("hasCode", presence(code))]),
            Self::Failed(error) => dictionary(id, error_fields(error)),
            Self::SignUpConfirmed | Self::CancelSignUp | Self::SignUpCancelled => {
                dictionary(id, [])
            },
        }
    }
}

/// Sign-in sub-flow events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignInEvent {
    /// Authenticate with username and password.
    InitiateSignIn {
        /// Username
        username: String,
        /// Password
        password: Secret,
    },
    /// The provider requires an additional step.
    ChallengeIssued(Challenge),
    /// Answer the outstanding challenge.
    RespondToChallenge {
        /// Code or new password
        answer: Secret,
    },
    /// Authentication finished; the session is persisted.
    SignInSucceeded(AuthSession),
    /// Abort the sub-flow (user request or flow timeout).
    CancelSignIn,
    /// The cancel action finished.
    SignInCancelled,
    /// A sign-in action failed or was aborted.
    Failed(AuthError),
}

impl DebugDictionary for SignInEvent {
    fn identifier(&self) -> &'static str {
        match self {
            Self::InitiateSignIn { .. } => "InitiateSignIn",
            Self::ChallengeIssued(_) => "ChallengeIssued",
            Self::RespondToChallenge { .. } => "RespondToChallenge",
            Self::SignInSucceeded(_) => "SignInSucceeded",
            Self::CancelSignIn => "CancelSignIn",
            Self::SignInCancelled => "SignInCancelled",
            Self::Failed(_) => "SignInFailed",
        }
    }

    fn debug_dictionary(&self) -> Map<String, Value> {
        let id = self.identifier();
        match self {
            Self::InitiateSignIn { username, password } => dictionary(
                id,
                [
                    ("username", Value::from(username.as_str())),
                    ("hasPassword", presence(password)),
                ],
            ),
            Self::ChallengeIssued(challenge) => dictionary(
                id,
                [(
                    "kind",
                    serde_json::to_value(challenge.kind).unwrap_or(Value::Null),
                )],
            ),
            Self::RespondToChallenge { answer } => {
                dictionary(id, [("hasAnswer", presence(answer))])
            },
            Self::SignInSucceeded(session) => {
                dictionary(id, [("userId", Value::from(session.user_id.as_str()))])
            },
            Self::Failed(error) => dictionary(id, error_fields(error)),
            Self::CancelSignIn | Self::SignInCancelled => dictionary(id, []),
        }
    }
}

/// Top-level authentication events.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthEvent {
    /// Apply a configuration.
    Configure(AuthConfiguration),
    /// Configuration validated; `session` is a restored stored session.
    Configured {
        /// The validated configuration
        configuration: AuthConfiguration,
        /// Session restored from the credential store
        session: Option<AuthSession>,
    },
    /// Configuration rejected.
    ConfigurationFailed(AuthError),
    /// Event for the sign-up sub-flow.
    SignUp(SignUpEvent),
    /// Event for the sign-in sub-flow.
    SignIn(SignInEvent),
    /// Refresh the current session's tokens.
    RefreshSession,
    /// New tokens issued and persisted.
    SessionRefreshed(AuthSession),
    /// Refresh failed.
    RefreshFailed(AuthError),
    /// End the current session.
    SignOut,
    /// Local credentials cleared.
    SignedOut {
        /// Whether the provider revoked the refresh token
        revoked: bool,
    },
    /// Sign-out failed.
    SignOutFailed(AuthError),
}

impl AuthEvent {
    /// Whether this is an application request that starts an operation.
    #[must_use]
    pub const fn is_request(&self) -> bool {
        matches!(
            self,
            Self::SignUp(SignUpEvent::InitiateSignUp { .. })
                | Self::SignIn(SignInEvent::InitiateSignIn { .. })
                | Self::RefreshSession
                | Self::SignOut
        )
    }
}

impl DebugDictionary for AuthEvent {
    fn identifier(&self) -> &'static str {
        match self {
            Self::Configure(_) => "Configure",
            Self::Configured { .. } => "Configured",
            Self::ConfigurationFailed(_) => "ConfigurationFailed",
            Self::SignUp(event) => event.identifier(),
            Self::SignIn(event) => event.identifier(),
            Self::RefreshSession => "RefreshSession",
            Self::SessionRefreshed(_) => "SessionRefreshed",
            Self::RefreshFailed(_) => "RefreshFailed",
            Self::SignOut => "SignOut",
            Self::SignedOut { .. } => "SignedOut",
            Self::SignOutFailed(_) => "SignOutFailed",
        }
    }

    fn debug_dictionary(&self) -> Map<String, Value> {
        let id = self.identifier();
        match self {
            Self::SignUp(event) => event.debug_dictionary(),
            Self::SignIn(event) => event.debug_dictionary(),
            Self::Configure(configuration) => dictionary(
                id,
                [
                    ("region", Value::from(configuration.region.as_str())),
                    ("userPoolId", Value::from(configuration.user_pool_id.as_str())),
                ],
            ),
            Self::Configured { session, .. } => {
                dictionary(id, [("restoredSession", Value::Bool(session.is_some()))])
            },
            Self::SessionRefreshed(session) => dictionary(
                id,
                [("expiresAt", Value::from(session.expires_at.to_rfc3339()))],
            ),
            Self::SignedOut { revoked } => dictionary(id, [("revoked", Value::Bool(*revoked))]),
            Self::ConfigurationFailed(error)
            | Self::RefreshFailed(error)
            | Self::SignOutFailed(error) => dictionary(id, error_fields(error)),
            Self::RefreshSession | Self::SignOut => dictionary(id, []),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_stay_out_of_debug_description() {
        let event = AuthEvent::SignUp(SignUpEvent::InitiateSignUp {
            username: "alice".into(),
            password: Secret::new("hunter2"),
            attributes: BTreeMap::from([("email".to_string(), "alice@example.com".to_string())]),
        });

        let description = event.debug_description();
        assert!(!description.contains("hunter2"));
        assert!(!description.contains("alice@example.com"));
        assert_eq!(
            description,
            r#"{"attributes":["email"],"hasPassword":true,"identifier":"InitiateSignUp","username":"alice"}"#
        );
        assert!(!format!("{event:?}").contains("hunter2"));
    }

    #[test]
    fn test_nested_identifiers() {
        assert_eq!(AuthEvent::SignIn(SignInEvent::CancelSignIn).identifier(), "CancelSignIn");
        assert_eq!(
            AuthEvent::SignUp(SignUpEvent::Failed(AuthError::Cancelled)).identifier(),
            "SignUpFailed"
        );
    }

    #[test]
    fn test_error_events_carry_category() {
        let description = AuthEvent::RefreshFailed(AuthError::Cancelled).debug_description();
        assert_eq!(
            description,
            r#"{"category":"cancelled","identifier":"RefreshFailed","message":"Flow cancelled"}"#
        );
    }

    #[test]
    fn test_requests() {
        assert!(AuthEvent::SignOut.is_request());
        assert!(!AuthEvent::SignedOut { revoked: true }.is_request());
    }
}
