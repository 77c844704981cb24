//! Sign-in actions.

use super::persist_session;
use crate::environment::AuthEnvironment;
use crate::error::{AuthError, Result};
use crate::events::SignInEvent;
use crate::providers::AuthOutcome;
use crate::state::{AuthSession, Challenge, Secret};
use authflow_core::action::Action;
use authflow_core::debug::{DebugDictionary, dictionary};
use authflow_core::dispatcher::EventDispatcher;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Work performed by the sign-in sub-flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignInAction {
    /// Authenticate with username and password.
    InitiateSignIn {
        /// Username
        username: String,
        /// Password
        password: Secret,
    },
    /// Answer the outstanding challenge.
    RespondToChallenge {
        /// Username
        username: String,
        /// Challenge being answered
        challenge: Challenge,
        /// Code or new password
        answer: Secret,
    },
    /// Finish a cancellation: drop any session the aborted attempt stored,
    /// then dispatch `SignInCancelled`. Always dispatches, even when the
    /// store cannot be cleared.
    CancelSignIn,
}

impl DebugDictionary for SignInAction {
    fn identifier(&self) -> &'static str {
        match self {
            Self::InitiateSignIn { .. } => "InitiateSignIn",
            Self::RespondToChallenge { .. } => "RespondToChallenge",
            Self::CancelSignIn => "CancelSignIn",
        }
    }

    fn debug_dictionary(&self) -> Map<String, Value> {
        let id = self.identifier();
        match self {
            Self::InitiateSignIn { username, .. } => {
                dictionary(id, [("username", Value::from(username.as_str()))])
            },
            Self::RespondToChallenge {
                username,
                challenge,
                ..
            } => dictionary(
                id,
                [
                    ("username", Value::from(username.as_str())),
                    (
                        "challenge",
                        serde_json::to_value(challenge.kind).unwrap_or(Value::Null),
                    ),
                ],
            ),
            Self::CancelSignIn => dictionary(id, []),
        }
    }
}

impl Action for SignInAction {
    type Event = SignInEvent;
    type Environment = AuthEnvironment;

    fn execute(
        self,
        dispatcher: EventDispatcher<SignInEvent>,
        env: Arc<AuthEnvironment>,
    ) -> BoxFuture<'static, ()> {
        match self {
            Self::InitiateSignIn { username, password } => Box::pin(async move {
                let outcome = env.provider.initiate_auth(username.clone(), password).await;
                let event = conclude(username, outcome, &env).await;
                dispatcher.send(event);
            }),
            Self::RespondToChallenge {
                username,
                challenge,
                answer,
            } => Box::pin(async move {
                let outcome = env
                    .provider
                    .respond_to_challenge(username.clone(), challenge, answer)
                    .await;
                let event = conclude(username, outcome, &env).await;
                dispatcher.send(event);
            }),
            Self::CancelSignIn => Box::pin(async move {
                // The aborted attempt may have saved its session already.
                if let Err(error) = env.credentials.clear().await {
                    tracing::warn!(%error, "Could not clear credentials of the cancelled sign-in");
                }
                env.cache.clear();
                tracing::info!("Sign-in cancelled; in-flight provider calls were aborted");
                dispatcher.send(SignInEvent::SignInCancelled);
            }),
        }
    }

    fn cancelled(&self) -> SignInEvent {
        SignInEvent::Failed(AuthError::Cancelled)
    }
}

/// Turn a provider answer into the sub-flow's result event.
///
/// Tokens are persisted before success is reported.
async fn conclude(username: String, outcome: Result<AuthOutcome>, env: &AuthEnvironment) -> SignInEvent {
    match outcome {
        Ok(AuthOutcome::Challenge(challenge)) => {
            tracing::info!(%username, kind = ?challenge.kind, "Sign-in challenge issued");
            SignInEvent::ChallengeIssued(challenge)
        },
        Ok(AuthOutcome::Authenticated { user_id, tokens }) => {
            let session = AuthSession::issue(user_id, username, tokens, env.clock.now());
            match persist_session(env, &session).await {
                Ok(()) => {
                    tracing::info!(user_id = %session.user_id, "Signed in");
                    SignInEvent::SignInSucceeded(session)
                },
                Err(error) => SignInEvent::Failed(error),
            }
        },
        Err(error) => {
            tracing::warn!(%username, %error, "Sign-in rejected");
            SignInEvent::Failed(error)
        },
    }
}
