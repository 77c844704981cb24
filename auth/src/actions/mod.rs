//! Authentication actions.
//!
//! Every action dispatches exactly one result event on every path. Provider
//! and credential store failures become the flow's error events; nothing is
//! returned to the runtime.

use crate::config::AuthConfiguration;
use crate::environment::AuthEnvironment;
use crate::error::{AuthError, Result};
use crate::events::AuthEvent;
use crate::state::AuthSession;
use authflow_core::action::Action;
use authflow_core::debug::{DebugDictionary, dictionary};
use authflow_core::dispatcher::EventDispatcher;
use authflow_runtime::retry::retry_with_predicate;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::sync::Arc;

mod sign_in;
mod sign_up;

pub use sign_in::SignInAction;
pub use sign_up::SignUpAction;

/// Work performed by the top-level flow.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthAction {
    /// Validate a configuration and restore a stored session.
    ValidateConfig {
        /// Configuration to validate
        configuration: AuthConfiguration,
    },
    /// Sign-up sub-flow action.
    SignUp(SignUpAction),
    /// Sign-in sub-flow action.
    SignIn(SignInAction),
    /// Exchange the refresh token for new tokens.
    RefreshSession {
        /// Active configuration (retry policy)
        configuration: AuthConfiguration,
        /// Session to refresh
        session: AuthSession,
    },
    /// Clear local credentials, then revoke the refresh token.
    SignOut {
        /// Active configuration
        configuration: AuthConfiguration,
        /// Session to end
        session: AuthSession,
    },
}

impl DebugDictionary for AuthAction {
    fn identifier(&self) -> &'static str {
        match self {
            Self::ValidateConfig { .. } => "ValidateConfig",
            Self::SignUp(action) => action.identifier(),
            Self::SignIn(action) => action.identifier(),
            Self::RefreshSession { .. } => "RefreshSession",
            Self::SignOut { .. } => "SignOut",
        }
    }

    fn debug_dictionary(&self) -> Map<String, Value> {
        let id = self.identifier();
        match self {
            Self::SignUp(action) => action.debug_dictionary(),
            Self::SignIn(action) => action.debug_dictionary(),
            Self::ValidateConfig { configuration } => dictionary(
                id,
                [
                    ("region", Value::from(configuration.region.as_str())),
                    ("userPoolId", Value::from(configuration.user_pool_id.as_str())),
                ],
            ),
            Self::RefreshSession {
                configuration,
                session,
            } => dictionary(
                id,
                [
                    ("userId", Value::from(session.user_id.as_str())),
                    ("maxRetries", Value::from(configuration.refresh_retry.max_retries)),
                ],
            ),
            Self::SignOut { session, .. } => {
                dictionary(id, [("userId", Value::from(session.user_id.as_str()))])
            },
        }
    }
}

impl Action for AuthAction {
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn execute(
        self,
        dispatcher: EventDispatcher<AuthEvent>,
        env: Arc<AuthEnvironment>,
    ) -> BoxFuture<'static, ()> {
        match self {
            Self::SignUp(action) => action.execute(dispatcher.scope(AuthEvent::SignUp), env),
            Self::SignIn(action) => action.execute(dispatcher.scope(AuthEvent::SignIn), env),
            Self::ValidateConfig { configuration } => {
                Box::pin(validate_config(configuration, dispatcher, env))
            },
            Self::RefreshSession {
                configuration,
                session,
            } => Box::pin(refresh_session(configuration, session, dispatcher, env)),
            Self::SignOut { session, .. } => Box::pin(sign_out(session, dispatcher, env)),
        }
    }

    fn cancelled(&self) -> AuthEvent {
        match self {
            Self::SignUp(action) => AuthEvent::SignUp(action.cancelled()),
            Self::SignIn(action) => AuthEvent::SignIn(action.cancelled()),
            Self::ValidateConfig { .. } => AuthEvent::ConfigurationFailed(AuthError::Cancelled),
            Self::RefreshSession { .. } => AuthEvent::RefreshFailed(AuthError::Cancelled),
            Self::SignOut { .. } => AuthEvent::SignOutFailed(AuthError::Cancelled),
        }
    }
}

/// Write `session` to the credential store, then to the cache.
pub(crate) async fn persist_session(env: &AuthEnvironment, session: &AuthSession) -> Result<()> {
    env.credentials.save_session(session.clone()).await?;
    env.cache.replace(session.clone());
    Ok(())
}

async fn validate_config(
    configuration: AuthConfiguration,
    dispatcher: EventDispatcher<AuthEvent>,
    env: Arc<AuthEnvironment>,
) {
    if let Err(error) = configuration.validate() {
        tracing::error!(%error, "Configuration rejected");
        dispatcher.send(AuthEvent::ConfigurationFailed(error));
        return;
    }

    let session = match env.credentials.load_session().await {
        Ok(Some(session)) if !session.is_expired(env.clock.now()) => {
            tracing::info!(user_id = %session.user_id, "Restored stored session");
            env.cache.replace(session.clone());
            Some(session)
        },
        Ok(Some(session)) => {
            tracing::debug!(user_id = %session.user_id, "Stored session expired, not restoring");
            None
        },
        Ok(None) => None,
        // A broken store must not block configuration.
        Err(error) => {
            tracing::warn!(%error, "Could not read stored session");
            None
        },
    };

    dispatcher.send(AuthEvent::Configured {
        configuration,
        session,
    });
}

async fn refresh_session(
    configuration: AuthConfiguration,
    session: AuthSession,
    dispatcher: EventDispatcher<AuthEvent>,
    env: Arc<AuthEnvironment>,
) {
    let username = session.username.clone();
    let refresh_token = session.tokens.refresh_token.clone();

    let result = retry_with_predicate(
        &configuration.refresh_retry,
        || env.provider.refresh_tokens(username.clone(), refresh_token.clone()),
        AuthError::is_retryable,
    )
    .await;

    let event = match result {
        Ok(tokens) => {
            let refreshed = AuthSession::issue(session.user_id, username, tokens, env.clock.now());
            match persist_session(&env, &refreshed).await {
                Ok(()) => {
                    tracing::info!(
                        user_id = %refreshed.user_id,
                        expires_at = %refreshed.expires_at,
                        "Session refreshed"
                    );
                    AuthEvent::SessionRefreshed(refreshed)
                },
                Err(error) => AuthEvent::RefreshFailed(error),
            }
        },
        Err(error) => {
            tracing::warn!(%error, retryable = error.is_retryable(), "Session refresh failed");
            AuthEvent::RefreshFailed(error)
        },
    };

    dispatcher.send(event);
}

async fn sign_out(session: AuthSession, dispatcher: EventDispatcher<AuthEvent>, env: Arc<AuthEnvironment>) {
    if let Err(error) = env.credentials.clear().await {
        tracing::error!(%error, "Could not clear stored credentials");
        dispatcher.send(AuthEvent::SignOutFailed(error));
        return;
    }
    env.cache.clear();

    let revoked = match env.provider.revoke(session.tokens.refresh_token).await {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(%error, "Refresh token not revoked; local session cleared");
            false
        },
    };

    tracing::info!(user_id = %session.user_id, revoked, "Signed out");
    dispatcher.send(AuthEvent::SignedOut { revoked });
}
