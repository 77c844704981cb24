//! Sign-up actions.

use crate::environment::AuthEnvironment;
use crate::error::AuthError;
use crate::events::SignUpEvent;
use crate::providers::SignUpRequest;
use crate::state::Secret;
use authflow_core::action::Action;
use authflow_core::debug::{DebugDictionary, dictionary};
use authflow_core::dispatcher::EventDispatcher;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Work performed by the sign-up sub-flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignUpAction {
    /// Register the user with the identity provider.
    InitiateSignUp {
        /// Username to register
        username: String,
        /// Chosen password
        password: Secret,
        /// User attributes
        attributes: BTreeMap<String, String>,
    },
    /// Submit the confirmation code.
    ConfirmSignUp {
        /// Registered username
        username: String,
        /// Code received by the user
        code: Secret,
    },
    /// Finish a cancellation.
    ///
    /// Always dispatches `SignUpCancelled`, whether or not an aborted
    /// registration had already reported.
    CancelSignUp,
}

impl DebugDictionary for SignUpAction {
    fn identifier(&self) -> &'static str {
        match self {
            Self::InitiateSignUp { .. } => "InitiateSignUp",
            Self::ConfirmSignUp { .. } => "ConfirmSignUp",
            Self::CancelSignUp => "CancelSignUp",
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
                    ("hasPassword", Value::Bool(!password.is_empty())),
                    (
                        "attributes",
                        Value::from(attributes.keys().cloned().collect::<Vec<_>>()),
                    ),
                ],
            ),
            Self::ConfirmSignUp { username, code } => dictionary(
                id,
                [
                    ("username", Value::from(username.as_str())),
                    ("hasCode", Value::Bool(!code.is_empty())),
                ],
            ),
            Self::CancelSignUp => dictionary(id, []),
        }
    }
}

impl Action for SignUpAction {
    type Event = SignUpEvent;
    type Environment = AuthEnvironment;

    fn execute(
        self,
        dispatcher: EventDispatcher<SignUpEvent>,
        env: Arc<AuthEnvironment>,
    ) -> BoxFuture<'static, ()> {
        match self {
            Self::InitiateSignUp {
                username,
                password,
                attributes,
            } => Box::pin(initiate_sign_up(
                SignUpRequest {
                    username,
                    password,
                    attributes,
                },
                dispatcher,
                env,
            )),
            Self::ConfirmSignUp { username, code } => {
                Box::pin(confirm_sign_up(username, code, dispatcher, env))
            },
            Self::CancelSignUp => Box::pin(async move {
                tracing::info!("Sign-up cancelled; in-flight provider calls were aborted");
                dispatcher.send(SignUpEvent::SignUpCancelled);
            }),
        }
    }

    fn cancelled(&self) -> SignUpEvent {
        SignUpEvent::Failed(AuthError::Cancelled)
    }
}

async fn initiate_sign_up(
    request: SignUpRequest,
    dispatcher: EventDispatcher<SignUpEvent>,
    env: Arc<AuthEnvironment>,
) {
    let username = request.username.clone();

    let event = match env.provider.sign_up(request).await {
        Ok(outcome) if outcome.confirmed => {
            tracing::info!(%username, user_id = %outcome.user_id, "User registered and confirmed");
            SignUpEvent::SignUpSucceeded {
                user_id: outcome.user_id,
                delivery: None,
            }
        },
        Ok(outcome) => match outcome.delivery {
            Some(delivery) => {
                tracing::info!(
                    %username,
                    user_id = %outcome.user_id,
                    destination = %delivery.destination,
                    "User registered, confirmation code sent"
                );
                SignUpEvent::SignUpSucceeded {
                    user_id: outcome.user_id,
                    delivery: Some(delivery),
                }
            },
            None => SignUpEvent::Failed(AuthError::internal(
                "provider left the user unconfirmed without delivering a code",
            )),
        },
        Err(error) => {
            tracing::warn!(%username, %error, "Sign-up rejected");
            SignUpEvent::Failed(error)
        },
    };

    dispatcher.send(event);
}

async fn confirm_sign_up(
    username: String,
    code: Secret,
    dispatcher: EventDispatcher<SignUpEvent>,
    env: Arc<AuthEnvironment>,
) {
    match env.provider.confirm_sign_up(username.clone(), code).await {
        Ok(()) => {
            tracing::info!(%username, "Sign-up confirmed");
            dispatcher.send(SignUpEvent::SignUpConfirmed);
        },
        Err(error) => {
            tracing::warn!(%username, %error, "Confirmation rejected");
            dispatcher.send(SignUpEvent::Failed(error));
        },
    }
}
