//! Sign-up sub-flow resolver.

use super::{SIGN_UP, SIGN_UP_TIMEOUT};
use crate::actions::SignUpAction;
use crate::environment::AuthEnvironment;
use crate::error::{AuthError, ProviderErrorKind};
use crate::events::SignUpEvent;
use crate::state::SignUpState;
use authflow_core::debug::DebugDictionary;
use authflow_core::effect::Effect;
use authflow_core::resolver::{FlowState, InvalidTransition, Resolution, Resolver};
use std::time::Duration;

type Step = Resolution<SignUpState, SignUpAction>;

/// Resolver for the sign-up sub-flow.
///
/// Registration and confirmation run under [`SIGN_UP`] so that a cancel
/// aborts whichever is in flight. With a flow timeout, each provider call
/// also arms a [`SIGN_UP_TIMEOUT`] timer that delivers `CancelSignUp`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignUpResolver {
    flow_timeout: Option<Duration>,
}

impl SignUpResolver {
    /// Create a resolver; `flow_timeout` arms a timer per provider call.
    #[must_use]
    pub const fn new(flow_timeout: Option<Duration>) -> Self {
        Self { flow_timeout }
    }

    /// Enter `state` and start `action` under the sign-up id.
    fn begin(&self, state: SignUpState, action: SignUpAction) -> Step {
        Resolution::to(state)
            .with(Effect::cancellable(SIGN_UP, action))
            .with_all(
                self.flow_timeout
                    .map(|timeout| Effect::timeout(SIGN_UP_TIMEOUT, timeout, SignUpEvent::CancelSignUp)),
            )
    }

    /// Enter `state` after a provider call completed; disarm the timer.
    fn settle(&self, state: SignUpState) -> Step {
        Resolution::to(state).with_all(
            self.flow_timeout
                .map(|_| Effect::Cancel(SIGN_UP_TIMEOUT)),
        )
    }
}

fn invalid(state: &SignUpState, event: &SignUpEvent, reason: &'static str) -> Step {
    Resolution::invalid(
        state,
        InvalidTransition::new(state.stage(), event.identifier(), reason),
    )
}

impl Resolver for SignUpResolver {
    type State = SignUpState;
    type Event = SignUpEvent;
    type Action = SignUpAction;
    type Environment = AuthEnvironment;

    fn resolve(&self, state: &SignUpState, event: &SignUpEvent) -> Step {
        use SignUpEvent as E;
        use SignUpState as S;

        match (state, event) {
            (
                S::NotStarted,
                E::InitiateSignUp {
                    username,
                    password,
                    attributes,
                },
            ) => {
                if username.trim().is_empty() {
                    return Resolution::to(S::Error(AuthError::provider(
                        ProviderErrorKind::InvalidParameter,
                        "username must not be empty",
                    )));
                }
                self.begin(
                    S::InitiatingSignUp {
                        username: username.clone(),
                    },
                    SignUpAction::InitiateSignUp {
                        username: username.clone(),
                        password: password.clone(),
                        attributes: attributes.clone(),
                    },
                )
            },

            (
                S::InitiatingSignUp { .. } | S::AwaitingConfirmation { .. } | S::ConfirmingSignUp { .. },
                E::InitiateSignUp { .. },
            ) => invalid(state, event, "sign-up already in progress"),

            (S::InitiatingSignUp { username }, E::SignUpSucceeded { user_id, delivery }) => {
                let next = match delivery {
                    Some(delivery) => S::AwaitingConfirmation {
                        username: username.clone(),
                        user_id: user_id.clone(),
                        delivery: delivery.clone(),
                    },
                    None => S::SignedUp {
                        username: username.clone(),
                        user_id: user_id.clone(),
                    },
                };
                self.settle(next)
            },

            (S::AwaitingConfirmation { username, user_id, .. }, E::ConfirmSignUp { code }) => self
                .begin(
                    S::ConfirmingSignUp {
                        username: username.clone(),
                        user_id: user_id.clone(),
                    },
                    SignUpAction::ConfirmSignUp {
                        username: username.clone(),
                        code: code.clone(),
                    },
                ),

            (S::ConfirmingSignUp { username, user_id }, E::SignUpConfirmed) => {
                self.settle(S::SignedUp {
                    username: username.clone(),
                    user_id: user_id.clone(),
                })
            },

            (S::InitiatingSignUp { .. } | S::ConfirmingSignUp { .. }, E::Failed(error)) => {
                self.settle(S::Error(error.clone()))
            },

            (
                S::InitiatingSignUp { .. } | S::AwaitingConfirmation { .. } | S::ConfirmingSignUp { .. },
                E::CancelSignUp,
            ) => Resolution::to(S::CancellingSignUp)
                .with(Effect::Cancel(SIGN_UP))
                .with(Effect::Cancel(SIGN_UP_TIMEOUT))
                .with(Effect::Run(SignUpAction::CancelSignUp)),

            (S::NotStarted, E::CancelSignUp) => Resolution::to(S::Cancelled),

            (S::CancellingSignUp, E::SignUpCancelled) => Resolution::to(S::Cancelled),

            (S::NotStarted, E::SignUpSucceeded { .. } | E::ConfirmSignUp { .. } | E::SignUpConfirmed) => {
                invalid(state, event, "sign-up was never started")
            },

            // Late results after a cancel, duplicate requests, terminal states
            _ => Resolution::unchanged(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CodeDelivery, DeliveryMedium, Secret, UserId};
    use authflow_testing::{ResolverTest, assertions};
    use std::collections::BTreeMap;

    fn initiate(username: &str) -> SignUpEvent {
        SignUpEvent::InitiateSignUp {
            username: username.to_string(),
            password: Secret::new("correct horse"),
            attributes: BTreeMap::new(),
        }
    }

    fn delivery() -> CodeDelivery {
        CodeDelivery {
            destination: "a***@example.com".into(),
            medium: DeliveryMedium::Email,
            attribute: "email".into(),
        }
    }

    fn awaiting() -> SignUpState {
        SignUpState::AwaitingConfirmation {
            username: "alice".into(),
            user_id: UserId::new("user-1"),
            delivery: delivery(),
        }
    }

    #[test]
    fn test_initiate_starts_cancellable_registration() {
        ResolverTest::new(SignUpResolver::new(None))
            .given_state(SignUpState::NotStarted)
            .when_event(initiate("alice"))
            .then_state(|state| {
                assert_eq!(
                    state,
                    &SignUpState::InitiatingSignUp {
                        username: "alice".into()
                    }
                );
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_runs(effects, "InitiateSignUp");
                assert!(matches!(effects[0], Effect::Cancellable { id, .. } if id == SIGN_UP));
            })
            .run();
    }

    #[test]
    fn test_flow_timeout_arms_timer() {
        let timeout = Duration::from_secs(30);
        ResolverTest::new(SignUpResolver::new(Some(timeout)))
            .given_state(SignUpState::NotStarted)
            .when_event(initiate("alice"))
            .then_effects(move |effects| {
                assertions::assert_effects_count(effects, 2);
                assert_eq!(
                    effects[1],
                    Effect::timeout(SIGN_UP_TIMEOUT, timeout, SignUpEvent::CancelSignUp)
                );
            })
            .run();
    }

    #[test]
    fn test_blank_username_fails_without_effects() {
        ResolverTest::new(SignUpResolver::new(None))
            .given_state(SignUpState::NotStarted)
            .when_event(initiate("  "))
            .then_state(|state| assert_eq!(state.stage(), "error"))
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    fn test_success_with_delivery_awaits_confirmation() {
        ResolverTest::new(SignUpResolver::new(Some(Duration::from_secs(5))))
            .given_state(SignUpState::InitiatingSignUp {
                username: "alice".into(),
            })
            .when_event(SignUpEvent::SignUpSucceeded {
                user_id: UserId::new("user-1"),
                delivery: Some(delivery()),
            })
            .then_state(|state| assert_eq!(state, &awaiting()))
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_cancels(effects, SIGN_UP_TIMEOUT);
            })
            .run();
    }

    #[test]
    fn test_success_without_delivery_is_signed_up() {
        ResolverTest::new(SignUpResolver::new(None))
            .given_state(SignUpState::InitiatingSignUp {
                username: "alice".into(),
            })
            .when_event(SignUpEvent::SignUpSucceeded {
                user_id: UserId::new("user-1"),
                delivery: None,
            })
            .then_state(|state| {
                assert!(state.is_terminal());
                assert_eq!(state.stage(), "signedUp");
            })
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    fn test_confirm_code() {
        ResolverTest::new(SignUpResolver::new(None))
            .given_state(awaiting())
            .when_event(SignUpEvent::ConfirmSignUp {
                code: Secret::new("123456"),
            })
            .then_state(|state| assert_eq!(state.stage(), "confirmingSignUp"))
            .then_effects(|effects| assertions::assert_runs(effects, "ConfirmSignUp"))
            .run();
    }

    #[test]
    fn test_cancel_aborts_and_runs_cancel_action() {
        ResolverTest::new(SignUpResolver::new(None))
            .given_state(SignUpState::InitiatingSignUp {
                username: "alice".into(),
            })
            .when_event(SignUpEvent::CancelSignUp)
            .then_state(|state| assert_eq!(state, &SignUpState::CancellingSignUp))
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 3);
                assertions::assert_cancels(effects, SIGN_UP);
                assertions::assert_cancels(effects, SIGN_UP_TIMEOUT);
                assertions::assert_runs(effects, "CancelSignUp");
            })
            .run();
    }

    #[test]
    fn test_cancelled_completion() {
        ResolverTest::new(SignUpResolver::new(None))
            .given_state(SignUpState::CancellingSignUp)
            .when_event(SignUpEvent::SignUpCancelled)
            .then_state(|state| assert_eq!(state, &SignUpState::Cancelled))
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    fn test_late_results_while_cancelling_are_no_ops() {
        let resolver = SignUpResolver::new(None);
        let late = [
            SignUpEvent::Failed(AuthError::Cancelled),
            SignUpEvent::SignUpSucceeded {
                user_id: UserId::new("user-1"),
                delivery: None,
            },
            SignUpEvent::SignUpConfirmed,
            SignUpEvent::CancelSignUp,
        ];
        for event in &late {
            assertions::assert_no_op(&resolver, &SignUpState::CancellingSignUp, event);
            assertions::assert_no_op(&resolver, &SignUpState::Cancelled, event);
        }
    }

    #[test]
    fn test_result_before_start_is_reported() {
        ResolverTest::new(SignUpResolver::new(None))
            .given_state(SignUpState::NotStarted)
            .when_event(SignUpEvent::SignUpConfirmed)
            .then_state(|state| assert_eq!(state, &SignUpState::NotStarted))
            .then_diagnostic(|diagnostic| {
                assert_eq!(diagnostic.map(|d| d.reason), Some("sign-up was never started"));
            })
            .run();
    }

    #[test]
    fn test_failure_moves_to_error() {
        let error = AuthError::provider(ProviderErrorKind::CodeMismatch, "wrong code");
        let expected = error.clone();
        ResolverTest::new(SignUpResolver::new(None))
            .given_state(SignUpState::ConfirmingSignUp {
                username: "alice".into(),
                user_id: UserId::new("user-1"),
            })
            .when_event(SignUpEvent::Failed(error))
            .then_state(move |state| assert_eq!(state, &SignUpState::Error(expected)))
            .run();
    }
}
