//! Sign-in sub-flow resolver.

use super::{SIGN_IN, SIGN_IN_TIMEOUT};
use crate::actions::SignInAction;
use crate::environment::AuthEnvironment;
use crate::error::{AuthError, ProviderErrorKind};
use crate::events::SignInEvent;
use crate::state::SignInState;
use authflow_core::debug::DebugDictionary;
use authflow_core::effect::Effect;
use authflow_core::resolver::{FlowState, InvalidTransition, Resolution, Resolver};
use std::time::Duration;

type Step = Resolution<SignInState, SignInAction>;

/// Resolver for the sign-in sub-flow.
///
/// Authentication and challenge answers run under [`SIGN_IN`]; a flow
/// timeout arms [`SIGN_IN_TIMEOUT`] per provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignInResolver {
    flow_timeout: Option<Duration>,
}

impl SignInResolver {
    /// Create a resolver; `flow_timeout` arms a timer per provider call.
    #[must_use]
    pub const fn new(flow_timeout: Option<Duration>) -> Self {
        Self { flow_timeout }
    }

    fn begin(&self, state: SignInState, action: SignInAction) -> Step {
        Resolution::to(state)
            .with(Effect::cancellable(SIGN_IN, action))
            .with_all(
                self.flow_timeout
                    .map(|timeout| Effect::timeout(SIGN_IN_TIMEOUT, timeout, SignInEvent::CancelSignIn)),
            )
    }

    fn settle(&self, state: SignInState) -> Step {
        Resolution::to(state).with_all(
            self.flow_timeout
                .map(|_| Effect::Cancel(SIGN_IN_TIMEOUT)),
        )
    }
}

impl Resolver for SignInResolver {
    type State = SignInState;
    type Event = SignInEvent;
    type Action = SignInAction;
    type Environment = AuthEnvironment;

    fn resolve(&self, state: &SignInState, event: &SignInEvent) -> Step {
        use SignInEvent as E;
        use SignInState as S;

        let invalid = |reason: &'static str| {
            Resolution::invalid(
                state,
                InvalidTransition::new(state.stage(), event.identifier(), reason),
            )
        };

        match (state, event) {
            (S::NotStarted, E::InitiateSignIn { username, password }) => {
                if username.trim().is_empty() {
                    return Resolution::to(S::Error(AuthError::provider(
                        ProviderErrorKind::InvalidParameter,
                        "username must not be empty",
                    )));
                }
                self.begin(
                    S::InitiatingSignIn {
                        username: username.clone(),
                    },
                    SignInAction::InitiateSignIn {
                        username: username.clone(),
                        password: password.clone(),
                    },
                )
            },

            (
                S::InitiatingSignIn { .. } | S::AwaitingChallenge { .. } | S::RespondingToChallenge { .. },
                E::InitiateSignIn { .. },
            ) => invalid("sign-in already in progress"),

            (
                S::InitiatingSignIn { username } | S::RespondingToChallenge { username, .. },
                E::ChallengeIssued(challenge),
            ) => self.settle(S::AwaitingChallenge {
                username: username.clone(),
                challenge: challenge.clone(),
            }),

            (S::AwaitingChallenge { username, challenge }, E::RespondToChallenge { answer }) => self
                .begin(
                    S::RespondingToChallenge {
                        username: username.clone(),
                        challenge: challenge.clone(),
                    },
                    SignInAction::RespondToChallenge {
                        username: username.clone(),
                        challenge: challenge.clone(),
                        answer: answer.clone(),
                    },
                ),

            (
                S::InitiatingSignIn { .. } | S::RespondingToChallenge { .. },
                E::SignInSucceeded(session),
            ) => self.settle(S::SignedIn(session.clone())),

            (S::InitiatingSignIn { .. } | S::RespondingToChallenge { .. }, E::Failed(error)) => {
                self.settle(S::Error(error.clone()))
            },

            (
                S::InitiatingSignIn { .. } | S::AwaitingChallenge { .. } | S::RespondingToChallenge { .. },
                E::CancelSignIn,
            ) => Resolution::to(S::CancellingSignIn)
                .with(Effect::Cancel(SIGN_IN))
                .with(Effect::Cancel(SIGN_IN_TIMEOUT))
                .with(Effect::Run(SignInAction::CancelSignIn)),

            (S::NotStarted, E::CancelSignIn) => Resolution::to(S::Cancelled),

            (S::CancellingSignIn, E::SignInCancelled) => Resolution::to(S::Cancelled),

            (
                S::NotStarted,
                E::ChallengeIssued(_) | E::RespondToChallenge { .. } | E::SignInSucceeded(_),
            ) => invalid("sign-in was never started"),

            (S::InitiatingSignIn { .. }, E::RespondToChallenge { .. }) => {
                invalid("no challenge was issued")
            },

            _ => Resolution::unchanged(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AuthSession, Challenge, ChallengeKind, Secret, Tokens, UserId};
    use authflow_testing::{ResolverTest, assertions, test_clock};
    use authflow_core::environment::Clock;

    fn challenge() -> Challenge {
        Challenge {
            kind: ChallengeKind::TotpCode,
            session: Secret::new("challenge-1"),
            destination: None,
        }
    }

    fn session() -> AuthSession {
        AuthSession::issue(
            UserId::new("user-1"),
            "alice".into(),
            Tokens {
                access_token: Secret::new("access-1"),
                id_token: Secret::new("id-1"),
                refresh_token: Secret::new("refresh-1"),
                expires_in: Duration::from_secs(3600),
            },
            test_clock().now(),
        )
    }

    #[test]
    fn test_initiate_starts_authentication() {
        ResolverTest::new(SignInResolver::new(None))
            .given_state(SignInState::NotStarted)
            .when_event(SignInEvent::InitiateSignIn {
                username: "alice".into(),
                password: Secret::new("password1"),
            })
            .then_state(|state| assert_eq!(state.stage(), "initiatingSignIn"))
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_runs(effects, "InitiateSignIn");
            })
            .run();
    }

    #[test]
    fn test_challenge_then_answer() {
        let resolver = SignInResolver::new(Some(Duration::from_secs(10)));

        let issued = resolver.resolve(
            &SignInState::InitiatingSignIn {
                username: "alice".into(),
            },
            &SignInEvent::ChallengeIssued(challenge()),
        );
        assert_eq!(issued.state.stage(), "awaitingChallenge");
        assertions::assert_cancels(&issued.effects, SIGN_IN_TIMEOUT);

        let answered = resolver.resolve(
            &issued.state,
            &SignInEvent::RespondToChallenge {
                answer: Secret::new("000000"),
            },
        );
        assert_eq!(answered.state.stage(), "respondingToChallenge");
        assertions::assert_runs(&answered.effects, "RespondToChallenge");
        assertions::assert_effects_count(&answered.effects, 2);
    }

    #[test]
    fn test_success_is_terminal() {
        ResolverTest::new(SignInResolver::new(None))
            .given_state(SignInState::RespondingToChallenge {
                username: "alice".into(),
                challenge: challenge(),
            })
            .when_event(SignInEvent::SignInSucceeded(session()))
            .then_state(|state| {
                assert_eq!(state, &SignInState::SignedIn(session()));
                assert!(state.is_terminal());
            })
            .run();
    }

    #[test]
    fn test_cancel_while_awaiting_challenge() {
        ResolverTest::new(SignInResolver::new(None))
            .given_state(SignInState::AwaitingChallenge {
                username: "alice".into(),
                challenge: challenge(),
            })
            .when_event(SignInEvent::CancelSignIn)
            .then_state(|state| assert_eq!(state, &SignInState::CancellingSignIn))
            .then_effects(|effects| {
                assertions::assert_cancels(effects, SIGN_IN);
                assertions::assert_runs(effects, "CancelSignIn");
            })
            .run();
    }

    #[test]
    fn test_answer_without_challenge_is_reported() {
        ResolverTest::new(SignInResolver::new(None))
            .given_state(SignInState::InitiatingSignIn {
                username: "alice".into(),
            })
            .when_event(SignInEvent::RespondToChallenge {
                answer: Secret::new("000000"),
            })
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .then_diagnostic(|diagnostic| {
                assert_eq!(diagnostic.map(|d| d.event), Some("RespondToChallenge"));
            })
            .run();
    }

    #[test]
    fn test_late_success_after_cancel_is_no_op() {
        let resolver = SignInResolver::new(None);
        assertions::assert_no_op(
            &resolver,
            &SignInState::CancellingSignIn,
            &SignInEvent::SignInSucceeded(session()),
        );
        assertions::assert_no_op(
            &resolver,
            &SignInState::Cancelled,
            &SignInEvent::Failed(AuthError::Cancelled),
        );
    }
}
