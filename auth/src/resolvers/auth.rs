//! Top-level authentication resolver.

use super::{SignInResolver, SignUpResolver};
use crate::actions::AuthAction;
use crate::config::{AuthConfiguration, CancelFallback};
use crate::environment::AuthEnvironment;
use crate::error::AuthError;
use crate::events::{AuthEvent, SignInEvent, SignUpEvent};
use crate::state::{AuthState, SignInState, SignUpState};
use authflow_core::composition::nest;
use authflow_core::debug::DebugDictionary;
use authflow_core::effect::Effect;
use authflow_core::resolver::{FlowState, InvalidTransition, Resolution, Resolver};

type Step = Resolution<AuthState, AuthAction>;

/// Resolver for the top-level authentication flow.
///
/// Owns configuration, session refresh and sign-out directly; sign-up and
/// sign-in are delegated to their sub-flow resolvers, built per step from
/// the active configuration's flow timeout.
///
/// # Example
///
/// ```
/// use authflow_auth::config::AuthConfiguration;
/// use authflow_auth::events::AuthEvent;
/// use authflow_auth::resolvers::AuthResolver;
/// use authflow_auth::state::AuthState;
/// use authflow_core::resolver::{FlowState, Resolver};
///
/// let resolution = AuthResolver::new().resolve(
///     &AuthState::NotConfigured,
///     &AuthEvent::Configure(AuthConfiguration::default()),
/// );
///
/// assert_eq!(resolution.state.stage(), "configuring");
/// assert_eq!(resolution.actions().count(), 1);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthResolver;

impl AuthResolver {
    /// Create the resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn invalid(state: &AuthState, event: &AuthEvent, reason: &'static str) -> Step {
    Resolution::invalid(
        state,
        InvalidTransition::new(state.stage(), event.identifier(), reason),
    )
}

/// State after a sub-flow was cancelled.
fn after_cancel(configuration: &AuthConfiguration) -> AuthState {
    match configuration.cancel_fallback {
        CancelFallback::Idle => AuthState::Idle {
            configuration: configuration.clone(),
        },
        CancelFallback::NotConfigured => AuthState::NotConfigured,
    }
}

fn sign_up(configuration: &AuthConfiguration, flow: &SignUpState, event: &SignUpEvent) -> Step {
    let child = SignUpResolver::new(configuration.flow_timeout).resolve(flow, event);
    nest(
        child,
        |flow| match flow {
            SignUpState::SignedUp { username, user_id } => AuthState::SignedUp {
                configuration: configuration.clone(),
                username,
                user_id,
            },
            SignUpState::Cancelled => after_cancel(configuration),
            SignUpState::Error(error) => AuthState::Error {
                configuration: Some(configuration.clone()),
                error,
            },
            flow => AuthState::SigningUp {
                configuration: configuration.clone(),
                flow,
            },
        },
        AuthAction::SignUp,
        AuthEvent::SignUp,
    )
}

fn sign_in(configuration: &AuthConfiguration, flow: &SignInState, event: &SignInEvent) -> Step {
    let child = SignInResolver::new(configuration.flow_timeout).resolve(flow, event);
    nest(
        child,
        |flow| match flow {
            SignInState::SignedIn(session) => AuthState::SignedIn {
                configuration: configuration.clone(),
                session,
            },
            SignInState::Cancelled => after_cancel(configuration),
            SignInState::Error(error) => AuthState::Error {
                configuration: Some(configuration.clone()),
                error,
            },
            flow => AuthState::SigningIn {
                configuration: configuration.clone(),
                flow,
            },
        },
        AuthAction::SignIn,
        AuthEvent::SignIn,
    )
}

impl Resolver for AuthResolver {
    type State = AuthState;
    type Event = AuthEvent;
    type Action = AuthAction;
    type Environment = AuthEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per row of the transition table
    fn resolve(&self, state: &AuthState, event: &AuthEvent) -> Step {
        use AuthEvent as E;
        use AuthState as S;

        match (state, event) {
            // Configuration
            (
                S::NotConfigured | S::Idle { .. } | S::SignedOut { .. } | S::Error { .. },
                E::Configure(configuration),
            ) => Resolution::to(S::Configuring {
                configuration: configuration.clone(),
            })
            .with(Effect::Run(AuthAction::ValidateConfig {
                configuration: configuration.clone(),
            })),

            (
                S::Configuring { .. },
                E::Configured {
                    configuration,
                    session,
                },
            ) => Resolution::to(match session {
                Some(session) => S::SignedIn {
                    configuration: configuration.clone(),
                    session: session.clone(),
                },
                None => S::Idle {
                    configuration: configuration.clone(),
                },
            }),

            (S::Configuring { .. }, E::ConfigurationFailed(error)) => Resolution::to(S::Error {
                configuration: None,
                error: error.clone(),
            }),

            (_, E::Configured { .. } | E::ConfigurationFailed(_)) => {
                invalid(state, event, "no configuration in progress")
            },

            // Requests before configuration
            (S::NotConfigured | S::Error { configuration: None, .. }, request) if request.is_request() => {
                Resolution::to(S::Error {
                    configuration: None,
                    error: AuthError::configuration("authentication is not configured"),
                })
            },

            // Sub-flows
            (
                S::Idle { configuration }
                | S::SignedUp { configuration, .. }
                | S::SignedOut { configuration }
                | S::Error {
                    configuration: Some(configuration),
                    ..
                },
                E::SignUp(child @ SignUpEvent::InitiateSignUp { .. }),
            ) => sign_up(configuration, &SignUpState::NotStarted, child),

            (
                S::Idle { configuration }
                | S::SignedUp { configuration, .. }
                | S::SignedOut { configuration }
                | S::Error {
                    configuration: Some(configuration),
                    ..
                },
                E::SignIn(child @ SignInEvent::InitiateSignIn { .. }),
            ) => sign_in(configuration, &SignInState::NotStarted, child),

            (S::SigningUp { configuration, flow }, E::SignUp(child)) => {
                sign_up(configuration, flow, child)
            },

            (S::SigningIn { configuration, flow }, E::SignIn(child)) => {
                sign_in(configuration, flow, child)
            },

            (_, E::SignUp(SignUpEvent::ConfirmSignUp { .. })) => {
                invalid(state, event, "no sign-up in progress")
            },

            (_, E::SignIn(SignInEvent::RespondToChallenge { .. })) => {
                invalid(state, event, "no sign-in in progress")
            },

            // Session refresh
            (
                S::SignedIn {
                    configuration,
                    session,
                },
                E::RefreshSession,
            ) => Resolution::to(S::RefreshingSession {
                configuration: configuration.clone(),
                session: session.clone(),
            })
            .with(Effect::Run(AuthAction::RefreshSession {
                configuration: configuration.clone(),
                session: session.clone(),
            })),

            (S::RefreshingSession { configuration, .. }, E::SessionRefreshed(session)) => {
                Resolution::to(S::SignedIn {
                    configuration: configuration.clone(),
                    session: session.clone(),
                })
            },

            (
                S::RefreshingSession {
                    configuration,
                    session,
                },
                E::RefreshFailed(error),
            ) => Resolution::to(if error.is_retryable() {
                // Retries exhausted on a transient failure; the old session still stands.
                S::SignedIn {
                    configuration: configuration.clone(),
                    session: session.clone(),
                }
            } else {
                S::Error {
                    configuration: Some(configuration.clone()),
                    error: error.clone(),
                }
            }),

            (_, E::SessionRefreshed(_) | E::RefreshFailed(_)) => {
                invalid(state, event, "no refresh in progress")
            },

            // Sign-out
            (
                S::SignedIn {
                    configuration,
                    session,
                },
                E::SignOut,
            ) => Resolution::to(S::SigningOut {
                configuration: configuration.clone(),
                session: session.clone(),
            })
            .with(Effect::Run(AuthAction::SignOut {
                configuration: configuration.clone(),
                session: session.clone(),
            })),

            (S::SigningOut { configuration, .. }, E::SignedOut { .. }) => {
                Resolution::to(S::SignedOut {
                    configuration: configuration.clone(),
                })
            },

            (S::SigningOut { configuration, .. }, E::SignOutFailed(error)) => {
                Resolution::to(S::Error {
                    configuration: Some(configuration.clone()),
                    error: error.clone(),
                })
            },

            (_, E::SignedOut { .. } | E::SignOutFailed(_)) => {
                invalid(state, event, "no sign-out in progress")
            },

            // Late sub-flow results, requests in the wrong stage
            _ => Resolution::unchanged(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;
    use crate::resolvers::{SIGN_UP, SIGN_UP_TIMEOUT};
    use crate::state::{AuthSession, Secret, Tokens, UserId};
    use authflow_testing::{ResolverTest, assertions, test_clock};
    use authflow_core::environment::Clock;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn configuration() -> AuthConfiguration {
        AuthConfiguration::default()
    }

    fn idle() -> AuthState {
        AuthState::Idle {
            configuration: configuration(),
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

    fn signed_in() -> AuthState {
        AuthState::SignedIn {
            configuration: configuration(),
            session: session(),
        }
    }

    fn initiate_sign_up() -> AuthEvent {
        AuthEvent::SignUp(SignUpEvent::InitiateSignUp {
            username: "alice".into(),
            password: Secret::new("correct horse"),
            attributes: BTreeMap::new(),
        })
    }

    #[test]
    fn test_configure_runs_validation() {
        ResolverTest::new(AuthResolver::new())
            .given_state(AuthState::NotConfigured)
            .when_event(AuthEvent::Configure(configuration()))
            .then_state(|state| assert_eq!(state.stage(), "configuring"))
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_runs(effects, "ValidateConfig");
            })
            .run();
    }

    #[test]
    fn test_configured_with_stored_session_is_signed_in() {
        ResolverTest::new(AuthResolver::new())
            .given_state(AuthState::Configuring {
                configuration: configuration(),
            })
            .when_event(AuthEvent::Configured {
                configuration: configuration(),
                session: Some(session()),
            })
            .then_state(|state| assert_eq!(state, &signed_in()))
            .run();
    }

    #[test]
    fn test_configuration_failure_drops_configuration() {
        ResolverTest::new(AuthResolver::new())
            .given_state(AuthState::Configuring {
                configuration: configuration(),
            })
            .when_event(AuthEvent::ConfigurationFailed(AuthError::configuration("bad region")))
            .then_state(|state| {
                assert_eq!(state.configuration(), None);
                assert!(state.error().is_some_and(AuthError::is_configuration));
            })
            .run();
    }

    #[test]
    fn test_request_before_configuration_fails() {
        ResolverTest::new(AuthResolver::new())
            .given_state(AuthState::NotConfigured)
            .when_event(initiate_sign_up())
            .then_state(|state| {
                assert_eq!(
                    state,
                    &AuthState::Error {
                        configuration: None,
                        error: AuthError::configuration("authentication is not configured"),
                    }
                );
            })
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    fn test_sign_up_is_delegated_and_embedded() {
        ResolverTest::new(AuthResolver::new())
            .given_state(idle())
            .when_event(initiate_sign_up())
            .then_state(|state| {
                assert_eq!(
                    state,
                    &AuthState::SigningUp {
                        configuration: configuration(),
                        flow: SignUpState::InitiatingSignUp {
                            username: "alice".into()
                        },
                    }
                );
            })
            .then_effects(|effects| {
                assert!(matches!(
                    &effects[0],
                    Effect::Cancellable {
                        id,
                        action: AuthAction::SignUp(_)
                    } if *id == SIGN_UP
                ));
            })
            .run();
    }

    #[test]
    fn test_sub_flow_timeout_uses_configuration() {
        let configuration = configuration().with_flow_timeout(Duration::from_secs(20));
        ResolverTest::new(AuthResolver::new())
            .given_state(AuthState::Idle { configuration })
            .when_event(initiate_sign_up())
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 2);
                assert_eq!(
                    effects[1],
                    Effect::timeout(
                        SIGN_UP_TIMEOUT,
                        Duration::from_secs(20),
                        AuthEvent::SignUp(SignUpEvent::CancelSignUp)
                    )
                );
            })
            .run();
    }

    #[test]
    fn test_confirmed_sign_up_collapses_to_signed_up() {
        ResolverTest::new(AuthResolver::new())
            .given_state(AuthState::SigningUp {
                configuration: configuration(),
                flow: SignUpState::ConfirmingSignUp {
                    username: "alice".into(),
                    user_id: UserId::new("user-1"),
                },
            })
            .when_event(AuthEvent::SignUp(SignUpEvent::SignUpConfirmed))
            .then_state(|state| {
                assert_eq!(
                    state,
                    &AuthState::SignedUp {
                        configuration: configuration(),
                        username: "alice".into(),
                        user_id: UserId::new("user-1"),
                    }
                );
            })
            .run();
    }

    #[test]
    fn test_cancelled_sub_flow_uses_fallback() {
        let resolver = AuthResolver::new();

        let stays_configured = resolver.resolve(
            &AuthState::SigningUp {
                configuration: configuration(),
                flow: SignUpState::CancellingSignUp,
            },
            &AuthEvent::SignUp(SignUpEvent::SignUpCancelled),
        );
        assert_eq!(stays_configured.state, idle());

        let drops_configuration = resolver.resolve(
            &AuthState::SigningIn {
                configuration: configuration().with_cancel_fallback(CancelFallback::NotConfigured),
                flow: SignInState::CancellingSignIn,
            },
            &AuthEvent::SignIn(SignInEvent::SignInCancelled),
        );
        assert_eq!(drops_configuration.state, AuthState::NotConfigured);
    }

    #[test]
    fn test_sign_in_success_collapses_to_signed_in() {
        ResolverTest::new(AuthResolver::new())
            .given_state(AuthState::SigningIn {
                configuration: configuration(),
                flow: SignInState::InitiatingSignIn {
                    username: "alice".into(),
                },
            })
            .when_event(AuthEvent::SignIn(SignInEvent::SignInSucceeded(session())))
            .then_state(|state| assert_eq!(state, &signed_in()))
            .run();
    }

    #[test]
    fn test_transient_refresh_failure_keeps_session() {
        let resolver = AuthResolver::new();
        let refreshing = resolver.resolve(&signed_in(), &AuthEvent::RefreshSession);
        assert_eq!(refreshing.state.stage(), "refreshingSession");
        assertions::assert_runs(&refreshing.effects, "RefreshSession");

        let transient = resolver.resolve(
            &refreshing.state,
            &AuthEvent::RefreshFailed(AuthError::provider(ProviderErrorKind::Network, "reset")),
        );
        assert_eq!(transient.state, signed_in());

        let fatal = resolver.resolve(
            &refreshing.state,
            &AuthEvent::RefreshFailed(AuthError::provider(ProviderErrorKind::NotAuthorized, "revoked")),
        );
        assert_eq!(fatal.state.stage(), "error");
        assert_eq!(fatal.state.configuration(), Some(&configuration()));
    }

    #[test]
    fn test_sign_out() {
        let resolver = AuthResolver::new();
        let signing_out = resolver.resolve(&signed_in(), &AuthEvent::SignOut);
        assertions::assert_runs(&signing_out.effects, "SignOut");

        let done = resolver.resolve(&signing_out.state, &AuthEvent::SignedOut { revoked: false });
        assert_eq!(
            done.state,
            AuthState::SignedOut {
                configuration: configuration()
            }
        );
    }

    #[test]
    fn test_impossible_results_are_reported() {
        ResolverTest::new(AuthResolver::new())
            .given_state(idle())
            .when_event(AuthEvent::SessionRefreshed(session()))
            .then_state(|state| assert_eq!(state, &idle()))
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .then_diagnostic(|diagnostic| {
                assert_eq!(
                    diagnostic.map(|d| (d.stage, d.reason)),
                    Some(("idle", "no refresh in progress"))
                );
            })
            .run();
    }

    #[test]
    fn test_stale_sub_flow_events_are_no_ops() {
        let resolver = AuthResolver::new();
        assertions::assert_no_op(
            &resolver,
            &idle(),
            &AuthEvent::SignUp(SignUpEvent::Failed(AuthError::Cancelled)),
        );
        assertions::assert_no_op(
            &resolver,
            &signed_in(),
            &AuthEvent::SignIn(SignInEvent::SignInSucceeded(session())),
        );
        assertions::assert_no_op(&resolver, &idle(), &AuthEvent::SignUp(SignUpEvent::CancelSignUp));
    }
}
