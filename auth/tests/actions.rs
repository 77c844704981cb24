//! Action behavior against the in-memory providers.
//!
//! Each action must dispatch exactly one result event on every path,
//! including provider failures and cancellation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use authflow_auth::mocks::{CONFIRMATION_CODE, MockCredentialStore, MockIdentityProvider, ProviderCall};
use authflow_auth::{
    AuthAction, AuthConfiguration, AuthEnvironment, AuthError, AuthEvent, ProviderErrorKind, Secret, SignInAction,
    SignInEvent, SignUpAction, SignUpEvent, UserId,
};
use authflow_core::environment::Clock;
use authflow_testing::{ActionProbe, test_clock};
use std::collections::BTreeMap;
use std::time::Duration;

fn environment(provider: &MockIdentityProvider, credentials: &MockCredentialStore) -> AuthEnvironment {
    AuthEnvironment::new(provider.clone(), credentials.clone()).with_clock(test_clock())
}

fn register(username: &str, password: &str) -> SignUpAction {
    SignUpAction::InitiateSignUp {
        username: username.to_string(),
        password: Secret::new(password),
        attributes: BTreeMap::from([("email".to_string(), format!("{username}@example.com"))]),
    }
}

fn provider_kind(error: &AuthError) -> Option<ProviderErrorKind> {
    match error {
        AuthError::Provider(error) => Some(error.kind),
        _ => None,
    }
}

#[tokio::test]
async fn test_registration_reports_delivery() {
    let provider = MockIdentityProvider::new();
    let probe = ActionProbe::new(environment(&provider, &MockCredentialStore::new()));

    let event = probe.run_single(register("alice", "correct horse")).await;

    let SignUpEvent::SignUpSucceeded { user_id, delivery } = &event else {
        panic!("unexpected event {event:?}");
    };
    assert_eq!(user_id.as_str(), "user-1");
    assert_eq!(
        delivery.as_ref().map(|d| d.destination.as_str()),
        Some("a***@example.com")
    );
}

#[tokio::test]
async fn test_rejected_password_fails_registration() {
    let provider = MockIdentityProvider::new();
    let probe = ActionProbe::new(environment(&provider, &MockCredentialStore::new()));

    let event = probe.run_single(register("alice", "short")).await;

    let SignUpEvent::Failed(error) = &event else {
        panic!("unexpected event {event:?}");
    };
    assert_eq!(provider_kind(error), Some(ProviderErrorKind::InvalidParameter));
}

#[tokio::test]
async fn test_duplicate_registration_fails() {
    let provider = MockIdentityProvider::new().with_user("alice", "password1");
    let probe = ActionProbe::new(environment(&provider, &MockCredentialStore::new()));

    let event = probe.run_single(register("alice", "correct horse")).await;

    assert!(matches!(
        &event,
        SignUpEvent::Failed(error) if provider_kind(error) == Some(ProviderErrorKind::UsernameExists)
    ));
}

#[tokio::test]
async fn test_confirmation() {
    let provider = MockIdentityProvider::new();
    let probe = ActionProbe::new(environment(&provider, &MockCredentialStore::new()));
    probe.run_single(register("bob", "correct horse")).await;

    let event = probe
        .run_single(SignUpAction::ConfirmSignUp {
            username: "bob".to_string(),
            code: Secret::new(CONFIRMATION_CODE),
        })
        .await;

    assert_eq!(event, SignUpEvent::SignUpConfirmed);
}

#[tokio::test]
async fn test_cancelled_confirmation_reports_cancellation_once() {
    let provider = MockIdentityProvider::new().with_latency(Duration::from_millis(200));
    let probe = ActionProbe::new(environment(&provider, &MockCredentialStore::new()));

    let events = probe
        .run_cancelled_after(
            SignUpAction::ConfirmSignUp {
                username: "bob".to_string(),
                code: Secret::new(CONFIRMATION_CODE),
            },
            Duration::from_millis(10),
        )
        .await;

    assert_eq!(events, vec![SignUpEvent::Failed(AuthError::Cancelled)]);
}

#[tokio::test]
async fn test_cancel_action_always_reports() {
    let environment = environment(&MockIdentityProvider::new(), &MockCredentialStore::new());
    let sign_up = ActionProbe::<SignUpAction>::new(environment.clone());
    let sign_in = ActionProbe::<SignInAction>::new(environment);

    assert_eq!(sign_up.run(SignUpAction::CancelSignUp).await, vec![SignUpEvent::SignUpCancelled]);
    assert_eq!(sign_in.run(SignInAction::CancelSignIn).await, vec![SignInEvent::SignInCancelled]);
}

#[tokio::test]
async fn test_cancel_sign_in_drops_session_saved_by_aborted_attempt() {
    let provider = MockIdentityProvider::new().with_user("carol", "password1");
    let credentials = MockCredentialStore::new();
    let environment = environment(&provider, &credentials);
    let cache = environment.cache.clone();
    let probe = ActionProbe::new(environment);

    let event = probe
        .run_single(SignInAction::InitiateSignIn {
            username: "carol".to_string(),
            password: Secret::new("password1"),
        })
        .await;
    assert!(matches!(event, SignInEvent::SignInSucceeded(_)));
    assert!(credentials.stored().unwrap().is_some());

    let events = probe.run(SignInAction::CancelSignIn).await;

    assert_eq!(events, vec![SignInEvent::SignInCancelled]);
    assert_eq!(credentials.stored().unwrap(), None);
    assert!(cache.get().is_none());
}

#[tokio::test]
async fn test_cancel_sign_in_reports_when_store_is_unavailable() {
    let credentials = MockCredentialStore::new();
    credentials.fail_with(AuthError::credential_store("keychain locked")).unwrap();
    let probe = ActionProbe::<SignInAction>::new(environment(&MockIdentityProvider::new(), &credentials));

    assert_eq!(probe.run(SignInAction::CancelSignIn).await, vec![SignInEvent::SignInCancelled]);
}

#[tokio::test]
async fn test_sign_in_persists_session() {
    let provider = MockIdentityProvider::new().with_user("carol", "password1");
    let credentials = MockCredentialStore::new();
    let environment = environment(&provider, &credentials);
    let cache = environment.cache.clone();
    let probe = ActionProbe::new(environment);

    let event = probe
        .run_single(AuthAction::SignIn(SignInAction::InitiateSignIn {
            username: "carol".to_string(),
            password: Secret::new("password1"),
        }))
        .await;

    let AuthEvent::SignIn(SignInEvent::SignInSucceeded(session)) = &event else {
        panic!("unexpected event {event:?}");
    };
    assert_eq!(session.issued_at, test_clock().now());
    assert_eq!(credentials.stored().unwrap().as_ref(), Some(session));
    assert_eq!(cache.get().as_ref(), Some(session));
}

#[tokio::test]
async fn test_unknown_user_does_not_touch_store() {
    let provider = MockIdentityProvider::new();
    let credentials = MockCredentialStore::new();
    let probe = ActionProbe::new(environment(&provider, &credentials));

    let event = probe
        .run_single(SignInAction::InitiateSignIn {
            username: "nobody".to_string(),
            password: Secret::new("password1"),
        })
        .await;

    assert!(matches!(
        &event,
        SignInEvent::Failed(error) if provider_kind(error) == Some(ProviderErrorKind::UserNotFound)
    ));
    assert_eq!(credentials.stored().unwrap(), None);
}

#[tokio::test]
async fn test_invalid_configuration_is_reported() {
    let probe = ActionProbe::new(environment(&MockIdentityProvider::new(), &MockCredentialStore::new()));

    let event = probe
        .run_single(AuthAction::ValidateConfig {
            configuration: AuthConfiguration::new("us-east-1_pool", "client", "not a region"),
        })
        .await;

    assert!(matches!(event, AuthEvent::ConfigurationFailed(error) if error.is_configuration()));
}

#[tokio::test]
async fn test_sign_out_clears_credentials_before_revoking() {
    let provider = MockIdentityProvider::new().with_user("dave", "password1");
    let credentials = MockCredentialStore::new();
    let probe = ActionProbe::new(environment(&provider, &credentials));

    let AuthEvent::SignIn(SignInEvent::SignInSucceeded(session)) = probe
        .run_single(AuthAction::SignIn(SignInAction::InitiateSignIn {
            username: "dave".to_string(),
            password: Secret::new("password1"),
        }))
        .await
    else {
        panic!("sign-in should succeed");
    };

    let event = probe
        .run_single(AuthAction::SignOut {
            configuration: AuthConfiguration::default(),
            session,
        })
        .await;

    assert_eq!(event, AuthEvent::SignedOut { revoked: true });
    assert_eq!(credentials.stored().unwrap(), None);
    assert_eq!(
        provider.calls().unwrap().last().copied(),
        Some(ProviderCall::Revoke)
    );
}

#[tokio::test]
async fn test_sign_out_fails_when_store_cannot_be_cleared() {
    let provider = MockIdentityProvider::new().with_user("erin", "password1");
    let credentials = MockCredentialStore::new();
    let environment = environment(&provider, &credentials);
    let cache = environment.cache.clone();
    let probe = ActionProbe::new(environment);

    let AuthEvent::SignIn(SignInEvent::SignInSucceeded(session)) = probe
        .run_single(AuthAction::SignIn(SignInAction::InitiateSignIn {
            username: "erin".to_string(),
            password: Secret::new("password1"),
        }))
        .await
    else {
        panic!("sign-in should succeed");
    };
    credentials.fail_with(AuthError::credential_store("keychain locked")).unwrap();

    let event = probe
        .run_single(AuthAction::SignOut {
            configuration: AuthConfiguration::default(),
            session: session.clone(),
        })
        .await;

    assert_eq!(event, AuthEvent::SignOutFailed(AuthError::credential_store("keychain locked")));
    assert_eq!(provider.call_count(ProviderCall::Revoke).unwrap(), 0);
    assert_eq!(credentials.stored().unwrap().as_ref(), Some(&session));
    assert_eq!(cache.get().as_ref(), Some(&session));
}

#[tokio::test]
async fn test_auto_confirmed_registration_has_no_delivery() {
    let provider = MockIdentityProvider::new().with_auto_confirm();
    let probe = ActionProbe::new(environment(&provider, &MockCredentialStore::new()));

    let event = probe.run_single(register("frank", "correct horse")).await;

    assert_eq!(
        event,
        SignUpEvent::SignUpSucceeded {
            user_id: UserId::new("user-1"),
            delivery: None,
        }
    );
}
