//! Signup demo binary
//!
//! Drives the authentication flow through configure, sign-up, confirmation,
//! sign-in, refresh and sign-out against the in-memory providers.

use authflow_auth::mocks::{CONFIRMATION_CODE, MockCredentialStore, MockIdentityProvider};
use authflow_auth::{
    AuthConfiguration, AuthEnvironment, AuthEvent, AuthMachine, AuthState, Secret, SignInEvent, SignUpEvent,
    SignUpState,
};
use authflow_core::resolver::FlowState;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WAIT: Duration = Duration::from_secs(5);

async fn step<F>(machine: &AuthMachine, label: &str, event: AuthEvent, settled: F) -> anyhow::Result<AuthState>
where
    F: Fn(&AuthState) -> bool,
{
    println!("\n>>> {label}");
    let state = machine
        .submit_and_wait_for(event, |state| settled(state) || state.stage() == "error", WAIT)
        .await?;
    if let Some(error) = state.error() {
        anyhow::bail!("{label} failed: {error}");
    }
    println!("Stage: {}", state.stage());
    Ok(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signup_demo=debug,authflow_runtime=debug,authflow_auth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Signup Demo: authflow authentication ===");

    let configuration = AuthConfiguration::from_env().unwrap_or_else(|error| {
        tracing::info!(%error, "No configuration in the environment, using defaults");
        AuthConfiguration::default()
    });
    let provider = MockIdentityProvider::new().with_latency(Duration::from_millis(50));
    let environment = AuthEnvironment::new(provider, MockCredentialStore::new());
    let cache = environment.cache.clone();

    let machine = authflow_auth::start(configuration, environment, WAIT).await?;
    println!("Configured, stage: {}", machine.current_state().stage());

    let awaiting = step(
        &machine,
        "Sign up alice",
        AuthEvent::SignUp(SignUpEvent::InitiateSignUp {
            username: "alice".to_string(),
            password: Secret::new("correct horse battery"),
            attributes: BTreeMap::from([("email".to_string(), "alice@example.com".to_string())]),
        }),
        |state| {
            matches!(
                state,
                AuthState::SigningUp {
                    flow: SignUpState::AwaitingConfirmation { .. },
                    ..
                }
            )
        },
    )
    .await?;
    if let AuthState::SigningUp {
        flow: SignUpState::AwaitingConfirmation { delivery, .. },
        ..
    } = &awaiting
    {
        println!("Code sent to {} via {:?}", delivery.destination, delivery.medium);
    }

    step(
        &machine,
        "Confirm sign-up",
        AuthEvent::SignUp(SignUpEvent::ConfirmSignUp {
            code: Secret::new(CONFIRMATION_CODE),
        }),
        |state| matches!(state, AuthState::SignedUp { .. }),
    )
    .await?;

    let signed_in = step(
        &machine,
        "Sign in alice",
        AuthEvent::SignIn(SignInEvent::InitiateSignIn {
            username: "alice".to_string(),
            password: Secret::new("correct horse battery"),
        }),
        |state| matches!(state, AuthState::SignedIn { .. }),
    )
    .await?;
    if let Some(session) = signed_in.session() {
        println!("Session for {} expires at {}", session.user_id, session.expires_at);
    }

    let refreshed = step(&machine, "Refresh session", AuthEvent::RefreshSession, |state| {
        matches!(state, AuthState::SignedIn { .. })
    })
    .await?;
    if let Some(session) = refreshed.session() {
        println!("Refreshed, expires at {}", session.expires_at);
    }
    println!("Cached session present: {}", cache.get().is_some());

    step(&machine, "Sign out", AuthEvent::SignOut, |state| {
        matches!(state, AuthState::SignedOut { .. })
    })
    .await?;
    println!("Cached session present: {}", cache.get().is_some());

    machine.shutdown(WAIT).await?;

    println!("\n=== Demo Complete ===");
    Ok(())
}
