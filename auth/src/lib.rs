//! # Authflow Authentication
//!
//! Hierarchical authentication flow built on the authflow resolver model.
//!
//! ## Flows
//!
//! - **Configuration**: validate a user-pool configuration and restore a
//!   stored session
//! - **Sign-up**: register, then confirm with a delivered code
//! - **Sign-in**: authenticate, answering challenges when the provider
//!   issues them
//! - **Session**: refresh tokens with retry, sign out with best-effort revoke
//!
//! Sign-up and sign-in are sub-flows: their states are carried inside
//! [`AuthState`] and their events inside [`AuthEvent`]. The top-level
//! [`AuthResolver`] delegates to [`SignUpResolver`] and [`SignInResolver`].
//!
//! ## Architecture
//!
//! ```text
//! Event → Resolver → (State, Effects) → Action execution → More Events
//! ```
//!
//! Provider and credential failures never surface as `Err` from the
//! machine; actions report them as events and the flow ends in
//! [`AuthState::Error`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use authflow_auth::*;
//!
//! let environment = AuthEnvironment::new(provider, credentials);
//! let machine = AuthMachine::new(AuthState::NotConfigured, AuthResolver::new(), environment);
//!
//! machine.submit(AuthEvent::Configure(AuthConfiguration::from_env()?))?;
//! machine.submit(AuthEvent::SignIn(SignInEvent::InitiateSignIn {
//!     username: "alice".into(),
//!     password: Secret::new("correct horse"),
//! }))?;
//!
//! let state = machine
//!     .wait_for(|state| state.session().is_some(), Duration::from_secs(5))
//!     .await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

use authflow_runtime::error::MachineError;
use authflow_runtime::{StateMachine, StateMachineConfig};
use std::time::Duration;

// Public modules
pub mod actions;
pub mod config;
pub mod environment;
pub mod error;
pub mod events;
pub mod providers;
pub mod resolvers;
pub mod state;

/// In-memory providers for tests and demos
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use actions::{AuthAction, SignInAction, SignUpAction};
pub use config::{AuthConfiguration, CancelFallback};
pub use environment::AuthEnvironment;
pub use error::{AuthError, ProviderError, ProviderErrorKind, Result};
pub use events::{AuthEvent, SignInEvent, SignUpEvent};
pub use providers::{CredentialStore, IdentityProvider, SessionCache};
pub use resolvers::{AuthResolver, SignInResolver, SignUpResolver};
pub use state::{AuthSession, AuthState, Secret, SignInState, SignUpState, Tokens, UserId};

/// State machine running the top-level authentication flow.
pub type AuthMachine = StateMachine<AuthResolver>;

/// Start an [`AuthMachine`] and configure it.
///
/// Submits [`AuthEvent::Configure`] and waits up to `grace` for the flow to
/// leave [`AuthState::Configuring`]. A rejected configuration still counts as
/// settled; inspect the returned machine's state for
/// [`AuthState::Error`].
///
/// # Errors
///
/// - [`MachineError::InvalidConfig`]: the machine configuration is rejected
/// - [`MachineError::ConfigurationTimeout`]: validation did not finish within
///   `grace`
pub async fn start(
    configuration: AuthConfiguration,
    environment: AuthEnvironment,
    grace: Duration,
) -> std::result::Result<AuthMachine, MachineError> {
    AuthMachine::configured(
        AuthState::NotConfigured,
        AuthResolver::new(),
        environment,
        StateMachineConfig::new("auth"),
        AuthEvent::Configure(configuration),
        |state| !matches!(state, AuthState::NotConfigured | AuthState::Configuring { .. }),
        grace,
    )
    .await
}
