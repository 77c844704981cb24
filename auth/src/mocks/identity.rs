//! Mock identity provider for testing.

use crate::error::{AuthError, ProviderErrorKind, Result};
use crate::providers::{AuthOutcome, IdentityProvider, ProviderFuture, SignUpOutcome, SignUpRequest};
use crate::state::{Challenge, ChallengeKind, CodeDelivery, DeliveryMedium, Secret, Tokens, UserId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Code the mock accepts for sign-up confirmation.
pub const CONFIRMATION_CODE: &str = "123456";

/// Answer the mock accepts for sign-in challenges.
pub const CHALLENGE_ANSWER: &str = "000000";

/// Provider operation, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderCall {
    /// [`IdentityProvider::sign_up`]
    SignUp,
    /// [`IdentityProvider::confirm_sign_up`]
    ConfirmSignUp,
    /// [`IdentityProvider::initiate_auth`]
    InitiateAuth,
    /// [`IdentityProvider::respond_to_challenge`]
    RespondToChallenge,
    /// [`IdentityProvider::refresh_tokens`]
    RefreshTokens,
    /// [`IdentityProvider::revoke`]
    Revoke,
}

#[derive(Debug)]
struct MockUser {
    user_id: UserId,
    password: Secret,
    confirmed: bool,
}

#[derive(Debug, Default)]
struct Registry {
    users: HashMap<String, MockUser>,
    revoked: HashSet<String>,
    failures: HashMap<ProviderCall, VecDeque<AuthError>>,
    calls: Vec<ProviderCall>,
    issued: u64,
}

impl Registry {
    fn next_serial(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }
}

/// Mock identity provider.
///
/// Uses in-memory storage and behaves like a small user pool: sign-up
/// registers an unconfirmed user, [`CONFIRMATION_CODE`] confirms it, and
/// sign-in checks the password. Tests can add latency, require a challenge
/// on sign-in and script failures per operation.
#[derive(Debug, Clone)]
pub struct MockIdentityProvider {
    registry: Arc<Mutex<Registry>>,
    latency: Duration,
    challenge: Option<ChallengeKind>,
    token_lifetime: Duration,
    auto_confirm: bool,
}

impl MockIdentityProvider {
    /// Create a new mock identity provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            latency: Duration::ZERO,
            challenge: None,
            token_lifetime: Duration::from_secs(3600),
            auto_confirm: false,
        }
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Require a challenge of `kind` before issuing tokens.
    #[must_use]
    pub const fn with_challenge(mut self, kind: ChallengeKind) -> Self {
        self.challenge = Some(kind);
        self
    }

    /// Lifetime of issued access tokens.
    #[must_use]
    pub const fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    /// Confirm new users at registration; no code is delivered.
    #[must_use]
    pub const fn with_auto_confirm(mut self) -> Self {
        self.auto_confirm = true;
        self
    }

    /// Register a confirmed user.
    #[must_use]
    pub fn with_user(self, username: &str, password: &str) -> Self {
        if let Ok(mut registry) = self.registry.lock() {
            let user_id = UserId::new(format!("user-{}", registry.users.len() + 1));
            registry.users.insert(
                username.to_string(),
                MockUser {
                    user_id,
                    password: Secret::new(password),
                    confirmed: true,
                },
            );
        }
        self
    }

    /// Make the next call to `call` fail with `error`.
    ///
    /// Failures queue up: scripting two failures fails the next two calls.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn fail_next(&self, call: ProviderCall, error: AuthError) -> Result<()> {
        self.lock()?.failures.entry(call).or_default().push_back(error);
        Ok(())
    }

    /// Every call made so far, in order.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn calls(&self) -> Result<Vec<ProviderCall>> {
        Ok(self.lock()?.calls.clone())
    }

    /// Number of calls to `call` so far.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn call_count(&self, call: ProviderCall) -> Result<usize> {
        Ok(self.lock()?.calls.iter().filter(|c| **c == call).count())
    }

    /// Whether `refresh_token` has been revoked.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn is_revoked(&self, refresh_token: &str) -> Result<bool> {
        Ok(self.lock()?.revoked.contains(refresh_token))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Registry>> {
        self.registry
            .lock()
            .map_err(|_| AuthError::internal("Mutex lock failed"))
    }

    /// Record the call, wait out the latency, then apply any scripted failure.
    async fn enter(&self, call: ProviderCall) -> Result<()> {
        let scripted = {
            let mut registry = self.lock()?;
            registry.calls.push(call);
            registry.failures.get_mut(&call).and_then(VecDeque::pop_front)
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        scripted.map_or(Ok(()), Err)
    }

    fn issue(&self, registry: &mut Registry) -> Tokens {
        let serial = registry.next_serial();
        Tokens {
            access_token: Secret::new(format!("access-{serial}")),
            id_token: Secret::new(format!("id-{serial}")),
            refresh_token: Secret::new(format!("refresh-{serial}")),
            expires_in: self.token_lifetime,
        }
    }

    fn authenticated(&self, registry: &mut Registry, username: &str) -> Result<AuthOutcome> {
        let user_id = registry
            .users
            .get(username)
            .map(|user| user.user_id.clone())
            .ok_or_else(|| not_found(username))?;

        Ok(AuthOutcome::Authenticated {
            user_id,
            tokens: self.issue(registry),
        })
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(username: &str) -> AuthError {
    AuthError::provider(
        ProviderErrorKind::UserNotFound,
        format!("User `{username}` does not exist"),
    )
}

/// `alice@example.com` becomes `a***@example.com`.
fn mask(destination: &str) -> String {
    match destination.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().unwrap_or('*');
            format!("{first}***@{domain}")
        },
        None => "***".to_string(),
    }
}

impl IdentityProvider for MockIdentityProvider {
    fn sign_up(&self, request: SignUpRequest) -> ProviderFuture<'_, SignUpOutcome> {
        Box::pin(async move {
            self.enter(ProviderCall::SignUp).await?;

            if request.password.expose().chars().count() < 8 {
                return Err(AuthError::provider(
                    ProviderErrorKind::InvalidParameter,
                    "Password must be at least 8 characters",
                ));
            }

            let mut registry = self.lock()?;
            if registry.users.contains_key(&request.username) {
                return Err(AuthError::provider(
                    ProviderErrorKind::UsernameExists,
                    format!("User `{}` already exists", request.username),
                ));
            }

            let user_id = UserId::new(format!("user-{}", registry.users.len() + 1));
            registry.users.insert(
                request.username.clone(),
                MockUser {
                    user_id: user_id.clone(),
                    password: request.password,
                    confirmed: self.auto_confirm,
                },
            );

            let email = request
                .attributes
                .get("email")
                .map_or(request.username.as_str(), String::as_str);

            Ok(SignUpOutcome {
                user_id,
                confirmed: self.auto_confirm,
                delivery: (!self.auto_confirm).then(|| CodeDelivery {
                    destination: mask(email),
                    medium: DeliveryMedium::Email,
                    attribute: "email".to_string(),
                }),
            })
        })
    }

    fn confirm_sign_up(&self, username: String, code: Secret) -> ProviderFuture<'_, ()> {
        Box::pin(async move {
            self.enter(ProviderCall::ConfirmSignUp).await?;

            let mut registry = self.lock()?;
            let user = registry
                .users
                .get_mut(&username)
                .ok_or_else(|| not_found(&username))?;

            if code.expose() != CONFIRMATION_CODE {
                return Err(AuthError::provider(
                    ProviderErrorKind::CodeMismatch,
                    "Invalid verification code provided",
                ));
            }
            user.confirmed = true;
            Ok(())
        })
    }

    fn initiate_auth(&self, username: String, password: Secret) -> ProviderFuture<'_, AuthOutcome> {
        Box::pin(async move {
            self.enter(ProviderCall::InitiateAuth).await?;

            let mut registry = self.lock()?;
            let user = registry.users.get(&username).ok_or_else(|| not_found(&username))?;

            if user.password != password {
                return Err(AuthError::provider(
                    ProviderErrorKind::NotAuthorized,
                    "Incorrect username or password",
                ));
            }
            if !user.confirmed {
                return Err(AuthError::provider(
                    ProviderErrorKind::NotAuthorized,
                    "User is not confirmed",
                ));
            }

            match self.challenge {
                Some(kind) => {
                    let serial = registry.next_serial();
                    Ok(AuthOutcome::Challenge(Challenge {
                        kind,
                        session: Secret::new(format!("challenge-{serial}")),
                        destination: (kind == ChallengeKind::SmsCode)
                            .then(|| "+*******0100".to_string()),
                    }))
                },
                None => self.authenticated(&mut registry, &username),
            }
        })
    }

    fn respond_to_challenge(
        &self,
        username: String,
        _challenge: Challenge,
        answer: Secret,
    ) -> ProviderFuture<'_, AuthOutcome> {
        Box::pin(async move {
            self.enter(ProviderCall::RespondToChallenge).await?;

            if answer.expose() != CHALLENGE_ANSWER {
                return Err(AuthError::provider(
                    ProviderErrorKind::CodeMismatch,
                    "Invalid code received for user",
                ));
            }

            let mut registry = self.lock()?;
            self.authenticated(&mut registry, &username)
        })
    }

    fn refresh_tokens(&self, username: String, refresh_token: Secret) -> ProviderFuture<'_, Tokens> {
        Box::pin(async move {
            self.enter(ProviderCall::RefreshTokens).await?;

            let mut registry = self.lock()?;
            if !registry.users.contains_key(&username) {
                return Err(not_found(&username));
            }
            if registry.revoked.contains(refresh_token.expose()) {
                return Err(AuthError::provider(
                    ProviderErrorKind::NotAuthorized,
                    "Refresh Token has been revoked",
                ));
            }

            // The refresh token itself is not rotated.
            let mut tokens = self.issue(&mut registry);
            tokens.refresh_token = refresh_token;
            Ok(tokens)
        })
    }

    fn revoke(&self, refresh_token: Secret) -> ProviderFuture<'_, ()> {
        Box::pin(async move {
            self.enter(ProviderCall::Revoke).await?;
            self.lock()?.revoked.insert(refresh_token.expose().to_string());
            Ok(())
        })
    }
}
