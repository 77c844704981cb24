//! Remote identity provider.

use super::ProviderFuture;
use crate::state::{Challenge, CodeDelivery, Secret, Tokens, UserId};
use std::collections::BTreeMap;

/// Registration request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignUpRequest {
    /// Username to register
    pub username: String,
    /// Chosen password
    pub password: Secret,
    /// User attributes (email, phone number)
    pub attributes: BTreeMap<String, String>,
}

/// Registration result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignUpOutcome {
    /// Assigned user id
    pub user_id: UserId,
    /// Whether the account is already confirmed
    pub confirmed: bool,
    /// Where the confirmation code went (unconfirmed accounts)
    pub delivery: Option<CodeDelivery>,
}

/// Result of an authentication step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Credentials accepted, tokens issued.
    Authenticated {
        /// Authenticated user
        user_id: UserId,
        /// Issued tokens
        tokens: Tokens,
    },
    /// Another step is required.
    Challenge(Challenge),
}

/// Identity provider operations used by the flows.
///
/// Every call reports failures as [`AuthError`](crate::error::AuthError);
/// remote failures use [`AuthError::Provider`](crate::error::AuthError::Provider)
/// with a kind that tells callers whether a retry can help.
///
/// # Cancellation
///
/// The runtime cancels an action by dropping its future. Implementations
/// must tolerate being dropped at any `.await` point.
pub trait IdentityProvider: Send + Sync {
    /// Register a new user.
    ///
    /// # Errors
    ///
    /// - `UsernameExists`: the username is taken
    /// - `InvalidParameter`: password policy or attribute validation failed
    fn sign_up(&self, request: SignUpRequest) -> ProviderFuture<'_, SignUpOutcome>;

    /// Confirm a registration with the delivered code.
    ///
    /// # Errors
    ///
    /// - `CodeMismatch` / `ExpiredCode`: the code was rejected
    /// - `UserNotFound`: no such registration
    fn confirm_sign_up(&self, username: String, code: Secret) -> ProviderFuture<'_, ()>;

    /// Authenticate with username and password.
    ///
    /// # Errors
    ///
    /// - `NotAuthorized`: credentials rejected
    /// - `UserNotFound`: no such user
    fn initiate_auth(&self, username: String, password: Secret) -> ProviderFuture<'_, AuthOutcome>;

    /// Answer a challenge issued by [`initiate_auth`](Self::initiate_auth).
    ///
    /// # Errors
    ///
    /// - `CodeMismatch` / `ExpiredCode`: the answer was rejected
    fn respond_to_challenge(
        &self,
        username: String,
        challenge: Challenge,
        answer: Secret,
    ) -> ProviderFuture<'_, AuthOutcome>;

    /// Exchange a refresh token for new tokens.
    ///
    /// # Errors
    ///
    /// - `NotAuthorized`: the refresh token is revoked or expired
    fn refresh_tokens(&self, username: String, refresh_token: Secret) -> ProviderFuture<'_, Tokens>;

    /// Revoke a refresh token.
    ///
    /// # Errors
    ///
    /// Remote failures only; revoking an unknown token succeeds.
    fn revoke(&self, refresh_token: Secret) -> ProviderFuture<'_, ()>;
}
