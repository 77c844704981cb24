//! Local credential persistence.

use super::ProviderFuture;
use crate::state::AuthSession;

/// Durable storage for the signed-in session.
///
/// Holds at most one session: the flow restores it when configured, writes
/// it after sign-in and refresh, and clears it on sign-out.
pub trait CredentialStore: Send + Sync {
    /// Load the stored session, if any.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialStore`](crate::error::AuthError::CredentialStore)
    /// if the store cannot be read.
    fn load_session(&self) -> ProviderFuture<'_, Option<AuthSession>>;

    /// Replace the stored session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialStore`](crate::error::AuthError::CredentialStore)
    /// if the store cannot be written.
    fn save_session(&self, session: AuthSession) -> ProviderFuture<'_, ()>;

    /// Remove the stored session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialStore`](crate::error::AuthError::CredentialStore)
    /// if the store cannot be written.
    fn clear(&self) -> ProviderFuture<'_, ()>;
}
