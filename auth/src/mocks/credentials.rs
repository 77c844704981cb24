//! Mock credential store for testing.

use crate::error::{AuthError, Result};
use crate::providers::{CredentialStore, ProviderFuture};
use crate::state::AuthSession;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock credential store.
///
/// Uses in-memory storage for testing. [`fail_with`](Self::fail_with) makes
/// every subsequent operation fail until [`recover`](Self::recover).
/// [`with_save_delay`](Self::with_save_delay) makes saves write the session
/// and then stall before returning.
#[derive(Debug, Clone, Default)]
pub struct MockCredentialStore {
    slot: Arc<Mutex<Option<AuthSession>>>,
    failure: Arc<Mutex<Option<AuthError>>>,
    save_delay: Option<Duration>,
}

impl MockCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `session`.
    #[must_use]
    pub fn with_session(session: AuthSession) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(session))),
            ..Self::default()
        }
    }

    /// Stall every save for `delay` after the session has been written.
    #[must_use]
    pub const fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = Some(delay);
        self
    }

    /// The stored session (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn stored(&self) -> Result<Option<AuthSession>> {
        Ok(self
            .slot
            .lock()
            .map_err(|_| AuthError::internal("Mutex lock failed"))?
            .clone())
    }

    /// Fail every operation with `error`.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn fail_with(&self, error: AuthError) -> Result<()> {
        *self
            .failure
            .lock()
            .map_err(|_| AuthError::internal("Mutex lock failed"))? = Some(error);
        Ok(())
    }

    /// Stop failing.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn recover(&self) -> Result<()> {
        *self
            .failure
            .lock()
            .map_err(|_| AuthError::internal("Mutex lock failed"))? = None;
        Ok(())
    }

    fn check(&self) -> Result<()> {
        let failure = self
            .failure
            .lock()
            .map_err(|_| AuthError::internal("Mutex lock failed"))?;
        failure.clone().map_or(Ok(()), Err)
    }

    fn write(&self, session: Option<AuthSession>) -> Result<()> {
        self.check()?;
        *self
            .slot
            .lock()
            .map_err(|_| AuthError::internal("Mutex lock failed"))? = session;
        Ok(())
    }
}

impl CredentialStore for MockCredentialStore {
    fn load_session(&self) -> ProviderFuture<'_, Option<AuthSession>> {
        Box::pin(async move {
            self.check()?;
            self.stored()
        })
    }

    fn save_session(&self, session: AuthSession) -> ProviderFuture<'_, ()> {
        Box::pin(async move {
            self.write(Some(session))?;
            if let Some(delay) = self.save_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        })
    }

    fn clear(&self) -> ProviderFuture<'_, ()> {
        Box::pin(async move { self.write(None) })
    }
}
