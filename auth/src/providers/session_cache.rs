//! In-memory cache of the current session.

use crate::state::AuthSession;
use std::sync::{Arc, Mutex, PoisonError};

/// Shared, synchronized slot holding the current session.
///
/// Clones share the same slot. The lock is held only for the duration of a
/// single call and never across an `.await`; no guard is handed out.
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
    slot: Arc<Mutex<Option<AuthSession>>>,
}

impl SessionCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the cached session.
    #[must_use]
    pub fn get(&self) -> Option<AuthSession> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Store `session`, returning the previous one.
    pub fn replace(&self, session: AuthSession) -> Option<AuthSession> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(session)
    }

    /// Remove the cached session, returning it.
    pub fn clear(&self) -> Option<AuthSession> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Secret, Tokens, UserId};
    use chrono::Utc;
    use std::time::Duration;

    fn session(user: &str) -> AuthSession {
        AuthSession::issue(
            UserId::new(user),
            user.to_string(),
            Tokens {
                access_token: Secret::new("a"),
                id_token: Secret::new("i"),
                refresh_token: Secret::new("r"),
                expires_in: Duration::from_secs(60),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_clones_share_the_slot() {
        let cache = SessionCache::new();
        let other = cache.clone();

        assert_eq!(cache.replace(session("alice")), None);
        assert_eq!(other.get().map(|s| s.username), Some("alice".to_string()));

        let previous = other.replace(session("bob"));
        assert_eq!(previous.map(|s| s.username), Some("alice".to_string()));

        assert!(cache.clear().is_some());
        assert_eq!(other.get(), None);
    }
}
