//! Authentication environment.
//!
//! This module defines the environment type for dependency injection
//! in auth actions.

use crate::providers::{CredentialStore, IdentityProvider, SessionCache};
use authflow_core::environment::{Clock, Environment, IdGenerator, RandomIdGenerator, SystemClock};
use std::fmt;
use std::sync::Arc;

/// Authentication environment.
///
/// Contains all external dependencies needed by auth actions. It is fixed
/// when the state machine is built; every action of the flow runs against
/// the same instance.
#[derive(Clone)]
pub struct AuthEnvironment {
    /// Remote identity provider.
    pub provider: Arc<dyn IdentityProvider>,

    /// Durable session storage.
    pub credentials: Arc<dyn CredentialStore>,

    /// Current session, shared with the application.
    pub cache: SessionCache,

    /// Clock for session timestamps and event envelopes.
    pub clock: Arc<dyn Clock>,

    /// Event correlation ids.
    pub ids: Arc<dyn IdGenerator>,
}

impl AuthEnvironment {
    /// Create an environment with the system clock and random ids.
    #[must_use]
    pub fn new<P, C>(provider: P, credentials: C) -> Self
    where
        P: IdentityProvider + 'static,
        C: CredentialStore + 'static,
    {
        Self {
            provider: Arc::new(provider),
            credentials: Arc::new(credentials),
            cache: SessionCache::new(),
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIdGenerator),
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replace the id generator.
    #[must_use]
    pub fn with_ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Share an existing session cache.
    #[must_use]
    pub fn with_cache(mut self, cache: SessionCache) -> Self {
        self.cache = cache;
        self
    }
}

impl Environment for AuthEnvironment {
    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn ids(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }
}

impl fmt::Debug for AuthEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthEnvironment")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
