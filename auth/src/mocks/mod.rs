//! Mock provider implementations for testing.
//!
//! This module provides simple, in-memory implementations of the provider
//! traits for use in unit and integration tests and in demos.

pub mod credentials;
pub mod identity;

pub use credentials::MockCredentialStore;
pub use identity::{CHALLENGE_ANSWER, CONFIRMATION_CODE, MockIdentityProvider, ProviderCall};
