//! Authentication providers.
//!
//! This module defines traits for the external dependencies actions talk
//! to: the remote identity provider and local credential persistence. The
//! in-process [`SessionCache`] is a concrete type; it has no I/O to swap out.
//!
//! # Dyn Compatibility
//!
//! Provider traits return `Pin<Box<dyn Future>>` instead of using `async fn`
//! so they can be held as `Arc<dyn IdentityProvider>` and
//! `Arc<dyn CredentialStore>` inside [`AuthEnvironment`](crate::environment::AuthEnvironment).
//! Actions name a single concrete environment type that way, and tests swap
//! implementations without touching the flow's types.

use crate::error::Result;
use std::future::Future;
use std::pin::Pin;

pub mod credentials;
pub mod identity;
pub mod session_cache;

pub use credentials::CredentialStore;
pub use identity::{AuthOutcome, IdentityProvider, SignUpOutcome, SignUpRequest};
pub use session_cache::SessionCache;

/// Boxed future returned by provider calls.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;
