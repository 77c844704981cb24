//! Authentication configuration.
//!
//! Configuration is supplied by the application (or read from the process
//! environment with [`AuthConfiguration::from_env`]) and validated by the
//! `ValidateConfig` action when the flow is configured.

use crate::error::{AuthError, Result};
use authflow_runtime::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the user pool id.
pub const ENV_USER_POOL_ID: &str = "AUTH_USER_POOL_ID";
/// Environment variable holding the app client id.
pub const ENV_APP_CLIENT_ID: &str = "AUTH_APP_CLIENT_ID";
/// Environment variable holding the region.
pub const ENV_REGION: &str = "AUTH_REGION";
/// Optional environment variable overriding the provider endpoint.
pub const ENV_ENDPOINT: &str = "AUTH_ENDPOINT";
/// Optional environment variable arming flow timeouts, in seconds.
pub const ENV_FLOW_TIMEOUT_SECS: &str = "AUTH_FLOW_TIMEOUT_SECS";

/// Where the top-level flow goes after a sub-flow is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelFallback {
    /// Stay configured and return to idle.
    #[default]
    Idle,
    /// Drop the configuration.
    NotConfigured,
}

/// Identity provider configuration.
///
/// # Example
///
/// ```
/// use authflow_auth::config::{AuthConfiguration, CancelFallback};
/// use std::time::Duration;
///
/// let configuration = AuthConfiguration::new("us-east-1_Abc123", "client-id", "us-east-1")
///     .with_flow_timeout(Duration::from_secs(30))
///     .with_cancel_fallback(CancelFallback::NotConfigured);
///
/// assert!(configuration.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfiguration {
    /// User pool id, prefixed by `<region>_`.
    pub user_pool_id: String,

    /// App client id.
    pub app_client_id: String,

    /// Provider region, e.g. `us-east-1`.
    pub region: String,

    /// Endpoint override (local emulators).
    pub endpoint: Option<String>,

    /// Timeout armed whenever a sub-flow starts a provider call.
    ///
    /// Default: none (no implicit timeout)
    pub flow_timeout: Option<Duration>,

    /// State to return to after a cancelled sub-flow.
    ///
    /// Default: [`CancelFallback::Idle`]
    pub cancel_fallback: CancelFallback,

    /// Retry policy for token refresh.
    pub refresh_retry: RetryPolicy,
}

impl AuthConfiguration {
    /// Create a configuration with defaults for everything but the ids.
    #[must_use]
    pub fn new(
        user_pool_id: impl Into<String>,
        app_client_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            user_pool_id: user_pool_id.into(),
            app_client_id: app_client_id.into(),
            region: region.into(),
            endpoint: None,
            flow_timeout: None,
            cancel_fallback: CancelFallback::default(),
            refresh_retry: RetryPolicy::default(),
        }
    }

    /// Set the endpoint override.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Arm flow timeouts.
    #[must_use]
    pub const fn with_flow_timeout(mut self, timeout: Duration) -> Self {
        self.flow_timeout = Some(timeout);
        self
    }

    /// Set the cancellation fallback.
    #[must_use]
    pub const fn with_cancel_fallback(mut self, fallback: CancelFallback) -> Self {
        self.cancel_fallback = fallback;
        self
    }

    /// Set the refresh retry policy.
    #[must_use]
    pub fn with_refresh_retry(mut self, policy: RetryPolicy) -> Self {
        self.refresh_retry = policy;
        self
    }

    /// Load from `AUTH_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if a required variable is missing
    /// or `AUTH_FLOW_TIMEOUT_SECS` is not a number. The result is not
    /// validated; that happens when the flow is configured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (same keys as [`from_env`](Self::from_env)).
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AuthError::configuration(format!("{key} is not set")))
        };

        let mut configuration = Self::new(
            required(ENV_USER_POOL_ID)?,
            required(ENV_APP_CLIENT_ID)?,
            required(ENV_REGION)?,
        );

        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|value| !value.is_empty()) {
            configuration.endpoint = Some(endpoint);
        }

        if let Some(raw) = lookup(ENV_FLOW_TIMEOUT_SECS) {
            let seconds = raw.trim().parse::<u64>().map_err(|_| {
                AuthError::configuration(format!(
                    "{ENV_FLOW_TIMEOUT_SECS} must be a number of seconds, got `{raw}`"
                ))
            })?;
            configuration.flow_timeout = Some(Duration::from_secs(seconds));
        }

        Ok(configuration)
    }

    /// Check that the configuration can be used against a provider.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if:
    /// - the pool id or client id is empty
    /// - the region is not shaped like `us-east-1`
    /// - the pool id is not prefixed by `<region>_`
    /// - the flow timeout is zero
    pub fn validate(&self) -> Result<()> {
        if self.app_client_id.trim().is_empty() {
            return Err(AuthError::configuration("app_client_id must not be empty"));
        }
        if !is_region(&self.region) {
            return Err(AuthError::configuration(format!(
                "region `{}` is not a valid region name",
                self.region
            )));
        }

        let prefix = format!("{}_", self.region);
        match self.user_pool_id.strip_prefix(&prefix) {
            Some(suffix) if !suffix.is_empty() => {},
            _ => {
                return Err(AuthError::configuration(format!(
                    "user_pool_id `{}` must start with `{prefix}`",
                    self.user_pool_id
                )));
            },
        }

        if self.flow_timeout == Some(Duration::ZERO) {
            return Err(AuthError::configuration("flow_timeout must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for AuthConfiguration {
    fn default() -> Self {
        Self::new("us-east-1_example", "example-client", "us-east-1")
    }
}

/// `xx-name-N` (`us-east-1`, `us-gov-west-1`).
fn is_region(region: &str) -> bool {
    let parts: Vec<&str> = region.split('-').collect();
    let [first, middle @ .., last] = parts.as_slice() else {
        return false;
    };

    first.len() == 2
        && first.chars().all(|c| c.is_ascii_lowercase())
        && !middle.is_empty()
        && middle
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_lowercase()))
        && !last.is_empty()
        && last.chars().all(|c| c.is_ascii_digit())
}
