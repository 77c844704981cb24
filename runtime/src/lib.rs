//! # Authflow Runtime
//!
//! Runtime for authflow state machines.
//!
//! This crate provides the [`StateMachine`] that owns a flow's state,
//! serializes event resolution and executes the effects a resolver returns.
//!
//! ## Core Components
//!
//! - **`StateMachine`**: Owns the current state and a FIFO event queue
//! - **Worker**: Single task that resolves one event at a time
//! - **Executor**: Runs actions and timers, wiring results back into the queue
//!   and handling cancellation
//!
//! ## Ordering
//!
//! Events are resolved strictly one at a time in submission order. Effects
//! from a resolution are started after the new state is committed, and the
//! events they produce are queued behind everything already submitted.
//!
//! ## Example
//!
//! ```ignore
//! use authflow_runtime::StateMachine;
//!
//! let machine = StateMachine::new(AuthState::NotConfigured, AuthResolver::new(), environment);
//!
//! machine.submit(AuthEvent::Configure(configuration))?;
//! let state = machine
//!     .wait_for(|state| matches!(state, AuthState::Idle { .. }), Duration::from_secs(5))
//!     .await?;
//! ```

use error::MachineError;

mod executor;
mod machine;

/// Retry logic with exponential backoff
pub mod retry;

pub use machine::{StateMachine, Transition};

/// Error types for the state machine runtime
pub mod error {
    use std::time::Duration;
    use thiserror::Error;

    /// Errors returned by [`StateMachine`](crate::StateMachine) operations
    ///
    /// Failures inside a flow are never reported here: actions turn them into
    /// events and the flow's state carries them. These errors are about the
    /// machine itself.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum MachineError {
        /// The machine is shutting down and not accepting new events
        #[error("State machine is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for queued events, actions and timers
        #[error("Shutdown timed out with {0} units of work still pending")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a state
        #[error("Timeout waiting for state")]
        Timeout,

        /// Transition broadcast channel closed
        #[error("Transition broadcast channel closed")]
        ChannelClosed,

        /// The worker task is gone (a resolver panicked)
        #[error("State machine worker has stopped")]
        Stopped,

        /// Construction-time configuration problem
        #[error("Invalid state machine configuration: {0}")]
        InvalidConfig(String),

        /// The configure event did not reach a configured state within the grace period
        #[error("Flow was not configured within {0:?}")]
        ConfigurationTimeout(Duration),
    }
}

/// Configuration for [`StateMachine`] instances
///
/// # Example
///
/// ```
/// use authflow_runtime::StateMachineConfig;
///
/// let config = StateMachineConfig::new("sign-up").with_transition_capacity(64);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct StateMachineConfig {
    /// Flow name, used as the `flow` field in logs and the `flow` metric label
    pub name: String,
    /// Capacity of the transition broadcast channel
    pub transition_capacity: usize,
    /// Optional subscriber that receives this machine's log output instead of
    /// the global default
    pub logger: Option<tracing::Dispatch>,
}

impl StateMachineConfig {
    /// Default configuration under a flow name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the transition broadcast capacity
    #[must_use]
    pub fn with_transition_capacity(mut self, capacity: usize) -> Self {
        self.transition_capacity = capacity;
        self
    }

    /// Route this machine's logs to `dispatch`
    #[must_use]
    pub fn with_logger(mut self, dispatch: tracing::Dispatch) -> Self {
        self.logger = Some(dispatch);
        self
    }

    /// Check the configuration before any task is spawned.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::InvalidConfig`] for an empty name or a zero
    /// broadcast capacity.
    pub fn validate(&self) -> Result<(), MachineError> {
        if self.name.trim().is_empty() {
            return Err(MachineError::InvalidConfig(
                "name must not be empty".to_string(),
            ));
        }
        if self.transition_capacity == 0 {
            return Err(MachineError::InvalidConfig(
                "transition_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            name: "state_machine".to_string(),
            transition_capacity: 256,
            logger: None,
        }
    }
}
