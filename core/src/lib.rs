//! # Authflow Core
//!
//! Core traits and types for hierarchical, event-driven authentication flows.
//!
//! A flow is a state machine. Its transition logic lives in a pure
//! [`Resolver`](resolver::Resolver); everything with side effects lives in
//! [`Action`](action::Action)s that the runtime executes and that report back
//! through an [`EventDispatcher`](dispatcher::EventDispatcher).
//!
//! ## Core Concepts
//!
//! - **Event**: Immutable description of something that happened inside a flow
//! - **State**: Immutable snapshot of where a flow stands
//! - **Resolver**: Pure function `(State, Event) → (State, Effects)`
//! - **Action**: Named unit of (async) work that dispatches follow-up events
//! - **Effect**: Description of what the runtime should do with actions and timers
//! - **Environment**: Injected, read-only dependencies handed to every action
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Unidirectional Data Flow
//! - Failures travel the same channel as successes
//! - Dependency Injection via Environment
//!
//! ## Example
//!
//! ```ignore
//! use authflow_core::prelude::*;
//!
//! impl Resolver for SignUpResolver {
//!     type State = SignUpState;
//!     type Event = SignUpEvent;
//!     type Action = SignUpAction;
//!     type Environment = AuthEnvironment;
//!
//!     fn resolve(&self, state: &SignUpState, event: &SignUpEvent) -> Resolution<SignUpState, SignUpAction> {
//!         match (state, event) {
//!             (SignUpState::NotStarted, SignUpEvent::InitiateSignUp { username, .. }) => {
//!                 Resolution::to(SignUpState::InitiatingSignUp { username: username.clone() })
//!                     .with(Effect::Run(SignUpAction::InitiateSignUp { .. }))
//!             }
//!             _ => Resolution::unchanged(state),
//!         }
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Actions: named, executable units of work
pub mod action;

/// Nested flow composition
pub mod composition;

/// Structured debug representation of actions and events
pub mod debug;

/// Event dispatchers: the sink actions emit into
pub mod dispatcher;

/// Effect descriptions returned by resolvers
pub mod effect;

/// Event envelopes (correlation id + timestamp)
pub mod event;

/// Resolver trait and resolution values
pub mod resolver;

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment handed to every action. A state machine is generic
/// over its environment type, so a mismatched environment is a compile error
/// rather than a runtime check inside each action.
pub mod environment {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// struct SystemClock;
    /// impl Clock for SystemClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         Utc::now()
    ///     }
    /// }
    ///
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Identifier generator - abstracts id creation for testability
    pub trait IdGenerator: Send + Sync {
        /// Produce the next identifier
        fn next_id(&self) -> Uuid;
    }

    /// Flow-scoped dependency bag.
    ///
    /// The state machine uses the clock and id generator to stamp incoming
    /// events; actions reach the rest of the dependencies through the concrete
    /// environment type.
    pub trait Environment: Send + Sync + 'static {
        /// Clock used for event timestamps
        fn clock(&self) -> &dyn Clock;

        /// Generator used for event correlation ids
        fn ids(&self) -> &dyn IdGenerator;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Random (v4) identifiers.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct RandomIdGenerator;

    impl IdGenerator for RandomIdGenerator {
        fn next_id(&self) -> Uuid {
            Uuid::new_v4()
        }
    }
}

/// Convenience re-exports for flow implementations
pub mod prelude {
    pub use crate::action::Action;
    pub use crate::debug::DebugDictionary;
    pub use crate::dispatcher::{EventDispatcher, EventSink};
    pub use crate::effect::{Effect, EffectId};
    pub use crate::environment::{Clock, Environment, IdGenerator};
    pub use crate::event::{Envelope, EventId};
    pub use crate::resolver::{FlowState, InvalidTransition, Resolution, Resolver};
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, IdGenerator, RandomIdGenerator, SystemClock};

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn test_random_ids_are_distinct() {
        let ids = RandomIdGenerator;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
