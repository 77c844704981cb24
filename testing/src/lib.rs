//! # Authflow Testing
//!
//! Testing utilities and helpers for authflow state machines.
//!
//! This crate provides:
//! - Deterministic implementations of the core environment traits
//! - A Given-When-Then harness for resolvers
//! - An action probe that executes one action against a recording dispatcher
//! - Property-based testing utilities
//!
//! ## Example
//!
//! ```ignore
//! use authflow_testing::{ActionProbe, ResolverTest};
//!
//! ResolverTest::new(SignUpResolver::new(None))
//!     .given_state(SignUpState::NotStarted)
//!     .when_event(SignUpEvent::InitiateSignUp { username, password })
//!     .then_state(|state| assert_eq!(state.stage(), "initiatingSignUp"))
//!     .then_effects(|effects| assertions::assert_effects_count(effects, 1))
//!     .run();
//!
//! let events = ActionProbe::new(environment).run(SignUpAction::CancelSignUp).await;
//! assert_eq!(events, vec![SignUpEvent::SignUpCancelled]);
//! ```

use chrono::{DateTime, Utc};

mod action_probe;
mod resolver_test;

pub use action_probe::{ActionProbe, RecordingDispatcher};
pub use resolver_test::{ResolverTest, assertions};

/// Deterministic implementations of the core environment traits.
pub mod mocks {
    use super::{DateTime, Utc};
    use authflow_core::environment::{Clock, Environment, IdGenerator};
    use std::sync::atomic::{AtomicU64, Ordering};
    use uuid::Uuid;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use authflow_testing::mocks::FixedClock;
    /// use authflow_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Fixed clock at 2025-01-01 00:00:00 UTC.
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default())
    }

    /// Identifiers counting up from 1.
    ///
    /// ```
    /// use authflow_testing::mocks::SequentialIdGenerator;
    /// use authflow_core::environment::IdGenerator;
    /// use uuid::Uuid;
    ///
    /// let ids = SequentialIdGenerator::new();
    /// assert_eq!(ids.next_id(), Uuid::from_u128(1));
    /// assert_eq!(ids.next_id(), Uuid::from_u128(2));
    /// ```
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator {
        issued: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Start at 1.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                issued: AtomicU64::new(0),
            }
        }

        /// Number of ids handed out so far.
        #[must_use]
        pub fn issued(&self) -> u64 {
            self.issued.load(Ordering::SeqCst)
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self) -> Uuid {
            let next = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            Uuid::from_u128(u128::from(next))
        }
    }

    /// Minimal environment: fixed clock and sequential ids.
    ///
    /// For flows whose actions need nothing else.
    #[derive(Debug)]
    pub struct TestEnvironment {
        /// Clock used for event timestamps
        pub clock: FixedClock,
        /// Generator used for event ids
        pub ids: SequentialIdGenerator,
    }

    impl Default for TestEnvironment {
        fn default() -> Self {
            Self {
                clock: test_clock(),
                ids: SequentialIdGenerator::new(),
            }
        }
    }

    impl Environment for TestEnvironment {
        fn clock(&self) -> &dyn Clock {
            &self.clock
        }

        fn ids(&self) -> &dyn IdGenerator {
            &self.ids
        }
    }
}

/// Test helpers
pub mod helpers {
    /// Install a `fmt` subscriber that writes through the test harness.
    ///
    /// Honors `RUST_LOG`; safe to call from every test.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities
///
/// Resolvers are pure, so their properties can be checked without a runtime:
/// replaying the same event sequence must always produce the same states and
/// effects.
pub mod properties {
    use authflow_core::resolver::{Resolution, Resolver};
    use proptest::collection::vec;
    use proptest::strategy::Strategy;

    /// Strategy for event sequences of up to `max_len` events.
    pub fn event_sequences<S>(events: S, max_len: usize) -> impl Strategy<Value = Vec<S::Value>>
    where
        S: Strategy,
    {
        vec(events, 0..=max_len)
    }

    /// Fold `events` through `resolver` starting at `initial`.
    ///
    /// Returns every intermediate resolution, in order. Effects are collected,
    /// not executed.
    pub fn replay<R: Resolver>(
        resolver: &R,
        initial: &R::State,
        events: &[R::Event],
    ) -> Vec<Resolution<R::State, R::Action>> {
        let mut state = initial.clone();
        let mut steps = Vec::with_capacity(events.len());
        for event in events {
            let resolution = resolver.resolve(&state, event);
            state = resolution.state.clone();
            steps.push(resolution);
        }
        steps
    }

    /// Whether two replays of the same sequence agree step for step.
    pub fn is_deterministic<R>(resolver: &R, initial: &R::State, events: &[R::Event]) -> bool
    where
        R: Resolver,
        Resolution<R::State, R::Action>: PartialEq,
    {
        replay(resolver, initial, events) == replay(resolver, initial, events)
    }
}

pub use mocks::{FixedClock, SequentialIdGenerator, TestEnvironment, test_clock};
