//! Ergonomic testing utilities for resolvers
//!
//! This module provides a fluent API for testing resolvers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ResolverTest is the natural name

use authflow_core::effect::Effect;
use authflow_core::resolver::{InvalidTransition, Resolver};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Type alias for diagnostic assertion functions
type DiagnosticAssertion = Box<dyn FnOnce(Option<&InvalidTransition>)>;

/// Fluent API for testing resolvers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// use authflow_testing::ResolverTest;
///
/// ResolverTest::new(AuthResolver::new())
///     .given_state(AuthState::NotConfigured)
///     .when_event(AuthEvent::Configure(configuration))
///     .then_state(|state| assert_eq!(state.stage(), "configuring"))
///     .then_effects(|effects| assert_eq!(effects.len(), 1))
///     .then_diagnostic(|diagnostic| assert!(diagnostic.is_none()))
///     .run();
/// ```
pub struct ResolverTest<R: Resolver> {
    resolver: R,
    initial_state: Option<R::State>,
    event: Option<R::Event>,
    state_assertions: Vec<StateAssertion<R::State>>,
    effect_assertions: Vec<EffectAssertion<R::Action>>,
    diagnostic_assertions: Vec<DiagnosticAssertion>,
}

impl<R: Resolver> ResolverTest<R> {
    /// Create a new resolver test
    #[must_use]
    pub const fn new(resolver: R) -> Self {
        Self {
            resolver,
            initial_state: None,
            event: None,
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
            diagnostic_assertions: Vec::new(),
        }
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: R::State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the event to resolve (When)
    #[must_use]
    pub fn when_event(mut self, event: R::Event) -> Self {
        self.event = Some(event);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::State) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the resulting effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<R::Action>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the invalid-transition diagnostic (Then)
    #[must_use]
    pub fn then_diagnostic<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(Option<&InvalidTransition>) + 'static,
    {
        self.diagnostic_assertions.push(Box::new(assertion));
        self
    }

    /// Resolve and run all assertions
    ///
    /// # Panics
    ///
    /// Panics if the initial state or event is not set, or if any assertion fails.
    #[allow(clippy::expect_used)] // Test harness
    pub fn run(self) {
        let state = self
            .initial_state
            .expect("Initial state must be set with given_state()");
        let event = self.event.expect("Event must be set with when_event()");

        let resolution = self.resolver.resolve(&state, &event);

        for assertion in self.state_assertions {
            assertion(&resolution.state);
        }
        for assertion in self.effect_assertions {
            assertion(&resolution.effects);
        }
        for assertion in self.diagnostic_assertions {
            assertion(resolution.diagnostic.as_ref());
        }
    }
}

/// Helper assertions for effects and resolutions
pub mod assertions {
    use authflow_core::action::Action;
    use authflow_core::effect::{Effect, EffectId};
    use authflow_core::resolver::Resolver;
    use std::fmt::Debug;

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    pub fn assert_no_effects<A>(effects: &[Effect<A>])
    where
        A: Action + Debug,
        A::Event: Debug,
    {
        assert!(
            effects.is_empty(),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    pub fn assert_effects_count<A: Action>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that exactly one executed action has `identifier`
    ///
    /// # Panics
    ///
    /// Panics if zero or several actions carry the identifier.
    pub fn assert_runs<A: Action>(effects: &[Effect<A>], identifier: &str) {
        let matching = effects
            .iter()
            .filter_map(Effect::action)
            .filter(|action| action.identifier() == identifier)
            .count();
        assert_eq!(
            matching, 1,
            "Expected exactly one `{identifier}` action, found {matching}"
        );
    }

    /// Assert that the effects cancel `id`
    ///
    /// # Panics
    ///
    /// Panics if no [`Effect::Cancel`] targets `id`.
    pub fn assert_cancels<A: Action>(effects: &[Effect<A>], id: EffectId) {
        assert!(
            effects.iter().any(|effect| effect.cancels(id)),
            "Expected a cancellation of `{id}`"
        );
    }

    /// Assert that `event` is a silent no-op in `state`
    ///
    /// Same state, no effects, no diagnostic.
    ///
    /// # Panics
    ///
    /// Panics if the resolution changes anything.
    pub fn assert_no_op<R>(resolver: &R, state: &R::State, event: &R::Event)
    where
        R: Resolver,
        R::State: PartialEq,
        R::Event: Debug,
    {
        let resolution = resolver.resolve(state, event);
        assert_eq!(
            &resolution.state, state,
            "Expected {event:?} to keep the state"
        );
        assert!(
            resolution.effects.is_empty(),
            "Expected {event:?} to produce no effects, found {}",
            resolution.effects.len()
        );
        assert!(
            resolution.diagnostic.is_none(),
            "Expected {event:?} to be a silent no-op, got {:?}",
            resolution.diagnostic
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authflow_core::action::Action;
    use authflow_core::debug::DebugDictionary;
    use authflow_core::dispatcher::EventDispatcher;
    use authflow_core::effect::EffectId;
    use authflow_core::resolver::{FlowState, Resolution};
    use futures::future::BoxFuture;
    use std::sync::Arc;

    #[derive(Clone, Debug, PartialEq)]
    enum Lamp {
        Off,
        Warming,
        On,
    }

    impl FlowState for Lamp {
        fn stage(&self) -> &'static str {
            match self {
                Self::Off => "off",
                Self::Warming => "warming",
                Self::On => "on",
            }
        }

        fn is_terminal(&self) -> bool {
            matches!(self, Self::On)
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    enum LampEvent {
        Switch,
        Warmed,
        Abort,
    }

    #[derive(Clone, Debug, PartialEq)]
    struct WarmUp;

    impl DebugDictionary for WarmUp {
        fn identifier(&self) -> &'static str {
            "WarmUp"
        }
    }

    impl Action for WarmUp {
        type Event = LampEvent;
        type Environment = ();

        fn execute(self, dispatcher: EventDispatcher<LampEvent>, _env: Arc<()>) -> BoxFuture<'static, ()> {
            Box::pin(async move { dispatcher.send(LampEvent::Warmed) })
        }

        fn cancelled(&self) -> LampEvent {
            LampEvent::Abort
        }
    }

    const WARM_UP: EffectId = EffectId::new("warm-up");

    struct LampResolver;

    impl Resolver for LampResolver {
        type State = Lamp;
        type Event = LampEvent;
        type Action = WarmUp;
        type Environment = ();

        fn resolve(&self, state: &Lamp, event: &LampEvent) -> Resolution<Lamp, WarmUp> {
            match (state, event) {
                (Lamp::Off, LampEvent::Switch) => {
                    Resolution::to(Lamp::Warming).with(Effect::cancellable(WARM_UP, WarmUp))
                },
                (Lamp::Warming, LampEvent::Warmed) => Resolution::to(Lamp::On),
                (Lamp::Warming, LampEvent::Abort) => {
                    Resolution::to(Lamp::Off).with(Effect::Cancel(WARM_UP))
                },
                (Lamp::Off, LampEvent::Warmed) => Resolution::invalid(
                    state,
                    InvalidTransition::new("off", "Warmed", "lamp was never switched on"),
                ),
                _ => Resolution::unchanged(state),
            }
        }
    }

    #[test]
    fn test_switch_starts_warm_up() {
        ResolverTest::new(LampResolver)
            .given_state(Lamp::Off)
            .when_event(LampEvent::Switch)
            .then_state(|state| assert_eq!(state, &Lamp::Warming))
            .then_effects(|effects| assertions::assert_runs(effects, "WarmUp"))
            .then_diagnostic(|diagnostic| assert!(diagnostic.is_none()))
            .run();
    }

    #[test]
    fn test_abort_cancels_warm_up() {
        ResolverTest::new(LampResolver)
            .given_state(Lamp::Warming)
            .when_event(LampEvent::Abort)
            .then_state(|state| assert_eq!(state, &Lamp::Off))
            .then_effects(|effects| assertions::assert_cancels(effects, WARM_UP))
            .run();
    }

    #[test]
    fn test_impossible_event_is_reported() {
        ResolverTest::new(LampResolver)
            .given_state(Lamp::Off)
            .when_event(LampEvent::Warmed)
            .then_state(|state| assert_eq!(state, &Lamp::Off))
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .then_diagnostic(|diagnostic| {
                assert_eq!(diagnostic.map(|d| d.event), Some("Warmed"));
            })
            .run();
    }

    #[test]
    fn test_late_event_is_no_op() {
        assertions::assert_no_op(&LampResolver, &Lamp::On, &LampEvent::Abort);
        assertions::assert_no_op(&LampResolver, &Lamp::Off, &LampEvent::Abort);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let events = vec![LampEvent::Switch, LampEvent::Abort, LampEvent::Switch, LampEvent::Warmed];
        let steps = crate::properties::replay(&LampResolver, &Lamp::Off, &events);
        assert_eq!(steps.len(), 4);
        assert_eq!(steps.last().map(|step| step.state.clone()), Some(Lamp::On));
        assert!(crate::properties::is_deterministic(&LampResolver, &Lamp::Off, &events));
    }
}
