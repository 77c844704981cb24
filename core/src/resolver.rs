//! Resolver trait - the only place transition logic lives.
//!
//! A resolver is a pure function `(State, Event) → (State, Effects)`:
//! no I/O, no shared mutable state, deterministic for identical inputs.
//!
//! # Total by construction
//!
//! For every `(state, event)` pair a flow does not handle, the resolver
//! returns [`Resolution::unchanged`]: same state, no effects. Late results
//! (a provider response for a flow that has since been cancelled) are
//! absorbed this way. Pairs that should be structurally impossible are
//! reported through the [`InvalidTransition`] side channel, which is logged
//! by the runtime and never changes state.

use crate::action::Action;
use crate::effect::Effect;
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;

/// State snapshot of a flow.
pub trait FlowState: Clone + fmt::Debug + Send + Sync + 'static {
    /// Stable label for the current stage, used in logs and diagnostics.
    fn stage(&self) -> &'static str;

    /// Whether the flow has reached a final outcome (success, cancelled, failed).
    fn is_terminal(&self) -> bool;
}

/// Diagnostic for an event that should not be possible in the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: `{event}` in stage `{stage}` ({reason})")]
pub struct InvalidTransition {
    /// Stage the machine was in
    pub stage: &'static str,
    /// Identifier of the offending event
    pub event: &'static str,
    /// Why the pair is impossible
    pub reason: &'static str,
}

impl InvalidTransition {
    /// Create a diagnostic.
    #[must_use]
    pub const fn new(stage: &'static str, event: &'static str, reason: &'static str) -> Self {
        Self {
            stage,
            event,
            reason,
        }
    }
}

/// Output of a single resolution step.
pub struct Resolution<S, A: Action> {
    /// The next state (equal to the input for no-op resolutions)
    pub state: S,
    /// Effects to hand to the runtime after the state is committed
    pub effects: SmallVec<[Effect<A>; 4]>,
    /// Diagnostic for impossible transitions
    pub diagnostic: Option<InvalidTransition>,
}

impl<S: Clone, A: Action> Resolution<S, A> {
    /// Keep the current state and run nothing.
    #[must_use]
    pub fn unchanged(state: &S) -> Self {
        Self::to(state.clone())
    }

    /// Keep the current state and report an impossible transition.
    #[must_use]
    pub fn invalid(state: &S, diagnostic: InvalidTransition) -> Self {
        Self {
            state: state.clone(),
            effects: SmallVec::new(),
            diagnostic: Some(diagnostic),
        }
    }
}

impl<S, A: Action> Resolution<S, A> {
    /// Move to `state` with no effects.
    #[must_use]
    pub fn to(state: S) -> Self {
        Self {
            state,
            effects: SmallVec::new(),
            diagnostic: None,
        }
    }

    /// Append an effect.
    #[must_use]
    pub fn with(mut self, effect: Effect<A>) -> Self {
        self.effects.push(effect);
        self
    }

    /// Append several effects.
    #[must_use]
    pub fn with_all<I>(mut self, effects: I) -> Self
    where
        I: IntoIterator<Item = Effect<A>>,
    {
        self.effects.extend(effects);
        self
    }

    /// Actions this resolution executes, in order.
    pub fn actions(&self) -> impl Iterator<Item = &A> {
        self.effects.iter().filter_map(Effect::action)
    }

    /// Whether anything happens beyond keeping the state.
    #[must_use]
    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }

    /// Replace the state, keeping effects and diagnostic.
    #[must_use]
    pub fn map_state<T, F>(self, f: F) -> Resolution<T, A>
    where
        F: FnOnce(S) -> T,
    {
        Resolution {
            state: f(self.state),
            effects: self.effects,
            diagnostic: self.diagnostic,
        }
    }
}

impl<S, A> fmt::Debug for Resolution<S, A>
where
    S: fmt::Debug,
    A: Action + fmt::Debug,
    A::Event: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("state", &self.state)
            .field("effects", &self.effects)
            .field("diagnostic", &self.diagnostic)
            .finish()
    }
}

impl<S, A> PartialEq for Resolution<S, A>
where
    S: PartialEq,
    A: Action + PartialEq,
    A::Event: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.effects == other.effects
            && self.diagnostic == other.diagnostic
    }
}

/// The Resolver trait - pure transition function of a flow
///
/// # Type Parameters
///
/// - `State`: The flow's state snapshot
/// - `Event`: The flow's closed event set
/// - `Action`: The flow's closed action set
/// - `Environment`: The dependencies its actions execute against
///
/// # Example
///
/// ```ignore
/// impl Resolver for SignUpResolver {
///     type State = SignUpState;
///     type Event = SignUpEvent;
///     type Action = SignUpAction;
///     type Environment = AuthEnvironment;
///
///     fn resolve(&self, state: &SignUpState, event: &SignUpEvent) -> Resolution<SignUpState, SignUpAction> {
///         match (state, event) {
///             (SignUpState::InitiatingSignUp { username }, SignUpEvent::SignUpSucceeded { user_id, .. }) => {
///                 Resolution::to(SignUpState::SignedUp { username: username.clone(), user_id: user_id.clone() })
///             }
///             _ => Resolution::unchanged(state),
///         }
///     }
/// }
/// ```
pub trait Resolver: Send + Sync + 'static {
    /// The state type this resolver operates on
    type State: FlowState;

    /// The event type this resolver consumes
    type Event: Send + 'static;

    /// The action type this resolver produces
    type Action: Action<Event = Self::Event, Environment = Self::Environment>;

    /// The environment type its actions need
    type Environment: Send + Sync + 'static;

    /// Compute the next state and the effects to run.
    ///
    /// Must not perform I/O and must be deterministic.
    fn resolve(
        &self,
        state: &Self::State,
        event: &Self::Event,
    ) -> Resolution<Self::State, Self::Action>;
}
