//! Effect descriptions.
//!
//! Effects are NOT executed by the resolver. They are values describing what
//! the runtime should do once the new state has been committed: run an
//! action, run it under a cancellation id, schedule a delayed event (flow
//! timeouts) or abort everything registered under an id.

use crate::action::Action;
use std::fmt;
use std::time::Duration;

/// Identifier grouping in-flight actions and timers for cancellation.
///
/// Flows use a fixed id per long-running stage, e.g. `EffectId::new("sign-up")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(&'static str);

impl EffectId {
    /// Create an effect id.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The id as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Effect type - describes a side effect to be executed by the runtime
///
/// # Type Parameters
///
/// - `A`: The action type this flow executes; its event type is what
///   delayed effects deliver back to the machine.
pub enum Effect<A: Action> {
    /// Execute an action.
    Run(A),

    /// Execute an action and register it under `id` so that a later
    /// [`Effect::Cancel`] can abort it.
    Cancellable {
        /// Cancellation group
        id: EffectId,
        /// Action to execute
        action: A,
    },

    /// Submit `event` to the machine after `duration`.
    ///
    /// With an id the timer can be cancelled; this is how flow timeouts are
    /// expressed (a delayed cancellation event).
    Delay {
        /// Optional cancellation group
        id: Option<EffectId>,
        /// How long to wait
        duration: Duration,
        /// Event to submit when the timer fires
        event: A::Event,
    },

    /// Abort every in-flight action and pending timer registered under the id.
    Cancel(EffectId),
}

impl<A: Action> Effect<A> {
    /// Shorthand for [`Effect::Cancellable`].
    #[must_use]
    pub const fn cancellable(id: EffectId, action: A) -> Self {
        Self::Cancellable { id, action }
    }

    /// Shorthand for a cancellable [`Effect::Delay`].
    #[must_use]
    pub const fn timeout(id: EffectId, duration: Duration, event: A::Event) -> Self {
        Self::Delay {
            id: Some(id),
            duration,
            event,
        }
    }

    /// The action this effect executes, if any.
    #[must_use]
    pub const fn action(&self) -> Option<&A> {
        match self {
            Self::Run(action) | Self::Cancellable { action, .. } => Some(action),
            Self::Delay { .. } | Self::Cancel(_) => None,
        }
    }

    /// Whether this effect cancels `id`.
    #[must_use]
    pub fn cancels(&self, id: EffectId) -> bool {
        matches!(self, Self::Cancel(target) if *target == id)
    }

    /// Lift a child flow's effect into a parent flow's action and event types.
    pub fn map<B, FA, FE>(self, embed_action: FA, embed_event: FE) -> Effect<B>
    where
        B: Action,
        FA: FnOnce(A) -> B,
        FE: FnOnce(A::Event) -> B::Event,
    {
        match self {
            Self::Run(action) => Effect::Run(embed_action(action)),
            Self::Cancellable { id, action } => Effect::Cancellable {
                id,
                action: embed_action(action),
            },
            Self::Delay {
                id,
                duration,
                event,
            } => Effect::Delay {
                id,
                duration,
                event: embed_event(event),
            },
            Self::Cancel(id) => Effect::Cancel(id),
        }
    }
}

// Manual impls: derives would put bounds on `A` only, not on `A::Event`.
impl<A> fmt::Debug for Effect<A>
where
    A: Action + fmt::Debug,
    A::Event: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run(action) => f.debug_tuple("Effect::Run").field(action).finish(),
            Self::Cancellable { id, action } => f
                .debug_struct("Effect::Cancellable")
                .field("id", id)
                .field("action", action)
                .finish(),
            Self::Delay {
                id,
                duration,
                event,
            } => f
                .debug_struct("Effect::Delay")
                .field("id", id)
                .field("duration", duration)
                .field("event", event)
                .finish(),
            Self::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
        }
    }
}

impl<A> Clone for Effect<A>
where
    A: Action + Clone,
    A::Event: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Run(action) => Self::Run(action.clone()),
            Self::Cancellable { id, action } => Self::Cancellable {
                id: *id,
                action: action.clone(),
            },
            Self::Delay {
                id,
                duration,
                event,
            } => Self::Delay {
                id: *id,
                duration: *duration,
                event: event.clone(),
            },
            Self::Cancel(id) => Self::Cancel(*id),
        }
    }
}

impl<A> PartialEq for Effect<A>
where
    A: Action + PartialEq,
    A::Event: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Run(a), Self::Run(b)) => a == b,
            (
                Self::Cancellable { id: ia, action: a },
                Self::Cancellable { id: ib, action: b },
            ) => ia == ib && a == b,
            (
                Self::Delay {
                    id: ia,
                    duration: da,
                    event: ea,
                },
                Self::Delay {
                    id: ib,
                    duration: db,
                    event: eb,
                },
            ) => ia == ib && da == db && ea == eb,
            (Self::Cancel(a), Self::Cancel(b)) => a == b,
            _ => false,
        }
    }
}
