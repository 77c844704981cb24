//! Event dispatchers.
//!
//! An action never knows which state machine (or test double) consumes its
//! output. It only holds an [`EventDispatcher`], a cheap clonable handle to
//! some [`EventSink`].
//!
//! Nested flows use [`EventDispatcher::scope`]: a child flow's action receives
//! a dispatcher for its own event type whose events are wrapped into the
//! parent's event type before reaching the parent machine.

use std::fmt;
use std::sync::Arc;

/// The sink actions emit events into.
///
/// Implementations must be safe to call concurrently from many producers.
pub trait EventSink<E>: Send + Sync {
    /// Deliver an event. Fire-and-forget: delivery failures are the sink's concern.
    fn send(&self, event: E);
}

/// Clonable handle to an [`EventSink`].
///
/// # Example
///
/// ```
/// use authflow_core::dispatcher::EventDispatcher;
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let log = Arc::clone(&seen);
/// let dispatcher = EventDispatcher::from_fn(move |event: u32| {
///     if let Ok(mut log) = log.lock() {
///         log.push(event);
///     }
/// });
///
/// // A child dispatcher that maps its events into the parent's type
/// let child = dispatcher.scope(|event: u8| u32::from(event) * 10);
/// child.send(4);
/// dispatcher.send(1);
///
/// assert_eq!(*seen.lock().unwrap(), vec![40, 1]);
/// ```
pub struct EventDispatcher<E> {
    sink: Arc<dyn EventSink<E>>,
}

impl<E> EventDispatcher<E> {
    /// Wrap a sink.
    pub fn new<S>(sink: S) -> Self
    where
        S: EventSink<E> + 'static,
    {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Wrap a shared sink.
    #[must_use]
    pub fn from_arc(sink: Arc<dyn EventSink<E>>) -> Self {
        Self { sink }
    }

    /// Build a dispatcher from a closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(E) + Send + Sync + 'static,
        E: 'static,
    {
        Self::new(FnSink(f))
    }

    /// Send an event to the underlying sink.
    pub fn send(&self, event: E) {
        self.sink.send(event);
    }

    /// Create a dispatcher for a child flow's events.
    ///
    /// Every event sent through the returned dispatcher is passed through
    /// `embed` and forwarded to this dispatcher.
    pub fn scope<C, F>(&self, embed: F) -> EventDispatcher<C>
    where
        F: Fn(C) -> E + Send + Sync + 'static,
        E: 'static,
        C: 'static,
    {
        let parent = self.clone();
        EventDispatcher::from_fn(move |event: C| parent.send(embed(event)))
    }
}

impl<E> Clone for EventDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<E> fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher").finish_non_exhaustive()
    }
}

/// Closure-backed sink used by [`EventDispatcher::from_fn`].
struct FnSink<F>(F);

impl<E, F> EventSink<E> for FnSink<F>
where
    F: Fn(E) + Send + Sync,
{
    fn send(&self, event: E) {
        (self.0)(event);
    }
}
