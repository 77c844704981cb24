//! Executing single actions outside a state machine.
//!
//! Given a fixed environment and a recording dispatcher, an action is fully
//! described by the events it emits. [`ActionProbe`] runs one action to
//! completion (or until a simulated cancellation) and returns those events.

use authflow_core::action::Action;
use authflow_core::dispatcher::EventDispatcher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Dispatcher sink that keeps every event it receives.
pub struct RecordingDispatcher<E> {
    events: Arc<Mutex<Vec<E>>>,
    notify: Arc<Notify>,
}

impl<E> Clone for RecordingDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
            notify: Arc::clone(&self.notify),
        }
    }
}

impl<E: Send + 'static> Default for RecordingDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + 'static> RecordingDispatcher<E> {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
        }
    }

    /// A dispatcher that records into this recorder.
    #[must_use]
    pub fn dispatcher(&self) -> EventDispatcher<E> {
        let events = Arc::clone(&self.events);
        let notify = Arc::clone(&self.notify);
        EventDispatcher::from_fn(move |event| {
            events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event);
            notify.notify_waiters();
        })
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take all recorded events.
    #[must_use]
    pub fn take(&self) -> Vec<E> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Wait until at least `count` events are recorded.
    ///
    /// Returns `false` on timeout.
    pub async fn wait_for_count(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

impl<E: Clone + Send + 'static> RecordingDispatcher<E> {
    /// Snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<E> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Runs single actions against a fixed environment.
///
/// # Example
///
/// ```ignore
/// let probe = ActionProbe::new(environment);
///
/// let events = probe.run(SignUpAction::CancelSignUp).await;
/// assert_eq!(events, vec![SignUpEvent::SignUpCancelled]);
///
/// let events = probe
///     .run_cancelled_after(slow_confirm, Duration::from_millis(10))
///     .await;
/// assert_eq!(events, vec![SignUpEvent::SignUpCancelled]);
/// ```
pub struct ActionProbe<A: Action> {
    environment: Arc<A::Environment>,
}

impl<A: Action> ActionProbe<A> {
    /// Probe bound to `environment`.
    pub fn new(environment: impl Into<Arc<A::Environment>>) -> Self {
        Self {
            environment: environment.into(),
        }
    }

    /// Execute `action` to completion and return what it dispatched.
    pub async fn run(&self, action: A) -> Vec<A::Event> {
        let recorder = RecordingDispatcher::new();
        action
            .execute(recorder.dispatcher(), Arc::clone(&self.environment))
            .await;
        recorder.take()
    }

    /// Execute `action`, cancelling it after `after` the way the runtime does.
    ///
    /// The action's future is dropped on cancellation. If it had not
    /// dispatched anything yet, its [`cancelled`](Action::cancelled) event is
    /// recorded instead; events after cancellation are discarded.
    pub async fn run_cancelled_after(&self, action: A, after: Duration) -> Vec<A::Event> {
        let recorder = RecordingDispatcher::new();
        let on_cancel = action.cancelled();
        let cancelled = Arc::new(AtomicBool::new(false));

        let gate = Arc::clone(&cancelled);
        let inner = recorder.dispatcher();
        let dispatcher = EventDispatcher::from_fn(move |event| {
            if !gate.load(Ordering::SeqCst) {
                inner.send(event);
            }
        });

        let work = action.execute(dispatcher, Arc::clone(&self.environment));
        if tokio::time::timeout(after, work).await.is_err() {
            cancelled.store(true, Ordering::SeqCst);
            if recorder.is_empty() {
                recorder.dispatcher().send(on_cancel);
            }
        }
        recorder.take()
    }

    /// Execute `action` and return its single event.
    ///
    /// # Panics
    ///
    /// Panics unless exactly one event was dispatched.
    #[allow(clippy::panic)] // Test assertion
    pub async fn run_single(&self, action: A) -> A::Event
    where
        A::Event: std::fmt::Debug,
    {
        let identifier = action.identifier();
        let mut events = self.run(action).await;
        match events.len() {
            1 => events.remove(0),
            n => panic!("Expected `{identifier}` to dispatch exactly one event, got {n}: {events:?}"),
        }
    }
}
