//! Effect execution.
//!
//! Every action runs in its own task, bound to a dispatcher and the shared
//! environment. The executor wraps the dispatcher in a guard so that the
//! "exactly one result event per action" contract holds even when a
//! cancellation races with the action's own result:
//!
//! - the first event wins the guard and is forwarded;
//! - once cancelled, events from the action are suppressed;
//! - if the action had not reported yet when it was cancelled, its
//!   `cancelled()` event is dispatched instead.
//!
//! Cancellable actions and timers are registered under their [`EffectId`]
//! and deregister themselves when they finish.

use authflow_core::action::Action;
use authflow_core::dispatcher::{EventDispatcher, EventSink};
use authflow_core::effect::{Effect, EffectId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};
use tracing::Instrument;
use tracing::instrument::WithSubscriber;

/// Counts queued events, running actions and pending timers.
///
/// The machine is idle when the count is zero.
#[derive(Clone)]
pub(crate) struct Activity(Arc<watch::Sender<usize>>);

impl Activity {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self(Arc::new(tx))
    }

    pub(crate) fn begin(&self) {
        self.0.send_modify(|pending| *pending += 1);
    }

    pub(crate) fn end(&self) {
        self.0.send_modify(|pending| *pending = pending.saturating_sub(1));
    }

    pub(crate) fn pending(&self) -> usize {
        *self.0.borrow()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<usize> {
        self.0.subscribe()
    }

    /// Begin a unit of work that ends when the guard is dropped.
    pub(crate) fn guard(&self) -> ActivityGuard {
        self.begin();
        ActivityGuard(self.clone())
    }
}

/// RAII guard that ends a unit of work on drop, even if the task panics.
pub(crate) struct ActivityGuard(Activity);

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.0.end();
    }
}

/// Spawn a task, optionally scoped to a machine-specific subscriber.
pub(crate) fn spawn_scoped<F>(logger: Option<&tracing::Dispatch>, future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match logger {
        Some(dispatch) => {
            tokio::spawn(future.with_subscriber(dispatch.clone()));
        },
        None => {
            tokio::spawn(future);
        },
    }
}

const PENDING: u8 = 0;
const EMITTED: u8 = 1;
const CANCELLED: u8 = 2;

/// Dispatcher wrapper enforcing one result per action execution.
struct GuardedSink<E> {
    inner: EventDispatcher<E>,
    outcome: Arc<AtomicU8>,
    identifier: &'static str,
}

impl<E: Send + 'static> EventSink<E> for GuardedSink<E> {
    fn send(&self, event: E) {
        match self
            .outcome
            .compare_exchange(PENDING, EMITTED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => self.inner.send(event),
            Err(EMITTED) => {
                tracing::warn!(
                    action = self.identifier,
                    "Action dispatched more than one event"
                );
                self.inner.send(event);
            },
            Err(_) => {
                tracing::debug!(
                    action = self.identifier,
                    "Suppressed event from cancelled action"
                );
            },
        }
    }
}

struct Registration {
    key: u64,
    cancel: oneshot::Sender<()>,
}

/// Per-resolution execution context.
pub(crate) struct ExecContext<A: Action> {
    pub(crate) flow: Arc<str>,
    pub(crate) dispatcher: EventDispatcher<A::Event>,
    pub(crate) environment: Arc<A::Environment>,
    pub(crate) activity: Activity,
    pub(crate) logger: Option<tracing::Dispatch>,
}

/// Runs effects and keeps the cancellation registry.
pub(crate) struct Executor {
    registry: Arc<Mutex<HashMap<EffectId, Vec<Registration>>>>,
    next_key: AtomicU64,
}

impl Executor {
    pub(crate) fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_key: AtomicU64::new(0),
        }
    }

    /// Number of registered (cancellable) executions.
    pub(crate) fn in_flight(&self) -> usize {
        self.registry
            .lock()
            .map(|registry| registry.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Execute one effect.
    pub(crate) fn execute<A>(&self, effect: Effect<A>, ctx: &ExecContext<A>)
    where
        A: Action,
        A::Event: Send + 'static,
    {
        match effect {
            Effect::Run(action) => self.spawn_action(action, None, ctx),
            Effect::Cancellable { id, action } => self.spawn_action(action, Some(id), ctx),
            Effect::Delay {
                id,
                duration,
                event,
            } => self.spawn_timer(id, duration, event, ctx),
            Effect::Cancel(id) => self.cancel(id, &ctx.flow),
        }
    }

    fn register(&self, id: EffectId) -> (u64, oneshot::Receiver<()>) {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        match self.registry.lock() {
            Ok(mut registry) => registry
                .entry(id)
                .or_default()
                .push(Registration { key, cancel: tx }),
            Err(_) => tracing::error!(effect_id = %id, "Cancellation registry poisoned"),
        }
        (key, rx)
    }

    fn cancel(&self, id: EffectId, flow: &str) {
        let registrations = match self.registry.lock() {
            Ok(mut registry) => registry.remove(&id).unwrap_or_default(),
            Err(_) => {
                tracing::error!(effect_id = %id, "Cancellation registry poisoned");
                return;
            },
        };

        tracing::debug!(
            effect_id = %id,
            count = registrations.len(),
            "Cancelling in-flight effects"
        );
        metrics::counter!("state_machine.effects.cancel_requests", "flow" => flow.to_string())
            .increment(1);

        for registration in registrations {
            // Receiver gone means the execution already finished.
            let _ = registration.cancel.send(());
        }
    }

    fn deregister(registry: &Mutex<HashMap<EffectId, Vec<Registration>>>, id: EffectId, key: u64) {
        let Ok(mut registry) = registry.lock() else {
            return;
        };
        if let Some(entries) = registry.get_mut(&id) {
            entries.retain(|registration| registration.key != key);
            if entries.is_empty() {
                registry.remove(&id);
            }
        }
    }

    fn spawn_action<A>(&self, action: A, id: Option<EffectId>, ctx: &ExecContext<A>)
    where
        A: Action,
    {
        let identifier = action.identifier();
        let on_cancel = action.cancelled();
        let expects_result = action.dispatches_result();
        let outcome = Arc::new(AtomicU8::new(PENDING));

        let guarded = EventDispatcher::new(GuardedSink {
            inner: ctx.dispatcher.clone(),
            outcome: Arc::clone(&outcome),
            identifier,
        });
        let cancellation = id.map(|id| (id, self.register(id)));
        let registry = Arc::clone(&self.registry);
        let dispatcher = ctx.dispatcher.clone();
        let flow = Arc::clone(&ctx.flow);
        let activity = ctx.activity.guard();

        tracing::debug!(action = identifier, cancellable = id.is_some(), "Executing action");
        metrics::counter!(
            "state_machine.actions.executed",
            "flow" => flow.to_string(),
            "action" => identifier
        )
        .increment(1);

        let work = action.execute(guarded, Arc::clone(&ctx.environment));

        spawn_scoped(ctx.logger.as_ref(), async move {
            let _activity = activity;
            let span = tracing::debug_span!("action", flow = %flow, action = identifier);

            async move {
                match cancellation {
                    Some((id, (key, cancel_rx))) => {
                        tokio::select! {
                            biased;
                            _ = cancel_rx => {
                                if outcome
                                    .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
                                    .is_ok()
                                {
                                    tracing::debug!("Action cancelled before reporting, dispatching cancellation");
                                    metrics::counter!(
                                        "state_machine.actions.cancelled",
                                        "flow" => flow.to_string(),
                                        "action" => identifier
                                    )
                                    .increment(1);
                                    dispatcher.send(on_cancel);
                                } else {
                                    outcome.store(CANCELLED, Ordering::Release);
                                    tracing::debug!("Action cancelled after reporting, result already queued");
                                }
                            }
                            () = work => {}
                        }
                        Self::deregister(&registry, id, key);
                    },
                    None => work.await,
                }

                if expects_result && outcome.load(Ordering::Acquire) == PENDING {
                    tracing::error!("Action completed without dispatching a result event");
                    metrics::counter!(
                        "state_machine.actions.missing_result",
                        "flow" => flow.to_string(),
                        "action" => identifier
                    )
                    .increment(1);
                }
            }
            .instrument(span)
            .await;
        });
    }

    fn spawn_timer<A>(
        &self,
        id: Option<EffectId>,
        duration: std::time::Duration,
        event: A::Event,
        ctx: &ExecContext<A>,
    ) where
        A: Action,
    {
        let cancellation = id.map(|id| (id, self.register(id)));
        let registry = Arc::clone(&self.registry);
        let dispatcher = ctx.dispatcher.clone();
        let activity = ctx.activity.guard();

        tracing::trace!(
            effect_id = ?id,
            delay_ms = duration.as_millis(),
            "Scheduling delayed event"
        );

        spawn_scoped(ctx.logger.as_ref(), async move {
            let _activity = activity;
            let fire = match cancellation {
                Some((id, (key, cancel_rx))) => {
                    let fire = tokio::select! {
                        biased;
                        _ = cancel_rx => false,
                        () = tokio::time::sleep(duration) => true,
                    };
                    Self::deregister(&registry, id, key);
                    fire
                },
                None => {
                    tokio::time::sleep(duration).await;
                    true
                },
            };

            if fire {
                tracing::trace!("Delay elapsed, dispatching event");
                dispatcher.send(event);
            } else {
                tracing::debug!("Delayed event cancelled");
            }
        });
    }
}
