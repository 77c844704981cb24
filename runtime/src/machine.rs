//! The state machine handle and its worker task.

use crate::StateMachineConfig;
use crate::error::MachineError;
use crate::executor::{Activity, ExecContext, Executor, spawn_scoped};
use authflow_core::debug::DebugDictionary;
use authflow_core::dispatcher::{EventDispatcher, EventSink};
use authflow_core::environment::Environment;
use authflow_core::event::{Envelope, EventId};
use authflow_core::resolver::{FlowState, InvalidTransition, Resolution, Resolver};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::Instrument;

/// One committed resolution step, as seen by observers.
#[derive(Debug, Clone)]
pub struct Transition<S, E> {
    /// State before the event
    pub old: S,
    /// State after the event (equal to `old` for no-ops)
    pub new: S,
    /// The resolved event
    pub envelope: Envelope<E>,
    /// Set when the event was impossible in `old`
    pub diagnostic: Option<InvalidTransition>,
}

impl<S: FlowState, E> Transition<S, E> {
    /// Whether the flow moved to a different stage.
    #[must_use]
    pub fn changed_stage(&self) -> bool {
        self.old.stage() != self.new.stage()
    }
}

fn stamp<Env: Environment, E>(environment: &Env, event: E) -> Envelope<E> {
    Envelope::new(
        EventId::new(environment.ids().next_id()),
        environment.clock().now(),
        event,
    )
}

/// Feeds events from actions and timers back into the queue.
struct QueueSink<E, Env> {
    tx: mpsc::UnboundedSender<Envelope<E>>,
    environment: Arc<Env>,
    activity: Activity,
}

impl<E: Send + 'static, Env: Environment> EventSink<E> for QueueSink<E, Env> {
    fn send(&self, event: E) {
        let envelope = stamp(self.environment.as_ref(), event);
        self.activity.begin();
        if self.tx.send(envelope).is_err() {
            self.activity.end();
            tracing::warn!("State machine stopped, dropping event");
        }
    }
}

struct Shared<R: Resolver> {
    name: Arc<str>,
    resolver: R,
    environment: Arc<R::Environment>,
    state: watch::Sender<R::State>,
    transitions: broadcast::Sender<Transition<R::State, R::Event>>,
    executor: Executor,
    activity: Activity,
    shutting_down: AtomicBool,
    logger: Option<tracing::Dispatch>,
}

impl<R: Resolver> Shared<R> {
    /// Run `f` with this machine's logger as the default subscriber.
    fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.logger {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

/// Handle to a running flow.
///
/// Cloning the handle is cheap; all clones refer to the same machine. The
/// worker task stops once every handle is dropped and no action or timer is
/// left that could still produce an event.
///
/// # Type Parameters
///
/// - `R`: The flow's resolver; its associated types fix the state, event,
///   action and environment types, so a machine can only ever be built with
///   the environment its actions expect.
pub struct StateMachine<R: Resolver> {
    shared: Arc<Shared<R>>,
    tx: mpsc::UnboundedSender<Envelope<R::Event>>,
}

impl<R: Resolver> Clone for StateMachine<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            tx: self.tx.clone(),
        }
    }
}

impl<R: Resolver> fmt::Debug for StateMachine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.shared.name)
            .field("stage", &self.shared.state.borrow().stage())
            .field("pending", &self.shared.activity.pending())
            .finish_non_exhaustive()
    }
}

impl<R> StateMachine<R>
where
    R: Resolver,
    R::Environment: Environment,
    R::Event: Clone + fmt::Debug + DebugDictionary + Sync,
{
    /// Start a machine with the default configuration.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        initial: R::State,
        resolver: R,
        environment: impl Into<Arc<R::Environment>>,
    ) -> Self {
        Self::spawn(
            initial,
            resolver,
            environment.into(),
            StateMachineConfig::default(),
        )
    }

    /// Start a machine with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::InvalidConfig`] if the configuration is rejected
    /// by [`StateMachineConfig::validate`]. Nothing is spawned in that case.
    pub fn with_config(
        initial: R::State,
        resolver: R,
        environment: impl Into<Arc<R::Environment>>,
        config: StateMachineConfig,
    ) -> Result<Self, MachineError> {
        config.validate()?;
        Ok(Self::spawn(initial, resolver, environment.into(), config))
    }

    /// Start a machine, submit `configure` and wait until `is_configured`
    /// holds.
    ///
    /// # Errors
    ///
    /// - [`MachineError::InvalidConfig`]: configuration rejected
    /// - [`MachineError::ConfigurationTimeout`]: the flow did not reach a
    ///   configured state within `grace`
    pub async fn configured<F>(
        initial: R::State,
        resolver: R,
        environment: impl Into<Arc<R::Environment>>,
        config: StateMachineConfig,
        configure: R::Event,
        is_configured: F,
        grace: Duration,
    ) -> Result<Self, MachineError>
    where
        F: Fn(&R::State) -> bool,
    {
        let machine = Self::with_config(initial, resolver, environment, config)?;
        machine.submit(configure)?;

        match machine.wait_for(is_configured, grace).await {
            Ok(_) => Ok(machine),
            Err(MachineError::Timeout) => {
                machine.shared.scoped(|| {
                    tracing::error!(
                        flow = %machine.shared.name,
                        stage = machine.shared.state.borrow().stage(),
                        grace_ms = grace.as_millis(),
                        "Flow not configured within grace period"
                    );
                });
                Err(MachineError::ConfigurationTimeout(grace))
            },
            Err(other) => Err(other),
        }
    }

    fn spawn(
        initial: R::State,
        resolver: R,
        environment: Arc<R::Environment>,
        config: StateMachineConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(initial);
        let (transitions, _) = broadcast::channel(config.transition_capacity);

        let shared = Arc::new(Shared {
            name: Arc::from(config.name),
            resolver,
            environment,
            state,
            transitions,
            executor: Executor::new(),
            activity: Activity::new(),
            shutting_down: AtomicBool::new(false),
            logger: config.logger,
        });

        let worker = Worker {
            shared: Arc::clone(&shared),
            rx,
            tx: tx.downgrade(),
        };
        spawn_scoped(shared.logger.as_ref(), worker.run());

        Self { shared, tx }
    }

    /// Flow name from the configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Enqueue an event.
    ///
    /// Returns immediately with the event's correlation id; resolution
    /// happens on the worker task in submission order.
    ///
    /// # Errors
    ///
    /// - [`MachineError::ShutdownInProgress`]: [`shutdown`](Self::shutdown) was called
    /// - [`MachineError::Stopped`]: the worker task is gone
    pub fn submit(&self, event: R::Event) -> Result<EventId, MachineError> {
        if self.shared.shutting_down.load(Ordering::Acquire) {
            return Err(MachineError::ShutdownInProgress);
        }

        let envelope = stamp(self.shared.environment.as_ref(), event);
        let id = envelope.id();
        self.shared.scoped(|| {
            tracing::trace!(
                flow = %self.shared.name,
                event_id = %id,
                event = %envelope.event().debug_description(),
                "Event submitted"
            );
        });

        self.shared.activity.begin();
        if self.tx.send(envelope).is_err() {
            self.shared.activity.end();
            return Err(MachineError::Stopped);
        }
        Ok(id)
    }

    /// Read the current state.
    pub fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&R::State) -> T,
    {
        f(&self.shared.state.borrow())
    }

    /// Clone of the current state.
    #[must_use]
    pub fn current_state(&self) -> R::State {
        self.shared.state.borrow().clone()
    }

    /// Receive every committed transition from now on.
    ///
    /// Slow receivers skip old transitions (`RecvError::Lagged`).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Transition<R::State, R::Event>> {
        self.shared.transitions.subscribe()
    }

    /// Watch the latest committed state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<R::State> {
        self.shared.state.subscribe()
    }

    /// Queued events, running actions and pending timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.activity.pending()
    }

    /// Actions and timers currently registered for cancellation.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.executor.in_flight()
    }

    /// Wait until the committed state satisfies `predicate`.
    ///
    /// The current state is checked first. Only the latest committed state
    /// is observed, so a predicate on a transient state can be missed; use
    /// [`subscribe`](Self::subscribe) to see every step.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Timeout`] if no matching state is observed
    /// within `timeout`.
    pub async fn wait_for<F>(&self, predicate: F, timeout: Duration) -> Result<R::State, MachineError>
    where
        F: Fn(&R::State) -> bool,
    {
        let mut rx = self.shared.state.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|state| predicate(state))).await {
            Ok(Ok(state)) => Ok(R::State::clone(&state)),
            Ok(Err(_)) => Err(MachineError::Stopped),
            Err(_) => Err(MachineError::Timeout),
        }
    }

    /// Wait until nothing is queued, running or scheduled.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Timeout`] if work is still pending after `timeout`.
    pub async fn wait_until_idle(&self, timeout: Duration) -> Result<(), MachineError> {
        let mut rx = self.shared.activity.watch();
        match tokio::time::timeout(timeout, rx.wait_for(|pending| *pending == 0)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(MachineError::Stopped),
            Err(_) => Err(MachineError::Timeout),
        }
    }

    /// Submit an event and wait for the first state, at or after that
    /// event's transition, matching `predicate`.
    ///
    /// Subscribes before submitting. If the receiver lags, the submitted
    /// event's own transition may have been dropped; from then on the
    /// current state is checked directly and later transitions all count.
    ///
    /// # Errors
    ///
    /// - [`MachineError::Timeout`]: no matching state within `timeout`
    /// - [`MachineError::ChannelClosed`]: transition channel closed
    /// - any error from [`submit`](Self::submit)
    pub async fn submit_and_wait_for<F>(
        &self,
        event: R::Event,
        predicate: F,
        timeout: Duration,
    ) -> Result<R::State, MachineError>
    where
        F: Fn(&R::State) -> bool,
    {
        let mut rx = self.subscribe();
        let id = self.submit(event)?;

        tokio::time::timeout(timeout, async {
            let mut applied = false;
            loop {
                match rx.recv().await {
                    Ok(transition) => {
                        applied |= transition.envelope.id() == id;
                        if applied && predicate(&transition.new) {
                            return Ok(transition.new);
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        self.shared.scoped(|| {
                            tracing::warn!(skipped, "Transition observer lagged");
                        });
                        applied = true;
                        let current = self.current_state();
                        if predicate(&current) {
                            return Ok(current);
                        }
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(MachineError::ChannelClosed);
                    },
                }
            }
        })
        .await
        .map_err(|_| MachineError::Timeout)?
    }

    /// Submit an event and wait until the flow reaches a terminal state.
    ///
    /// # Errors
    ///
    /// Same as [`submit_and_wait_for`](Self::submit_and_wait_for).
    pub async fn run_until_terminal(
        &self,
        event: R::Event,
        timeout: Duration,
    ) -> Result<R::State, MachineError> {
        self.submit_and_wait_for(event, |state| state.is_terminal(), timeout)
            .await
    }

    /// Stop accepting events and wait for in-flight work to finish.
    ///
    /// Events produced by actions that are still running continue to be
    /// resolved; only [`submit`](Self::submit) is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::ShutdownTimeout`] with the number of pending
    /// units of work if `timeout` expires first.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), MachineError> {
        self.shared.scoped(|| {
            tracing::info!(flow = %self.shared.name, "Initiating graceful shutdown");
        });
        metrics::counter!("state_machine.shutdown.initiated", "flow" => self.shared.name.to_string())
            .increment(1);

        self.shared.shutting_down.store(true, Ordering::Release);

        match self.wait_until_idle(timeout).await {
            Ok(()) => {
                self.shared.scoped(|| {
                    tracing::info!(flow = %self.shared.name, "Shutdown complete");
                });
                Ok(())
            },
            Err(MachineError::Timeout) => {
                let pending = self.pending();
                self.shared.scoped(|| {
                    tracing::error!(
                        flow = %self.shared.name,
                        pending,
                        "Shutdown timed out with work still pending"
                    );
                });
                metrics::counter!("state_machine.shutdown.timeout", "flow" => self.shared.name.to_string())
                    .increment(1);
                Err(MachineError::ShutdownTimeout(pending))
            },
            Err(other) => Err(other),
        }
    }
}

/// Single consumer of the event queue.
struct Worker<R: Resolver> {
    shared: Arc<Shared<R>>,
    rx: mpsc::UnboundedReceiver<Envelope<R::Event>>,
    tx: mpsc::WeakUnboundedSender<Envelope<R::Event>>,
}

impl<R> Worker<R>
where
    R: Resolver,
    R::Environment: Environment,
    R::Event: Clone + fmt::Debug + DebugDictionary + Sync,
{
    async fn run(mut self) {
        let span = tracing::info_span!("state_machine", flow = %self.shared.name);

        async move {
            tracing::debug!("Worker started");
            while let Some(envelope) = self.rx.recv().await {
                self.process(envelope);
            }
            tracing::debug!("Worker stopped");
        }
        .instrument(span)
        .await;
    }

    fn process(&self, envelope: Envelope<R::Event>) {
        let shared = &self.shared;
        let flow = shared.name.to_string();
        let old = shared.state.borrow().clone();

        let started = Instant::now();
        let Resolution {
            state,
            effects,
            diagnostic,
        } = shared.resolver.resolve(&old, envelope.event());
        metrics::histogram!("state_machine.resolve.duration_seconds", "flow" => flow.clone())
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(
            "state_machine.events.total",
            "flow" => flow.clone(),
            "event" => envelope.event().identifier()
        )
        .increment(1);

        if let Some(diagnostic) = &diagnostic {
            tracing::warn!(
                event_id = %envelope.id(),
                event = %envelope.event().debug_description(),
                %diagnostic,
                "Invalid transition"
            );
            metrics::counter!("state_machine.transitions.invalid", "flow" => flow.clone())
                .increment(1);
        }

        tracing::debug!(
            event_id = %envelope.id(),
            event = envelope.event().identifier(),
            from = old.stage(),
            to = state.stage(),
            effects = effects.len(),
            "Resolved event"
        );

        shared.state.send_replace(state.clone());
        // No subscribers is not an error.
        let _ = shared.transitions.send(Transition {
            old,
            new: state,
            envelope,
            diagnostic,
        });

        if !effects.is_empty() {
            match self.tx.upgrade() {
                Some(tx) => {
                    let ctx = ExecContext {
                        flow: Arc::clone(&shared.name),
                        dispatcher: EventDispatcher::new(QueueSink {
                            tx,
                            environment: Arc::clone(&shared.environment),
                            activity: shared.activity.clone(),
                        }),
                        environment: Arc::clone(&shared.environment),
                        activity: shared.activity.clone(),
                        logger: shared.logger.clone(),
                    };
                    for effect in effects {
                        shared.executor.execute(effect, &ctx);
                    }
                },
                None => {
                    tracing::debug!(dropped = effects.len(), "State machine stopping, dropping effects");
                },
            }
        }

        shared.activity.end();
    }
}
