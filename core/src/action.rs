//! Actions - named, executable units of work.
//!
//! An action is produced by a resolver, executed at most once by the runtime,
//! and reports its outcome by dispatching events. It receives exactly two
//! inputs: a dispatcher and the environment. That is what makes actions
//! testable in isolation: with a fixed environment and a recording
//! dispatcher, an action is fully described by the events it emits.
//!
//! # Contract
//!
//! On every reachable path (success, failure, guard-clause rejection) an
//! action dispatches **exactly one** result event. Failures are not returned
//! or thrown; they are turned into the flow's error event. The only exception
//! is a fire-and-forget step that overrides
//! [`dispatches_result`](Action::dispatches_result).
//!
//! When the runtime aborts an in-flight action, it dispatches
//! [`cancelled`](Action::cancelled) in place of the result the action would
//! have produced.
//!
//! Flows implement this trait on a closed enum of their actions, which keeps
//! the set of variants exhaustively checked by the compiler.

use crate::debug::DebugDictionary;
use crate::dispatcher::EventDispatcher;
use futures::future::BoxFuture;
use std::sync::Arc;

/// A unit of (possibly asynchronous) work that produces follow-up events.
///
/// The stable identifier comes from the [`DebugDictionary`] supertrait.
pub trait Action: DebugDictionary + Send + 'static {
    /// Event type this action dispatches.
    type Event: Send + 'static;

    /// Environment this action executes against.
    type Environment: Send + Sync + 'static;

    /// Perform the work, dispatching the outcome through `dispatcher`.
    fn execute(
        self,
        dispatcher: EventDispatcher<Self::Event>,
        env: Arc<Self::Environment>,
    ) -> BoxFuture<'static, ()>;

    /// Terminal event dispatched when this action is aborted before it reported.
    fn cancelled(&self) -> Self::Event;

    /// Whether this action is expected to dispatch a result event.
    ///
    /// Only fire-and-forget steps (for example pure logging) return `false`.
    fn dispatches_result(&self) -> bool {
        true
    }
}
