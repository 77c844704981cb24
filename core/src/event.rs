//! Event envelopes.
//!
//! Flows define their own closed event enums (`SignUpEvent`, `AuthEvent`, ...).
//! When an event enters a state machine it is wrapped in an [`Envelope`] that
//! carries a correlation id and the time it was submitted. Envelopes are never
//! mutated after construction and are discarded once the resulting transition
//! has been committed and broadcast.
//!
//! # Example
//!
//! ```
//! use authflow_core::event::{Envelope, EventId};
//! use chrono::Utc;
//! use uuid::Uuid;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum DoorEvent {
//!     Open,
//! }
//!
//! let envelope = Envelope::new(EventId::new(Uuid::nil()), Utc::now(), DoorEvent::Open);
//! assert_eq!(envelope.event(), &DoorEvent::Open);
//! ```

use crate::debug::DebugDictionary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Opaque correlation token for a submitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Wrap a UUID.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event plus its correlation id and submission timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<E> {
    id: EventId,
    timestamp: DateTime<Utc>,
    event: E,
}

impl<E> Envelope<E> {
    /// Build an envelope. Normally done by the state machine on submission.
    #[must_use]
    pub const fn new(id: EventId, timestamp: DateTime<Utc>, event: E) -> Self {
        Self {
            id,
            timestamp,
            event,
        }
    }

    /// Correlation id.
    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// Submission time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The wrapped event.
    #[must_use]
    pub const fn event(&self) -> &E {
        &self.event
    }

    /// Consume the envelope, returning the wrapped event.
    #[must_use]
    pub fn into_event(self) -> E {
        self.event
    }
}

impl<E: DebugDictionary> DebugDictionary for Envelope<E> {
    fn identifier(&self) -> &'static str {
        self.event.identifier()
    }

    fn debug_dictionary(&self) -> Map<String, Value> {
        let mut dict = self.event.debug_dictionary();
        dict.insert("eventId".to_string(), Value::String(self.id.to_string()));
        dict.insert(
            "timestamp".to_string(),
            Value::String(self.timestamp.to_rfc3339()),
        );
        dict
    }
}
