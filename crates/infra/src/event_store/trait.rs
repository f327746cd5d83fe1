use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use chaintrack_core::{Address, ExpectedVersion};
use chaintrack_events::EventEnvelope;
use std::sync::Arc;

/// An event ready to be appended to the log (not yet assigned a sequence number).
///
/// ## Event Lifecycle
///
/// 1. **Domain event**: produced by a ledger's `handle()`
/// 2. **UncommittedEvent**: serialized and tagged with the emitting ledger
/// 3. **StoredEvent**: appended with its position in the log
/// 4. **EventEnvelope**: published to the bus for subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub ledger: Address,
    pub ledger_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// An event in the append-only log.
///
/// `sequence_number` is the 1-based position in the global log. It is
/// assigned by the store during append and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub ledger: Address,
    pub ledger_type: String,

    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    /// Convert a stored event into an envelope for publication.
    pub fn to_envelope(&self) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            self.event_id,
            self.ledger,
            self.ledger_type.clone(),
            self.event_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// Event store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors: a call
/// rejected with one of these has not changed any ledger either.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("ledger type mismatch: {0}")]
    LedgerTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only event log.
///
/// ## Append Semantics
///
/// `append()`:
/// - checks the log height against `expected_version`
/// - assigns sequence numbers starting at `height + 1`
/// - persists the whole batch or nothing
/// - rejects a ledger address that changes its `ledger_type`
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// The whole log, in sequence order.
    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Events emitted by one ledger, in sequence order.
    fn load_ledger(&self, ledger: Address) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Number of events in the log (the sequence number of the last one).
    fn height(&self) -> Result<u64, EventStoreError>;
}

/// Shared store. Each host keeps its own view of the log and resyncs when an
/// append finds the log has moved past it.
impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_all()
    }

    fn load_ledger(&self, ledger: Address) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_ledger(ledger)
    }

    fn height(&self) -> Result<u64, EventStoreError> {
        (**self).height()
    }
}

impl UncommittedEvent {
    /// Build an uncommitted event from a typed ledger event.
    pub fn from_typed<E>(
        ledger: Address,
        ledger_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: chaintrack_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            ledger,
            ledger_type: ledger_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
