use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chaintrack_core::Address;

/// Envelope for a committed event, carrying log metadata.
///
/// This is the unit published to subscribers after an append.
///
/// Notes:
/// - `ledger` is the address of the ledger that emitted the event.
/// - `sequence_number` is the position in the global, append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    ledger: Address,
    ledger_type: String,
    event_type: String,

    /// Monotonically increasing position in the log.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        ledger: Address,
        ledger_type: impl Into<String>,
        event_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            ledger,
            ledger_type: ledger_type.into(),
            event_type: event_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn ledger(&self) -> Address {
        self.ledger
    }

    pub fn ledger_type(&self) -> &str {
        &self.ledger_type
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
