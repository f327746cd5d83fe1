//! Rebuild ledger state from the event log.
//!
//! Replay applies every logged event, in sequence order, to a freshly deployed
//! pair of ledgers. No decision logic runs: the log already records what was
//! decided.

use serde_json::Value as JsonValue;
use thiserror::Error;

use chaintrack_core::{Address, Aggregate};
use chaintrack_inventory::{InventoryEvent, InventoryLedger};
use chaintrack_shipments::{ShipmentEvent, ShipmentLedger};

use crate::chain::{Deployment, LedgerState};
use crate::event_store::{EventStoreError, StoredEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("event {sequence} from unknown ledger {ledger} ({ledger_type})")]
    UnknownLedger {
        sequence: u64,
        ledger: Address,
        ledger_type: String,
    },

    #[error("event {sequence} ({event_type}) could not be decoded: {reason}")]
    Decode {
        sequence: u64,
        event_type: String,
        reason: String,
    },

    #[error("sequence gap: expected {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },
}

/// Rebuild both ledgers of `deployment` from `events`.
pub fn rebuild(deployment: &Deployment, events: &[StoredEvent]) -> Result<LedgerState, ReplayError> {
    let mut inventory = InventoryLedger::new(deployment.inventory);
    let mut shipments = ShipmentLedger::new(
        deployment.shipments,
        deployment.inventory,
        deployment.policy,
    );

    let mut height = 0;
    for stored in events {
        let expected = height + 1;
        if stored.sequence_number != expected {
            return Err(ReplayError::SequenceGap {
                expected,
                found: stored.sequence_number,
            });
        }

        if stored.ledger == deployment.inventory {
            let event: InventoryEvent = decode(stored)?;
            inventory.apply(&event);
        } else if stored.ledger == deployment.shipments {
            let event: ShipmentEvent = decode(stored)?;
            shipments.apply(&event);
        } else {
            return Err(ReplayError::UnknownLedger {
                sequence: stored.sequence_number,
                ledger: stored.ledger,
                ledger_type: stored.ledger_type.clone(),
            });
        }
        height = stored.sequence_number;
    }

    tracing::debug!(
        height,
        products = inventory.product_count(),
        shipments = shipments.shipment_count(),
        "ledgers rebuilt from log"
    );

    Ok(LedgerState {
        inventory,
        shipments,
        height,
    })
}

fn decode<E: serde::de::DeserializeOwned>(stored: &StoredEvent) -> Result<E, ReplayError> {
    serde_json::from_value::<E>(JsonValue::clone(&stored.payload)).map_err(|e| {
        ReplayError::Decode {
            sequence: stored.sequence_number,
            event_type: stored.event_type.clone(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn stored(seq: u64, ledger: Address, payload: JsonValue) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::now_v7(),
            ledger,
            ledger_type: "inventory".to_string(),
            sequence_number: seq,
            event_type: "inventory.product.added".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload,
        }
    }

    #[test]
    fn empty_log_gives_fresh_ledgers() {
        let deployment = Deployment::default();
        let replayed = rebuild(&deployment, &[]).unwrap();
        assert_eq!(replayed.height, 0);
        assert_eq!(replayed.inventory.product_count(), 0);
        assert_eq!(replayed.shipments.shipment_count(), 0);
    }

    #[test]
    fn undecodable_payload_is_reported() {
        let deployment = Deployment::default();
        let err = rebuild(
            &deployment,
            &[stored(1, deployment.inventory, serde_json::json!({"nope": 1}))],
        )
        .unwrap_err();
        assert!(matches!(err, ReplayError::Decode { sequence: 1, .. }));
    }

    #[test]
    fn foreign_ledger_and_gaps_are_rejected() {
        let deployment = Deployment::default();
        let err = rebuild(
            &deployment,
            &[stored(1, Address::from_bytes([0xEE; 20]), JsonValue::Null)],
        )
        .unwrap_err();
        assert!(matches!(err, ReplayError::UnknownLedger { .. }));

        let err = rebuild(&deployment, &[stored(2, deployment.inventory, JsonValue::Null)])
            .unwrap_err();
        assert_eq!(err, ReplayError::SequenceGap { expected: 1, found: 2 });
    }
}
