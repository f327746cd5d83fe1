//! Shipment ledger (event-sourced).
//!
//! Owns shipment records and the status state machine. Creating a shipment
//! draws stock from the linked inventory ledger in the same all-or-nothing step.

pub mod ledger;
pub mod shipment;

pub use ledger::{
    CreateShipment, LEDGER_TYPE, ShipmentCommand, ShipmentCreated, ShipmentEvent, ShipmentLedger,
    ShipmentPlan, ShipmentStatusUpdated, UpdateShipmentStatus,
};
pub use shipment::{LineItem, Shipment, ShipmentId, ShipmentStatus, StatusUpdatePolicy};
