//! The `SupplyChain` host: executes ledger calls one at a time, in total order.
//!
//! ## Call pipeline
//!
//! ```text
//! call(principal, args)
//!   ↓
//! 1. Lock both ledgers and stamp the call time
//!   ↓
//! 2. Decide: pure `handle`/`plan_shipment`, produces events
//!   ↓
//! 3. Persist: append to the log (expected height = current height)
//!   ↓
//! 4. Apply: evolve the ledgers from the committed events
//!   ↓
//! 5. Publish: fan committed envelopes out on the bus
//! ```
//!
//! A failure in 2 or 3 leaves both ledgers and the log untouched.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use chaintrack_auth::Principal;
use chaintrack_core::{Address, Aggregate, Clock, DomainError, DomainResult, ExpectedVersion, SystemClock};
use chaintrack_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use chaintrack_inventory::{
    AddProduct, DecreaseInventory, InventoryCommand, InventoryEvent, InventoryLedger, Product,
    ProductId, UpdateProductQuantity,
};
use chaintrack_shipments::{
    CreateShipment, Shipment, ShipmentCommand, ShipmentEvent, ShipmentId, ShipmentLedger,
    ShipmentStatus, StatusUpdatePolicy, UpdateShipmentStatus,
};

use crate::analytics::Analytics;
use crate::event_store::{
    EventFilter, EventQueryResult, EventStore, EventStoreError, InMemoryEventStore, Pagination,
    UncommittedEvent, query_events,
};
use crate::replay::{self, ReplayError};

/// Bus carrying committed events as JSON envelopes.
pub type EnvelopeBus = InMemoryEventBus<EventEnvelope<JsonValue>>;

/// Where the two ledgers live, and the status policy the shipment ledger runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub inventory: Address,
    pub shipments: Address,
    pub policy: StatusUpdatePolicy,
}

impl Deployment {
    /// First deployment address on a fresh local devnet.
    pub const DEFAULT_INVENTORY: Address = Address::from_bytes([
        0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67, 0xf0, 0x32, 0xd9, 0x3f, 0x64,
        0x2f, 0x64, 0x18, 0x0a, 0xa3,
    ]);

    /// Second deployment address on a fresh local devnet.
    pub const DEFAULT_SHIPMENTS: Address = Address::from_bytes([
        0xe7, 0xf1, 0x72, 0x5e, 0x77, 0x34, 0xce, 0x28, 0x8f, 0x83, 0x67, 0xe1, 0xbb, 0x14, 0x3e,
        0x90, 0xbb, 0x3f, 0x05, 0x12,
    ]);

    pub fn with_policy(policy: StatusUpdatePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }
}

impl Default for Deployment {
    fn default() -> Self {
        Self {
            inventory: Self::DEFAULT_INVENTORY,
            shipments: Self::DEFAULT_SHIPMENTS,
            policy: StatusUpdatePolicy::default(),
        }
    }
}

/// Both ledgers, and the log height their state reflects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerState {
    pub inventory: InventoryLedger,
    pub shipments: ShipmentLedger,
    pub height: u64,
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] EventStoreError),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error("ledger state unavailable: lock poisoned")]
    Poisoned,
}

impl ChainError {
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ChainError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// Filter for shipment listings. Both set fields must match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShipmentFilter {
    pub sender: Option<Address>,
    pub receiver: Option<Address>,
}

/// What a call decided, before it is persisted.
struct Decision<T> {
    value: T,
    inventory_events: Vec<InventoryEvent>,
    shipment_events: Vec<ShipmentEvent>,
}

impl<T> Decision<T> {
    fn inventory(value: T, events: Vec<InventoryEvent>) -> Self {
        Self {
            value,
            inventory_events: events,
            shipment_events: Vec::new(),
        }
    }

    fn shipments(value: T, events: Vec<ShipmentEvent>) -> Self {
        Self {
            value,
            inventory_events: Vec::new(),
            shipment_events: events,
        }
    }
}

pub struct SupplyChain<S = InMemoryEventStore, B = Arc<EnvelopeBus>> {
    deployment: Deployment,
    state: Mutex<LedgerState>,
    store: S,
    bus: B,
    clock: Arc<dyn Clock>,
}

impl SupplyChain {
    /// A fresh in-memory chain with wall-clock time.
    pub fn in_memory(policy: StatusUpdatePolicy) -> Self {
        let deployment = Deployment::with_policy(policy);
        let state = LedgerState {
            inventory: InventoryLedger::new(deployment.inventory),
            shipments: ShipmentLedger::new(deployment.shipments, deployment.inventory, policy),
            height: 0,
        };
        Self {
            deployment,
            state: Mutex::new(state),
            store: InMemoryEventStore::new(),
            bus: Arc::new(EnvelopeBus::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

impl<S, B> SupplyChain<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Attach to `store`, rebuilding both ledgers from whatever it already holds.
    pub fn new(
        deployment: Deployment,
        store: S,
        bus: B,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ChainError> {
        let log = store.load_all()?;
        let state = replay::rebuild(&deployment, &log)?;

        tracing::info!(
            inventory = %deployment.inventory,
            shipments = %deployment.shipments,
            policy = %deployment.policy,
            height = state.height,
            "supply chain ready"
        );

        Ok(Self {
            deployment,
            state: Mutex::new(state),
            store,
            bus,
            clock,
        })
    }

    pub fn deployment(&self) -> Deployment {
        self.deployment
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Receive every envelope committed after this call.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.bus.subscribe()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, ChainError> {
        self.state.lock().map_err(|_| ChainError::Poisoned)
    }

    /// Run one call through the pipeline.
    ///
    /// When another host sharing the store has appended since this host last
    /// synced, the append fails with `Concurrency`; the ledgers are then
    /// rebuilt from the log and the call is decided once more.
    fn commit<T>(
        &self,
        operation: &'static str,
        caller: &Principal,
        decide: impl Fn(&LedgerState, DateTime<Utc>) -> DomainResult<Decision<T>>,
    ) -> Result<T, ChainError> {
        let mut state = self.lock()?;
        let mut resynced = false;

        loop {
            let at = self.clock.now();
            let decision = match decide(&*state, at) {
                Ok(d) => d,
                Err(err) => {
                    tracing::warn!(
                        operation,
                        caller = %caller,
                        code = err.code(),
                        error = %err,
                        "call rejected"
                    );
                    return Err(err.into());
                }
            };

            let uncommitted = self.uncommitted(&decision)?;
            let committed = match self
                .store
                .append(uncommitted, ExpectedVersion::Exact(state.height))
            {
                Ok(c) => c,
                Err(EventStoreError::Concurrency(reason)) if !resynced => {
                    tracing::warn!(
                        operation,
                        height = state.height,
                        reason = %reason,
                        "log advanced by another writer; resyncing"
                    );
                    let log = self.store.load_all()?;
                    *state = replay::rebuild(&self.deployment, &log)?;
                    resynced = true;
                    continue;
                }
                Err(err) => {
                    tracing::error!(operation, caller = %caller, error = %err, "append failed");
                    return Err(err.into());
                }
            };

            for ev in &decision.inventory_events {
                state.inventory.apply(ev);
            }
            for ev in &decision.shipment_events {
                state.shipments.apply(ev);
            }
            if let Some(last) = committed.last() {
                state.height = last.sequence_number;
            }

            // Published under the lock so subscribers observe log order.
            for stored in &committed {
                if let Err(err) = self.bus.publish(stored.to_envelope()) {
                    tracing::warn!(
                        sequence = stored.sequence_number,
                        error = ?err,
                        "event publication failed; the log still holds it"
                    );
                }
            }

            tracing::info!(
                operation,
                caller = %caller,
                events = committed.len(),
                height = state.height,
                "call committed"
            );

            return Ok(decision.value);
        }
    }

    fn uncommitted<T>(&self, decision: &Decision<T>) -> Result<Vec<UncommittedEvent>, ChainError> {
        let mut uncommitted =
            Vec::with_capacity(decision.inventory_events.len() + decision.shipment_events.len());
        for ev in &decision.inventory_events {
            uncommitted.push(UncommittedEvent::from_typed(
                self.deployment.inventory,
                chaintrack_inventory::LEDGER_TYPE,
                Uuid::now_v7(),
                ev,
            )?);
        }
        for ev in &decision.shipment_events {
            uncommitted.push(UncommittedEvent::from_typed(
                self.deployment.shipments,
                chaintrack_shipments::LEDGER_TYPE,
                Uuid::now_v7(),
                ev,
            )?);
        }
        Ok(uncommitted)
    }

    fn read<T>(&self, f: impl FnOnce(&LedgerState) -> DomainResult<T>) -> Result<T, ChainError> {
        let state = self.lock()?;
        Ok(f(&*state)?)
    }

    // ---- inventory ---------------------------------------------------------

    pub fn add_product(
        &self,
        caller: &Principal,
        name: impl Into<String>,
        description: impl Into<String>,
        initial_quantity: u64,
    ) -> Result<ProductId, ChainError> {
        let (name, description) = (name.into(), description.into());
        self.commit("add_product", caller, |state, at| {
            let events = state
                .inventory
                .handle(&InventoryCommand::AddProduct(AddProduct {
                    caller: *caller,
                    name: name.clone(),
                    description: description.clone(),
                    initial_quantity,
                    occurred_at: at,
                }))?;
            let id = ProductId::following(state.inventory.product_count())?;
            Ok(Decision::inventory(id, events))
        })
    }

    pub fn update_product_quantity(
        &self,
        caller: &Principal,
        product_id: ProductId,
        new_quantity: u64,
    ) -> Result<(), ChainError> {
        self.commit("update_product_quantity", caller, |state, at| {
            let events = state.inventory.handle(&InventoryCommand::UpdateProductQuantity(
                UpdateProductQuantity {
                    caller: *caller,
                    product_id,
                    new_quantity,
                    occurred_at: at,
                },
            ))?;
            Ok(Decision::inventory((), events))
        })
    }

    /// Returns the remaining quantity.
    pub fn decrease_inventory(
        &self,
        caller: &Principal,
        product_id: ProductId,
        amount: u64,
    ) -> Result<u64, ChainError> {
        self.commit("decrease_inventory", caller, |state, at| {
            let events = state
                .inventory
                .handle(&InventoryCommand::DecreaseInventory(DecreaseInventory {
                    caller: *caller,
                    product_id,
                    amount,
                    occurred_at: at,
                }))?;
            let remaining = state.inventory.get_product(product_id)?.quantity - amount;
            Ok(Decision::inventory(remaining, events))
        })
    }

    pub fn product(&self, id: ProductId) -> Result<Product, ChainError> {
        self.read(|state| state.inventory.get_product(id).cloned())
    }

    pub fn products(&self) -> Result<Vec<Product>, ChainError> {
        self.read(|state| Ok(state.inventory.products().cloned().collect()))
    }

    pub fn product_count(&self) -> Result<u64, ChainError> {
        self.read(|state| Ok(state.inventory.product_count()))
    }

    pub fn check_availability(&self, id: ProductId, requested: u64) -> Result<bool, ChainError> {
        self.read(|state| Ok(state.inventory.check_availability(id, requested)))
    }

    pub fn low_stock(&self, threshold: u64) -> Result<Vec<Product>, ChainError> {
        self.read(|state| {
            Ok(state
                .inventory
                .low_stock(threshold)
                .into_iter()
                .cloned()
                .collect())
        })
    }

    // ---- shipments ---------------------------------------------------------

    pub fn create_shipment(
        &self,
        caller: &Principal,
        receiver: Address,
        product_ids: Vec<ProductId>,
        quantities: Vec<u64>,
    ) -> Result<ShipmentId, ChainError> {
        self.commit("create_shipment", caller, |state, at| {
            let plan = state.shipments.plan_shipment(
                &state.inventory,
                &CreateShipment {
                    caller: *caller,
                    receiver,
                    product_ids: product_ids.clone(),
                    quantities: quantities.clone(),
                    occurred_at: at,
                },
            )?;
            Ok(Decision {
                value: plan.shipment_id,
                inventory_events: plan.inventory_events,
                shipment_events: plan.shipment_events,
            })
        })
    }

    pub fn update_shipment_status(
        &self,
        caller: &Principal,
        shipment_id: ShipmentId,
        new_status: ShipmentStatus,
    ) -> Result<ShipmentStatus, ChainError> {
        self.commit("update_shipment_status", caller, |state, at| {
            let events = state
                .shipments
                .handle(&ShipmentCommand::UpdateShipmentStatus(UpdateShipmentStatus {
                    caller: *caller,
                    shipment_id,
                    new_status,
                    occurred_at: at,
                }))?;
            Ok(Decision::shipments(new_status, events))
        })
    }

    pub fn shipment(&self, id: ShipmentId) -> Result<Shipment, ChainError> {
        self.read(|state| state.shipments.get_shipment(id).cloned())
    }

    pub fn shipment_status(&self, id: ShipmentId) -> Result<ShipmentStatus, ChainError> {
        self.read(|state| state.shipments.get_shipment_status(id))
    }

    pub fn shipments(&self, filter: ShipmentFilter) -> Result<Vec<Shipment>, ChainError> {
        self.read(|state| {
            Ok(state
                .shipments
                .shipments()
                .filter(|s| filter.sender.is_none_or(|a| s.sender == a))
                .filter(|s| filter.receiver.is_none_or(|a| s.receiver == a))
                .cloned()
                .collect())
        })
    }

    pub fn shipment_count(&self) -> Result<u64, ChainError> {
        self.read(|state| Ok(state.shipments.shipment_count()))
    }

    // ---- chain -------------------------------------------------------------

    pub fn analytics(&self, low_stock_threshold: u64) -> Result<Analytics, ChainError> {
        self.read(|state| {
            Ok(Analytics::compute(
                &state.inventory,
                &state.shipments,
                low_stock_threshold,
            ))
        })
    }

    pub fn events(
        &self,
        filter: &EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, ChainError> {
        Ok(query_events(&self.store, filter, pagination)?)
    }

    pub fn height(&self) -> Result<u64, ChainError> {
        self.read(|state| Ok(state.height))
    }

    /// A consistent copy of both ledgers.
    pub fn snapshot(&self) -> Result<LedgerState, ChainError> {
        self.read(|state| Ok(state.clone()))
    }
}
