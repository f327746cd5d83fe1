use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chaintrack_auth::{Principal, authorize_party};
use chaintrack_core::{Address, Aggregate, AggregateRoot, DomainError, DomainResult, Receipt};
use chaintrack_events::{Event, execute};
use chaintrack_inventory::{DecreaseInventory, InventoryCommand, InventoryEvent, InventoryLedger, ProductId};

use crate::shipment::{LineItem, Shipment, ShipmentId, ShipmentStatus, StatusUpdatePolicy};

/// Ledger type tag used in the event log.
pub const LEDGER_TYPE: &str = "shipments";

/// Aggregate root: the shipment ledger.
///
/// Linked at construction to exactly one inventory ledger; shipment creation
/// against any other inventory is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentLedger {
    address: Address,
    inventory: Address,
    policy: StatusUpdatePolicy,
    shipments: BTreeMap<ShipmentId, Shipment>,
    shipment_count: u64,
    version: u64,
}

/// The decided, not yet applied, effects of a shipment creation.
///
/// Produced by [`ShipmentLedger::plan_shipment`] without touching either
/// ledger; [`ShipmentLedger::commit`] applies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentPlan {
    pub shipment_id: ShipmentId,
    pub inventory_events: Vec<InventoryEvent>,
    pub shipment_events: Vec<ShipmentEvent>,
}

impl ShipmentLedger {
    pub fn new(address: Address, inventory: Address, policy: StatusUpdatePolicy) -> Self {
        Self {
            address,
            inventory,
            policy,
            shipments: BTreeMap::new(),
            shipment_count: 0,
            version: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Address of the linked inventory ledger.
    pub fn inventory_address(&self) -> Address {
        self.inventory
    }

    pub fn policy(&self) -> StatusUpdatePolicy {
        self.policy
    }

    pub fn shipment_count(&self) -> u64 {
        self.shipment_count
    }

    pub fn get_shipment(&self, id: ShipmentId) -> DomainResult<&Shipment> {
        self.shipments
            .get(&id)
            .ok_or_else(|| DomainError::not_found(ShipmentId::KIND, id.get()))
    }

    pub fn get_shipment_status(&self, id: ShipmentId) -> DomainResult<ShipmentStatus> {
        self.get_shipment(id).map(|s| s.status)
    }

    /// All shipments in id order.
    pub fn shipments(&self) -> impl Iterator<Item = &Shipment> {
        self.shipments.values()
    }

    pub fn shipments_by_sender(&self, sender: Address) -> Vec<&Shipment> {
        self.shipments
            .values()
            .filter(|s| s.sender == sender)
            .collect()
    }

    pub fn shipments_by_receiver(&self, receiver: Address) -> Vec<&Shipment> {
        self.shipments
            .values()
            .filter(|s| s.receiver == receiver)
            .collect()
    }

    /// Decide a shipment creation against `inventory` without mutating anything.
    ///
    /// Quantities are summed per product and each total becomes one
    /// `DecreaseInventory` call made with this ledger as the caller. Every
    /// product appears once, so each decrement can be decided against the same
    /// inventory snapshot.
    pub fn plan_shipment(
        &self,
        inventory: &InventoryLedger,
        cmd: &CreateShipment,
    ) -> DomainResult<ShipmentPlan> {
        if inventory.address() != self.inventory {
            return Err(DomainError::invalid_input(format!(
                "shipment ledger {} is linked to inventory {}, not {}",
                self.address,
                self.inventory,
                inventory.address()
            )));
        }

        let shipment_events = self.handle(&ShipmentCommand::CreateShipment(cmd.clone()))?;

        let mut totals: BTreeMap<ProductId, u64> = BTreeMap::new();
        for (product_id, quantity) in cmd.product_ids.iter().zip(&cmd.quantities) {
            let total = totals.entry(*product_id).or_insert(0);
            *total = total.checked_add(*quantity).ok_or_else(|| {
                DomainError::invalid_input(format!("quantity overflow for product {product_id}"))
            })?;
        }

        let ledger_caller = Principal::new(self.address);
        let mut inventory_events = Vec::with_capacity(totals.len());
        for (product_id, amount) in totals {
            let decrease = InventoryCommand::DecreaseInventory(DecreaseInventory {
                caller: ledger_caller,
                product_id,
                amount,
                occurred_at: cmd.occurred_at,
            });
            inventory_events.extend(inventory.handle(&decrease)?);
        }

        Ok(ShipmentPlan {
            shipment_id: ShipmentId::following(self.shipment_count)?,
            inventory_events,
            shipment_events,
        })
    }

    /// Apply a plan produced by [`plan_shipment`](Self::plan_shipment) on the
    /// same snapshot of both ledgers.
    pub fn commit(&mut self, inventory: &mut InventoryLedger, plan: &ShipmentPlan) -> ShipmentId {
        for ev in &plan.inventory_events {
            inventory.apply(ev);
        }
        for ev in &plan.shipment_events {
            self.apply(ev);
        }
        plan.shipment_id
    }

    /// Create a shipment, drawing its stock from `inventory`. All-or-nothing.
    pub fn create_shipment(
        &mut self,
        inventory: &mut InventoryLedger,
        caller: &Principal,
        receiver: Address,
        product_ids: Vec<ProductId>,
        quantities: Vec<u64>,
        at: DateTime<Utc>,
    ) -> DomainResult<ShipmentPlan> {
        let cmd = CreateShipment {
            caller: *caller,
            receiver,
            product_ids,
            quantities,
            occurred_at: at,
        };
        let plan = self.plan_shipment(inventory, &cmd)?;
        self.commit(inventory, &plan);
        Ok(plan)
    }

    pub fn update_shipment_status(
        &mut self,
        caller: &Principal,
        shipment_id: ShipmentId,
        new_status: ShipmentStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Receipt<ShipmentStatus, ShipmentEvent>> {
        let command = ShipmentCommand::UpdateShipmentStatus(UpdateShipmentStatus {
            caller: *caller,
            shipment_id,
            new_status,
            occurred_at: at,
        });
        let events = execute(self, &command)?;
        Ok(Receipt::new(new_status, events))
    }
}

impl AggregateRoot for ShipmentLedger {
    type Id = Address;

    fn id(&self) -> &Self::Id {
        &self.address
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateShipment.
///
/// `product_ids` and `quantities` are parallel arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateShipment {
    pub caller: Principal,
    pub receiver: Address,
    pub product_ids: Vec<ProductId>,
    pub quantities: Vec<u64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateShipmentStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateShipmentStatus {
    pub caller: Principal,
    pub shipment_id: ShipmentId,
    pub new_status: ShipmentStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentCommand {
    CreateShipment(CreateShipment),
    UpdateShipmentStatus(UpdateShipmentStatus),
}

/// Event: ShipmentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentCreated {
    pub shipment_id: ShipmentId,
    pub sender: Address,
    pub receiver: Address,
    pub items: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentStatusUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentStatusUpdated {
    pub shipment_id: ShipmentId,
    pub previous_status: ShipmentStatus,
    pub new_status: ShipmentStatus,
    pub updated_by: Address,
    /// Present only on the transition to `Delivered`.
    pub delivered_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentEvent {
    ShipmentCreated(ShipmentCreated),
    ShipmentStatusUpdated(ShipmentStatusUpdated),
}

impl ShipmentEvent {
    pub fn shipment_id(&self) -> ShipmentId {
        match self {
            ShipmentEvent::ShipmentCreated(e) => e.shipment_id,
            ShipmentEvent::ShipmentStatusUpdated(e) => e.shipment_id,
        }
    }
}

impl Event for ShipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShipmentEvent::ShipmentCreated(_) => "shipments.shipment.created",
            ShipmentEvent::ShipmentStatusUpdated(_) => "shipments.shipment.status_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ShipmentEvent::ShipmentCreated(e) => e.occurred_at,
            ShipmentEvent::ShipmentStatusUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ShipmentLedger {
    type Command = ShipmentCommand;
    type Event = ShipmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ShipmentEvent::ShipmentCreated(e) => {
                self.shipments.insert(
                    e.shipment_id,
                    Shipment {
                        id: e.shipment_id,
                        sender: e.sender,
                        receiver: e.receiver,
                        status: ShipmentStatus::Pending,
                        created_at: e.occurred_at,
                        delivered_at: None,
                        items: e.items.clone(),
                    },
                );
                self.shipment_count = self.shipment_count.max(e.shipment_id.get());
            }
            ShipmentEvent::ShipmentStatusUpdated(e) => {
                if let Some(shipment) = self.shipments.get_mut(&e.shipment_id) {
                    shipment.status = e.new_status;
                    if shipment.delivered_at.is_none() {
                        shipment.delivered_at = e.delivered_at;
                    }
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ShipmentCommand::CreateShipment(cmd) => self.handle_create(cmd),
            ShipmentCommand::UpdateShipmentStatus(cmd) => self.handle_update_status(cmd),
        }
    }
}

impl ShipmentLedger {
    /// Validates the request shape only; stock is checked by `plan_shipment`.
    fn handle_create(&self, cmd: &CreateShipment) -> Result<Vec<ShipmentEvent>, DomainError> {
        if cmd.product_ids.len() != cmd.quantities.len() {
            return Err(DomainError::invalid_input(format!(
                "{} product ids but {} quantities",
                cmd.product_ids.len(),
                cmd.quantities.len()
            )));
        }
        if cmd.product_ids.is_empty() {
            return Err(DomainError::invalid_input(
                "a shipment needs at least one line item",
            ));
        }
        if let Some(pos) = cmd.quantities.iter().position(|q| *q == 0) {
            return Err(DomainError::invalid_input(format!(
                "line item {pos} has zero quantity"
            )));
        }
        if cmd.receiver.is_zero() {
            return Err(DomainError::invalid_input("receiver cannot be the zero address"));
        }

        let items = cmd
            .product_ids
            .iter()
            .zip(&cmd.quantities)
            .map(|(product_id, quantity)| LineItem {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect();

        Ok(vec![ShipmentEvent::ShipmentCreated(ShipmentCreated {
            shipment_id: ShipmentId::following(self.shipment_count)?,
            sender: cmd.caller.address(),
            receiver: cmd.receiver,
            items,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_status(
        &self,
        cmd: &UpdateShipmentStatus,
    ) -> Result<Vec<ShipmentEvent>, DomainError> {
        let shipment = self.get_shipment(cmd.shipment_id)?;
        let current = shipment.status;

        authorize_party(
            &cmd.caller,
            &shipment.parties(),
            self.policy.allowed_from(current),
        )?;

        if !current.can_transition_to(cmd.new_status) {
            tracing::debug!(
                shipment_id = %cmd.shipment_id,
                from = %current,
                to = %cmd.new_status,
                "rejecting status update: invalid transition"
            );
            return Err(DomainError::invalid_transition(current, cmd.new_status));
        }

        let delivered_at = (cmd.new_status == ShipmentStatus::Delivered).then_some(cmd.occurred_at);

        Ok(vec![ShipmentEvent::ShipmentStatusUpdated(
            ShipmentStatusUpdated {
                shipment_id: cmd.shipment_id,
                previous_status: current,
                new_status: cmd.new_status,
                updated_by: cmd.caller.address(),
                delivered_at,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn inventory_address() -> Address {
        addr(0xA1)
    }

    fn shipments_address() -> Address {
        addr(0xB2)
    }

    fn sender() -> Principal {
        Principal::new(addr(1))
    }

    fn receiver() -> Principal {
        Principal::new(addr(2))
    }

    fn stranger() -> Principal {
        Principal::new(addr(9))
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn fixture(policy: StatusUpdatePolicy) -> (InventoryLedger, ShipmentLedger) {
        let mut inventory = InventoryLedger::new(inventory_address());
        inventory
            .add_product(&sender(), "Product 1", "Test Product 1", 100, test_time())
            .unwrap();
        inventory
            .add_product(&sender(), "Product 2", "Test Product 2", 50, test_time())
            .unwrap();
        let ledger = ShipmentLedger::new(shipments_address(), inventory_address(), policy);
        (inventory, ledger)
    }

    fn ship(
        ledger: &mut ShipmentLedger,
        inventory: &mut InventoryLedger,
        items: &[(u64, u64)],
    ) -> DomainResult<ShipmentId> {
        ledger
            .create_shipment(
                inventory,
                &sender(),
                receiver().address(),
                items.iter().map(|(p, _)| ProductId(*p)).collect(),
                items.iter().map(|(_, q)| *q).collect(),
                test_time(),
            )
            .map(|plan| plan.shipment_id)
    }

    #[test]
    fn create_shipment_decrements_inventory_and_starts_pending() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        let id = ship(&mut ledger, &mut inventory, &[(1, 50)]).unwrap();

        assert_eq!(id, ShipmentId(1));
        assert_eq!(ledger.shipment_count(), 1);
        assert_eq!(inventory.get_product(ProductId(1)).unwrap().quantity, 50);

        let shipment = ledger.get_shipment(id).unwrap();
        assert_eq!(shipment.sender, sender().address());
        assert_eq!(shipment.receiver, receiver().address());
        assert_eq!(shipment.status, ShipmentStatus::Pending);
        assert_eq!(shipment.delivered_at, None);
        assert_eq!(
            shipment.items,
            vec![LineItem {
                product_id: ProductId(1),
                quantity: 50
            }]
        );
        assert_eq!(
            ledger.get_shipment_status(id).unwrap().to_string(),
            "Pending"
        );
    }

    #[test]
    fn inventory_decrements_are_made_by_the_shipment_ledger() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        let plan = ledger
            .create_shipment(
                &mut inventory,
                &sender(),
                receiver().address(),
                vec![ProductId(2), ProductId(1)],
                vec![5, 7],
                test_time(),
            )
            .unwrap();

        assert_eq!(plan.inventory_events.len(), 2);
        for ev in &plan.inventory_events {
            match ev {
                InventoryEvent::InventoryDecreased(e) => {
                    assert_eq!(e.decreased_by, shipments_address());
                }
                other => panic!("unexpected inventory event {other:?}"),
            }
        }
        // Line items keep the caller's order.
        let shipment = ledger.get_shipment(plan.shipment_id).unwrap();
        assert_eq!(shipment.items[0].product_id, ProductId(2));
        assert_eq!(shipment.items[1].product_id, ProductId(1));
    }

    #[test]
    fn duplicate_products_are_summed_before_checking_stock() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);

        // 60 + 60 > 100, even though each line alone fits.
        let err = ship(&mut ledger, &mut inventory, &[(1, 60), (1, 60)]).unwrap_err();
        assert_eq!(err, DomainError::insufficient_inventory(1, 120, 100));
        assert_eq!(inventory.get_product(ProductId(1)).unwrap().quantity, 100);

        ship(&mut ledger, &mut inventory, &[(1, 40), (1, 60)]).unwrap();
        assert_eq!(inventory.get_product(ProductId(1)).unwrap().quantity, 0);
    }

    #[test]
    fn failing_line_item_rolls_back_the_whole_shipment() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        let inventory_before = inventory.clone();
        let ledger_before = ledger.clone();

        let err = ship(&mut ledger, &mut inventory, &[(1, 10), (2, 51)]).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientInventory { product_id: 2, .. }));

        assert_eq!(inventory, inventory_before);
        assert_eq!(ledger, ledger_before);
        assert_eq!(ledger.shipment_count(), 0);
    }

    #[test]
    fn unknown_product_fails_with_not_found() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        let err = ship(&mut ledger, &mut inventory, &[(1, 1), (7, 1)]).unwrap_err();
        assert_eq!(err, DomainError::not_found("product", 7));
        assert_eq!(inventory.get_product(ProductId(1)).unwrap().quantity, 100);
    }

    #[test]
    fn malformed_requests_are_invalid_input() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        let at = test_time();

        let mismatched = ledger.create_shipment(
            &mut inventory,
            &sender(),
            receiver().address(),
            vec![ProductId(1), ProductId(2)],
            vec![1],
            at,
        );
        assert!(matches!(mismatched, Err(DomainError::InvalidInput(_))));

        let empty =
            ledger.create_shipment(&mut inventory, &sender(), receiver().address(), vec![], vec![], at);
        assert!(matches!(empty, Err(DomainError::InvalidInput(_))));

        let zero_qty = ship(&mut ledger, &mut inventory, &[(1, 0)]);
        assert!(matches!(zero_qty, Err(DomainError::InvalidInput(_))));

        let zero_receiver = ledger.create_shipment(
            &mut inventory,
            &sender(),
            Address::ZERO,
            vec![ProductId(1)],
            vec![1],
            at,
        );
        assert!(matches!(zero_receiver, Err(DomainError::InvalidInput(_))));

        assert_eq!(ledger.shipment_count(), 0);
        assert_eq!(inventory.get_product(ProductId(1)).unwrap().quantity, 100);
    }

    #[test]
    fn foreign_inventory_is_rejected() {
        let (_, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        let mut other = InventoryLedger::new(addr(0xCC));
        other
            .add_product(&sender(), "Elsewhere", "", 10, test_time())
            .unwrap();

        let err = ship(&mut ledger, &mut other, &[(1, 1)]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
        assert_eq!(other.get_product(ProductId(1)).unwrap().quantity, 10);
    }

    #[test]
    fn sender_walks_the_full_lifecycle() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        let id = ship(&mut ledger, &mut inventory, &[(1, 50)]).unwrap();

        ledger
            .update_shipment_status(&sender(), id, ShipmentStatus::InTransit, test_time())
            .unwrap();
        assert_eq!(ledger.get_shipment_status(id).unwrap(), ShipmentStatus::InTransit);
        assert_eq!(ledger.get_shipment(id).unwrap().delivered_at, None);

        let delivered_at = test_time() + Duration::hours(3);
        ledger
            .update_shipment_status(&sender(), id, ShipmentStatus::Delivered, delivered_at)
            .unwrap();
        let shipment = ledger.get_shipment(id).unwrap();
        assert_eq!(shipment.status, ShipmentStatus::Delivered);
        assert_eq!(shipment.delivered_at, Some(delivered_at));
    }

    #[test]
    fn non_sender_cannot_dispatch() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        let id = ship(&mut ledger, &mut inventory, &[(1, 50)]).unwrap();

        let err = ledger
            .update_shipment_status(&stranger(), id, ShipmentStatus::InTransit, test_time())
            .unwrap_err();
        assert!(err.to_string().contains("Unauthorized"));

        let err = ledger
            .update_shipment_status(&receiver(), id, ShipmentStatus::InTransit, test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));

        assert_eq!(ledger.get_shipment_status(id).unwrap(), ShipmentStatus::Pending);
    }

    #[test]
    fn skipping_and_reversing_are_invalid_transitions() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        let id = ship(&mut ledger, &mut inventory, &[(1, 50)]).unwrap();

        let err = ledger
            .update_shipment_status(&sender(), id, ShipmentStatus::Delivered, test_time())
            .unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("Pending", "Delivered"));
        assert!(err.to_string().contains("Invalid status transition"));

        let err = ledger
            .update_shipment_status(&sender(), id, ShipmentStatus::Pending, test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));

        ledger
            .update_shipment_status(&sender(), id, ShipmentStatus::InTransit, test_time())
            .unwrap();
        let err = ledger
            .update_shipment_status(&sender(), id, ShipmentStatus::Pending, test_time())
            .unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("InTransit", "Pending"));
    }

    #[test]
    fn delivered_is_terminal_and_timestamp_set_once() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        let id = ship(&mut ledger, &mut inventory, &[(1, 50)]).unwrap();
        let t = test_time();

        ledger
            .update_shipment_status(&sender(), id, ShipmentStatus::InTransit, t)
            .unwrap();
        ledger
            .update_shipment_status(&sender(), id, ShipmentStatus::Delivered, t)
            .unwrap();

        for status in ShipmentStatus::ALL {
            let err = ledger
                .update_shipment_status(&sender(), id, status, t + Duration::days(1))
                .unwrap_err();
            assert!(matches!(err, DomainError::InvalidTransition { .. }));
        }
        assert_eq!(ledger.get_shipment(id).unwrap().delivered_at, Some(t));
    }

    #[test]
    fn check_order_is_not_found_then_unauthorized_then_transition() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        let id = ship(&mut ledger, &mut inventory, &[(1, 50)]).unwrap();

        let err = ledger
            .update_shipment_status(&stranger(), ShipmentId(99), ShipmentStatus::Delivered, test_time())
            .unwrap_err();
        assert_eq!(err, DomainError::not_found("shipment", 99));

        // Illegal transition requested by an outsider: authorization wins.
        let err = ledger
            .update_shipment_status(&stranger(), id, ShipmentStatus::Delivered, test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[test]
    fn receiver_may_confirm_delivery_under_receiver_policy() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::ReceiverConfirmsDelivery);
        let id = ship(&mut ledger, &mut inventory, &[(2, 10)]).unwrap();

        let err = ledger
            .update_shipment_status(&receiver(), id, ShipmentStatus::InTransit, test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));

        ledger
            .update_shipment_status(&sender(), id, ShipmentStatus::InTransit, test_time())
            .unwrap();
        ledger
            .update_shipment_status(&receiver(), id, ShipmentStatus::Delivered, test_time())
            .unwrap();
        assert!(ledger.get_shipment(id).unwrap().is_delivered());
    }

    #[test]
    fn receiver_cannot_confirm_delivery_under_sender_policy() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        let id = ship(&mut ledger, &mut inventory, &[(2, 10)]).unwrap();
        ledger
            .update_shipment_status(&sender(), id, ShipmentStatus::InTransit, test_time())
            .unwrap();

        let err = ledger
            .update_shipment_status(&receiver(), id, ShipmentStatus::Delivered, test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[test]
    fn queries_by_party() {
        let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        ship(&mut ledger, &mut inventory, &[(1, 1)]).unwrap();
        ledger
            .create_shipment(
                &mut inventory,
                &receiver(),
                stranger().address(),
                vec![ProductId(2)],
                vec![1],
                test_time(),
            )
            .unwrap();

        assert_eq!(ledger.shipments().count(), 2);
        assert_eq!(ledger.shipments_by_sender(sender().address()).len(), 1);
        assert_eq!(ledger.shipments_by_receiver(receiver().address()).len(), 1);
        assert_eq!(ledger.shipments_by_sender(receiver().address())[0].id, ShipmentId(2));
        assert!(ledger.shipments_by_receiver(sender().address()).is_empty());
    }

    #[test]
    fn plan_is_pure() {
        let (inventory, ledger) = fixture(StatusUpdatePolicy::SenderOnly);
        let cmd = CreateShipment {
            caller: sender(),
            receiver: receiver().address(),
            product_ids: vec![ProductId(1)],
            quantities: vec![10],
            occurred_at: test_time(),
        };

        let first = ledger.plan_shipment(&inventory, &cmd).unwrap();
        let second = ledger.plan_shipment(&inventory, &cmd).unwrap();
        assert_eq!(first, second);
        assert_eq!(inventory.get_product(ProductId(1)).unwrap().quantity, 100);
        assert_eq!(ledger.shipment_count(), 0);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a creation whose per-product totals exceed stock changes nothing.
            #[test]
            fn over_allocation_never_partially_applies(
                lines in prop::collection::vec((1u64..=2, 1u64..80), 1..6),
            ) {
                let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
                let before_inventory = inventory.clone();
                let before_ledger = ledger.clone();

                let total_for = |p: u64| lines.iter().filter(|(id, _)| *id == p).map(|(_, q)| q).sum::<u64>();
                let fits = total_for(1) <= 100 && total_for(2) <= 50;

                let result = ship(&mut ledger, &mut inventory, &lines);

                if fits {
                    prop_assert!(result.is_ok());
                    prop_assert_eq!(inventory.get_product(ProductId(1)).unwrap().quantity, 100 - total_for(1));
                    prop_assert_eq!(inventory.get_product(ProductId(2)).unwrap().quantity, 50 - total_for(2));
                } else {
                    let is_insufficient = matches!(result, Err(DomainError::InsufficientInventory { .. }));
                    prop_assert!(is_insufficient);
                    prop_assert_eq!(&inventory, &before_inventory);
                    prop_assert_eq!(&ledger, &before_ledger);
                }
            }

            /// Property: only the single successor of the current status is accepted.
            #[test]
            fn only_forward_single_steps_succeed(requests in prop::collection::vec(0u8..3, 0..8)) {
                let (mut inventory, mut ledger) = fixture(StatusUpdatePolicy::SenderOnly);
                let id = ship(&mut ledger, &mut inventory, &[(1, 1)]).unwrap();

                for code in requests {
                    let requested = ShipmentStatus::try_from(code).unwrap();
                    let current = ledger.get_shipment_status(id).unwrap();
                    let result = ledger.update_shipment_status(&sender(), id, requested, test_time());

                    if current.next() == Some(requested) {
                        prop_assert!(result.is_ok());
                        prop_assert_eq!(ledger.get_shipment_status(id).unwrap(), requested);
                    } else {
                        let is_invalid = matches!(result, Err(DomainError::InvalidTransition { .. }));
                        prop_assert!(is_invalid);
                        prop_assert_eq!(ledger.get_shipment_status(id).unwrap(), current);
                    }
                }
            }
        }
    }
}
