use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chaintrack_auth::Principal;
use chaintrack_core::{Address, Aggregate, AggregateRoot, DomainError, DomainResult, Receipt};
use chaintrack_events::{Event, execute};

use crate::product::{Product, ProductId};

/// Ledger type tag used in the event log.
pub const LEDGER_TYPE: &str = "inventory";

/// Aggregate root: the inventory ledger (every product record it owns).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryLedger {
    address: Address,
    products: BTreeMap<ProductId, Product>,
    product_count: u64,
    version: u64,
}

impl InventoryLedger {
    /// A freshly deployed, empty ledger at `address`.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            products: BTreeMap::new(),
            product_count: 0,
            version: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn product_count(&self) -> u64 {
        self.product_count
    }

    pub fn get_product(&self, id: ProductId) -> DomainResult<&Product> {
        self.products
            .get(&id)
            .ok_or_else(|| DomainError::not_found(ProductId::KIND, id.get()))
    }

    /// `requested <= quantity`. Unknown products have nothing available.
    pub fn check_availability(&self, id: ProductId, requested: u64) -> bool {
        self.products
            .get(&id)
            .is_some_and(|p| p.is_available(requested))
    }

    /// All products in id order.
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    /// Products whose quantity is strictly below `threshold`.
    pub fn low_stock(&self, threshold: u64) -> Vec<&Product> {
        self.products
            .values()
            .filter(|p| p.quantity < threshold)
            .collect()
    }

    /// Sum of all quantities.
    pub fn total_units(&self) -> u128 {
        self.products.values().map(|p| u128::from(p.quantity)).sum()
    }

    pub fn add_product(
        &mut self,
        caller: &Principal,
        name: impl Into<String>,
        description: impl Into<String>,
        initial_quantity: u64,
        at: DateTime<Utc>,
    ) -> DomainResult<Receipt<ProductId, InventoryEvent>> {
        let command = InventoryCommand::AddProduct(AddProduct {
            caller: *caller,
            name: name.into(),
            description: description.into(),
            initial_quantity,
            occurred_at: at,
        });
        let events = execute(self, &command)?;
        Ok(Receipt::new(ProductId::new(self.product_count), events))
    }

    pub fn update_product_quantity(
        &mut self,
        caller: &Principal,
        product_id: ProductId,
        new_quantity: u64,
        at: DateTime<Utc>,
    ) -> DomainResult<Receipt<(), InventoryEvent>> {
        let command = InventoryCommand::UpdateProductQuantity(UpdateProductQuantity {
            caller: *caller,
            product_id,
            new_quantity,
            occurred_at: at,
        });
        let events = execute(self, &command)?;
        Ok(Receipt::new((), events))
    }

    /// Returns the remaining quantity.
    pub fn decrease_inventory(
        &mut self,
        caller: &Principal,
        product_id: ProductId,
        amount: u64,
        at: DateTime<Utc>,
    ) -> DomainResult<Receipt<u64, InventoryEvent>> {
        let command = InventoryCommand::DecreaseInventory(DecreaseInventory {
            caller: *caller,
            product_id,
            amount,
            occurred_at: at,
        });
        let events = execute(self, &command)?;
        let remaining = self.get_product(product_id)?.quantity;
        Ok(Receipt::new(remaining, events))
    }
}

impl AggregateRoot for InventoryLedger {
    type Id = Address;

    fn id(&self) -> &Self::Id {
        &self.address
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AddProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddProduct {
    pub caller: Principal,
    pub name: String,
    pub description: String,
    pub initial_quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProductQuantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProductQuantity {
    pub caller: Principal,
    pub product_id: ProductId,
    pub new_quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DecreaseInventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecreaseInventory {
    pub caller: Principal,
    pub product_id: ProductId,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    AddProduct(AddProduct),
    UpdateProductQuantity(UpdateProductQuantity),
    DecreaseInventory(DecreaseInventory),
}

/// Event: ProductAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAdded {
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub quantity: u64,
    pub added_by: Address,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductQuantityUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductQuantityUpdated {
    pub product_id: ProductId,
    pub previous_quantity: u64,
    pub new_quantity: u64,
    pub updated_by: Address,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InventoryDecreased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDecreased {
    pub product_id: ProductId,
    pub amount: u64,
    pub remaining: u64,
    pub decreased_by: Address,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ProductAdded(ProductAdded),
    ProductQuantityUpdated(ProductQuantityUpdated),
    InventoryDecreased(InventoryDecreased),
}

impl InventoryEvent {
    pub fn product_id(&self) -> ProductId {
        match self {
            InventoryEvent::ProductAdded(e) => e.product_id,
            InventoryEvent::ProductQuantityUpdated(e) => e.product_id,
            InventoryEvent::InventoryDecreased(e) => e.product_id,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ProductAdded(_) => "inventory.product.added",
            InventoryEvent::ProductQuantityUpdated(_) => "inventory.product.quantity_updated",
            InventoryEvent::InventoryDecreased(_) => "inventory.product.decreased",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ProductAdded(e) => e.occurred_at,
            InventoryEvent::ProductQuantityUpdated(e) => e.occurred_at,
            InventoryEvent::InventoryDecreased(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryLedger {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ProductAdded(e) => {
                self.products.insert(
                    e.product_id,
                    Product {
                        id: e.product_id,
                        name: e.name.clone(),
                        description: e.description.clone(),
                        quantity: e.quantity,
                    },
                );
                self.product_count = self.product_count.max(e.product_id.get());
            }
            InventoryEvent::ProductQuantityUpdated(e) => {
                if let Some(product) = self.products.get_mut(&e.product_id) {
                    product.quantity = e.new_quantity;
                }
            }
            InventoryEvent::InventoryDecreased(e) => {
                if let Some(product) = self.products.get_mut(&e.product_id) {
                    product.quantity = e.remaining;
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::AddProduct(cmd) => self.handle_add(cmd),
            InventoryCommand::UpdateProductQuantity(cmd) => self.handle_update(cmd),
            InventoryCommand::DecreaseInventory(cmd) => self.handle_decrease(cmd),
        }
    }
}

impl InventoryLedger {
    fn handle_add(&self, cmd: &AddProduct) -> Result<Vec<InventoryEvent>, DomainError> {
        if cmd.name.trim().is_empty() {
            return Err(DomainError::invalid_input("product name cannot be empty"));
        }

        Ok(vec![InventoryEvent::ProductAdded(ProductAdded {
            product_id: ProductId::following(self.product_count)?,
            name: cmd.name.clone(),
            description: cmd.description.clone(),
            quantity: cmd.initial_quantity,
            added_by: cmd.caller.address(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(
        &self,
        cmd: &UpdateProductQuantity,
    ) -> Result<Vec<InventoryEvent>, DomainError> {
        let product = self.get_product(cmd.product_id)?;

        Ok(vec![InventoryEvent::ProductQuantityUpdated(
            ProductQuantityUpdated {
                product_id: cmd.product_id,
                previous_quantity: product.quantity,
                new_quantity: cmd.new_quantity,
                updated_by: cmd.caller.address(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_decrease(&self, cmd: &DecreaseInventory) -> Result<Vec<InventoryEvent>, DomainError> {
        let product = self.get_product(cmd.product_id)?;

        if cmd.amount > product.quantity {
            tracing::debug!(
                product_id = %cmd.product_id,
                requested = cmd.amount,
                available = product.quantity,
                "rejecting decrease: insufficient inventory"
            );
            return Err(DomainError::insufficient_inventory(
                cmd.product_id.get(),
                cmd.amount,
                product.quantity,
            ));
        }

        Ok(vec![InventoryEvent::InventoryDecreased(InventoryDecreased {
            product_id: cmd.product_id,
            amount: cmd.amount,
            remaining: product.quantity - cmd.amount,
            decreased_by: cmd.caller.address(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
