//! Inventory ledger (event-sourced).
//!
//! Business rules for product stock, implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod ledger;
pub mod product;

pub use ledger::{
    AddProduct, DecreaseInventory, InventoryCommand, InventoryDecreased, InventoryEvent,
    InventoryLedger, LEDGER_TYPE, ProductAdded, ProductQuantityUpdated, UpdateProductQuantity,
};
pub use product::{Product, ProductId};
