use serde::{Deserialize, Serialize};

chaintrack_core::sequence_id!(
    /// Product identifier, assigned by the inventory ledger starting at 1.
    ProductId,
    "product"
);

/// A product record as stored by the inventory ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub quantity: u64,
}

impl Product {
    pub fn is_available(&self, requested: u64) -> bool {
        requested <= self.quantity
    }
}
