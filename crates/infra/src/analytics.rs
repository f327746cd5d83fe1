//! Dashboard summary over both ledgers, computed on demand.

use serde::{Deserialize, Serialize};

use chaintrack_inventory::{InventoryLedger, Product};
use chaintrack_shipments::{ShipmentLedger, ShipmentStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusCounts {
    pub pending: u64,
    pub in_transit: u64,
    pub delivered: u64,
}

impl StatusCounts {
    fn record(&mut self, status: ShipmentStatus) {
        match status {
            ShipmentStatus::Pending => self.pending += 1,
            ShipmentStatus::InTransit => self.in_transit += 1,
            ShipmentStatus::Delivered => self.delivered += 1,
        }
    }

    pub fn get(&self, status: ShipmentStatus) -> u64 {
        match status {
            ShipmentStatus::Pending => self.pending,
            ShipmentStatus::InTransit => self.in_transit,
            ShipmentStatus::Delivered => self.delivered,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analytics {
    pub total_products: u64,
    pub total_units: u128,
    pub total_shipments: u64,
    pub status_counts: StatusCounts,
    pub delivered_shipments: u64,
    pub low_stock_threshold: u64,
    pub low_stock: Vec<Product>,
}

impl Analytics {
    pub fn compute(
        inventory: &InventoryLedger,
        shipments: &ShipmentLedger,
        low_stock_threshold: u64,
    ) -> Self {
        let mut status_counts = StatusCounts::default();
        for shipment in shipments.shipments() {
            status_counts.record(shipment.status);
        }

        Self {
            total_products: inventory.product_count(),
            total_units: inventory.total_units(),
            total_shipments: shipments.shipment_count(),
            status_counts,
            delivered_shipments: status_counts.delivered,
            low_stock_threshold,
            low_stock: inventory
                .low_stock(low_stock_threshold)
                .into_iter()
                .cloned()
                .collect(),
        }
    }
}
