//! Service wiring: the supply chain host plus the settings handlers need.

use chaintrack_infra::{ChainConfig, SupplyChain};
use chaintrack_shipments::StatusUpdatePolicy;

pub struct AppServices {
    pub chain: SupplyChain,
    pub low_stock_threshold: u64,
}

impl AppServices {
    pub fn new(chain: SupplyChain, low_stock_threshold: u64) -> Self {
        Self {
            chain,
            low_stock_threshold,
        }
    }

    /// A fresh in-memory chain configured from `config`.
    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new(
            SupplyChain::in_memory(config.status_policy),
            config.low_stock_threshold,
        )
    }

    pub fn policy(&self) -> StatusUpdatePolicy {
        self.chain.deployment().policy
    }
}
