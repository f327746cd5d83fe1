//! Infrastructure layer: configuration, the event log, and the host that runs
//! both ledgers.

pub mod analytics;
pub mod chain;
pub mod config;
pub mod event_store;
pub mod replay;

pub use analytics::{Analytics, StatusCounts};
pub use chain::{ChainError, Deployment, EnvelopeBus, LedgerState, ShipmentFilter, SupplyChain};
pub use config::{ChainConfig, ConfigError};
pub use replay::{ReplayError, rebuild};
