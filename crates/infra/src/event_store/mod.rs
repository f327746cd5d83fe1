//! Append-only event log.
//!
//! One global log records every committed ledger event in commit order. The
//! log is the source of truth: ledger state can always be rebuilt from it.

pub mod in_memory;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use query::{EventFilter, EventQueryResult, Pagination, query_events};
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
