//! Event query interface for inspection and debugging.
//!
//! Queries are read-only and paginated by default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chaintrack_core::Address;

use crate::event_store::{EventStore, EventStoreError, StoredEvent};

/// Pagination parameters for event queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of events to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).clamp(1, 1000),
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria for event queries. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub ledger: Option<Address>,
    /// e.g. "inventory" or "shipments".
    pub ledger_type: Option<String>,
    /// e.g. "shipments.shipment.status_updated".
    pub event_type: Option<String>,
    /// Only events with a sequence number strictly greater than this.
    pub after_sequence: Option<u64>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn matches(&self, event: &StoredEvent) -> bool {
        self.ledger.is_none_or(|l| l == event.ledger)
            && self
                .ledger_type
                .as_deref()
                .is_none_or(|t| t == event.ledger_type)
            && self
                .event_type
                .as_deref()
                .is_none_or(|t| t == event.event_type)
            && self
                .after_sequence
                .is_none_or(|s| event.sequence_number > s)
            && self.occurred_after.is_none_or(|t| event.occurred_at > t)
            && self.occurred_before.is_none_or(|t| event.occurred_at < t)
    }
}

/// Paginated event query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQueryResult {
    pub events: Vec<StoredEvent>,
    /// Number of events matching the filter (across all pages).
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

/// Run a filtered, paginated query against the log, in sequence order.
pub fn query_events<S>(
    store: &S,
    filter: &EventFilter,
    pagination: Pagination,
) -> Result<EventQueryResult, EventStoreError>
where
    S: EventStore + ?Sized,
{
    let matching: Vec<StoredEvent> = store
        .load_all()?
        .into_iter()
        .filter(|e| filter.matches(e))
        .collect();

    let total = matching.len() as u64;
    let start = pagination.offset as usize;
    let events: Vec<StoredEvent> = matching
        .into_iter()
        .skip(start)
        .take(pagination.limit as usize)
        .collect();
    let has_more = (start + events.len()) < total as usize;

    Ok(EventQueryResult {
        events,
        total,
        pagination,
        has_more,
    })
}
