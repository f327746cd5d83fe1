use std::collections::HashMap;
use std::sync::RwLock;

use chaintrack_core::{Address, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// In-memory append-only event log.
///
/// Intended for tests/dev and the single-process host.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Log>,
}

#[derive(Debug, Default)]
struct Log {
    events: Vec<StoredEvent>,
    /// Type each ledger address was first recorded with.
    ledger_types: HashMap<Address, String>,
}

impl Log {
    fn height(&self) -> u64 {
        self.events.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The ledger type recorded for `ledger`, if it has any events.
    pub fn ledger_type(&self, ledger: Address) -> Result<Option<String>, EventStoreError> {
        let log = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(log.ledger_types.get(&ledger).cloned())
    }

    fn poisoned() -> EventStoreError {
        EventStoreError::Unavailable("lock poisoned".to_string())
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let mut log = self.inner.write().map_err(|_| Self::poisoned())?;
        let current = log.height();

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        // A ledger address keeps the type it was first recorded with, across
        // the existing log and within this batch.
        let mut batch: HashMap<Address, &str> = HashMap::new();
        for (idx, e) in events.iter().enumerate() {
            let existing = log
                .ledger_types
                .get(&e.ledger)
                .map(String::as_str)
                .or_else(|| batch.get(&e.ledger).copied());
            match existing {
                Some(existing) if existing != e.ledger_type => {
                    return Err(EventStoreError::LedgerTypeMismatch(format!(
                        "ledger {} is '{}', attempted append with '{}' (index {idx})",
                        e.ledger, existing, e.ledger_type
                    )));
                }
                Some(_) => {}
                None => {
                    batch.insert(e.ledger, e.ledger_type.as_str());
                }
            }
        }
        let new_ledgers: Vec<(Address, String)> = batch
            .into_iter()
            .map(|(ledger, ty)| (ledger, ty.to_string()))
            .collect();

        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                ledger: e.ledger,
                ledger_type: e.ledger_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            committed.push(stored);
        }
        log.events.extend(committed.iter().cloned());
        log.ledger_types.extend(new_ledgers);

        Ok(committed)
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let log = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(log.events.clone())
    }

    fn load_ledger(&self, ledger: Address) -> Result<Vec<StoredEvent>, EventStoreError> {
        let log = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(log
            .events
            .iter()
            .filter(|e| e.ledger == ledger)
            .cloned()
            .collect())
    }

    fn height(&self) -> Result<u64, EventStoreError> {
        let log = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(log.height())
    }
}
