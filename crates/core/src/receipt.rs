//! Result of a committed ledger call.

/// What a successful mutating call hands back: its return value plus the events
/// it committed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt<T, E> {
    pub value: T,
    pub events: Vec<E>,
}

impl<T, E> Receipt<T, E> {
    pub fn new(value: T, events: Vec<E>) -> Self {
        Self { value, events }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Receipt<U, E> {
        Receipt {
            value: f(self.value),
            events: self.events,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}
