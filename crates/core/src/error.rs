//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, authorization). Infrastructure concerns belong elsewhere.
///
/// Every variant describes a rejected call: a ledger that returns one of these
/// has not changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced product or shipment does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    /// A decrement asked for more stock than the product holds.
    #[error(
        "Insufficient inventory for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientInventory {
        product_id: u64,
        requested: u64,
        available: u64,
    },

    /// The caller may not perform the requested operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested status is not the legal successor of the current one.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Malformed arguments (e.g. mismatched line item arrays).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl DomainError {
    pub fn not_found(kind: &'static str, id: u64) -> Self {
        Self::NotFound { kind, id }
    }

    pub fn insufficient_inventory(product_id: u64, requested: u64, available: u64) -> Self {
        Self::InsufficientInventory {
            product_id,
            requested,
            available,
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Stable machine-readable code, used by transports.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotFound { .. } => "not_found",
            DomainError::InsufficientInventory { .. } => "insufficient_inventory",
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::InvalidTransition { .. } => "invalid_transition",
            DomainError::InvalidInput(_) => "invalid_input",
        }
    }
}
