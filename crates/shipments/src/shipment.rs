use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chaintrack_auth::{Party, ShipmentParties};
use chaintrack_core::{Address, DomainError};
use chaintrack_inventory::ProductId;

chaintrack_core::sequence_id!(
    /// Shipment identifier, assigned by the shipment ledger starting at 1.
    ShipmentId,
    "shipment"
);

/// Shipment status lifecycle: `Pending -> InTransit -> Delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShipmentStatus {
    Pending,
    InTransit,
    Delivered,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 3] = [
        ShipmentStatus::Pending,
        ShipmentStatus::InTransit,
        ShipmentStatus::Delivered,
    ];

    /// Stable numeric code (`Pending = 0`).
    pub fn code(self) -> u8 {
        match self {
            ShipmentStatus::Pending => 0,
            ShipmentStatus::InTransit => 1,
            ShipmentStatus::Delivered => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "Pending",
            ShipmentStatus::InTransit => "InTransit",
            ShipmentStatus::Delivered => "Delivered",
        }
    }

    /// The only legal successor, if any.
    pub fn next(self) -> Option<ShipmentStatus> {
        match self {
            ShipmentStatus::Pending => Some(ShipmentStatus::InTransit),
            ShipmentStatus::InTransit => Some(ShipmentStatus::Delivered),
            ShipmentStatus::Delivered => None,
        }
    }

    pub fn can_transition_to(self, to: ShipmentStatus) -> bool {
        self.next() == Some(to)
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl core::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for ShipmentStatus {
    type Error = DomainError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ShipmentStatus::Pending),
            1 => Ok(ShipmentStatus::InTransit),
            2 => Ok(ShipmentStatus::Delivered),
            other => Err(DomainError::invalid_input(format!(
                "unknown shipment status code {other}"
            ))),
        }
    }
}

/// Accepts a status name (case-insensitive, `_`/`-` ignored) or a numeric code.
impl FromStr for ShipmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return ShipmentStatus::try_from(code);
        }

        let normalized: String = trimmed
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "pending" => Ok(ShipmentStatus::Pending),
            "intransit" => Ok(ShipmentStatus::InTransit),
            "delivered" => Ok(ShipmentStatus::Delivered),
            _ => Err(DomainError::invalid_input(format!(
                "unknown shipment status '{trimmed}'"
            ))),
        }
    }
}

/// Who may move a shipment along. Fixed for the lifetime of a ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusUpdatePolicy {
    /// The sender performs both transitions.
    #[default]
    SenderOnly,
    /// The sender dispatches; sender or receiver may confirm delivery.
    ReceiverConfirmsDelivery,
}

impl StatusUpdatePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusUpdatePolicy::SenderOnly => "sender_only",
            StatusUpdatePolicy::ReceiverConfirmsDelivery => "receiver_confirms_delivery",
        }
    }

    /// Parties allowed to move a shipment out of `from`.
    ///
    /// A terminal status has no successor; it reuses the delivery rule so the
    /// party check still runs before the transition is rejected.
    pub fn allowed_from(self, from: ShipmentStatus) -> &'static [Party] {
        match (self, from) {
            (_, ShipmentStatus::Pending) => &[Party::Sender],
            (StatusUpdatePolicy::SenderOnly, _) => &[Party::Sender],
            (StatusUpdatePolicy::ReceiverConfirmsDelivery, _) => &[Party::Sender, Party::Receiver],
        }
    }
}

impl core::fmt::Display for StatusUpdatePolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusUpdatePolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sender_only" => Ok(StatusUpdatePolicy::SenderOnly),
            "receiver_confirms_delivery" => Ok(StatusUpdatePolicy::ReceiverConfirmsDelivery),
            other => Err(DomainError::invalid_input(format!(
                "unknown status update policy '{other}'"
            ))),
        }
    }
}

/// Shipment line: product and quantity, in the order given at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u64,
}

/// A shipment record as stored by the shipment ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub sender: Address,
    pub receiver: Address,
    pub status: ShipmentStatus,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub items: Vec<LineItem>,
}

impl Shipment {
    pub fn parties(&self) -> ShipmentParties {
        ShipmentParties {
            sender: self.sender,
            receiver: self.receiver,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.status == ShipmentStatus::Delivered
    }

    /// Total units across all line items.
    pub fn total_quantity(&self) -> u128 {
        self.items.iter().map(|i| u128::from(i.quantity)).sum()
    }
}
