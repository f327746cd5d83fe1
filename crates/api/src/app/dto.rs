use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chaintrack_core::{Address, DomainError};
use chaintrack_inventory::{Product, ProductId};
use chaintrack_shipments::{LineItem, Shipment, ShipmentId, ShipmentStatus};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AddProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub quantity: u64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u64,
}

#[derive(Debug, Deserialize)]
pub struct DecreaseInventoryRequest {
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub quantity: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateShipmentRequest {
    pub receiver: String,
    pub product_ids: Vec<u64>,
    pub quantities: Vec<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShipmentListQuery {
    pub sender: Option<String>,
    pub receiver: Option<String>,
}

/// A status given either by name (`"InTransit"`) or by code (`1`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StatusInput {
    Code(u8),
    Name(String),
}

impl StatusInput {
    pub fn parse(&self) -> Result<ShipmentStatus, DomainError> {
        match self {
            StatusInput::Code(code) => ShipmentStatus::try_from(*code),
            StatusInput::Name(name) => name.parse(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: StatusInput,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub ledger_type: Option<String>,
    pub event_type: Option<String>,
    pub after: Option<u64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub quantity: u64,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id.get(),
            name: p.name,
            description: p.description,
            quantity: p.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LineItemResponse {
    pub product_id: u64,
    pub quantity: u64,
}

impl From<LineItem> for LineItemResponse {
    fn from(item: LineItem) -> Self {
        Self {
            product_id: item.product_id.get(),
            quantity: item.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub status_code: u8,
}

impl From<ShipmentStatus> for StatusResponse {
    fn from(status: ShipmentStatus) -> Self {
        Self {
            status: status.as_str(),
            status_code: status.code(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShipmentResponse {
    pub id: u64,
    pub sender: Address,
    pub receiver: Address,
    pub status: &'static str,
    pub status_code: u8,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub items: Vec<LineItemResponse>,
}

impl From<Shipment> for ShipmentResponse {
    fn from(s: Shipment) -> Self {
        Self {
            id: s.id.get(),
            sender: s.sender,
            receiver: s.receiver,
            status: s.status.as_str(),
            status_code: s.status.code(),
            created_at: s.created_at,
            delivered_at: s.delivered_at,
            items: s.items.into_iter().map(LineItemResponse::from).collect(),
        }
    }
}

// -------------------------
// Path / field parsing
// -------------------------

pub fn parse_product_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse()
        .map_err(|e: DomainError| errors::domain_error_to_response(&e))
}

pub fn parse_shipment_id(raw: &str) -> Result<ShipmentId, axum::response::Response> {
    raw.parse()
        .map_err(|e: DomainError| errors::domain_error_to_response(&e))
}

pub fn parse_address(raw: &str) -> Result<Address, axum::response::Response> {
    raw.trim()
        .parse()
        .map_err(|e: DomainError| errors::domain_error_to_response(&e))
}
