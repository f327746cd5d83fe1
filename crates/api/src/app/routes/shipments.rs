use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use chaintrack_infra::ShipmentFilter;
use chaintrack_inventory::ProductId;

use crate::app::{dto, errors, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_shipments).post(create_shipment))
        .route("/count", get(shipment_count))
        .route("/:id", get(get_shipment))
        .route("/:id/status", get(get_status).put(update_status))
}

pub async fn create_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateShipmentRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let receiver = match dto::parse_address(&body.receiver) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let product_ids = body.product_ids.into_iter().map(ProductId::new).collect();

    match services.chain.create_shipment(
        principal.principal(),
        receiver,
        product_ids,
        body.quantities,
    ) {
        Ok(id) => {
            tracing::info!(
                shipment_id = %id,
                sender = %principal.address(),
                receiver = %receiver,
                "shipment created"
            );
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "id": id.get() })),
            )
                .into_response()
        }
        Err(e) => errors::chain_error_to_response(e),
    }
}

pub async fn list_shipments(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ShipmentListQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match errors::query_params(query) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let sender = match query.sender.as_deref().map(dto::parse_address).transpose() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let receiver = match query.receiver.as_deref().map(dto::parse_address).transpose() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.chain.shipments(ShipmentFilter { sender, receiver }) {
        Ok(shipments) => Json(
            shipments
                .into_iter()
                .map(dto::ShipmentResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::chain_error_to_response(e),
    }
}

pub async fn shipment_count(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.chain.shipment_count() {
        Ok(count) => Json(serde_json::json!({ "count": count })).into_response(),
        Err(e) => errors::chain_error_to_response(e),
    }
}

pub async fn get_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_shipment_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.chain.shipment(id) {
        Ok(shipment) => Json(dto::ShipmentResponse::from(shipment)).into_response(),
        Err(e) => errors::chain_error_to_response(e),
    }
}

pub async fn get_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_shipment_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.chain.shipment_status(id) {
        Ok(status) => Json(dto::StatusResponse::from(status)).into_response(),
        Err(e) => errors::chain_error_to_response(e),
    }
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateStatusRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let id = match dto::parse_shipment_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let status = match body.status.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(&e),
    };

    match services
        .chain
        .update_shipment_status(principal.principal(), id, status)
    {
        Ok(status) => {
            tracing::info!(
                shipment_id = %id,
                status = %status,
                caller = %principal.address(),
                "shipment status updated"
            );
            Json(dto::StatusResponse::from(status)).into_response()
        }
        Err(e) => errors::chain_error_to_response(e),
    }
}
