use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use crate::app::{dto, errors, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/products", post(add_product).get(list_products))
        .route("/products/count", get(product_count))
        .route("/products/low-stock", get(low_stock))
        .route("/products/:id", get(get_product))
        .route("/products/:id/quantity", put(update_quantity))
        .route("/products/:id/availability", get(check_availability))
        .route("/products/:id/decrease", post(decrease_inventory))
}

pub async fn add_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::AddProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.chain.add_product(
        principal.principal(),
        body.name,
        body.description,
        body.quantity,
    ) {
        Ok(id) => {
            tracing::info!(product_id = %id, caller = %principal.address(), "product added");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "id": id.get() })),
            )
                .into_response()
        }
        Err(e) => errors::chain_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.chain.products() {
        Ok(products) => Json(
            products
                .into_iter()
                .map(dto::ProductResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::chain_error_to_response(e),
    }
}

pub async fn product_count(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.chain.product_count() {
        Ok(count) => Json(serde_json::json!({ "count": count })).into_response(),
        Err(e) => errors::chain_error_to_response(e),
    }
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let threshold = services.low_stock_threshold;
    match services.chain.low_stock(threshold) {
        Ok(products) => Json(serde_json::json!({
            "threshold": threshold,
            "products": products
                .into_iter()
                .map(dto::ProductResponse::from)
                .collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => errors::chain_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.chain.product(id) {
        Ok(product) => Json(dto::ProductResponse::from(product)).into_response(),
        Err(e) => errors::chain_error_to_response(e),
    }
}

pub async fn update_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateQuantityRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    if let Err(e) = services
        .chain
        .update_product_quantity(principal.principal(), id, body.quantity)
    {
        return errors::chain_error_to_response(e);
    }

    match services.chain.product(id) {
        Ok(product) => Json(dto::ProductResponse::from(product)).into_response(),
        Err(e) => errors::chain_error_to_response(e),
    }
}

pub async fn check_availability(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    query: Result<Query<dto::AvailabilityQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match errors::query_params(query) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(quantity) = query.quantity else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_input",
            "query parameter 'quantity' is required",
        );
    };

    match services.chain.check_availability(id, quantity) {
        Ok(available) => Json(serde_json::json!({
            "product_id": id.get(),
            "quantity": quantity,
            "available": available,
        }))
        .into_response(),
        Err(e) => errors::chain_error_to_response(e),
    }
}

pub async fn decrease_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::DecreaseInventoryRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .chain
        .decrease_inventory(principal.principal(), id, body.amount)
    {
        Ok(remaining) => Json(serde_json::json!({
            "product_id": id.get(),
            "remaining": remaining,
        }))
        .into_response(),
        Err(e) => errors::chain_error_to_response(e),
    }
}
