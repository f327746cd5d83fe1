use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};

use crate::app::{errors, services::AppServices};

pub async fn get_analytics(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.chain.analytics(services.low_stock_threshold) {
        Ok(analytics) => Json(analytics).into_response(),
        Err(e) => errors::chain_error_to_response(e),
    }
}
