use axum::Json;
use axum::extract::Query;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use chaintrack_core::DomainError;
use chaintrack_infra::ChainError;

pub fn domain_error_to_response(err: &DomainError) -> axum::response::Response {
    let status = match err {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::InsufficientInventory { .. } => StatusCode::CONFLICT,
        DomainError::Unauthorized(_) => StatusCode::FORBIDDEN,
        DomainError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn chain_error_to_response(err: ChainError) -> axum::response::Response {
    match err {
        ChainError::Domain(e) => domain_error_to_response(&e),
        ChainError::Store(e) => {
            tracing::error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        ChainError::Replay(e) => {
            tracing::error!(error = %e, "replay failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "replay_error", e.to_string())
        }
        ChainError::Poisoned => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "unavailable",
            "ledger state unavailable",
        ),
    }
}

/// Unwrap a JSON body, answering a malformed one as invalid input.
pub fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, axum::response::Response> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| invalid_input(rejection.body_text()))
}

pub fn query_params<T>(
    params: Result<Query<T>, QueryRejection>,
) -> Result<T, axum::response::Response> {
    params
        .map(|Query(query)| query)
        .map_err(|rejection| invalid_input(rejection.body_text()))
}

fn invalid_input(message: String) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_input", message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
