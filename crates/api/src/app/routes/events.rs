use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query, rejection::QueryRejection},
    response::IntoResponse,
};

use chaintrack_infra::event_store::{EventFilter, Pagination};

use crate::app::{dto, errors, services::AppServices};

/// The committed event log, oldest first.
pub async fn list_events(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::EventsQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match errors::query_params(query) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let filter = EventFilter {
        ledger_type: query.ledger_type,
        event_type: query.event_type,
        after_sequence: query.after,
        ..EventFilter::default()
    };
    let pagination = Pagination::new(query.limit, query.offset);

    match services.chain.events(&filter, pagination) {
        Ok(result) => Json(result).into_response(),
        Err(e) => errors::chain_error_to_response(e),
    }
}
