use axum::{Router, routing::get};

pub mod analytics;
pub mod events;
pub mod inventory;
pub mod shipments;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/analytics", get(analytics::get_analytics))
        .route("/events", get(events::list_events))
        .nest("/inventory", inventory::router())
        .nest("/shipments", shipments::router())
}
