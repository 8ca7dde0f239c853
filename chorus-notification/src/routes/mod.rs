use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;

use chorus_shared::middleware::metrics_middleware;

use crate::AppState;

pub mod health;
pub mod notifications;

/// All HTTP routes of the service, gzip-compressed when the client accepts it.
/// CORS and request tracing are added by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/grouped", get(notifications::list_grouped))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/mark-all-read", post(notifications::mark_all_read))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .route("/notifications/:id", delete(notifications::delete_notification))
        .route_layer(axum::middleware::from_fn(metrics_middleware))
        .with_state(state)
        .layer(CompressionLayer::new())
}
