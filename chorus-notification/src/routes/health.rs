use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use chorus_shared::types::api::{HealthCheck, HealthResponse};

use crate::{AppState, SERVICE_NAME};

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mut checks = vec![match state.store.ping() {
        Ok(()) => HealthCheck::passed("store"),
        Err(e) => HealthCheck::failed("store", e.to_string()),
    }];

    if let Some(rabbitmq) = &state.rabbitmq {
        checks.push(if rabbitmq.is_connected() {
            HealthCheck::passed("rabbitmq")
        } else {
            HealthCheck::failed("rabbitmq", "channel closed")
        });
    }

    Json(HealthResponse::healthy(SERVICE_NAME, env!("CARGO_PKG_VERSION")).with_checks(checks))
}

/// Prometheus text exposition. Empty when no recorder is installed.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
