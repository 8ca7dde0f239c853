use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use chorus_shared::clients::rabbitmq::RabbitMQClient;
use chorus_shared::middleware::JwtSecretSource;

pub mod config;
pub mod events;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;

use crate::config::AppConfig;
use crate::services::NotificationStore;

pub const SERVICE_NAME: &str = "chorus-notification";

/// Shared by every handler and subscriber. Built once at startup.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn NotificationStore>,
    pub rabbitmq: Option<RabbitMQClient>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn NotificationStore>) -> Self {
        Self {
            config,
            store,
            rabbitmq: None,
            metrics_handle: None,
        }
    }

    pub fn with_rabbitmq(mut self, rabbitmq: RabbitMQClient) -> Self {
        self.rabbitmq = Some(rabbitmq);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

impl JwtSecretSource for AppState {
    fn jwt_secret(&self) -> &str {
        &self.config.jwt_secret
    }
}
