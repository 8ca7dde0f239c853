use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use chorus_notification::config::{AppConfig, StoreBackend};
use chorus_notification::events::subscriber;
use chorus_notification::services::{MemoryNotificationStore, NotificationStore, PgNotificationStore};
use chorus_notification::{routes, AppState, SERVICE_NAME};
use chorus_shared::clients::db::create_pool;
use chorus_shared::clients::rabbitmq::RabbitMQClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chorus_shared::middleware::init_tracing(SERVICE_NAME);

    let config = AppConfig::load()?;
    let port = config.port;

    let store: Arc<dyn NotificationStore> = match config.store {
        StoreBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.db_pool_size)?;
            Arc::new(PgNotificationStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory notification store, data will not persist");
            Arc::new(MemoryNotificationStore::default())
        }
    };

    let metrics_handle = chorus_shared::middleware::init_metrics(SERVICE_NAME)?;
    metrics::describe_counter!(
        routes::notifications::GROUPS_BUILT_TOTAL,
        "Notification groups returned by the grouped feed"
    );

    let mut state = AppState::new(config, store).with_metrics(metrics_handle);
    if state.config.events_enabled {
        let rabbitmq = RabbitMQClient::connect(&state.config.rabbitmq_url).await?;
        state = state.with_rabbitmq(rabbitmq);
    }
    let state = Arc::new(state);

    if let Some(rabbitmq) = state.rabbitmq.clone() {
        // Spawn social event subscriber
        let social_state = state.clone();
        let social_rabbitmq = rabbitmq.clone();
        tokio::spawn(async move {
            if let Err(e) = subscriber::listen_social_events(social_state, social_rabbitmq).await {
                tracing::error!(error = %e, "social event subscriber failed");
            }
        });

        // Spawn messaging event subscriber
        let messaging_state = state.clone();
        let messaging_rabbitmq = rabbitmq.clone();
        tokio::spawn(async move {
            if let Err(e) = subscriber::listen_messaging_events(messaging_state, messaging_rabbitmq).await {
                tracing::error!(error = %e, "messaging event subscriber failed");
            }
        });

        // Spawn account event subscriber
        let account_state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = subscriber::listen_account_events(account_state, rabbitmq).await {
                tracing::error!(error = %e, "account event subscriber failed");
            }
        });
    } else {
        tracing::info!("event subscribers disabled");
    }

    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "chorus-notification starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("chorus-notification stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
