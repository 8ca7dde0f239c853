use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Log line format, chosen from `CHORUS_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, with source locations.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    pub fn for_environment(env: Option<&str>) -> Self {
        match env {
            Some("production") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Filter used when `RUST_LOG` is unset: debug for the service itself.
pub fn default_directives(service_name: &str) -> String {
    format!("info,{}=debug,tower_http=debug", service_name.replace('-', "_"))
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing(service_name: &str) {
    let env = std::env::var("CHORUS_ENV").ok();
    let format = LogFormat::for_environment(env.as_deref());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(service_name)));

    let output: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Json => fmt::layer().json().with_thread_ids(true).boxed(),
        LogFormat::Pretty => fmt::layer().with_file(true).with_line_number(true).boxed(),
    };

    tracing_subscriber::registry().with(output).with(filter).init();

    tracing::info!(service = service_name, format = ?format, "tracing initialized");
}
