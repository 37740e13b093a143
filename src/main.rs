//! AskQL Server
//!
//! Run with: cargo run
//!
//! Configuration is read from the environment; see `askql::config` for the
//! full list. At minimum set ASKQL_DATABASE_URL, ASKQL_DATASETS and
//! GEMINI_API_KEY. RUST_LOG controls log levels (default: askql=info).

use askql::api::run_server;
use askql::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "askql=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;

    tracing::info!("AskQL configuration:");
    tracing::info!("  Host: {}:{}", settings.host, settings.port);
    tracing::info!("  Row ceiling: {}", settings.max_query_rows);
    tracing::info!(
        "  Query timeout: {} seconds",
        settings.query_timeout.as_secs()
    );
    tracing::info!(
        "  Retries: {}, repair attempts: {}",
        settings.max_retries,
        settings.max_repair_attempts
    );
    tracing::info!("  Unqualified tables: {:?}", settings.unqualified_tables);
    tracing::info!("  Synthesizer model: {}", settings.gemini_model);

    if settings.datasets.is_empty() {
        tracing::warn!("  No datasets configured (set ASKQL_DATASETS)");
    }
    for dataset in &settings.datasets {
        tracing::info!("    - {} -> schema {}", dataset.name, dataset.namespace);
    }

    run_server(settings).await
}
