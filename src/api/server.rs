use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    dataset_schema, health_check, list_datasets, query, refresh_schema, stats, validate, AppState,
};
use crate::catalog::{PgCatalog, SchemaCache};
use crate::config::Settings;
use crate::exec::{connect_pool, PgConnector, QueryExecutor};
use crate::pipeline::Pipeline;
use crate::synth::{GeminiSynthesizer, QuerySynthesizer, SynthError};

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        // Query pipeline
        .route("/query", post(query))
        .route("/validate", post(validate))
        // Datasets
        .route("/datasets", get(list_datasets))
        .route("/datasets/:name/schema", get(dataset_schema).delete(refresh_schema))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Wire the pool, catalog, synthesizer and pipeline, then serve HTTP
pub async fn run_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    // One pool, shared by the connector and the catalog
    let pool = connect_pool(&settings.database_url, &settings.pool_settings()).await?;
    tracing::info!(
        "Connected to PostgreSQL (pool size {}, acquire timeout {}s)",
        settings.pool_size,
        settings.pool_settings().acquire_timeout.as_secs()
    );

    let executor = QueryExecutor::new(Arc::new(PgConnector::new(pool.clone())))
        .with_retry(settings.retry_policy())
        .with_timeout(settings.query_timeout);

    let schemas = Arc::new(SchemaCache::with_config(
        Arc::new(PgCatalog::new(pool)),
        256,
        settings.schema_cache_ttl,
    ));

    let gemini = settings
        .gemini_config()
        .ok_or_else(|| SynthError::NotConfigured("GEMINI_API_KEY is not set".into()))?;
    let synthesizer: Arc<dyn QuerySynthesizer> = Arc::new(GeminiSynthesizer::new(gemini)?);

    let pipeline = Pipeline::new(executor, synthesizer, schemas, settings.pipeline_config());

    let state = Arc::new(AppState {
        pipeline,
        datasets: settings.datasets.clone(),
        max_query_rows: settings.max_query_rows,
    });

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    tracing::info!("Starting AskQL server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("AskQL server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
