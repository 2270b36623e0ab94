use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use portfolio_service::app;
use portfolio_service::config::{AppConfig, StoreBackend};
use portfolio_service::logging::{init_logging, request_trace_layer, LoggingConfig};
use portfolio_service::services::retry::RetryPolicy;
use portfolio_service::services::validation_cache::ValidationCache;
use portfolio_service::state::AppState;
use portfolio_service::store::{InMemoryPortfolioStore, PgPortfolioStore, PortfolioStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    let logging_config = LoggingConfig::from_env();
    init_logging(logging_config.clone())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let config = AppConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    let store: Arc<dyn PortfolioStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set for the postgres backend")?;
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(database_url)
                .await
                .context("failed to connect to Postgres")?;

            if config.run_migrations {
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("failed to run database migrations")?;
                tracing::info!("Database migrations applied");
            }

            tracing::info!("Using Postgres portfolio store");
            Arc::new(PgPortfolioStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory portfolio store; data is lost on restart");
            Arc::new(InMemoryPortfolioStore::new())
        }
    };

    let validation_cache = if config.validation_cache_enabled {
        tracing::info!("Validation cache enabled (capacity {})", config.validation_cache_size);
        Some(Arc::new(ValidationCache::new(config.validation_cache_size)))
    } else {
        tracing::info!("Validation cache disabled");
        None
    };

    let state = AppState::new(
        store,
        validation_cache,
        RetryPolicy::with_max_retries(config.bulk_max_retries),
    );
    let app = app::create_app(state).layer(request_trace_layer(&logging_config));

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Portfolio service running at http://{}/", addr);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
