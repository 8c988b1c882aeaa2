use anyhow::{Context, Result};
use forgeplane_core::{Config, EventBus, ProviderRegistry, Resolver};
use forgeplane_engine::OrchestrationEngine;
use forgeplane_providers::Loader;
use forgeplane_storage::Database;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "forgeplaned=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("forgeplaned starting...");

    let mut config = Config::from_env().context("failed to build configuration from environment")?;
    if let Ok(path) = std::env::var("FORGEPLANE_CONFIG") {
        config = config
            .merge_yaml(std::path::Path::new(&path))
            .context("failed to merge configuration file")?;
    }

    let db = Database::from_url(&config.database_url).await.context("failed to connect to database")?;
    db.migrate().await.context("failed to run database migrations")?;
    tracing::info!("database connection established");

    let registry = Arc::new(ProviderRegistry::new());
    let resolver = Arc::new(Resolver::new(registry.clone()));

    let loader = Loader::new(config.providers_root.clone(), config.core_version.clone());
    let failures = loader.load_all(&registry, &resolver).await.context("failed to read providers root")?;
    for (name, error) in &failures {
        tracing::warn!(provider = %name, error = %error, "provider failed to load");
    }
    let provider_count = registry.len().await;
    tracing::info!(providers = provider_count, "providers loaded");

    let event_bus = EventBus::default();
    let engine = Arc::new(OrchestrationEngine::new(registry, resolver, db, event_bus, config));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine_handle = tokio::spawn(engine.clone().run(shutdown_rx));

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");
    shutdown_tx.send(true).ok();
    engine_handle.await.context("orchestration engine task panicked")?;

    tracing::info!("forgeplaned shutdown complete");
    Ok(())
}
