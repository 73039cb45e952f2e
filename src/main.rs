use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use recommendation_engine::api::{create_router, AppState};
use recommendation_engine::config::Config;
use recommendation_engine::db::{create_pool, create_redis_client, Cache};
use recommendation_engine::services::{
    ModelRegistry, ProfileService, RecommendationEngine, Trainer,
};
use recommendation_engine::store::{
    CatalogStore, FileArtifactStore, PgCatalogStore, PgInteractionStore, PgProfileStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recommendation_engine=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_handle) = Cache::new(redis_client).await;

    let catalog: Arc<dyn CatalogStore> = Arc::new(PgCatalogStore::new(pool.clone()));
    let registry = Arc::new(ModelRegistry::default());

    let trainer = Trainer::new(
        catalog.clone(),
        Arc::new(PgInteractionStore::new(pool.clone())),
        Arc::new(FileArtifactStore::new(&config.artifact_dir)),
        registry.clone(),
    );
    if let Err(e) = trainer.load_or_train().await {
        tracing::error!(error = %e, "Starting with whatever models are loaded");
    }
    let retrain_task = config
        .model_update_interval()
        .map(|every| trainer.spawn_periodic(every));

    let engine = RecommendationEngine::new(registry, catalog.clone(), config.signal_timeout());
    let profiles = ProfileService::new(
        Arc::new(PgProfileStore::new(pool.clone())),
        Some(cache.clone()),
        config.cache_ttl_secs,
    );

    let state = Arc::new(
        AppState::new(engine, profiles, trainer, catalog, config.clone()).with_cache(cache),
    );
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %config.bind_address(), "Server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = retrain_task {
        task.abort();
    }
    cache_handle.shutdown().await;
    pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
