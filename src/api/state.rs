use std::sync::Arc;

use crate::config::Config;
use crate::db::Cache;
use crate::services::{ProfileService, RecommendationEngine, Trainer};
use crate::store::CatalogStore;

/// Everything a handler needs, built once at startup and shared behind an `Arc`
#[derive(Clone)]
pub struct AppState {
    pub engine: RecommendationEngine,
    pub profiles: ProfileService,
    pub trainer: Trainer,
    pub catalog: Arc<dyn CatalogStore>,
    /// Response cache, write-only from the handlers
    pub cache: Option<Cache>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        engine: RecommendationEngine,
        profiles: ProfileService,
        trainer: Trainer,
        catalog: Arc<dyn CatalogStore>,
        config: Config,
    ) -> Self {
        Self {
            engine,
            profiles,
            trainer,
            catalog,
            cache: None,
            config,
        }
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }
}
