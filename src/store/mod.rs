//! Collaborator contracts consumed by the ranking core and the training
//! pipeline, plus their PostgreSQL, file-system and in-memory implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::AppResult;
use crate::models::{
    InteractionRecord, PopularProduct, ProductFeatures, Region, Signal, TrendingProduct,
    UserProfile,
};
use crate::services::registry::StoredArtifact;

pub mod files;
pub mod memory;
pub mod postgres;

pub use files::FileArtifactStore;
pub use postgres::{PgCatalogStore, PgInteractionStore, PgProfileStore};

/// Read access to the active product catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// An active product, `None` if it was deleted or deactivated
    async fn get_active_product(&self, product_id: &str) -> AppResult<Option<ProductFeatures>>;

    /// Active products in `categories`, ordered by
    /// `vendor_rating × cultural_relevance × multiplier` descending
    async fn query_by_category(
        &self,
        categories: &[String],
        multiplier: f64,
        limit: usize,
    ) -> AppResult<Vec<ProductFeatures>>;

    /// Order counts over the trailing window, most ordered first
    async fn query_popular(&self, window_days: u32, limit: usize)
        -> AppResult<Vec<PopularProduct>>;

    /// Every active product. Used to build the content corpus.
    async fn list_active_products(&self) -> AppResult<Vec<ProductFeatures>>;

    /// Products ordered in `region` within the window by at least
    /// `min_orders` distinct orders
    async fn query_trending(
        &self,
        region: Region,
        window_days: u32,
        min_orders: u32,
        limit: usize,
    ) -> AppResult<Vec<TrendingProduct>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> AppResult<Option<UserProfile>>;
}

/// Training input. Never consulted on the request path.
pub trait InteractionStore: Send + Sync {
    fn get_interactions(&self, since: DateTime<Utc>) -> BoxStream<'_, AppResult<InteractionRecord>>;
}

/// Versioned, immutable model artifacts keyed by signal
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn load(&self, signal: Signal) -> AppResult<Option<StoredArtifact>>;

    async fn save(&self, artifact: &StoredArtifact) -> AppResult<()>;
}
