//! In-process collaborators for tests and local runs without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ArtifactStore, CatalogStore, InteractionStore, ProfileStore};
use crate::error::AppResult;
use crate::models::{
    InteractionRecord, PopularProduct, ProductFeatures, Region, Signal, TrendingProduct,
    UserProfile,
};
use crate::services::fallback::NEUTRAL_RATING;
use crate::services::registry::StoredArtifact;

/// Catalog holding active products plus pre-aggregated order statistics
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: Vec<ProductFeatures>,
    popular: Vec<PopularProduct>,
    trending: HashMap<Region, Vec<TrendingProduct>>,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<ProductFeatures>) -> Self {
        Self {
            products,
            ..Default::default()
        }
    }

    pub fn with_popular(mut self, popular: Vec<PopularProduct>) -> Self {
        self.popular = popular;
        self
    }

    pub fn with_trending(mut self, region: Region, trending: Vec<TrendingProduct>) -> Self {
        self.trending.insert(region, trending);
        self
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn get_active_product(&self, product_id: &str) -> AppResult<Option<ProductFeatures>> {
        Ok(self
            .products
            .iter()
            .find(|p| p.product_id == product_id)
            .cloned())
    }

    async fn query_by_category(
        &self,
        categories: &[String],
        multiplier: f64,
        limit: usize,
    ) -> AppResult<Vec<ProductFeatures>> {
        let mut matching: Vec<ProductFeatures> = self
            .products
            .iter()
            .filter(|p| categories.contains(&p.category))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.cultural_score(multiplier)
                .total_cmp(&a.cultural_score(multiplier))
        });
        matching.truncate(limit);
        Ok(matching)
    }

    async fn query_popular(
        &self,
        _window_days: u32,
        limit: usize,
    ) -> AppResult<Vec<PopularProduct>> {
        let mut popular = self.popular.clone();
        popular.sort_by(|a, b| {
            b.order_count.cmp(&a.order_count).then_with(|| {
                b.avg_rating
                    .unwrap_or(NEUTRAL_RATING)
                    .total_cmp(&a.avg_rating.unwrap_or(NEUTRAL_RATING))
            })
        });
        popular.truncate(limit);
        Ok(popular)
    }

    async fn list_active_products(&self) -> AppResult<Vec<ProductFeatures>> {
        Ok(self.products.clone())
    }

    async fn query_trending(
        &self,
        region: Region,
        _window_days: u32,
        min_orders: u32,
        limit: usize,
    ) -> AppResult<Vec<TrendingProduct>> {
        let mut trending: Vec<TrendingProduct> = self
            .trending
            .get(&region)
            .into_iter()
            .flatten()
            .filter(|t| t.recent_orders >= i64::from(min_orders))
            .cloned()
            .collect();
        trending.sort_by(|a, b| {
            b.recent_orders
                .cmp(&a.recent_orders)
                .then(b.total_items_sold.cmp(&a.total_items_sold))
        });
        trending.truncate(limit);
        Ok(trending)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProfiles {
    profiles: HashMap<String, UserProfile>,
}

impl InMemoryProfiles {
    pub fn new(profiles: impl IntoIterator<Item = UserProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.user_id.clone(), p))
                .collect(),
        }
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfiles {
    async fn get_profile(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        Ok(self.profiles.get(user_id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryInteractions {
    records: Vec<InteractionRecord>,
}

impl InMemoryInteractions {
    pub fn new(records: Vec<InteractionRecord>) -> Self {
        Self { records }
    }
}

impl InteractionStore for InMemoryInteractions {
    fn get_interactions(&self, since: DateTime<Utc>) -> BoxStream<'_, AppResult<InteractionRecord>> {
        stream::iter(
            self.records
                .iter()
                .filter(move |r| r.timestamp > since)
                .cloned()
                .map(Ok),
        )
        .boxed()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryArtifacts {
    artifacts: RwLock<HashMap<Signal, StoredArtifact>>,
}

impl InMemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.artifacts.read().await.len()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifacts {
    async fn load(&self, signal: Signal) -> AppResult<Option<StoredArtifact>> {
        Ok(self.artifacts.read().await.get(&signal).cloned())
    }

    async fn save(&self, artifact: &StoredArtifact) -> AppResult<()> {
        self.artifacts
            .write()
            .await
            .insert(artifact.signal(), artifact.clone());
        Ok(())
    }
}
