use std::sync::Arc;

use crate::cached;
use crate::db::{Cache, CacheKey};
use crate::error::AppResult;
use crate::models::UserProfile;
use crate::store::ProfileStore;

/// Profile lookups with an optional cache-aside layer in front of the store
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    cache: Option<Cache>,
    ttl: u64,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>, cache: Option<Cache>, ttl: u64) -> Self {
        Self { store, cache, ttl }
    }

    pub async fn get_profile(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        let Some(cache) = &self.cache else {
            return self.store.get_profile(user_id).await;
        };

        cached!(
            cache,
            CacheKey::UserProfile(user_id.to_string()),
            self.ttl,
            self.store.get_profile(user_id)
        )
    }
}
