//! Business rules applied to the fused ranking before truncation.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

use crate::models::{
    cost_of_living_multiplier, ProductFeatures, Reason, Region, ScoredCandidate, UserProfile,
};
use crate::store::CatalogStore;

pub const LOCALITY_BOOST: f64 = 1.2;
pub const LANGUAGE_PENALTY: f64 = 0.8;

/// Concurrent catalog lookups per request
const LOOKUP_CONCURRENCY: usize = 16;

/// Highest price shown to the user: income tier base times the regional
/// cost-of-living multiplier
pub fn budget_cap(profile: &UserProfile) -> f64 {
    profile.income_tier().base_price_cap() * cost_of_living_multiplier(&profile.region)
}

/// Same region, or a neighbouring one
pub fn is_local_vendor(user_region: &str, vendor_region: &str) -> bool {
    let user = user_region.trim();
    let vendor = vendor_region.trim();
    if !user.is_empty() && user.eq_ignore_ascii_case(vendor) {
        return true;
    }

    match (Region::lookup(user), Region::lookup(vendor)) {
        (Some(user), Some(vendor)) => user.neighbours().contains(&vendor),
        _ => false,
    }
}

/// Local-language shoppers are steered away from products that only carry a
/// secondary-language name
pub fn needs_language_penalty(profile: &UserProfile, product: &ProductFeatures) -> bool {
    profile.language.is_local() && !product.has_local_name() && product.has_secondary_name()
}

/// Budget cap, locality boost and language penalty over candidates already
/// paired with their catalog entries. Re-sorts and truncates to `limit`.
pub fn apply_rules(
    profile: &UserProfile,
    candidates: Vec<(ScoredCandidate, ProductFeatures)>,
    limit: usize,
) -> Vec<ScoredCandidate> {
    let cap = budget_cap(profile);

    let mut kept: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter(|(_, product)| product.price <= cap)
        .map(|(mut candidate, product)| {
            if is_local_vendor(&profile.region, &product.vendor_region) {
                candidate.scale(LOCALITY_BOOST);
                if !candidate.reasons.contains(&Reason::LocalVendor) {
                    candidate.reasons.push(Reason::LocalVendor);
                }
            }
            if needs_language_penalty(profile, &product) {
                candidate.scale(LANGUAGE_PENALTY);
            }
            candidate.product = Some(product.display());
            candidate
        })
        .collect();

    kept.sort_by(|a, b| b.total_score().total_cmp(&a.total_score()));
    kept.truncate(limit);
    kept
}

/// Full post-filter: exclusions, catalog enrichment, then [`apply_rules`].
///
/// All catalog lookups share one deadline, `lookup_timeout` after the call.
/// Candidates whose product is missing from the catalog, or whose lookup fails
/// or misses the deadline, are dropped without failing the request.
pub async fn post_filter(
    catalog: &dyn CatalogStore,
    profile: &UserProfile,
    fused: Vec<ScoredCandidate>,
    exclude: &HashSet<String>,
    limit: usize,
    lookup_timeout: Duration,
) -> Vec<ScoredCandidate> {
    let deadline = Instant::now() + lookup_timeout;
    let enriched: Vec<(ScoredCandidate, ProductFeatures)> = stream::iter(
        fused
            .into_iter()
            .filter(|candidate| !exclude.contains(&candidate.product_id)),
    )
    .map(|candidate| async move {
        let lookup =
            tokio::time::timeout_at(deadline, catalog.get_active_product(&candidate.product_id))
                .await;

        match lookup {
            Ok(Ok(Some(product))) => Some((candidate, product)),
            Ok(Ok(None)) => {
                tracing::debug!(product_id = %candidate.product_id, "Dropping stale candidate");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    product_id = %candidate.product_id,
                    error = %e,
                    "Catalog lookup failed, dropping candidate"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    product_id = %candidate.product_id,
                    "Enrichment deadline passed, dropping candidate"
                );
                None
            }
        }
    })
    .buffered(LOOKUP_CONCURRENCY)
    .filter_map(|pair| async move { pair })
    .collect()
    .await;

    apply_rules(profile, enriched, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{IncomeTier, Language, Signal};
    use crate::store::memory::InMemoryCatalog;
    use crate::store::MockCatalogStore;

    fn product(id: &str, price: f64, vendor_region: &str) -> ProductFeatures {
        ProductFeatures {
            product_id: id.to_string(),
            name: format!("{id} nomi"),
            name_ru: None,
            description: String::new(),
            description_ru: None,
            category: "general".to_string(),
            subcategory: None,
            price,
            brand: None,
            tags: Vec::new(),
            vendor_id: "v1".to_string(),
            vendor_region: vendor_region.to_string(),
            vendor_rating: 4.0,
            is_local_product: false,
            cultural_relevance: 0.0,
        }
    }

    fn scored(id: &str, score: f64) -> ScoredCandidate {
        let mut candidate = ScoredCandidate::new(id);
        candidate.add_contribution(Signal::Content, score);
        candidate
    }

    #[test]
    fn test_budget_cap_scenario() {
        let profile = UserProfile::new("u1", "TSH").with_income(IncomeTier::Medium);
        assert!((budget_cap(&profile) - 2_400_000.0).abs() < 1e-6);

        let kept = apply_rules(
            &profile,
            vec![
                (scored("cheap", 1.0), product("cheap", 2_000_000.0, "QOR")),
                (scored("dear", 2.0), product("dear", 3_000_000.0, "QOR")),
            ],
            10,
        );
        let ids: Vec<&str> = kept.iter().map(|c| c.product_id.as_str()).collect();
        assert_eq!(ids, vec!["cheap"]);
    }

    #[test]
    fn test_missing_income_uses_medium_and_unknown_region_default() {
        let profile = UserProfile::new("u1", "ZZZ");
        assert!((budget_cap(&profile) - 1_800_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_neighbouring_vendor_is_local() {
        assert!(is_local_vendor("TSH", "TSH"));
        assert!(is_local_vendor("TSH", "SIR"));
        assert!(!is_local_vendor("TSH", "QOR"));
        assert!(is_local_vendor("ZZZ", "zzz"));
        assert!(!is_local_vendor("", ""));
    }

    #[test]
    fn test_boost_can_reorder() {
        let profile = UserProfile::new("u1", "SAM");
        let kept = apply_rules(
            &profile,
            vec![
                (scored("far", 1.0), product("far", 100.0, "QOR")),
                (scored("near", 0.9), product("near", 100.0, "SAM")),
            ],
            10,
        );

        assert_eq!(kept[0].product_id, "near");
        assert!((kept[0].total_score() - 1.08).abs() < 1e-9);
        assert!(kept[0].reasons.contains(&Reason::LocalVendor));
        assert_eq!(kept[0].product.as_ref().map(|p| p.price), Some(100.0));
    }

    #[test]
    fn test_language_penalty_only_for_secondary_only_names() {
        let profile = UserProfile::new("u1", "QOR").with_language(Language::Uz);
        let mut russian_only = product("ru", 100.0, "TSH");
        russian_only.name = String::new();
        russian_only.name_ru = Some("Чай".to_string());

        let kept = apply_rules(
            &profile,
            vec![(scored("ru", 1.0), russian_only.clone())],
            10,
        );
        assert!((kept[0].total_score() - 0.8).abs() < 1e-9);

        let russian_reader = profile.with_language(Language::Ru);
        let kept = apply_rules(&russian_reader, vec![(scored("ru", 1.0), russian_only)], 10);
        assert!((kept[0].total_score() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_scaling_keeps_sum_consistent() {
        let profile = UserProfile::new("u1", "SAM");
        let mut candidate = scored("p1", 0.5);
        candidate.add_contribution(Signal::Cultural, 0.25);

        let kept = apply_rules(&profile, vec![(candidate, product("p1", 10.0, "SAM"))], 10);
        let sum: f64 = kept[0].scores().values().sum();
        assert!((kept[0].total_score() - sum).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_post_filter_drops_stale_and_excluded() {
        let catalog = InMemoryCatalog::new(vec![
            product("a", 10.0, "QOR"),
            product("b", 10.0, "QOR"),
            product("c", 10.0, "QOR"),
        ]);
        let profile = UserProfile::new("u1", "TSH");
        let fused = vec![
            scored("a", 0.9),
            scored("gone", 0.8),
            scored("b", 0.7),
            scored("c", 0.6),
        ];
        let exclude = HashSet::from(["b".to_string()]);

        let kept = post_filter(&catalog, &profile, fused, &exclude, 10, Duration::from_secs(1)).await;
        let ids: Vec<&str> = kept.iter().map(|c| c.product_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_post_filter_truncates_after_rules() {
        let catalog = InMemoryCatalog::new(vec![
            product("a", 10.0, "QOR"),
            product("b", 10.0, "TSH"),
        ]);
        let profile = UserProfile::new("u1", "TSH");

        let kept = post_filter(
            &catalog,
            &profile,
            vec![scored("a", 1.0), scored("b", 0.9)],
            &HashSet::new(),
            1,
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].product_id, "b");
    }

    #[tokio::test]
    async fn test_failed_lookup_drops_only_that_candidate() {
        let mut catalog = MockCatalogStore::new();
        catalog
            .expect_get_active_product()
            .returning(|id| match id {
                "broken" => Err(AppError::Internal("connection reset".into())),
                other => Ok(Some(product(other, 10.0, "QOR"))),
            });

        let kept = post_filter(
            &catalog,
            &UserProfile::new("u1", "TSH"),
            vec![scored("broken", 1.0), scored("ok", 0.5)],
            &HashSet::new(),
            10,
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].product_id, "ok");
    }

    struct SlowCatalog {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl CatalogStore for SlowCatalog {
        async fn get_active_product(
            &self,
            product_id: &str,
        ) -> crate::error::AppResult<Option<ProductFeatures>> {
            tokio::time::sleep(self.delay).await;
            Ok(Some(product(product_id, 10.0, "QOR")))
        }

        async fn query_by_category(
            &self,
            _categories: &[String],
            _multiplier: f64,
            _limit: usize,
        ) -> crate::error::AppResult<Vec<ProductFeatures>> {
            Ok(Vec::new())
        }

        async fn query_popular(
            &self,
            _window_days: u32,
            _limit: usize,
        ) -> crate::error::AppResult<Vec<crate::models::PopularProduct>> {
            Ok(Vec::new())
        }

        async fn list_active_products(&self) -> crate::error::AppResult<Vec<ProductFeatures>> {
            Ok(Vec::new())
        }

        async fn query_trending(
            &self,
            _region: Region,
            _window_days: u32,
            _min_orders: u32,
            _limit: usize,
        ) -> crate::error::AppResult<Vec<crate::models::TrendingProduct>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_slow_catalog_is_bounded_by_one_deadline() {
        let catalog = SlowCatalog {
            delay: Duration::from_millis(100),
        };
        let fused: Vec<ScoredCandidate> = (0..64)
            .map(|i| scored(&format!("p{i}"), 1.0 - f64::from(i) / 100.0))
            .collect();

        let started = std::time::Instant::now();
        let kept = post_filter(
            &catalog,
            &UserProfile::new("u1", "TSH"),
            fused,
            &HashSet::new(),
            64,
            Duration::from_millis(150),
        )
        .await;

        assert!(started.elapsed() < Duration::from_millis(350));
        assert!(!kept.is_empty());
        assert!(kept.len() < 64);
    }
}
