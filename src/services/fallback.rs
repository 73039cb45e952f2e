//! Popularity ranking that stands in for the collaborative signal when the
//! user is unseen or no collaborative artifact is loaded.

use crate::error::AppResult;
use crate::models::{PopularProduct, Reason, SignalCandidate};
use crate::store::CatalogStore;

pub const POPULARITY_WINDOW_DAYS: u32 = 30;

/// Rating assumed for products without reviews
pub const NEUTRAL_RATING: f64 = 3.0;

fn popularity_score(product: &PopularProduct) -> f64 {
    product.order_count as f64 * product.avg_rating.unwrap_or(NEUTRAL_RATING)
}

/// Products ordered by 30-day order count, then average rating, descending
pub async fn popular_candidates(
    catalog: &dyn CatalogStore,
    limit: usize,
) -> AppResult<Vec<SignalCandidate>> {
    let mut popular = catalog.query_popular(POPULARITY_WINDOW_DAYS, limit).await?;
    popular.sort_by(|a, b| {
        b.order_count.cmp(&a.order_count).then_with(|| {
            b.avg_rating
                .unwrap_or(NEUTRAL_RATING)
                .total_cmp(&a.avg_rating.unwrap_or(NEUTRAL_RATING))
        })
    });
    popular.truncate(limit);

    Ok(popular
        .iter()
        .map(|p| SignalCandidate::new(p.product_id.clone(), popularity_score(p), Reason::PopularInMarket))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockCatalogStore;

    fn popular(id: &str, orders: i64, rating: Option<f64>) -> PopularProduct {
        PopularProduct {
            product_id: id.to_string(),
            order_count: orders,
            avg_rating: rating,
        }
    }

    #[tokio::test]
    async fn test_ties_broken_by_rating_with_neutral_default() {
        let mut catalog = MockCatalogStore::new();
        catalog
            .expect_query_popular()
            .withf(|window, limit| *window == 30 && *limit == 4)
            .returning(|_, _| {
                Ok(vec![
                    popular("unrated", 10, None),
                    popular("loved", 10, Some(4.8)),
                    popular("panned", 10, Some(1.5)),
                    popular("bestseller", 40, Some(4.0)),
                ])
            });

        let candidates = popular_candidates(&catalog, 4).await.unwrap();
        let ids: Vec<&str> = candidates.iter().map(|c| c.product_id.as_str()).collect();
        assert_eq!(ids, vec!["bestseller", "loved", "unrated", "panned"]);
        assert_eq!(candidates[2].score, 30.0);
        assert!(candidates
            .iter()
            .all(|c| c.reason == Reason::PopularInMarket));
    }
}
