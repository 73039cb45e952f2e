use serde::Serialize;

use crate::error::AppResult;
use crate::models::{Region, TrendingProduct};
use crate::store::CatalogStore;

pub const TRENDING_WINDOW_DAYS: u32 = 7;
pub const TRENDING_MIN_ORDERS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingItem {
    #[serde(flatten)]
    pub product: TrendingProduct,
    pub trend_score: i64,
}

/// Products with regional momentum over the last week
pub async fn trending_in(
    catalog: &dyn CatalogStore,
    region: Region,
    limit: usize,
) -> AppResult<Vec<TrendingItem>> {
    let products = catalog
        .query_trending(region, TRENDING_WINDOW_DAYS, TRENDING_MIN_ORDERS, limit)
        .await?;

    tracing::debug!(region = %region, count = products.len(), "Trending products fetched");

    Ok(products
        .into_iter()
        .map(|product| TrendingItem {
            trend_score: product.trend_score(),
            product,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryCatalog;

    fn trending(id: &str, orders: i64, items: i64) -> TrendingProduct {
        TrendingProduct {
            product_id: id.to_string(),
            name: id.to_string(),
            price: 1000.0,
            category: "fruits".to_string(),
            recent_orders: orders,
            total_items_sold: items,
            avg_rating: None,
        }
    }

    #[tokio::test]
    async fn test_trending_requires_minimum_orders() {
        let catalog = InMemoryCatalog::new(Vec::new()).with_trending(
            Region::Far,
            vec![trending("quiet", 2, 40), trending("melon", 5, 9)],
        );

        let items = trending_in(&catalog, Region::Far, 20).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product.product_id, "melon");
        assert_eq!(items[0].trend_score, 19);

        let elsewhere = trending_in(&catalog, Region::Tsh, 20).await.unwrap();
        assert!(elsewhere.is_empty());
    }
}
