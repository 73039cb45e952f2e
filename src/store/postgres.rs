use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use sqlx::{FromRow, PgPool};

use super::{CatalogStore, InteractionStore, ProfileStore};
use crate::error::AppResult;
use crate::models::{
    IncomeTier, InteractionRecord, InteractionType, Language, PopularProduct, ProductFeatures,
    Region, TrendingProduct, UserProfile,
};

/// Active product joined with its vendor. Vendors in these regions count as local.
const PRODUCT_SELECT: &str = r#"
    SELECT
        p.id::text AS product_id,
        COALESCE(p.name, '') AS name,
        p.name_ru,
        COALESCE(p.description, '') AS description,
        p.description_ru,
        p.category,
        p.subcategory,
        p.price::float8 AS price,
        p.brand,
        COALESCE(p.tags, '{}') AS tags,
        v.id::text AS vendor_id,
        COALESCE(v.region, '') AS vendor_region,
        COALESCE(v.rating, 0)::float8 AS vendor_rating,
        COALESCE(v.region IN ('TSH', 'SAM', 'BUX', 'AND', 'FAR', 'NAM'), false) AS is_local_product,
        COALESCE(p.cultural_relevance, 0)::float8 AS cultural_relevance
    FROM products p
    JOIN vendors v ON p.vendor_id = v.id
    WHERE p.status = 'active'
"#;

#[derive(Debug, FromRow)]
struct ProductRow {
    product_id: String,
    name: String,
    name_ru: Option<String>,
    description: String,
    description_ru: Option<String>,
    category: String,
    subcategory: Option<String>,
    price: f64,
    brand: Option<String>,
    tags: Vec<String>,
    vendor_id: String,
    vendor_region: String,
    vendor_rating: f64,
    is_local_product: bool,
    cultural_relevance: f64,
}

impl From<ProductRow> for ProductFeatures {
    fn from(row: ProductRow) -> Self {
        Self {
            product_id: row.product_id,
            name: row.name,
            name_ru: row.name_ru,
            description: row.description,
            description_ru: row.description_ru,
            category: row.category,
            subcategory: row.subcategory,
            price: row.price,
            brand: row.brand,
            tags: row.tags,
            vendor_id: row.vendor_id,
            vendor_region: row.vendor_region,
            vendor_rating: row.vendor_rating,
            is_local_product: row.is_local_product,
            cultural_relevance: row.cultural_relevance,
        }
    }
}

#[derive(Debug, FromRow)]
struct PopularRow {
    product_id: String,
    order_count: i64,
    avg_rating: Option<f64>,
}

#[derive(Debug, FromRow)]
struct TrendingRow {
    product_id: String,
    name: String,
    price: f64,
    category: String,
    recent_orders: i64,
    total_items_sold: i64,
    avg_rating: Option<f64>,
}

/// Catalog backed by the marketplace database
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn get_active_product(&self, product_id: &str) -> AppResult<Option<ProductFeatures>> {
        let sql = format!("{PRODUCT_SELECT} AND p.id::text = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ProductFeatures::from))
    }

    async fn query_by_category(
        &self,
        categories: &[String],
        multiplier: f64,
        limit: usize,
    ) -> AppResult<Vec<ProductFeatures>> {
        let sql = format!(
            "{PRODUCT_SELECT} AND p.category = ANY($1)
            ORDER BY COALESCE(v.rating, 0) * COALESCE(p.cultural_relevance, 0) * $2 DESC
            LIMIT $3"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(categories)
            .bind(multiplier)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ProductFeatures::from).collect())
    }

    async fn query_popular(
        &self,
        window_days: u32,
        limit: usize,
    ) -> AppResult<Vec<PopularProduct>> {
        let rows = sqlx::query_as::<_, PopularRow>(
            r#"
            WITH recent AS (
                SELECT oi.product_id, COUNT(DISTINCT o.id) AS order_count
                FROM order_items oi
                JOIN orders o ON oi.order_id = o.id
                WHERE o.created_at > NOW() - make_interval(days => $1)
                GROUP BY oi.product_id
            ),
            ratings AS (
                SELECT product_id, AVG(rating)::float8 AS avg_rating
                FROM product_reviews
                GROUP BY product_id
            )
            SELECT p.id::text AS product_id, recent.order_count, ratings.avg_rating
            FROM products p
            JOIN recent ON recent.product_id = p.id
            LEFT JOIN ratings ON ratings.product_id = p.id
            WHERE p.status = 'active'
            ORDER BY recent.order_count DESC, COALESCE(ratings.avg_rating, 3.0) DESC
            LIMIT $2
            "#,
        )
        .bind(window_days as i32)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PopularProduct {
                product_id: row.product_id,
                order_count: row.order_count,
                avg_rating: row.avg_rating,
            })
            .collect())
    }

    async fn list_active_products(&self) -> AppResult<Vec<ProductFeatures>> {
        let sql = format!("{PRODUCT_SELECT} ORDER BY p.id");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ProductFeatures::from).collect())
    }

    async fn query_trending(
        &self,
        region: Region,
        window_days: u32,
        min_orders: u32,
        limit: usize,
    ) -> AppResult<Vec<TrendingProduct>> {
        let rows = sqlx::query_as::<_, TrendingRow>(
            r#"
            SELECT
                p.id::text AS product_id,
                COALESCE(p.name, '') AS name,
                p.price::float8 AS price,
                p.category,
                COUNT(DISTINCT o.id) AS recent_orders,
                COUNT(DISTINCT oi.id) AS total_items_sold,
                AVG(pr.rating)::float8 AS avg_rating
            FROM products p
            JOIN order_items oi ON p.id = oi.product_id
            JOIN orders o ON oi.order_id = o.id
            LEFT JOIN product_reviews pr ON p.id = pr.product_id
            WHERE o.shipping_region = $1
              AND o.created_at > NOW() - make_interval(days => $2)
              AND p.status = 'active'
            GROUP BY p.id, p.name, p.price, p.category
            HAVING COUNT(DISTINCT o.id) >= $3
            ORDER BY recent_orders DESC, total_items_sold DESC, avg_rating DESC NULLS LAST
            LIMIT $4
            "#,
        )
        .bind(region.code())
        .bind(window_days as i32)
        .bind(i64::from(min_orders))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TrendingProduct {
                product_id: row.product_id,
                name: row.name,
                price: row.price,
                category: row.category,
                recent_orders: row.recent_orders,
                total_items_sold: row.total_items_sold,
                avg_rating: row.avg_rating,
            })
            .collect())
    }
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    user_id: String,
    region: Option<String>,
    language: Option<String>,
    age_group: Option<String>,
    gender: Option<String>,
    income_level: Option<String>,
    interests: Vec<String>,
    purchase_history: Vec<String>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            user_id: row.user_id,
            region: row.region.unwrap_or_default(),
            language: Language::parse_lenient(row.language.as_deref()),
            age_group: row.age_group,
            gender: row.gender,
            income_level: IncomeTier::parse_lenient(row.income_level.as_deref()),
            interests: row.interests,
            purchase_history: row.purchase_history,
        }
    }
}

#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn get_profile(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT
                u.id::text AS user_id,
                u.region,
                u.language_preference AS language,
                u.age_group,
                u.gender,
                u.income_level,
                ARRAY(
                    SELECT DISTINCT ui.category
                    FROM user_interests ui
                    WHERE ui.user_id = u.id
                ) AS interests,
                ARRAY(
                    SELECT p.category
                    FROM orders o
                    JOIN order_items oi ON o.id = oi.order_id
                    JOIN products p ON oi.product_id = p.id
                    WHERE o.user_id = u.id
                      AND o.created_at > NOW() - INTERVAL '6 months'
                    GROUP BY p.category
                    ORDER BY MAX(o.created_at) DESC
                ) AS purchase_history
            FROM users u
            WHERE u.id::text = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserProfile::from))
    }
}

#[derive(Debug, FromRow)]
struct InteractionRow {
    user_id: String,
    product_id: String,
    interaction_type: String,
    rating: Option<f64>,
    timestamp: DateTime<Utc>,
    region: Option<String>,
    language: Option<String>,
}

impl From<InteractionRow> for InteractionRecord {
    fn from(row: InteractionRow) -> Self {
        Self {
            user_id: row.user_id,
            product_id: row.product_id,
            interaction_type: InteractionType::parse_lenient(&row.interaction_type),
            rating: row.rating.unwrap_or(0.0),
            timestamp: row.timestamp,
            region: row.region.unwrap_or_default(),
            language: row.language.unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct PgInteractionStore {
    pool: PgPool,
}

impl PgInteractionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl InteractionStore for PgInteractionStore {
    fn get_interactions(&self, since: DateTime<Utc>) -> BoxStream<'_, AppResult<InteractionRecord>> {
        sqlx::query_as::<_, InteractionRow>(
            r#"
            SELECT
                user_id::text AS user_id,
                product_id::text AS product_id,
                interaction_type,
                rating::float8 AS rating,
                timestamp::timestamptz AS timestamp,
                region,
                language_preference AS language
            FROM user_interactions
            WHERE timestamp > $1
            ORDER BY timestamp DESC
            "#,
        )
        .bind(since)
        .fetch(&self.pool)
        .map(|row| row.map(InteractionRecord::from).map_err(Into::into))
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_row_defaults() {
        let row = ProfileRow {
            user_id: "42".to_string(),
            region: None,
            language: Some("RU".to_string()),
            age_group: None,
            gender: None,
            income_level: Some("unknown".to_string()),
            interests: vec!["tea".to_string()],
            purchase_history: Vec::new(),
        };

        let profile = UserProfile::from(row);
        assert_eq!(profile.region, "");
        assert_eq!(profile.language, Language::Ru);
        assert_eq!(profile.income_level, Some(IncomeTier::Medium));
        assert!(profile.region_code().is_none());
    }

    #[test]
    fn test_interaction_row_without_rating() {
        let row = InteractionRow {
            user_id: "1".to_string(),
            product_id: "9".to_string(),
            interaction_type: "view".to_string(),
            rating: None,
            timestamp: Utc::now(),
            region: Some("SAM".to_string()),
            language: None,
        };

        let record = InteractionRecord::from(row);
        assert_eq!(record.interaction_type, InteractionType::View);
        assert_eq!(record.rating, 0.0);
        assert_eq!(record.region, "SAM");
    }
}
