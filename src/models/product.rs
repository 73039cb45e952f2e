use serde::{Deserialize, Serialize};

/// Catalog entry as seen by the ranking core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFeatures {
    pub product_id: String,
    /// Local-language (Uzbek) name, empty when the vendor never supplied one
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_ru: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub description_ru: Option<String>,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub vendor_id: String,
    pub vendor_region: String,
    /// 0 to 5
    pub vendor_rating: f64,
    #[serde(default)]
    pub is_local_product: bool,
    /// 0.0 to 1.0, 0.0 meaning no cultural boost
    #[serde(default)]
    pub cultural_relevance: f64,
}

impl ProductFeatures {
    pub fn has_local_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    pub fn has_secondary_name(&self) -> bool {
        self.name_ru
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }

    /// Score the catalog orders cultural candidates by
    pub fn cultural_score(&self, multiplier: f64) -> f64 {
        self.vendor_rating * self.cultural_relevance * multiplier
    }

    pub fn display(&self) -> ProductDisplay {
        ProductDisplay {
            product_name: self.name.clone(),
            product_name_ru: self.name_ru.clone(),
            price: self.price,
            vendor_region: self.vendor_region.clone(),
            vendor_rating: self.vendor_rating,
            category: self.category.clone(),
        }
    }
}

/// Display fields attached to a surviving recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDisplay {
    pub product_name: String,
    pub product_name_ru: Option<String>,
    pub price: f64,
    pub vendor_region: String,
    pub vendor_rating: f64,
    pub category: String,
}

/// Order volume for a product over a trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularProduct {
    pub product_id: String,
    pub order_count: i64,
    pub avg_rating: Option<f64>,
}

/// Regional sales momentum for a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingProduct {
    pub product_id: String,
    pub name: String,
    pub price: f64,
    pub category: String,
    pub recent_orders: i64,
    pub total_items_sold: i64,
    pub avg_rating: Option<f64>,
}

impl TrendingProduct {
    pub fn trend_score(&self) -> i64 {
        self.recent_orders * 2 + self.total_items_sold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, name_ru: Option<&str>) -> ProductFeatures {
        ProductFeatures {
            product_id: "p1".to_string(),
            name: name.to_string(),
            name_ru: name_ru.map(str::to_string),
            description: String::new(),
            description_ru: None,
            category: "food".to_string(),
            subcategory: None,
            price: 10_000.0,
            brand: None,
            tags: vec![],
            vendor_id: "v1".to_string(),
            vendor_region: "TSH".to_string(),
            vendor_rating: 4.0,
            is_local_product: true,
            cultural_relevance: 0.5,
        }
    }

    #[test]
    fn test_name_presence() {
        let ru_only = product("  ", Some("Чай"));
        assert!(!ru_only.has_local_name());
        assert!(ru_only.has_secondary_name());

        let blank_ru = product("Choy", Some(""));
        assert!(blank_ru.has_local_name());
        assert!(!blank_ru.has_secondary_name());
    }

    #[test]
    fn test_cultural_score() {
        assert_eq!(product("Choy", None).cultural_score(2.0), 4.0);
    }

    #[test]
    fn test_trend_score() {
        let trending = TrendingProduct {
            product_id: "p1".to_string(),
            name: "Choy".to_string(),
            price: 1.0,
            category: "food".to_string(),
            recent_orders: 5,
            total_items_sold: 12,
            avg_rating: None,
        };
        assert_eq!(trending.trend_score(), 22);
    }
}
