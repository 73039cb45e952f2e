use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    View,
    Click,
    AddToCart,
    Purchase,
    Review,
    #[serde(other)]
    Other,
}

impl InteractionType {
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "view" => InteractionType::View,
            "click" => InteractionType::Click,
            "add_to_cart" | "cart" => InteractionType::AddToCart,
            "purchase" | "order" => InteractionType::Purchase,
            "review" => InteractionType::Review,
            _ => InteractionType::Other,
        }
    }
}

/// One historical user/product event, used only by offline training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: String,
    pub product_id: String,
    pub interaction_type: InteractionType,
    pub rating: f64,
    pub timestamp: DateTime<Utc>,
    /// Region the interaction happened in, not the product's region
    pub region: String,
    pub language: String,
}
