//! Domain records shared by the stores, the ranking core and the API.

mod candidate;
mod interaction;
mod product;
mod profile;
mod region;

pub use candidate::{Reason, ScoredCandidate, Signal, SignalCandidate, SignalReport, SignalStatus};
pub use interaction::{InteractionRecord, InteractionType};
pub use product::{PopularProduct, ProductDisplay, ProductFeatures, TrendingProduct};
pub use profile::UserProfile;
pub use region::{
    cost_of_living_multiplier, interaction_weight, IncomeTier, Language, Region,
    DEFAULT_COST_MULTIPLIER, DEFAULT_INTERACTION_WEIGHT,
};

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Where in the storefront a recommendation request originates
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestContext {
    #[default]
    General,
    HolidayShopping,
    Other(String),
}

impl RequestContext {
    pub fn as_str(&self) -> &str {
        match self {
            RequestContext::General => "general",
            RequestContext::HolidayShopping => "holiday_shopping",
            RequestContext::Other(raw) => raw,
        }
    }

    pub fn is_holiday_shopping(&self) -> bool {
        matches!(self, RequestContext::HolidayShopping)
    }
}

impl From<String> for RequestContext {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "general" => RequestContext::General,
            "holiday_shopping" => RequestContext::HolidayShopping,
            _ => RequestContext::Other(raw),
        }
    }
}

impl From<&str> for RequestContext {
    fn from(raw: &str) -> Self {
        RequestContext::from(raw.to_string())
    }
}

impl From<RequestContext> for String {
    fn from(context: RequestContext) -> Self {
        context.as_str().to_string()
    }
}

impl Display for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_context_round_trips_unknown_values() {
        let context: RequestContext = serde_json::from_str("\"cart\"").unwrap();
        assert_eq!(context, RequestContext::Other("cart".to_string()));
        assert_eq!(serde_json::to_string(&context).unwrap(), "\"cart\"");
    }

    #[test]
    fn test_holiday_context() {
        let context = RequestContext::from("holiday_shopping");
        assert!(context.is_holiday_shopping());
        assert_eq!(context.to_string(), "holiday_shopping");
        assert!(!RequestContext::default().is_holiday_shopping());
    }
}
