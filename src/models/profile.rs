use serde::{Deserialize, Serialize};

use super::{IncomeTier, Language, Region};

/// Snapshot of a shopper, fetched fresh or from cache for every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    /// Raw region code. May fall outside the enumerated set.
    pub region: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub age_group: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub income_level: Option<IncomeTier>,
    #[serde(default)]
    pub interests: Vec<String>,
    /// Purchase categories, most recent first
    #[serde(default)]
    pub purchase_history: Vec<String>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            region: region.into(),
            language: Language::default(),
            age_group: None,
            gender: None,
            income_level: None,
            interests: Vec::new(),
            purchase_history: Vec::new(),
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_income(mut self, income: IncomeTier) -> Self {
        self.income_level = Some(income);
        self
    }

    pub fn with_interests<I, S>(mut self, interests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interests = interests.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_purchase_history<I, S>(mut self, history: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.purchase_history = history.into_iter().map(Into::into).collect();
        self
    }

    /// The enumerated region, or `None` when the stored code is unrecognized
    pub fn region_code(&self) -> Option<Region> {
        Region::lookup(&self.region)
    }

    pub fn income_tier(&self) -> IncomeTier {
        self.income_level.unwrap_or_default()
    }

    /// Purchase history followed by interests, used as the content-signal query
    pub fn interest_terms(&self) -> impl Iterator<Item = &str> {
        self.purchase_history
            .iter()
            .chain(self.interests.iter())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_defaults_to_local_language_and_medium_income() {
        let profile = UserProfile::new("u1", "SAM");
        assert_eq!(profile.language, Language::Uz);
        assert_eq!(profile.income_tier(), IncomeTier::Medium);
        assert_eq!(profile.region_code(), Some(Region::Sam));
    }

    #[test]
    fn test_unknown_region_has_no_code() {
        let profile = UserProfile::new("u1", "ZZZ");
        assert_eq!(profile.region_code(), None);
    }

    #[test]
    fn test_interest_terms_put_purchases_first() {
        let profile = UserProfile::new("u1", "TSH")
            .with_interests(["music"])
            .with_purchase_history(["phones", "laptops"]);
        let terms: Vec<&str> = profile.interest_terms().collect();
        assert_eq!(terms, vec!["phones", "laptops", "music"]);
    }

    #[test]
    fn test_profile_deserializes_with_missing_optional_fields() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"user_id":"u9","region":"FAR","income_level":"high"}"#)
                .unwrap();
        assert_eq!(profile.income_tier(), IncomeTier::High);
        assert!(profile.interests.is_empty());
    }
}
