use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Display};

use super::ProductDisplay;

/// Name of a scoring signal. Also the key of per-signal score entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Collaborative,
    /// Stands in for `Collaborative` on the fallback path
    Popularity,
    Content,
    Cultural,
}

impl Signal {
    /// Signals backed by a trained artifact
    pub const TRAINED: [Signal; 3] = [Signal::Collaborative, Signal::Content, Signal::Cultural];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Collaborative => "collaborative",
            Signal::Popularity => "popularity",
            Signal::Content => "content",
            Signal::Cultural => "cultural",
        }
    }
}

impl Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explanation tag attached to a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    CollaborativeFiltering,
    PopularInMarket,
    ContentSimilarity,
    CulturalRelevance,
    LocalVendor,
}

/// Raw, unweighted output of one signal for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalCandidate {
    pub product_id: String,
    pub score: f64,
    pub reason: Reason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cultural_factor: Option<String>,
}

impl SignalCandidate {
    pub fn new(product_id: impl Into<String>, score: f64, reason: Reason) -> Self {
        Self {
            product_id: product_id.into(),
            score,
            reason,
            cultural_factor: None,
        }
    }

    pub fn with_cultural_factor(mut self, factor: impl Into<String>) -> Self {
        self.cultural_factor = Some(factor.into());
        self
    }
}

/// A fused recommendation.
///
/// `total_score` is always the sum of the entries in `scores`. Signals that did
/// not produce this product have no entry at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub product_id: String,
    scores: BTreeMap<Signal, f64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub reasons: Vec<Reason>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cultural_factor: Option<String>,
    total_score: f64,
    #[serde(flatten, default)]
    pub product: Option<ProductDisplay>,
}

impl ScoredCandidate {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            scores: BTreeMap::new(),
            reasons: Vec::new(),
            cultural_factor: None,
            total_score: 0.0,
            product: None,
        }
    }

    /// Records a weighted contribution. The first contribution per signal wins.
    pub fn add_contribution(&mut self, signal: Signal, weighted_score: f64) -> bool {
        if self.scores.contains_key(&signal) {
            return false;
        }
        self.scores.insert(signal, weighted_score);
        self.recompute_total();
        true
    }

    /// Multiplies every entry by `factor`, keeping the total equal to the sum
    pub fn scale(&mut self, factor: f64) {
        for score in self.scores.values_mut() {
            *score *= factor;
        }
        self.recompute_total();
    }

    pub fn total_score(&self) -> f64 {
        self.total_score
    }

    pub fn scores(&self) -> &BTreeMap<Signal, f64> {
        &self.scores
    }

    pub fn score_for(&self, signal: Signal) -> Option<f64> {
        self.scores.get(&signal).copied()
    }

    /// Drops reason tags and the cultural explanation
    pub fn without_explanations(mut self) -> Self {
        self.reasons.clear();
        self.cultural_factor = None;
        self
    }

    fn recompute_total(&mut self) {
        self.total_score = self.scores.values().sum();
    }
}

/// What happened to a signal during one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignalStatus {
    /// The signal ran; `candidates` may be zero
    Ran { candidates: usize },
    /// The user has no collaborative factors; popularity ran in its place
    ColdStart,
    /// No artifact loaded for the signal
    Unavailable,
    TimedOut,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub signal: Signal,
    #[serde(flatten)]
    pub status: SignalStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_tracks_entries() {
        let mut candidate = ScoredCandidate::new("p1");
        candidate.add_contribution(Signal::Content, 0.25);
        candidate.add_contribution(Signal::Cultural, 0.5);
        assert_eq!(candidate.total_score(), 0.75);

        candidate.scale(2.0);
        assert_eq!(candidate.score_for(Signal::Content), Some(0.5));
        assert_eq!(candidate.total_score(), 1.5);
    }

    #[test]
    fn test_first_contribution_per_signal_wins() {
        let mut candidate = ScoredCandidate::new("p1");
        assert!(candidate.add_contribution(Signal::Content, 0.25));
        assert!(!candidate.add_contribution(Signal::Content, 9.0));
        assert_eq!(candidate.total_score(), 0.25);
    }

    #[test]
    fn test_absent_signal_has_no_entry() {
        let mut candidate = ScoredCandidate::new("p1");
        candidate.add_contribution(Signal::Cultural, 0.1);
        assert_eq!(candidate.score_for(Signal::Collaborative), None);
        assert_eq!(candidate.scores().len(), 1);
    }

    #[test]
    fn test_serialized_scores_use_signal_names() {
        let mut candidate = ScoredCandidate::new("p1");
        candidate.add_contribution(Signal::Popularity, 3.0);
        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(json["scores"]["popularity"], 3.0);
        assert_eq!(json["total_score"], 3.0);
        assert!(json.get("reasons").is_none());
    }

    #[test]
    fn test_signal_report_serialization() {
        let report = SignalReport {
            signal: Signal::Content,
            status: SignalStatus::Ran { candidates: 4 },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["signal"], "content");
        assert_eq!(json["status"], "ran");
        assert_eq!(json["candidates"], 4);
    }
}
