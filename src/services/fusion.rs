//! Weighted fusion of per-signal candidate lists into one ranking.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Region, RequestContext, ScoredCandidate, Signal, SignalCandidate};

/// Per-signal weights for one request.
///
/// Adjustments are additive and never renormalized, so the weights need not
/// sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    pub collaborative: f64,
    pub content: f64,
    pub cultural: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self::BASELINE
    }
}

impl SignalWeights {
    pub const BASELINE: SignalWeights = SignalWeights {
        collaborative: 0.4,
        content: 0.3,
        cultural: 0.3,
    };

    const REGION_SHIFT: f64 = 0.1;
    const HOLIDAY_SHIFT: f64 = 0.1;

    pub fn for_request(region: &str, context: &RequestContext) -> Self {
        let mut weights = Self::BASELINE;

        // Unrecognized regions are treated as non-urban
        if Region::lookup(region).is_some_and(|r| r.is_urban()) {
            weights.content += Self::REGION_SHIFT;
            weights.cultural -= Self::REGION_SHIFT;
        } else {
            weights.cultural += Self::REGION_SHIFT;
            weights.content -= Self::REGION_SHIFT;
        }

        if context.is_holiday_shopping() {
            weights.collaborative -= Self::HOLIDAY_SHIFT;
            weights.content -= Self::HOLIDAY_SHIFT;
            weights.cultural += 2.0 * Self::HOLIDAY_SHIFT;
        }

        weights
    }

    /// Popularity fills the collaborative slot and shares its weight
    pub fn weight(&self, signal: Signal) -> f64 {
        match signal {
            Signal::Collaborative | Signal::Popularity => self.collaborative,
            Signal::Content => self.content,
            Signal::Cultural => self.cultural,
        }
    }

    pub fn total(&self) -> f64 {
        self.collaborative + self.content + self.cultural
    }
}

/// Merges signal outputs in the order given.
///
/// Each raw score is multiplied by its signal's weight. A product seen by
/// several signals gets one entry per signal; a signal that did not produce a
/// product contributes no entry. The result is sorted by combined score,
/// descending, with exact ties kept in first-seen order.
pub fn fuse(
    weights: &SignalWeights,
    signals: Vec<(Signal, Vec<SignalCandidate>)>,
) -> Vec<ScoredCandidate> {
    let mut fused: Vec<ScoredCandidate> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (signal, candidates) in signals {
        let weight = weights.weight(signal);
        for candidate in candidates {
            let position = *positions
                .entry(candidate.product_id.clone())
                .or_insert_with(|| {
                    fused.push(ScoredCandidate::new(candidate.product_id.clone()));
                    fused.len() - 1
                });
            let entry = &mut fused[position];

            if !entry.add_contribution(signal, candidate.score * weight) {
                continue;
            }
            if !entry.reasons.contains(&candidate.reason) {
                entry.reasons.push(candidate.reason);
            }
            if entry.cultural_factor.is_none() {
                entry.cultural_factor = candidate.cultural_factor;
            }
        }
    }

    fused.sort_by(|a, b| b.total_score().total_cmp(&a.total_score()));
    fused
}
