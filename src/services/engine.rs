//! Request-path orchestration: runs the three signals concurrently, fuses
//! their output and applies the post-filter.

use chrono::{FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::models::{
    RequestContext, ScoredCandidate, Signal, SignalCandidate, SignalReport, SignalStatus,
    UserProfile,
};
use crate::services::collaborative::CollaborativeOutcome;
use crate::services::cultural::MarketFactors;
use crate::services::fallback::popular_candidates;
use crate::services::filters::post_filter;
use crate::services::fusion::{fuse, SignalWeights};
use crate::services::registry::{ModelRegistry, ModelSet};
use crate::store::CatalogStore;

/// Marketplace local time, UTC+5
const MARKET_UTC_OFFSET_SECS: i32 = 5 * 3600;

/// Signals fetch this many candidates per requested result
const OVERSCORE_FACTOR: usize = 2;

/// Today's date in the marketplace time zone
pub fn market_today() -> NaiveDate {
    let now = Utc::now();
    match FixedOffset::east_opt(MARKET_UTC_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset).date_naive(),
        None => now.date_naive(),
    }
}

/// Everything one recommendation request produced
#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub items: Vec<ScoredCandidate>,
    pub signals: Vec<SignalReport>,
    pub weights: SignalWeights,
    pub model_version: u64,
    pub market_factors: Option<MarketFactors>,
}

impl Recommendations {
    pub fn status_of(&self, signal: Signal) -> Option<&SignalStatus> {
        self.signals
            .iter()
            .find(|report| report.signal == signal)
            .map(|report| &report.status)
    }
}

struct SignalRun {
    signal: Signal,
    status: SignalStatus,
    candidates: Vec<SignalCandidate>,
}

impl SignalRun {
    fn ran(signal: Signal, candidates: Vec<SignalCandidate>) -> Self {
        Self {
            signal,
            status: SignalStatus::Ran {
                candidates: candidates.len(),
            },
            candidates,
        }
    }

    fn empty(signal: Signal, status: SignalStatus) -> Self {
        Self {
            signal,
            status,
            candidates: Vec::new(),
        }
    }

    fn report(&self) -> SignalReport {
        SignalReport {
            signal: self.signal,
            status: self.status.clone(),
        }
    }
}

/// The fusion engine. Cheap to share: models live behind the registry and
/// every request works on its own snapshot.
#[derive(Clone)]
pub struct RecommendationEngine {
    registry: Arc<ModelRegistry>,
    catalog: Arc<dyn CatalogStore>,
    signal_timeout: Duration,
}

impl RecommendationEngine {
    pub fn new(
        registry: Arc<ModelRegistry>,
        catalog: Arc<dyn CatalogStore>,
        signal_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            catalog,
            signal_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub async fn recommend(
        &self,
        profile: &UserProfile,
        context: &RequestContext,
        limit: usize,
        exclude: &HashSet<String>,
    ) -> Recommendations {
        self.recommend_on(profile, context, limit, exclude, market_today())
            .await
    }

    /// Ranks products for `profile` as of `date`. Never fails: a signal that
    /// is missing, errors or times out contributes nothing.
    pub async fn recommend_on(
        &self,
        profile: &UserProfile,
        context: &RequestContext,
        limit: usize,
        exclude: &HashSet<String>,
        date: NaiveDate,
    ) -> Recommendations {
        let models = self.registry.snapshot().await;
        let k = limit.saturating_mul(OVERSCORE_FACTOR);

        let (collaborative, content, cultural) = tokio::join!(
            self.collaborative_signal(&models, &profile.user_id, k),
            self.content_signal(&models, profile, k),
            self.cultural_signal(&models, profile, date, k),
        );

        let mut signals: Vec<SignalReport> = collaborative.iter().map(SignalRun::report).collect();
        signals.push(content.report());
        signals.push(cultural.report());

        let weights = SignalWeights::for_request(&profile.region, context);
        let fused = fuse(
            &weights,
            collaborative
                .into_iter()
                .chain([content, cultural])
                .map(|run| (run.signal, run.candidates))
                .collect(),
        );
        let fused_count = fused.len();

        let items = post_filter(
            self.catalog.as_ref(),
            profile,
            fused,
            exclude,
            limit,
            self.signal_timeout,
        )
        .await;

        tracing::info!(
            user_id = %profile.user_id,
            context = %context,
            fused = fused_count,
            returned = items.len(),
            model_version = models.version,
            "Recommendations ranked"
        );

        Recommendations {
            items,
            signals,
            weights,
            model_version: models.version,
            market_factors: models
                .cultural
                .as_ref()
                .map(|model| model.market_factors(date, &profile.region)),
        }
    }

    /// Collaborative filtering, or popularity when the user is unseen or no
    /// collaborative model is loaded. Yields one run per signal involved.
    async fn collaborative_signal(
        &self,
        models: &ModelSet,
        user_id: &str,
        k: usize,
    ) -> Vec<SignalRun> {
        let status = match &models.collaborative {
            Some(model) => match model.score(user_id, k) {
                CollaborativeOutcome::Scored(candidates) => {
                    return vec![SignalRun::ran(Signal::Collaborative, candidates)];
                }
                CollaborativeOutcome::ColdStart => {
                    tracing::debug!(user_id = %user_id, "Cold start, using popularity");
                    SignalStatus::ColdStart
                }
            },
            None => {
                tracing::debug!("No collaborative model loaded, using popularity");
                SignalStatus::Unavailable
            }
        };

        let popularity = self
            .guarded(
                Signal::Popularity,
                popular_candidates(self.catalog.as_ref(), k),
            )
            .await;

        vec![
            SignalRun::empty(Signal::Collaborative, status),
            popularity,
        ]
    }

    async fn content_signal(&self, models: &ModelSet, profile: &UserProfile, k: usize) -> SignalRun {
        match &models.content {
            Some(model) => SignalRun::ran(Signal::Content, model.score(profile, k)),
            None => SignalRun::empty(Signal::Content, SignalStatus::Unavailable),
        }
    }

    async fn cultural_signal(
        &self,
        models: &ModelSet,
        profile: &UserProfile,
        date: NaiveDate,
        k: usize,
    ) -> SignalRun {
        match &models.cultural {
            Some(model) => {
                self.guarded(
                    Signal::Cultural,
                    model.score(self.catalog.as_ref(), profile, date, k),
                )
                .await
            }
            None => SignalRun::empty(Signal::Cultural, SignalStatus::Unavailable),
        }
    }

    /// Runs an I/O-bound signal under the per-signal timeout, degrading errors
    /// and timeouts to an empty run
    async fn guarded<F>(&self, signal: Signal, fetch: F) -> SignalRun
    where
        F: Future<Output = AppResult<Vec<SignalCandidate>>>,
    {
        match tokio::time::timeout(self.signal_timeout, fetch).await {
            Ok(Ok(candidates)) => SignalRun::ran(signal, candidates),
            Ok(Err(e)) => {
                tracing::warn!(signal = %signal, error = %e, "Signal failed, continuing without it");
                SignalRun::empty(signal, SignalStatus::Failed)
            }
            Err(_) => {
                tracing::warn!(
                    signal = %signal,
                    timeout_ms = self.signal_timeout.as_millis() as u64,
                    "Signal timed out, continuing without it"
                );
                SignalRun::empty(signal, SignalStatus::TimedOut)
            }
        }
    }

    /// Content neighbours of a product, never including the product itself
    pub async fn similar_products(
        &self,
        product_id: &str,
        limit: usize,
    ) -> AppResult<Vec<SignalCandidate>> {
        let models = self.registry.snapshot().await;
        let model = models
            .content
            .as_ref()
            .ok_or(AppError::ModelUnavailable(Signal::Content))?;

        model.similar(product_id, limit).ok_or_else(|| {
            AppError::NotFound(format!(
                "Product {} is not in the content model",
                product_id
            ))
        })
    }

    /// Calendar and regional factors for a region today, if the cultural
    /// model is loaded
    pub async fn market_factors(&self, region: &str) -> Option<MarketFactors> {
        let models = self.registry.snapshot().await;
        models
            .cultural
            .as_ref()
            .map(|model| model.market_factors(market_today(), region))
    }
}
