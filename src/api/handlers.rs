use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

use super::AppState;
use crate::db::CacheKey;
use crate::error::{AppError, AppResult};
use crate::middleware::RequestId;
use crate::models::{
    Region, RequestContext, ScoredCandidate, Signal, SignalCandidate, SignalReport,
};
use crate::services::cultural::MarketFactors;
use crate::services::fusion::SignalWeights;
use crate::services::trending::{trending_in, TrendingItem};

const DEFAULT_RECOMMENDATION_LIMIT: usize = 10;
const DEFAULT_SIMILAR_LIMIT: usize = 10;
const DEFAULT_TRENDING_LIMIT: usize = 20;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    #[serde(default)]
    pub context: RequestContext,
    #[serde(default = "default_recommendation_limit")]
    pub limit: usize,
    #[serde(default)]
    pub exclude_products: Vec<String>,
    #[serde(default = "default_include_explanations")]
    pub include_explanations: bool,
}

fn default_recommendation_limit() -> usize {
    DEFAULT_RECOMMENDATION_LIMIT
}

fn default_include_explanations() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationResponse {
    pub user_id: String,
    pub recommendations: Vec<ScoredCandidate>,
    pub context: RequestContext,
    pub generated_at: DateTime<Utc>,
    pub model_version: u64,
    pub market_factors: Option<MarketFactors>,
    pub weights: SignalWeights,
    pub signals: Vec<SignalReport>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SimilarProductsResponse {
    pub product_id: String,
    pub similar_products: Vec<SignalCandidate>,
}

#[derive(Debug, Serialize)]
pub struct TrendingResponse {
    pub region: Region,
    pub trending_products: Vec<TrendingItem>,
    pub generated_at: DateTime<Utc>,
}

/// Rejects limits outside `1..=max`
fn validate_limit(limit: usize, max: usize) -> AppResult<usize> {
    if limit == 0 || limit > max {
        return Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}",
            max
        )));
    }
    Ok(limit)
}

// Handlers

/// Health check endpoint, including which signals have a loaded artifact
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let models = state.engine.registry().snapshot().await;
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "model_version": models.version,
            "models": {
                "collaborative": models.is_loaded(Signal::Collaborative),
                "content": models.is_loaded(Signal::Content),
                "cultural": models.is_loaded(Signal::Cultural),
            }
        })),
    )
}

/// Personalized recommendations for a known user
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    let limit = validate_limit(request.limit, state.config.max_limit)?;
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::InvalidInput("user_id is required".to_string()));
    }

    let profile = state
        .profiles
        .get_profile(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    let exclude: HashSet<String> = request.exclude_products.into_iter().collect();
    let result = state
        .engine
        .recommend(&profile, &request.context, limit, &exclude)
        .await;

    let recommendations = if request.include_explanations {
        result.items
    } else {
        result
            .items
            .into_iter()
            .map(ScoredCandidate::without_explanations)
            .collect()
    };

    let response = RecommendationResponse {
        user_id: profile.user_id.clone(),
        recommendations,
        context: request.context,
        generated_at: Utc::now(),
        model_version: result.model_version,
        market_factors: result.market_factors,
        weights: result.weights,
        signals: result.signals,
    };

    if let Some(cache) = &state.cache {
        let key = CacheKey::Recommendations {
            user_id: response.user_id.clone(),
            context: response.context.to_string(),
        };
        cache.set_in_background(&key, &response, state.config.cache_ttl_secs);
    }

    tracing::info!(
        request_id = %request_id,
        user_id = %response.user_id,
        count = response.recommendations.len(),
        "Served recommendations"
    );

    Ok(Json(response))
}

/// Content neighbours of a product
pub async fn similar_products(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<SimilarProductsResponse>> {
    let limit = validate_limit(
        query.limit.unwrap_or(DEFAULT_SIMILAR_LIMIT),
        state.config.max_limit,
    )?;

    let similar_products = state.engine.similar_products(&product_id, limit).await?;

    Ok(Json(SimilarProductsResponse {
        product_id,
        similar_products,
    }))
}

/// Products with recent momentum in a region
pub async fn trending(
    State(state): State<Arc<AppState>>,
    Path(region): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<TrendingResponse>> {
    let region: Region = region.parse()?;
    let limit = validate_limit(
        query.limit.unwrap_or(DEFAULT_TRENDING_LIMIT),
        state.config.max_limit,
    )?;

    let trending_products = trending_in(state.catalog.as_ref(), region, limit).await?;

    Ok(Json(TrendingResponse {
        region,
        trending_products,
        generated_at: Utc::now(),
    }))
}

/// Starts a background training run
pub async fn retrain(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<(StatusCode, Json<Value>)> {
    state.trainer.spawn_retrain()?;
    tracing::info!(request_id = %request_id, "Retrain requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "training_started" })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_bounds() {
        assert!(validate_limit(0, 100).is_err());
        assert!(validate_limit(101, 100).is_err());
        assert_eq!(validate_limit(100, 100).unwrap(), 100);
    }

    #[test]
    fn test_request_defaults() {
        let request: RecommendationRequest =
            serde_json::from_value(json!({ "user_id": "u1" })).unwrap();
        assert_eq!(request.context, RequestContext::General);
        assert_eq!(request.limit, 10);
        assert!(request.exclude_products.is_empty());
        assert!(request.include_explanations);
    }
}
