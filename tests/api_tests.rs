use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use recommendation_engine::api::{create_router, AppState};
use recommendation_engine::config::Config;
use recommendation_engine::models::{
    InteractionRecord, InteractionType, PopularProduct, ProductFeatures, Region, TrendingProduct,
    UserProfile,
};
use recommendation_engine::services::{
    ModelRegistry, ProfileService, RecommendationEngine, Trainer,
};
use recommendation_engine::store::memory::{
    InMemoryArtifacts, InMemoryCatalog, InMemoryInteractions, InMemoryProfiles,
};
use recommendation_engine::store::CatalogStore;

fn product(id: &str, name: &str, category: &str, price: f64, region: &str) -> ProductFeatures {
    ProductFeatures {
        product_id: id.to_string(),
        name: name.to_string(),
        name_ru: None,
        description: String::new(),
        description_ru: None,
        category: category.to_string(),
        subcategory: None,
        price,
        brand: None,
        tags: Vec::new(),
        vendor_id: format!("vendor-{id}"),
        vendor_region: region.to_string(),
        vendor_rating: 4.2,
        is_local_product: true,
        cultural_relevance: 0.6,
    }
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new(vec![
        product("tea-green", "Yashil choy", "food", 30_000.0, "TSH"),
        product("tea-black", "Qora choy", "food", 35_000.0, "SAM"),
        product("melon", "Qovun shirin", "fruits", 15_000.0, "XOR"),
        product("grapes", "Uzum shirin", "fruits", 20_000.0, "FAR"),
        product("atlas", "Atlas ipak mato", "textiles", 250_000.0, "FAR"),
        product("adras", "Adras ipak mato", "textiles", 180_000.0, "NAM"),
        product("halva", "Halva shirinlik", "sweets", 40_000.0, "BUX"),
    ])
    .with_popular(vec![
        PopularProduct {
            product_id: "melon".to_string(),
            order_count: 30,
            avg_rating: Some(4.6),
        },
        PopularProduct {
            product_id: "tea-green".to_string(),
            order_count: 12,
            avg_rating: None,
        },
    ])
    .with_trending(
        Region::Far,
        vec![TrendingProduct {
            product_id: "atlas".to_string(),
            name: "Atlas ipak mato".to_string(),
            price: 250_000.0,
            category: "textiles".to_string(),
            recent_orders: 6,
            total_items_sold: 11,
            avg_rating: Some(4.9),
        }],
    )
}

fn interactions() -> Vec<InteractionRecord> {
    let record = |user: &str, item: &str, rating: f64| InteractionRecord {
        user_id: user.to_string(),
        product_id: item.to_string(),
        interaction_type: InteractionType::Purchase,
        rating,
        timestamp: Utc::now() - Duration::days(5),
        region: "SAM".to_string(),
        language: "uz".to_string(),
    };
    vec![
        record("shopper-1", "tea-green", 5.0),
        record("shopper-1", "melon", 4.0),
        record("shopper-2", "tea-green", 4.0),
        record("shopper-2", "tea-black", 5.0),
        record("shopper-2", "halva", 4.0),
        record("shopper-3", "atlas", 5.0),
        record("shopper-3", "adras", 4.0),
    ]
}

fn profiles() -> InMemoryProfiles {
    InMemoryProfiles::new([
        UserProfile::new("shopper-1", "SAM").with_interests(["choy", "shirin"]),
        UserProfile::new("shopper-2", "TSH"),
        UserProfile::new("newcomer", "FAR").with_interests(["ipak"]),
    ])
}

async fn create_test_server(trained: bool) -> TestServer {
    let catalog: Arc<dyn CatalogStore> = Arc::new(catalog());
    let registry = Arc::new(ModelRegistry::default());
    let trainer = Trainer::new(
        catalog.clone(),
        Arc::new(InMemoryInteractions::new(interactions())),
        Arc::new(InMemoryArtifacts::new()),
        registry.clone(),
    )
    .with_rank(8);
    if trained {
        trainer.retrain().await.unwrap();
    }

    let config = Config::default();
    let engine = RecommendationEngine::new(registry, catalog.clone(), config.signal_timeout());
    let profiles = ProfileService::new(Arc::new(profiles()), None, config.cache_ttl_secs);
    let state = AppState::new(engine, profiles, trainer, catalog, config);

    TestServer::new(create_router(Arc::new(state))).unwrap()
}

fn signal_status<'a>(body: &'a Value, signal: &str) -> Option<&'a str> {
    body["signals"]
        .as_array()?
        .iter()
        .find(|report| report["signal"] == signal)
        .and_then(|report| report["status"].as_str())
}

#[tokio::test]
async fn test_health_check_reports_loaded_models() {
    let server = create_test_server(true).await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_version"], 1);
    assert_eq!(body["models"]["collaborative"], true);
    assert_eq!(body["models"]["content"], true);
    assert_eq!(body["models"]["cultural"], true);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server(false).await;
    let request_id = "6f1c2d7e-3b4a-4c5d-8e9f-0a1b2c3d4e5f";

    let response = server
        .get("/health")
        .add_header(
            axum::http::HeaderName::from_static("x-request-id"),
            axum::http::HeaderValue::from_static(request_id),
        )
        .await;

    assert_eq!(response.header("x-request-id"), request_id);
}

#[tokio::test]
async fn test_recommendations_for_known_user() {
    let server = create_test_server(true).await;

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "user_id": "shopper-1", "limit": 3 }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["user_id"], "shopper-1");
    assert_eq!(body["context"], "general");
    assert_eq!(body["model_version"], 1);
    assert_eq!(signal_status(&body, "collaborative"), Some("ran"));

    let items = body["recommendations"].as_array().unwrap();
    assert!(!items.is_empty());
    assert!(items.len() <= 3);
    for item in items {
        let sum: f64 = item["scores"]
            .as_object()
            .unwrap()
            .values()
            .map(|v| v.as_f64().unwrap())
            .sum();
        assert!((item["total_score"].as_f64().unwrap() - sum).abs() < 1e-9);
        assert!(item["product_name"].is_string());
    }
}

#[tokio::test]
async fn test_cold_start_user_gets_popularity() {
    let server = create_test_server(true).await;

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "user_id": "newcomer", "context": "holiday_shopping" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(signal_status(&body, "collaborative"), Some("cold_start"));
    assert_eq!(signal_status(&body, "popularity"), Some("ran"));
    // FAR is rural: 0.3 + 0.1 + 0.2
    assert!((body["weights"]["cultural"].as_f64().unwrap() - 0.6).abs() < 1e-9);

    let items = body["recommendations"].as_array().unwrap();
    assert!(!items.is_empty());
    assert!(items
        .iter()
        .all(|item| item["scores"].get("collaborative").is_none()));
}

#[tokio::test]
async fn test_excluded_products_and_explanations() {
    let server = create_test_server(true).await;

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({
            "user_id": "shopper-1",
            "exclude_products": ["tea-black", "halva"],
            "include_explanations": false
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    for item in body["recommendations"].as_array().unwrap() {
        assert_ne!(item["product_id"], "tea-black");
        assert_ne!(item["product_id"], "halva");
        assert!(item.get("reasons").is_none());
        assert!(item.get("cultural_factor").is_none());
    }
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let server = create_test_server(true).await;

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "user_id": "ghost" }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn test_limit_out_of_range_is_rejected() {
    let server = create_test_server(true).await;

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "user_id": "shopper-1", "limit": 0 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/api/v1/similar-products/melon")
        .add_query_param("limit", 1000)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_untrained_service_still_recommends() {
    let server = create_test_server(false).await;

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "user_id": "shopper-1" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(signal_status(&body, "collaborative"), Some("unavailable"));
    assert_eq!(signal_status(&body, "content"), Some("unavailable"));
    assert!(body["market_factors"].is_null());
    let ids: Vec<&str> = body["recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["product_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["melon", "tea-green"]);
}

#[tokio::test]
async fn test_similar_products() {
    let server = create_test_server(true).await;

    let response = server
        .get("/api/v1/similar-products/atlas")
        .add_query_param("limit", 3)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["product_id"], "atlas");
    let similar = body["similar_products"].as_array().unwrap();
    assert_eq!(similar.len(), 3);
    assert_eq!(similar[0]["product_id"], "adras");
    assert!(similar.iter().all(|item| item["product_id"] != "atlas"));
}

#[tokio::test]
async fn test_similar_products_errors() {
    let server = create_test_server(true).await;
    server
        .get("/api/v1/similar-products/unknown")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let untrained = create_test_server(false).await;
    untrained
        .get("/api/v1/similar-products/atlas")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_trending_by_region() {
    let server = create_test_server(false).await;

    let response = server.get("/api/v1/trending/far").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["region"], "FAR");
    assert_eq!(body["trending_products"][0]["product_id"], "atlas");
    assert_eq!(body["trending_products"][0]["trend_score"], 23);

    server
        .get("/api/v1/trending/XYZ")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_retrain_is_accepted() {
    let server = create_test_server(false).await;

    let response = server.post("/api/v1/models/retrain").await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["status"], "training_started");
}
