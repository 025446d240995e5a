//! Lookup API integration tests
//!
//! Drives the axum router directly with `tower::ServiceExt::oneshot` against
//! a wiremock EcoTrack upstream, verifying the response envelope and that
//! the cache keeps repeat requests off the upstream.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ecotrack_bot::core::web_server::router;
use ecotrack_bot::ecotrack::EcoClient;
use ecotrack_bot::services::LookupService;

fn build_router(upstream: &MockServer) -> axum::Router {
    let base_url = Url::parse(&upstream.uri()).unwrap();
    let client = Arc::new(EcoClient::new(base_url, "test-api-key-123").unwrap());
    router(Arc::new(LookupService::new(client)))
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

#[tokio::test]
async fn test_wilayas_served_from_cache_after_first_fetch() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/get/wilayas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"wilaya_id": 16, "wilaya_name": "Alger"},
            {"wilaya_id": 31, "wilaya_name": "Oran"}
        ])))
        .expect(1)
        .mount(&upstream)
        .await;

    let app = build_router(&upstream);

    let (status, first) = get(&app, "/api/wilayas").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], json!(true));
    assert_eq!(first["data"], json!([{"id": 16, "nom": "Alger"}, {"id": 31, "nom": "Oran"}]));

    // Second hit within the TTL must be served from cache; the expect(1)
    // above fails on drop if the upstream is called again.
    let (status, second) = get(&app, "/api/wilayas").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_communes_requires_positive_wilaya_id() {
    let upstream = MockServer::start().await;
    let app = build_router(&upstream);

    for uri in ["/api/communes", "/api/communes?wilaya_id=0", "/api/communes?wilaya_id=abc"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri: {}", uri);
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].as_str().unwrap().contains("wilaya_id"));
    }
}

#[tokio::test]
async fn test_communes_happy_path_and_cache() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/get/communes"))
        .and(query_param("wilaya_id", "16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"nom": "Bab El Oued"},
            {"name": "Alger Centre"}
        ])))
        .expect(1)
        .mount(&upstream)
        .await;

    let app = build_router(&upstream);

    let (status, body) = get(&app, "/api/communes?wilaya_id=16").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["Bab El Oued", "Alger Centre"]));

    let (status, again) = get(&app, "/api/communes?wilaya_id=16").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again, body);
}

#[tokio::test]
async fn test_upstream_failure_maps_to_500() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/get/wilayas"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"message": "maintenance"})))
        .mount(&upstream)
        .await;

    let app = build_router(&upstream);

    let (status, body) = get(&app, "/api/wilayas").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("maintenance"));
}

#[tokio::test]
async fn test_empty_commune_list_is_an_error() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/get/communes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&upstream)
        .await;

    let app = build_router(&upstream);

    let (status, body) = get(&app, "/api/communes?wilaya_id=9").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_health_endpoint() {
    let upstream = MockServer::start().await;
    let app = build_router(&upstream);

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!("ok"));
}
