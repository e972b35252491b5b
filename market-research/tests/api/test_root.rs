//! Service banner, unknown routes and CORS

use super::common::*;
use serde_json::Value;

#[tokio::test]
async fn test_root_reports_running() {
    let (base, _) = spawn_with_memory_store().await;

    let response = reqwest::get(format!("{}/", base)).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Synthetic Market Research API is running");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_health_through_client() {
    let (base, _) = spawn_with_memory_store().await;

    let health = client(&base).health().await.unwrap();
    assert_eq!(health.message, "Synthetic Market Research API is running");
}

#[tokio::test]
async fn test_unknown_route_is_enveloped_404() {
    let (base, _) = spawn_with_memory_store().await;

    let response = reqwest::get(format!("{}/api/nothing-here", base))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unsupported_method_is_enveloped_405() {
    let (base, _) = spawn_with_memory_store().await;
    let http = reqwest::Client::new();

    let response = http
        .put(format!("{}/api/projects", base))
        .json(&serde_json::json!({"name": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 405);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Method not allowed");

    let response = http
        .patch(format!("{}/api/projects/1", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 405);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (base, _) = spawn_with_memory_store().await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/api/projects", base))
        .header("Origin", "http://localhost:5000")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 204);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
    let allowed = response.headers()["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .to_lowercase();
    assert!(allowed.contains("x-api-key"));
}

#[tokio::test]
async fn test_cors_header_on_errors() {
    let (base, _) = spawn_with_memory_store().await;

    let response = reqwest::get(format!("{}/api/projects/999", base))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}
