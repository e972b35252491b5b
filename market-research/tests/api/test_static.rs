//! Static file server for the single-page client

use super::common::*;
use market_research::static_files;

const INDEX_HTML: &str = "<!doctype html><title>Synthetic Market Research</title>";

async fn spawn_static() -> (String, tempfile::TempDir) {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("index.html"), INDEX_HTML).unwrap();
    std::fs::create_dir(root.path().join("js")).unwrap();
    std::fs::write(root.path().join("js/main.js"), "console.log('ok');").unwrap();
    std::fs::write(root.path().join("styles.css"), "body {}").unwrap();

    let base = spawn(static_files::router(root.path().to_path_buf())).await;
    (base, root)
}

async fn fetch(url: String) -> (u16, String, String) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default();
    (status, content_type, response.text().await.unwrap())
}

#[tokio::test]
async fn test_root_serves_index() {
    let (base, _root) = spawn_static().await;

    let (status, content_type, body) = fetch(format!("{}/", base)).await;
    assert_eq!(status, 200);
    assert_eq!(content_type, "text/html");
    assert_eq!(body, INDEX_HTML);
}

#[tokio::test]
async fn test_assets_carry_their_content_type() {
    let (base, _root) = spawn_static().await;

    let (status, content_type, body) = fetch(format!("{}/js/main.js", base)).await;
    assert_eq!(status, 200);
    assert_eq!(content_type, "text/javascript");
    assert_eq!(body, "console.log('ok');");

    let (_, content_type, _) = fetch(format!("{}/styles.css", base)).await;
    assert_eq!(content_type, "text/css");
}

#[tokio::test]
async fn test_client_routes_fall_back_to_index() {
    let (base, _root) = spawn_static().await;

    let (status, content_type, body) = fetch(format!("{}/projects/12", base)).await;
    assert_eq!(status, 200);
    assert_eq!(content_type, "text/html");
    assert_eq!(body, INDEX_HTML);

    let (status, _, body) = fetch(format!("{}/about.html", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body, INDEX_HTML);
}

#[tokio::test]
async fn test_missing_asset_is_404() {
    let (base, _root) = spawn_static().await;

    let (status, _, body) = fetch(format!("{}/missing.css", base)).await;
    assert_eq!(status, 404);
    assert_eq!(body, "File not found: /missing.css");
}
