//! Static file server for the single-page client
//!
//! `/` maps to `index.html`. A missing file whose path has no extension or ends in
//! `.html` is a client-side route and gets `index.html`; any other missing file is a 404.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tracing::{debug, warn};

const INDEX: &str = "index.html";

/// Content type by file extension, `application/octet-stream` when unknown
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("html") => "text/html",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") => "image/jpg",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Whether a missing path should fall back to the client's `index.html`
pub fn is_client_route(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        None => true,
        Some(extension) => extension.eq_ignore_ascii_case("html"),
    }
}

/// Map a request path onto a path relative to the root. `None` for anything escaping it.
pub fn resolve(request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Some(PathBuf::from(INDEX));
    }

    let relative = PathBuf::from(trimmed);
    let safe = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    safe.then_some(relative)
}

/// Router serving files under `root`
pub fn router(root: PathBuf) -> Router {
    Router::new()
        .fallback(serve_file)
        .with_state(Arc::new(root))
}

async fn serve_file(State(root): State<Arc<PathBuf>>, uri: Uri) -> Response {
    let Some(relative) = resolve(uri.path()) else {
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    };

    let path = root.join(&relative);
    match tokio::fs::read(&path).await {
        Ok(content) => file_response(content_type_for(&path), content),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            if !is_client_route(&relative) {
                debug!(path = %relative.display(), "static file not found");
                return (StatusCode::NOT_FOUND, format!("File not found: {}", uri.path()))
                    .into_response();
            }

            match tokio::fs::read(root.join(INDEX)).await {
                Ok(content) => file_response("text/html", content),
                Err(e) => server_error(&e),
            }
        }
        Err(e) => server_error(&e),
    }
}

fn file_response(content_type: &'static str, content: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, content_type)], content).into_response()
}

fn server_error(error: &std::io::Error) -> Response {
    warn!(%error, "failed to read static file");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Server Error: {:?}", error.kind()),
    )
        .into_response()
}
