use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use market_research_sdk::{NewProject, Project, ProjectId, ResearchRequest};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::envelope::{success, ApiError, During};
use super::AppState;
use crate::error::Error;
use crate::store::PROJECT_NOT_FOUND;

pub const API_KEY_HEADER: &str = "x-api-key";

const DELETE_NOT_FOUND: &str = "Project not found or could not be deleted";

#[derive(Debug, Deserialize)]
struct GenerateBody {
    #[serde(default)]
    target_segment: String,
    #[serde(default)]
    product_concept: String,
    #[serde(default)]
    research_questions: Vec<String>,
}

#[derive(Serialize)]
struct ProjectList<'a> {
    projects: &'a [Project],
}

#[derive(Serialize)]
struct ProjectBody<'a> {
    project: &'a Project,
}

#[derive(Serialize)]
struct Created {
    message: &'static str,
    project_id: ProjectId,
}

#[derive(Serialize)]
struct Message {
    message: String,
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Synthetic Market Research API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn generate_research(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    const OPERATION: &str = "generating research";

    // Credential first: nothing about the body is looked at without a key
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    if api_key.is_empty() {
        return Err(ApiError::from_error(Error::MissingCredential, OPERATION));
    }

    let body: GenerateBody = parse_body(body)?;
    let request = ResearchRequest {
        target_segment: body.target_segment,
        product_concept: body.product_concept,
        research_questions: body.research_questions,
    };
    request.validate().map_err(Error::from).during(OPERATION)?;

    let result = state
        .generator
        .generate(api_key, &request)
        .await
        .during(OPERATION)?;
    success(&result)
}

pub async fn list_projects(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let projects = state
        .store
        .list_projects()
        .await
        .during("fetching projects")?;
    success(&ProjectList {
        projects: &projects,
    })
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id).ok_or_else(|| ApiError::not_found(PROJECT_NOT_FOUND))?;
    let project = state
        .store
        .get_project(id)
        .await
        .during("fetching the project")?;
    success(&ProjectBody { project: &project })
}

pub async fn create_project(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    const OPERATION: &str = "creating the project";

    let project: NewProject = parse_body(body)?;
    project.validate().map_err(Error::from).during(OPERATION)?;

    let project_id = state
        .store
        .create_project(&project)
        .await
        .during(OPERATION)?;
    success(&Created {
        message: "Project created successfully",
        project_id,
    })
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id).ok_or_else(|| ApiError::not_found(DELETE_NOT_FOUND))?;
    let deleted = state
        .store
        .delete_project(id)
        .await
        .during("deleting the project")?;

    if !deleted {
        return Err(ApiError::not_found(DELETE_NOT_FOUND));
    }
    success(&Message {
        message: format!("Project {} deleted successfully", id),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// Ids are positive; anything else names no project
fn parse_id(raw: &str) -> Option<ProjectId> {
    raw.parse().ok().filter(|id| *id > 0)
}

/// Decode a JSON object body; any failure is a 400 in the envelope
fn parse_body<T: DeserializeOwned>(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<T, ApiError> {
    let Json(value) = body.map_err(|rejection| {
        ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    if !value.is_object() {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    }

    serde_json::from_value(value)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}
