//! Client orchestrator
//!
//! A typed client for the six HTTP endpoints plus the session state a UI keeps
//! around it: the cached API key, the research form, the loaded result or project,
//! and an `Idle / Loading / Error / Success` status.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use market_research_sdk::{
    Analysis, NewProject, Persona, Project, ProjectId, ResearchRequest, ResearchResult,
    ValidationError,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5001";

/// File names used when a session's results are written out
pub const RESULTS_FILE: &str = "market_research_results.json";
pub const TRANSCRIPT_FILE: &str = "focus_group_transcript.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server origin, e.g. `http://localhost:5001`
    pub api_base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Please enter your OpenAI API key")]
    MissingCredential,
    #[error("{0}")]
    InvalidForm(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Another request is still in progress")]
    Busy,
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Failed to connect to the API server: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Unexpected response from the API server: {0}")]
    Decode(String),
    #[error("No research results to export")]
    NothingToExport,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// HTTP status of a server-side rejection
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthInfo {
    pub message: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedProject {
    pub message: String,
    pub project_id: ProjectId,
}

#[derive(Deserialize)]
struct ProjectsEnvelope {
    projects: Vec<Project>,
}

#[derive(Deserialize)]
struct ProjectEnvelope {
    project: Project,
}

#[derive(Deserialize)]
struct MessageEnvelope {
    message: String,
}

/// HTTP client for the research API
#[derive(Clone)]
pub struct ResearchClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ResearchClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Cache the API key in memory. An empty key clears it.
    pub fn set_api_key(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.api_key = if key.trim().is_empty() {
            None
        } else {
            Some(key.trim().to_string())
        };
    }

    pub fn clear_api_key(&mut self) {
        self.api_key = None;
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<HealthInfo> {
        let response = self.http.get(self.url("/")).send().await?;
        decode(response).await
    }

    /// Fails locally, without sending anything, when no API key is cached
    pub async fn generate_research(&self, request: &ResearchRequest) -> Result<ResearchResult> {
        let api_key = self.api_key.as_deref().ok_or(ClientError::MissingCredential)?;
        let response = self
            .http
            .post(self.url("/api/generate/research"))
            .header("X-API-KEY", api_key)
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let response = self.http.get(self.url("/api/projects")).send().await?;
        let envelope: ProjectsEnvelope = decode(response).await?;
        Ok(envelope.projects)
    }

    pub async fn get_project(&self, id: ProjectId) -> Result<Project> {
        let response = self
            .http
            .get(self.url(&format!("/api/projects/{}", id)))
            .send()
            .await?;
        let envelope: ProjectEnvelope = decode(response).await?;
        Ok(envelope.project)
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<CreatedProject> {
        let response = self
            .http
            .post(self.url("/api/projects"))
            .json(project)
            .send()
            .await?;
        decode(response).await
    }

    /// Returns the server's confirmation message
    pub async fn delete_project(&self, id: ProjectId) -> Result<String> {
        let response = self
            .http
            .delete(self.url(&format!("/api/projects/{}", id)))
            .send()
            .await?;
        let envelope: MessageEnvelope = decode(response).await?;
        Ok(envelope.message)
    }
}

/// Unwrap the `{success, ...}` envelope
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status().as_u16();
    let text = response.text().await?;

    let body: Value = match serde_json::from_str(&text) {
        Ok(body) => body,
        Err(_) if !(200..300).contains(&status) => {
            return Err(ClientError::Api {
                status,
                message: format!("HTTP {}", status),
            })
        }
        Err(e) => return Err(ClientError::Decode(e.to_string())),
    };

    if body.get("success").and_then(Value::as_bool) != Some(true) {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status));
        return Err(ClientError::Api { status, message });
    }

    serde_json::from_value(body).map_err(|e| ClientError::Decode(e.to_string()))
}

/// What the UI is doing right now
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UiStatus {
    #[default]
    Idle,
    Loading(String),
    Error(String),
    Success(String),
}

impl UiStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    /// Enter `Loading`. Refused while another operation is in flight.
    pub fn begin(&mut self, message: impl Into<String>) -> Result<()> {
        if self.is_loading() {
            return Err(ClientError::Busy);
        }
        *self = Self::Loading(message.into());
        Ok(())
    }

    /// Leave `Loading` with the outcome of the operation
    pub fn finish<T>(&mut self, outcome: Result<T>, success: impl Into<String>) -> Result<T> {
        *self = match &outcome {
            Ok(_) => Self::Success(success.into()),
            Err(e) => Self::Error(e.to_string()),
        };
        outcome
    }

    pub fn reset(&mut self) {
        *self = Self::Idle;
    }
}

/// The research form as typed in by the user
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResearchForm {
    pub product_concept: String,
    pub target_segment: String,
    pub research_questions: Vec<String>,
    pub project_name: String,
}

impl ResearchForm {
    /// Questions with blank entries dropped
    pub fn valid_questions(&self) -> Vec<String> {
        self.research_questions
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn to_request(&self) -> Result<ResearchRequest> {
        if self.product_concept.trim().is_empty() {
            return Err(ClientError::InvalidForm(
                "Please enter a product/service concept".to_string(),
            ));
        }
        if self.target_segment.trim().is_empty() {
            return Err(ClientError::InvalidForm("Please enter a target segment".to_string()));
        }
        let research_questions = self.valid_questions();
        if research_questions.is_empty() {
            return Err(ClientError::InvalidForm(
                "Please enter at least one research question".to_string(),
            ));
        }

        Ok(ResearchRequest {
            target_segment: self.target_segment.trim().to_string(),
            product_concept: self.product_concept.trim().to_string(),
            research_questions,
        })
    }

    /// Copy a saved project's inputs back into the form
    pub fn fill_from(&mut self, project: &Project) {
        self.product_concept = project.product_concept.clone();
        self.target_segment = project.target_segment.clone();
        self.research_questions = project.research_questions.clone();
        self.project_name = project.name.clone();
    }
}

/// Remembers the API key between runs, in a file under the user config directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyStore {
    path: PathBuf,
}

impl ApiKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/market-research/api_key`, when the platform has one
    pub fn default_location() -> Option<Self> {
        ProjectDirs::from("", "", "market-research")
            .map(|dirs| Self::new(dirs.config_dir().join("api_key")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The remembered key; a missing or blank file is no key
    pub fn load(&self) -> Option<String> {
        let key = fs::read_to_string(&self.path).ok()?;
        let key = key.trim();
        (!key.is_empty()).then(|| key.to_string())
    }

    /// Remember `key`. A blank key forgets the stored one.
    pub fn save(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return self.clear();
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, key)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Everything the downloadable results file holds
#[derive(Debug, Serialize)]
struct ResultsExport<'a> {
    product_concept: &'a str,
    target_segment: &'a str,
    research_questions: Vec<String>,
    personas: &'a [Persona],
    transcript: &'a str,
    analysis: &'a Analysis,
}

/// Client-side workflow state around a [`ResearchClient`]
pub struct ResearchSession {
    client: ResearchClient,
    pub form: ResearchForm,
    result: Option<ResearchResult>,
    loaded_project: Option<Project>,
    projects: Vec<Project>,
    status: UiStatus,
}

impl ResearchSession {
    pub fn new(client: ResearchClient) -> Self {
        Self {
            client,
            form: ResearchForm::default(),
            result: None,
            loaded_project: None,
            projects: Vec::new(),
            status: UiStatus::Idle,
        }
    }

    pub fn client_mut(&mut self) -> &mut ResearchClient {
        &mut self.client
    }

    pub fn status(&self) -> &UiStatus {
        &self.status
    }

    pub fn result(&self) -> Option<&ResearchResult> {
        self.result.as_ref()
    }

    pub fn loaded_project(&self) -> Option<&Project> {
        self.loaded_project.as_ref()
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Back to `Idle`; also recovers a session whose operation was cancelled mid-flight
    pub fn reset(&mut self) {
        self.status.reset();
    }

    pub fn clear_loaded_project(&mut self) {
        self.loaded_project = None;
        self.result = None;
    }

    /// Validate the form and run generation
    pub async fn generate(&mut self) -> Result<&ResearchResult> {
        if self.status.is_loading() {
            return Err(ClientError::Busy);
        }
        if !self.client.has_api_key() {
            return self.status.finish(Err(ClientError::MissingCredential), "");
        }
        let request = match self.form.to_request() {
            Ok(request) => request,
            Err(e) => return self.status.finish(Err(e), ""),
        };

        self.status.begin("Generating research... This may take a minute")?;
        let outcome = self.client.generate_research(&request).await;
        let result = self.status.finish(outcome, "Research generated successfully!")?;

        Ok(self.result.insert(result))
    }

    /// Save the form and the current result as a new project
    pub async fn save(&mut self) -> Result<ProjectId> {
        if self.status.is_loading() {
            return Err(ClientError::Busy);
        }
        if self.form.project_name.trim().is_empty() {
            let err = ClientError::InvalidForm("Please enter a project name".to_string());
            return self.status.finish(Err(err), "");
        }

        let project = NewProject {
            name: self.form.project_name.trim().to_string(),
            product_concept: self.form.product_concept.clone(),
            target_segment: self.form.target_segment.clone(),
            research_questions: self.form.valid_questions(),
            personas: self
                .result
                .as_ref()
                .map(|r| r.personas.clone())
                .unwrap_or_default(),
            transcript: self
                .result
                .as_ref()
                .map(|r| r.transcript.clone())
                .unwrap_or_default(),
            analysis: self.result.as_ref().map(|r| r.analysis.clone()),
        };

        self.status.begin("Saving project...")?;
        let outcome = self.client.create_project(&project).await;
        let created = self.status.finish(outcome, "Project saved successfully!")?;
        if let UiStatus::Success(message) = &mut self.status {
            *message = format!("{} Project ID: {}", message, created.project_id);
        }
        Ok(created.project_id)
    }

    pub async fn load_projects(&mut self) -> Result<&[Project]> {
        self.status.begin("Loading projects...")?;
        let outcome = self.client.list_projects().await;
        self.projects = self.status.finish(outcome, "Projects loaded")?;
        Ok(&self.projects)
    }

    /// Load a saved project; its inputs replace the form, its outputs the current result
    pub async fn load_project(&mut self, id: ProjectId) -> Result<&Project> {
        self.status.begin("Loading project...")?;
        let outcome = self.client.get_project(id).await;
        let project = self.status.finish(outcome, "Project loaded successfully!")?;

        self.form.fill_from(&project);
        self.result = project.analysis.clone().map(|analysis| ResearchResult {
            personas: project.personas.clone(),
            transcript: project.transcript.clone(),
            analysis,
            token_count: Default::default(),
        });
        Ok(self.loaded_project.insert(project))
    }

    /// The current result with the form inputs, as pretty-printed JSON
    pub fn export_json(&self) -> Result<String> {
        let result = self.result.as_ref().ok_or(ClientError::NothingToExport)?;
        let export = ResultsExport {
            product_concept: &self.form.product_concept,
            target_segment: &self.form.target_segment,
            research_questions: self.form.valid_questions(),
            personas: &result.personas,
            transcript: &result.transcript,
            analysis: &result.analysis,
        };
        serde_json::to_string_pretty(&export).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub fn export_transcript(&self) -> Result<String> {
        self.result
            .as_ref()
            .map(|result| result.transcript.clone())
            .ok_or(ClientError::NothingToExport)
    }

    /// Write both exports into `dir`, creating it if needed
    pub fn write_exports(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let json = self.export_json()?;
        let transcript = self.export_transcript()?;

        fs::create_dir_all(dir)?;
        let results_path = dir.join(RESULTS_FILE);
        let transcript_path = dir.join(TRANSCRIPT_FILE);
        fs::write(&results_path, json)?;
        fs::write(&transcript_path, transcript)?;
        Ok(vec![results_path, transcript_path])
    }

    pub async fn delete_project(&mut self, id: ProjectId) -> Result<()> {
        self.status.begin("Deleting project...")?;
        let outcome = self.client.delete_project(id).await;
        self.status.finish(outcome, "Project deleted successfully!")?;

        self.projects.retain(|p| p.id != id);
        if self.loaded_project.as_ref().map(|p| p.id) == Some(id) {
            self.loaded_project = None;
        }
        Ok(())
    }
}
