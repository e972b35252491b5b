//! Project store gateway
//!
//! CRUD over the persistent project collection. Every operation is exactly one
//! capability invocation; the gateway owns the mapping from capability output to
//! typed results, including the "absent" conventions (`null` / `{}` for a missing project,
//! `{"success": false}` for a failed delete).

use std::path::PathBuf;
use std::sync::Arc;

use market_research_sdk::{
    env, names, Capability, CapabilityOutput, Invocation, NewProject, Project, ProjectId,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

pub const PROJECT_NOT_FOUND: &str = "Project not found";

#[derive(Debug, Deserialize)]
struct Created {
    project_id: ProjectId,
}

#[derive(Debug, Deserialize)]
struct Deleted {
    success: bool,
}

/// Typed access to persisted projects through store capabilities
#[derive(Clone)]
pub struct ProjectStore {
    capability: Arc<dyn Capability>,
    database: Option<PathBuf>,
}

impl ProjectStore {
    pub fn new(capability: Arc<dyn Capability>) -> Self {
        Self {
            capability,
            database: None,
        }
    }

    /// Pass `RESEARCH_DATABASE` to every store invocation
    pub fn with_database(mut self, path: PathBuf) -> Self {
        self.database = Some(path);
        self
    }

    fn invocation(&self, capability: &str) -> Invocation {
        let invocation = Invocation::new(capability);
        match &self.database {
            Some(path) => invocation.env(env::RESEARCH_DATABASE, path.display().to_string()),
            None => invocation,
        }
    }

    /// All projects, newest first
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let output = self
            .capability
            .invoke(self.invocation(names::LIST_PROJECTS))
            .await?;
        let projects: Vec<Project> = decode(names::LIST_PROJECTS, output)?;
        debug!(count = projects.len(), "listed projects");
        Ok(projects)
    }

    pub async fn get_project(&self, id: ProjectId) -> Result<Project> {
        let output = self
            .capability
            .invoke(self.invocation(names::GET_PROJECT).arg(id.to_string()))
            .await?;

        if is_absent(&output) {
            return Err(Error::NotFound(PROJECT_NOT_FOUND.to_string()));
        }
        decode(names::GET_PROJECT, output)
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<ProjectId> {
        project.validate()?;

        let data = serde_json::to_string(project)
            .map_err(|e| Error::malformed(names::SAVE_PROJECT, e))?;
        let output = self
            .capability
            .invoke(self.invocation(names::SAVE_PROJECT).env(env::PROJECT_DATA, data))
            .await?;

        let created: Created = decode(names::SAVE_PROJECT, output)?;
        debug!(project_id = created.project_id, "created project");
        Ok(created.project_id)
    }

    /// `false` covers both "no such project" and "delete failed"
    pub async fn delete_project(&self, id: ProjectId) -> Result<bool> {
        let output = self
            .capability
            .invoke(self.invocation(names::DELETE_PROJECT).arg(id.to_string()))
            .await?;

        let deleted: Deleted = decode(names::DELETE_PROJECT, output)?;
        Ok(deleted.success)
    }
}

fn is_absent(output: &CapabilityOutput) -> bool {
    match output {
        CapabilityOutput::Json(Value::Null) => true,
        CapabilityOutput::Json(Value::Object(map)) => map.is_empty(),
        _ => false,
    }
}

/// Decode typed output; text output and shape mismatches are malformed results
pub(crate) fn decode<T: DeserializeOwned>(capability: &str, output: CapabilityOutput) -> Result<T> {
    match output {
        CapabilityOutput::Json(value) => {
            serde_json::from_value(value).map_err(|e| Error::malformed(capability, e))
        }
        CapabilityOutput::Text(text) => Err(Error::malformed(
            capability,
            format!("expected JSON, got {} bytes of text", text.len()),
        )),
    }
}
