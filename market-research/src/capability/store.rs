//! Store capabilities over the project database
//!
//! Shared by the `research-capability` executable and the in-process adapter, so
//! both produce byte-for-byte the same output conventions.

use anyhow::{bail, Context, Result};
use market_research_sdk::{env, names, Invocation, NewProject, ProjectId};
use serde_json::{json, Value};

use crate::database::Database;

/// Whether `name` is one of the four store capabilities
pub fn is_store_capability(name: &str) -> bool {
    matches!(
        name,
        names::LIST_PROJECTS | names::GET_PROJECT | names::SAVE_PROJECT | names::DELETE_PROJECT
    )
}

/// Run one store invocation against `db`, returning the JSON it prints
pub fn run(db: &Database, invocation: &Invocation) -> Result<Value> {
    match invocation.capability() {
        names::LIST_PROJECTS => Ok(serde_json::to_value(db.list_projects()?)?),
        names::GET_PROJECT => {
            let id = project_id_arg(invocation)?;
            match db.get_project(id)? {
                Some(project) => Ok(serde_json::to_value(project)?),
                None => Ok(json!({})),
            }
        }
        names::SAVE_PROJECT => {
            let data = invocation
                .env_vars()
                .get(env::PROJECT_DATA)
                .context("PROJECT_DATA not provided")?;
            let project: NewProject =
                serde_json::from_str(data).context("PROJECT_DATA is not a valid project")?;
            project.validate()?;

            let id = db.insert_project(&project)?;
            Ok(json!({ "project_id": id }))
        }
        names::DELETE_PROJECT => {
            let id = project_id_arg(invocation)?;
            Ok(json!({ "success": db.delete_project(id)? }))
        }
        other => bail!("Unknown store capability: {}", other),
    }
}

fn project_id_arg(invocation: &Invocation) -> Result<ProjectId> {
    let raw = invocation
        .args()
        .first()
        .context("Project id not provided")?;
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid project id: {}", raw))
}
