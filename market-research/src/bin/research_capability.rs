/*
┌─────────────────────────────────────────────────────────────────────────────┐
│                         RESEARCH CAPABILITY                                  │
└─────────────────────────────────────────────────────────────────────────────┘

  One process per invocation. The server spawns this executable with the
  capability name as the first argument.

  generate-research
    │
    ├─> Env: OPENAI_API_KEY, TARGET_SEGMENT, PRODUCT_CONCEPT,
    │        RESEARCH_QUESTIONS (JSON array), optional OPENAI_MODEL,
    │        OPENAI_BASE_URL, PERSONA_COUNT
    ├─> Stage 1: generate personas
    ├─> Stage 2: simulate focus group
    ├─> Stage 3: analyze transcript
    └─> Stdout: ResearchResult JSON

  list-projects            → JSON array, newest first
  get-project <id>         → project JSON, or {} when absent
  save-project             → {"project_id": N}   (env PROJECT_DATA)
  delete-project <id>      → {"success": bool}

  Store commands use RESEARCH_DATABASE, or the default data directory.

┌─────────────────────────────────────────────────────────────────────────────┐
│ PROTOCOL:                                                                    │
│ • Stdout carries exactly one JSON document                                  │
│ • Stderr carries logs and __CAPABILITY_EVENT__: progress lines              │
│ • Exit status 1 with "Error: ..." on stderr on any failure                  │
└─────────────────────────────────────────────────────────────────────────────┘

EXAMPLE COMMANDS:

  RESEARCH_DATABASE=/tmp/projects.db research-capability list-projects

  PROJECT_DATA='{"name":"Demo","product_concept":"app","target_segment":"students"}' \
    research-capability save-project
*/

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use market_research::capability::{generate, store};
use market_research::config::default_database_path;
use market_research::database::Database;
use market_research_sdk::{env, names, Invocation};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "research-capability",
    version,
    about = "External capabilities of the synthetic market research service"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate personas, a focus group transcript and its analysis
    GenerateResearch,
    /// Print all saved projects
    ListProjects,
    /// Print one project, or {} when it does not exist
    GetProject {
        #[arg(allow_hyphen_values = true)]
        id: String,
    },
    /// Save the project in PROJECT_DATA
    SaveProject,
    /// Delete one project
    DeleteProject {
        #[arg(allow_hyphen_values = true)]
        id: String,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::GenerateResearch => names::GENERATE_RESEARCH,
            Self::ListProjects => names::LIST_PROJECTS,
            Self::GetProject { .. } => names::GET_PROJECT,
            Self::SaveProject => names::SAVE_PROJECT,
            Self::DeleteProject { .. } => names::DELETE_PROJECT,
        }
    }

    /// Rebuild the invocation this process was started for
    fn invocation(&self) -> Invocation {
        let invocation = Invocation::new(self.name());
        match self {
            Self::GetProject { id } | Self::DeleteProject { id } => invocation.arg(id),
            Self::SaveProject => match std::env::var(env::PROJECT_DATA) {
                Ok(data) => invocation.env(env::PROJECT_DATA, data),
                Err(_) => invocation,
            },
            _ => invocation,
        }
    }
}

fn database_path() -> Result<PathBuf> {
    match std::env::var_os(env::RESEARCH_DATABASE) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => default_database_path(),
    }
}

async fn run(command: Command) -> Result<Value> {
    match command {
        Command::GenerateResearch => {
            let settings = generate::GenerateSettings::from_env()?;
            let result = generate::run(settings).await?;
            tracing::info!(total_tokens = result.token_count.total, "generation finished");
            Ok(serde_json::to_value(result)?)
        }
        store_command => {
            let invocation = store_command.invocation();
            let db = Database::open(database_path()?)?;
            store::run(&db, &invocation)
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    match run(args.command).await {
        Ok(value) => println!("{}", value),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
