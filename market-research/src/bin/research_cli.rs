//! Command-line client for the research API
//!
//! ```text
//! research-cli health
//! research-cli generate --concept "Flashcard app" --segment "Students" \
//!     --question "Would you pay $5/month?" --save "Flashcards v1" --output ./results
//! research-cli projects list
//! research-cli projects show 3 --output ./results
//! research-cli projects delete 3
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use market_research::client::{
    ApiKeyStore, ClientConfig, ResearchClient, ResearchSession, DEFAULT_API_BASE_URL,
};
use market_research_sdk::{
    log_found, log_info, log_stats, log_success, log_warning, Project, ProjectId, ResearchResult,
};

#[derive(Parser, Debug)]
#[command(name = "research-cli", version, about = "Synthetic market research client")]
struct Args {
    /// API server origin
    #[arg(long, env = "RESEARCH_API_URL", default_value = DEFAULT_API_BASE_URL)]
    api_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the API server is up
    Health,
    /// Generate personas, a focus group and an analysis
    Generate {
        /// OpenAI API key, forwarded to the server as X-API-KEY (defaults to the remembered key)
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        /// Remember the API key for later runs
        #[arg(long)]
        remember_key: bool,
        #[arg(long)]
        concept: String,
        #[arg(long)]
        segment: String,
        /// Research question (repeatable)
        #[arg(long = "question", required = true)]
        questions: Vec<String>,
        /// Save the result as a project with this name
        #[arg(long)]
        save: Option<String>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
        /// Write the results JSON and the transcript into this directory
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Manage saved projects
    Projects {
        #[command(subcommand)]
        command: ProjectsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectsCommand {
    List,
    Show {
        id: ProjectId,
        /// Write the project's results JSON and transcript into this directory
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    Delete { id: ProjectId },
}

fn print_result(result: &ResearchResult) {
    log_found!(result.personas.len(), "personas");
    for persona in &result.personas {
        println!("  • {} ({}), {}", persona.name, persona.age, persona.occupation);
    }

    println!("\nEmotional summary:\n  {}", result.analysis.emotional_summary);
    for (tone, score) in &result.analysis.emotional_tone {
        println!("  {:<12} {:.2}", tone, score);
    }

    if !result.analysis.recommendations.is_empty() {
        println!("\nRecommendations:");
        for recommendation in &result.analysis.recommendations {
            println!("  • {}", recommendation);
        }
    }
    log_stats!(result.token_count);
}

fn write_exports(session: &ResearchSession, dir: &Path) -> Result<()> {
    for path in session.write_exports(dir)? {
        log_success!("Wrote {}", path.display());
    }
    Ok(())
}

/// The key given on the command line, else the remembered one
fn resolve_api_key(given: Option<String>, remember: bool) -> Result<Option<String>> {
    let store = ApiKeyStore::default_location();
    match given {
        Some(key) => {
            if remember {
                match &store {
                    Some(store) => store.save(&key)?,
                    None => {
                        log_warning!("No config directory; the API key was not remembered");
                    }
                }
            }
            Ok(Some(key))
        }
        None => Ok(store.and_then(|store| store.load())),
    }
}

fn print_project(project: &Project) {
    println!(
        "#{} {} [{}]",
        project.id,
        project.name,
        project.created_at.format("%Y-%m-%d %H:%M")
    );
    println!("  Concept: {}", project.product_concept);
    println!("  Segment: {}", project.target_segment);
    for question in &project.research_questions {
        println!("  ? {}", question);
    }
}

async fn run(args: Args) -> Result<()> {
    let client = ResearchClient::new(ClientConfig {
        api_base_url: args.api_url,
    });

    match args.command {
        Command::Health => {
            let health = client.health().await?;
            log_success!("{} (version {})", health.message, health.version);
        }
        Command::Generate {
            api_key,
            remember_key,
            concept,
            segment,
            questions,
            save,
            json,
            output,
        } => {
            let mut session = ResearchSession::new(client);
            if let Some(key) = resolve_api_key(api_key, remember_key)? {
                session.client_mut().set_api_key(key);
            }
            session.form.product_concept = concept;
            session.form.target_segment = segment;
            session.form.research_questions = questions;

            log_info!("Generating research... This may take a minute");
            let result = session.generate().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(result)?);
            } else {
                print_result(result);
            }

            if let Some(dir) = output {
                write_exports(&session, &dir)?;
            }

            if let Some(name) = save {
                session.form.project_name = name;
                let id = session.save().await?;
                log_success!("Project saved successfully! Project ID: {}", id);
            }
        }
        Command::Projects { command } => match command {
            ProjectsCommand::List => {
                let projects = client.list_projects().await?;
                if projects.is_empty() {
                    log_warning!("No saved projects");
                } else {
                    log_found!(projects.len(), "saved projects");
                    for project in &projects {
                        print_project(project);
                    }
                }
            }
            ProjectsCommand::Show { id, output } => {
                let mut session = ResearchSession::new(client);
                let project = session.load_project(id).await?;
                print_project(project);
                match &project.analysis {
                    Some(analysis) => println!("\n{}", analysis.emotional_summary),
                    None => {
                        log_warning!("Project has no analysis");
                    }
                }

                if let Some(dir) = output {
                    write_exports(&session, &dir)?;
                }
            }
            ProjectsCommand::Delete { id } => {
                let message = client.delete_project(id).await?;
                log_success!(message);
            }
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
