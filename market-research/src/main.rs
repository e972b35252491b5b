use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use market_research::api::{self, AppState};
use market_research::config::{ServerConfig, StoreMode};
use market_research::generation::ResearchGenerator;
use market_research::local::InProcessStore;
use market_research::runtime::ProcessCapability;
use market_research::static_files;
use market_research::store::ProjectStore;
use market_research_sdk::Capability;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn build_state(config: &ServerConfig) -> Result<AppState> {
    let process: Arc<dyn Capability> = Arc::new(ProcessCapability::new(config.build_registry()?));

    let store = match config.store_mode {
        StoreMode::Process => {
            let store = ProjectStore::new(process.clone());
            match &config.database {
                Some(path) => store.with_database(path.clone()),
                None => store,
            }
        }
        StoreMode::InProcess => {
            let path = config.database_path()?;
            info!(database = %path.display(), "serving store capabilities in-process");
            ProjectStore::new(Arc::new(InProcessStore::open(path)?))
        }
    };

    Ok(AppState {
        store,
        generator: ResearchGenerator::new(process),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    let state = build_state(&config)?;

    let api_listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind API listener on {}", config.listen))?;
    info!(listen = %config.listen, "research API listening");
    let api_server = async {
        axum::serve(api_listener, api::router(state))
            .await
            .context("API server failed")
    };

    match &config.static_dir {
        Some(root) => {
            let static_listener = TcpListener::bind(config.static_listen)
                .await
                .with_context(|| {
                    format!("failed to bind static listener on {}", config.static_listen)
                })?;
            info!(
                listen = %config.static_listen,
                root = %root.display(),
                "static file server listening"
            );
            let static_server = async {
                axum::serve(static_listener, static_files::router(root.clone()))
                    .await
                    .context("static file server failed")
            };
            tokio::try_join!(api_server, static_server)?;
        }
        None => api_server.await?,
    }

    Ok(())
}
