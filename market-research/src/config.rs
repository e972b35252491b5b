//! Server configuration
//!
//! Command-line flags with environment fallbacks, plus an optional YAML file that
//! adds or overrides capability specs:
//!
//! ```yaml
//! capabilities:
//!   generate-research:
//!     program: /usr/local/bin/research-capability
//!     args: [generate-research]
//!     env:
//!       OPENAI_MODEL: gpt-4o-mini
//!     timeout_secs: 900
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use market_research_sdk::names;
use serde::Deserialize;
use tracing::{info, warn};

use crate::discovery::find_capability_binary;
use crate::runtime::{CapabilityRegistry, CapabilitySpec};

/// Where store capabilities run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreMode {
    /// Spawn the capability executable for every store call
    Process,
    /// Serve store calls from the server's own database connection
    InProcess,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "market-research",
    version,
    about = "Synthetic market research API server"
)]
pub struct ServerConfig {
    /// Address the API listens on
    #[arg(long, env = "RESEARCH_LISTEN", default_value = "0.0.0.0:5001")]
    pub listen: SocketAddr,

    /// Directory of the single-page client; enables the static file server
    #[arg(long, env = "RESEARCH_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Address the static file server listens on
    #[arg(long, env = "RESEARCH_STATIC_LISTEN", default_value = "0.0.0.0:5000")]
    pub static_listen: SocketAddr,

    /// SQLite database for projects (defaults to the user data directory)
    #[arg(long, env = "RESEARCH_DATABASE")]
    pub database: Option<PathBuf>,

    /// Path to the research-capability executable (discovered when omitted)
    #[arg(long, env = "RESEARCH_CAPABILITY_BIN")]
    pub capability_bin: Option<PathBuf>,

    /// YAML file adding or overriding capability specs
    #[arg(long, env = "RESEARCH_CAPABILITIES")]
    pub capabilities_file: Option<PathBuf>,

    /// Where store capabilities run
    #[arg(long, env = "RESEARCH_STORE_MODE", value_enum, default_value = "process")]
    pub store_mode: StoreMode,

    /// Timeout for generate-research, in seconds
    #[arg(long, env = "RESEARCH_GENERATE_TIMEOUT", default_value_t = 600)]
    pub generate_timeout_secs: u64,

    /// Timeout for store capabilities, in seconds
    #[arg(long, env = "RESEARCH_STORE_TIMEOUT", default_value_t = 30)]
    pub store_timeout_secs: u64,
}

/// One entry of the capability file
#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityEntry {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub timeout_secs: Option<u64>,
}

impl From<CapabilityEntry> for CapabilitySpec {
    fn from(entry: CapabilityEntry) -> Self {
        Self {
            program: entry.program,
            args: entry.args,
            env: entry.env,
            timeout: entry.timeout_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityFile {
    #[serde(default)]
    pub capabilities: BTreeMap<String, CapabilityEntry>,
}

impl CapabilityFile {
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Invalid capability file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read capability file {}", path.display()))?;
        Self::parse(&yaml)
    }
}

/// `<data dir>/projects.db`, shared by the server and the capability executable
pub fn default_database_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "market-research")
        .context("Could not determine a data directory; set RESEARCH_DATABASE")?;
    Ok(dirs.data_dir().join("projects.db"))
}

impl ServerConfig {
    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Database path for in-process mode: configured or default
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => default_database_path(),
        }
    }

    /// Assemble the capability registry: bundled executable first, file entries on top
    pub fn build_registry(&self) -> Result<CapabilityRegistry> {
        let binary = self.capability_bin.clone().or_else(find_capability_binary);

        let mut registry = match &binary {
            Some(program) => {
                info!(program = %program.display(), "using capability executable");
                CapabilityRegistry::for_binary(
                    program,
                    self.generate_timeout(),
                    self.store_timeout(),
                )
            }
            None => CapabilityRegistry::new(),
        };

        if let Some(path) = &self.capabilities_file {
            let file = CapabilityFile::load(path)?;
            for (name, entry) in file.capabilities {
                info!(capability = %name, program = %entry.program.display(), "capability override");
                registry.register(name, entry.into());
            }
        }

        for name in names::ALL {
            if registry.get(name).is_none() {
                warn!(
                    capability = name,
                    "no executable for capability; set RESEARCH_CAPABILITY_BIN or add it to the capability file"
                );
            }
        }

        Ok(registry)
    }
}
