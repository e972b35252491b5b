//! In-process store adapter
//!
//! Serves the four store capabilities from a database connection owned by the
//! server, with no child process. Queries run on the blocking pool, one at a time.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use market_research_sdk::{
    async_trait, names, Capability, CapabilityError, CapabilityOutput, CapabilityResult,
    Invocation,
};

use crate::capability::store;
use crate::database::Database;

#[derive(Clone)]
pub struct InProcessStore {
    db: Arc<Mutex<Database>>,
}

impl InProcessStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open (creating if needed) the database at `path`
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        let db = Database::new_in_memory()?;
        db.initialize_schema()?;
        Ok(Self::new(db))
    }
}

#[async_trait]
impl Capability for InProcessStore {
    async fn invoke(&self, invocation: Invocation) -> CapabilityResult<CapabilityOutput> {
        let capability = invocation.capability().to_string();
        if !store::is_store_capability(&capability) {
            return Err(CapabilityError::Unknown(capability));
        }

        let db = self.db.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let db = db
                .lock()
                .map_err(|_| anyhow!("project database lock poisoned"))?;
            store::run(&db, &invocation)
        })
        .await;

        match outcome {
            Ok(Ok(value)) => Ok(CapabilityOutput::Json(value)),
            Ok(Err(e)) => Err(CapabilityError::Internal {
                capability,
                message: format!("{:#}", e),
            }),
            Err(e) => Err(CapabilityError::Internal {
                capability,
                message: e.to_string(),
            }),
        }
    }

    fn capabilities(&self) -> Vec<String> {
        [
            names::LIST_PROJECTS,
            names::GET_PROJECT,
            names::SAVE_PROJECT,
            names::DELETE_PROJECT,
        ]
        .iter()
        .map(|name| name.to_string())
        .collect()
    }
}
