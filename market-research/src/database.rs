//! SQLite database for persisted research projects
//!
//! This module backs the four store capabilities (`list-projects`, `get-project`,
//! `save-project`, `delete-project`). The same file may be opened by several
//! capability processes at once, so the connection runs in WAL mode with a busy timeout.
//!
//! # Database Schema
//!
//! The database consists of 4 tables:
//!
//! 1. **projects** - Core project fields (name, concept, segment, transcript, analysis JSON)
//! 2. **project_questions** - Ordered research questions per project
//! 3. **project_personas** - Ordered persona JSON documents per project
//! 4. **schema_version** - Database schema version for migrations
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use market_research::database::Database;
//! use market_research_sdk::NewProject;
//!
//! # fn main() -> anyhow::Result<()> {
//! let db = Database::new("/tmp/projects.db".into())?;
//! db.initialize_schema()?;
//!
//! let id = db.insert_project(&NewProject {
//!     name: "Flashcards".to_string(),
//!     product_concept: "Spaced repetition flashcard app".to_string(),
//!     target_segment: "University students".to_string(),
//!     ..Default::default()
//! })?;
//!
//! let project = db.get_project(id)?;
//! assert!(project.is_some());
//! assert!(db.delete_project(id)?);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use market_research_sdk::{Analysis, NewProject, Persona, Project, ProjectId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::time::Duration;

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database wrapper for project persistence
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database connection at the specified path
    pub fn new(path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;

        // Enable WAL mode for concurrent capability processes
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(Self { conn })
    }

    /// Create an in-memory database (tests and throwaway servers)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    /// Open the database at `path` and bring its schema up to date
    pub fn open(path: PathBuf) -> Result<Self> {
        let db = Self::new(path)?;
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema with all tables and indexes
    pub fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                product_concept TEXT NOT NULL,
                target_segment TEXT NOT NULL,
                transcript TEXT NOT NULL DEFAULT '',

                -- Analysis document as JSON, NULL when absent
                analysis TEXT,

                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS project_questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                question TEXT NOT NULL,

                FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_questions_project_id
            ON project_questions(project_id, position);

            CREATE TABLE IF NOT EXISTS project_personas (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                persona_data TEXT NOT NULL,

                FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_personas_project_id
            ON project_personas(project_id, position);

            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            INSERT OR IGNORE INTO schema_version (version) VALUES (1);
            "#,
        )?;

        // Run migrations
        self.migrate_to_v2()?;

        Ok(())
    }

    /// Migrate database schema to version 2 (listing index)
    pub fn migrate_to_v2(&self) -> Result<()> {
        let current = self.get_schema_version()?;

        if current < 2 {
            self.conn.execute_batch(
                r#"
                CREATE INDEX IF NOT EXISTS idx_projects_created_at
                ON projects(created_at DESC, id DESC);

                INSERT OR IGNORE INTO schema_version (version) VALUES (2);
                "#,
            )?;
        }

        Ok(())
    }

    /// Get current schema version
    pub fn get_schema_version(&self) -> Result<i32> {
        let version: Option<i32> =
            self.conn
                .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                    row.get(0)
                })?;
        Ok(version.unwrap_or(0))
    }

    /// Insert a new project with its questions and personas, returning the assigned id
    pub fn insert_project(&self, project: &NewProject) -> Result<ProjectId> {
        let analysis = project
            .analysis
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize analysis")?;
        let created_at = format_timestamp(&Utc::now());

        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO projects (
                name, product_concept, target_segment, transcript, analysis, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                project.name,
                project.product_concept,
                project.target_segment,
                project.transcript,
                analysis,
                created_at,
            ],
        )?;
        let id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO project_questions (project_id, position, question) VALUES (?1, ?2, ?3)",
            )?;
            for (position, question) in project.research_questions.iter().enumerate() {
                stmt.execute(params![id, position, question])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO project_personas (project_id, position, persona_data) VALUES (?1, ?2, ?3)",
            )?;
            for (position, persona) in project.personas.iter().enumerate() {
                stmt.execute(params![id, position, serde_json::to_string(persona)?])?;
            }
        }

        tx.commit()?;
        Ok(id)
    }

    /// Get a single project by ID
    pub fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        let project = self
            .conn
            .query_row(
                r#"
                SELECT id, name, product_concept, target_segment, transcript, analysis, created_at
                FROM projects
                WHERE id = ?1
                "#,
                params![id],
                map_project_row,
            )
            .optional()?;

        match project {
            Some(project) => Ok(Some(self.load_children(project)?)),
            None => Ok(None),
        }
    }

    /// List all projects, newest first
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, product_concept, target_segment, transcript, analysis, created_at
            FROM projects
            ORDER BY created_at DESC, id DESC
            "#,
        )?;

        let projects = stmt
            .query_map([], map_project_row)?
            .collect::<Result<Vec<_>, _>>()?;

        projects
            .into_iter()
            .map(|project| self.load_children(project))
            .collect()
    }

    /// Delete a project by ID. Returns false when no such project existed.
    pub fn delete_project(&self, id: ProjectId) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Number of stored projects
    pub fn count_projects(&self) -> Result<usize> {
        let count: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?;
        Ok(count)
    }

    fn load_children(&self, mut project: Project) -> Result<Project> {
        let mut stmt = self.conn.prepare(
            "SELECT question FROM project_questions WHERE project_id = ?1 ORDER BY position ASC",
        )?;
        project.research_questions = stmt
            .query_map(params![project.id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT persona_data FROM project_personas WHERE project_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt
            .query_map(params![project.id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        project.personas = rows
            .iter()
            .map(|data| serde_json::from_str::<Persona>(data))
            .collect::<Result<_, _>>()
            .with_context(|| format!("Corrupt persona data for project {}", project.id))?;

        Ok(project)
    }
}

// Fixed-width UTC timestamps keep lexical and chronological order identical
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Map a database row to a Project without its questions and personas
fn map_project_row(row: &Row) -> rusqlite::Result<Project> {
    let id: ProjectId = row.get(0)?;
    let name: String = row.get(1)?;
    let product_concept: String = row.get(2)?;
    let target_segment: String = row.get(3)?;
    let transcript: String = row.get(4)?;
    let analysis_str: Option<String> = row.get(5)?;
    let created_at_str: String = row.get(6)?;

    let analysis = analysis_str
        .map(|s| serde_json::from_str::<Analysis>(&s))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Utc);

    Ok(Project {
        id,
        name,
        product_concept,
        target_segment,
        research_questions: Vec::new(),
        personas: Vec::new(),
        transcript,
        analysis,
        created_at,
    })
}
