//! Shared types for the synthetic market research service
//!
//! Both sides of the process boundary depend on this crate: the HTTP server that
//! invokes capabilities, and the `research-capability` executable that implements them.

// Re-export async trait for convenience
pub use async_trait::async_trait;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Store-assigned project identity
pub type ProjectId = i64;

/// Fixed capability names understood by the capability executable
pub mod names {
    pub const GENERATE_RESEARCH: &str = "generate-research";
    pub const LIST_PROJECTS: &str = "list-projects";
    pub const GET_PROJECT: &str = "get-project";
    pub const SAVE_PROJECT: &str = "save-project";
    pub const DELETE_PROJECT: &str = "delete-project";

    /// Every capability name, generation first
    pub const ALL: [&str; 5] = [
        GENERATE_RESEARCH,
        LIST_PROJECTS,
        GET_PROJECT,
        SAVE_PROJECT,
        DELETE_PROJECT,
    ];
}

/// Named environment values exchanged with capabilities
pub mod env {
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const TARGET_SEGMENT: &str = "TARGET_SEGMENT";
    pub const PRODUCT_CONCEPT: &str = "PRODUCT_CONCEPT";
    pub const RESEARCH_QUESTIONS: &str = "RESEARCH_QUESTIONS";
    pub const PROJECT_DATA: &str = "PROJECT_DATA";
    pub const RESEARCH_DATABASE: &str = "RESEARCH_DATABASE";
}

// ============================================================================
// Data model
// ============================================================================

/// Input rejected before it reaches a capability
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(&'static [&'static str]),
    #[error("{0} must not contain empty entries")]
    BlankEntry(&'static str),
    #[error("{field} is out of range: {reason}")]
    OutOfRange { field: String, reason: String },
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Inputs for one generation run. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub target_segment: String,
    pub product_concept: String,
    pub research_questions: Vec<String>,
}

impl ResearchRequest {
    pub const REQUIRED: &'static [&'static str] =
        &["target_segment", "product_concept", "research_questions"];

    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.target_segment)
            || is_blank(&self.product_concept)
            || self.research_questions.is_empty()
        {
            return Err(ValidationError::MissingFields(Self::REQUIRED));
        }
        if self.research_questions.iter().any(|q| is_blank(q)) {
            return Err(ValidationError::BlankEntry("research_questions"));
        }
        Ok(())
    }
}

/// One synthesized consumer profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub age: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub background: String,
    #[serde(default, alias = "interests and hobbies", alias = "hobbies")]
    pub interests: String,
    #[serde(default, alias = "values and motivations", alias = "core_values")]
    pub values: String,
    #[serde(
        default,
        alias = "pain points relevant to product research",
        alias = "pain points"
    )]
    pub pain_points: String,
}

/// Models answer with `"age": 34` as often as `"age": "34"`
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Integer(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

/// Pricing sensitivity summary
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub price_range: String,
}

/// Thematic analysis of a focus-group transcript
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Analysis {
    pub emotional_summary: String,
    /// Emotion label -> ratio in [0, 1]
    #[serde(default)]
    pub emotional_tone: BTreeMap<String, f64>,
    /// Theme label -> description
    #[serde(default)]
    pub theme_details: BTreeMap<String, String>,
    #[serde(default)]
    pub objections: Vec<String>,
    #[serde(default)]
    pub praise: Vec<String>,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl Analysis {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (label, ratio) in &self.emotional_tone {
            if !ratio.is_finite() || !(0.0..=1.0).contains(ratio) {
                return Err(ValidationError::OutOfRange {
                    field: format!("emotional_tone.{}", label),
                    reason: format!("{} is not a ratio in [0, 1]", ratio),
                });
            }
        }
        Ok(())
    }
}

/// Token usage per generation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenCount {
    pub personas: u64,
    pub focus_group: u64,
    pub analysis: u64,
    pub total: u64,
}

impl TokenCount {
    pub fn new(personas: u64, focus_group: u64, analysis: u64) -> Self {
        Self {
            personas,
            focus_group,
            analysis,
            total: personas + focus_group + analysis,
        }
    }

    /// Sum of the stage counts. `total` is reported as delivered and never recomputed.
    pub fn sum(&self) -> u64 {
        self.personas + self.focus_group + self.analysis
    }
}

/// Output of a generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub personas: Vec<Persona>,
    pub transcript: String,
    pub analysis: Analysis,
    pub token_count: TokenCount,
}

impl ResearchResult {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.analysis.validate()
    }
}

/// A persisted bundle of research inputs and outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub product_concept: String,
    pub target_segment: String,
    #[serde(default)]
    pub research_questions: Vec<String>,
    #[serde(default)]
    pub personas: Vec<Persona>,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub analysis: Option<Analysis>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Caller-supplied fields, for re-saving an edited copy as a new project
    pub fn to_new_project(&self) -> NewProject {
        NewProject {
            name: self.name.clone(),
            product_concept: self.product_concept.clone(),
            target_segment: self.target_segment.clone(),
            research_questions: self.research_questions.clone(),
            personas: self.personas.clone(),
            transcript: self.transcript.clone(),
            analysis: self.analysis.clone(),
        }
    }
}

/// Payload of a create-project call
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewProject {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product_concept: String,
    #[serde(default)]
    pub target_segment: String,
    #[serde(default)]
    pub research_questions: Vec<String>,
    #[serde(default)]
    pub personas: Vec<Persona>,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub analysis: Option<Analysis>,
}

impl NewProject {
    pub const REQUIRED: &'static [&'static str] = &["name", "product_concept", "target_segment"];

    /// Bundle a finished generation run under `name`
    pub fn from_research(
        name: impl Into<String>,
        request: &ResearchRequest,
        result: &ResearchResult,
    ) -> Self {
        Self {
            name: name.into(),
            product_concept: request.product_concept.clone(),
            target_segment: request.target_segment.clone(),
            research_questions: request.research_questions.clone(),
            personas: result.personas.clone(),
            transcript: result.transcript.clone(),
            analysis: Some(result.analysis.clone()),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.name) || is_blank(&self.product_concept) || is_blank(&self.target_segment)
        {
            return Err(ValidationError::MissingFields(Self::REQUIRED));
        }
        if let Some(analysis) = &self.analysis {
            analysis.validate()?;
        }
        Ok(())
    }
}

// ============================================================================
// Capability contract
// ============================================================================

/// One call to an external capability: name, positional args and named env values
#[derive(Clone, Default)]
pub struct Invocation {
    capability: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    secrets: BTreeSet<String>,
}

impl Invocation {
    pub const REDACTED: &'static str = "[REDACTED]";

    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Like [`Invocation::env`], but the value is scrubbed from logs and diagnostics
    pub fn secret_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.secrets.insert(key.clone());
        self.env.insert(key, value.into());
        self
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env_vars(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn env_keys(&self) -> Vec<&str> {
        self.env.keys().map(String::as_str).collect()
    }

    pub fn is_secret(&self, key: &str) -> bool {
        self.secrets.contains(key)
    }

    /// Replace every secret value occurring in `text`
    pub fn redact(&self, text: &str) -> String {
        let mut redacted = text.to_string();
        for key in &self.secrets {
            if let Some(value) = self.env.get(key) {
                if !value.is_empty() {
                    redacted = redacted.replace(value.as_str(), Self::REDACTED);
                }
            }
        }
        redacted
    }
}

// Env values carry credentials and payloads; only keys are shown.
impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("capability", &self.capability)
            .field("args", &self.args)
            .field("env_keys", &self.env_keys())
            .finish()
    }
}

/// What a capability printed on success
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityOutput {
    Json(serde_json::Value),
    /// Stdout that did not parse as JSON
    Text(String),
}

impl CapabilityOutput {
    pub fn from_stdout(stdout: &str) -> Self {
        match serde_json::from_str(stdout.trim()) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(stdout.to_string()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Text(_) => "text",
        }
    }

    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// Failure at the invocation boundary
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("unknown capability '{0}'")]
    Unknown(String),
    #[error("failed to start capability '{capability}': {source}")]
    Spawn {
        capability: String,
        #[source]
        source: std::io::Error,
    },
    #[error("capability '{capability}' exited with {}: {diagnostic}", describe_exit(.code))]
    Failed {
        capability: String,
        code: Option<i32>,
        diagnostic: String,
    },
    #[error("capability '{capability}' timed out after {timeout:?}")]
    TimedOut {
        capability: String,
        timeout: Duration,
    },
    #[error("i/o error while talking to capability '{capability}': {source}")]
    Io {
        capability: String,
        #[source]
        source: std::io::Error,
    },
    #[error("capability '{capability}' failed: {message}")]
    Internal { capability: String, message: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl CapabilityError {
    pub fn capability(&self) -> &str {
        match self {
            Self::Unknown(name) => name,
            Self::Spawn { capability, .. }
            | Self::Failed { capability, .. }
            | Self::TimedOut { capability, .. }
            | Self::Io { capability, .. }
            | Self::Internal { capability, .. } => capability,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { code, .. } => *code,
            _ => None,
        }
    }
}

/// Result type for capability operations
pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// An independently invoked unit of generation or persistence logic
///
/// The server only ever talks to capabilities through this trait; the
/// process-spawning adapter and in-process adapters are interchangeable.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Run one invocation to completion
    async fn invoke(&self, invocation: Invocation) -> CapabilityResult<CapabilityOutput>;

    /// Capability names this adapter can serve
    fn capabilities(&self) -> Vec<String>;
}

// ============================================================================
// Capability progress events
// ============================================================================

/// Stderr line prefix marking a structured progress event
pub const EVENT_PREFIX: &str = "__CAPABILITY_EVENT__:";

/// Structured progress events emitted by capabilities on stderr
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CapabilityEvent {
    StageStarted {
        stage: usize,
        name: String,
        total_stages: usize,
    },
    StageCompleted {
        stage: usize,
        name: String,
        tokens: Option<u64>,
    },
    StageFailed {
        stage: usize,
        name: String,
        error: String,
    },
}

impl CapabilityEvent {
    /// Emit this event to stderr for the invoking server
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            use std::io::Write;
            eprintln!("{}{}", EVENT_PREFIX, json);
            let _ = std::io::stderr().flush();
        }
    }

    /// Decode a stderr line; `None` for ordinary diagnostic lines
    pub fn parse_line(line: &str) -> Option<Self> {
        line.strip_prefix(EVENT_PREFIX)
            .and_then(|json| serde_json::from_str(json).ok())
    }
}

#[macro_export]
macro_rules! log_stage_start {
    ($stage:expr, $name:expr, $total:expr) => {
        $crate::CapabilityEvent::StageStarted {
            stage: $stage,
            name: $name.to_string(),
            total_stages: $total,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_stage_complete {
    ($stage:expr, $name:expr) => {
        $crate::CapabilityEvent::StageCompleted {
            stage: $stage,
            name: $name.to_string(),
            tokens: None,
        }
        .emit();
    };
    ($stage:expr, $name:expr, $tokens:expr) => {
        $crate::CapabilityEvent::StageCompleted {
            stage: $stage,
            name: $name.to_string(),
            tokens: Some($tokens),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_stage_failed {
    ($stage:expr, $name:expr, $error:expr) => {
        $crate::CapabilityEvent::StageFailed {
            stage: $stage,
            name: $name.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

// ============================================================================
// Console Logging Macros (for the command-line client)
// ============================================================================

/// Logs an informational message.
///
/// # Example
/// ```
/// use market_research_sdk::log_info;
/// log_info!("Generating research, this may take a minute...");
/// ```
///
/// Outputs:
/// ```text
/// ℹ Generating research, this may take a minute...
/// ```
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
///
/// # Example
/// ```
/// use market_research_sdk::log_warning;
/// log_warning!("Project 7 not found");
/// ```
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a success message.
///
/// # Example
/// ```
/// use market_research_sdk::log_success;
/// log_success!("Saved project 12");
/// ```
#[macro_export]
macro_rules! log_success {
    ($message:expr) => {
        println!("\x1b[32m✓ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[32m✓ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs the number of items found.
///
/// # Example
/// ```
/// use market_research_sdk::log_found;
/// log_found!(3, "saved projects");
/// ```
///
/// Outputs:
/// ```text
/// Found 3 saved projects
/// ```
#[macro_export]
macro_rules! log_found {
    ($count:expr, $item_type:expr) => {
        println!("\x1b[36mFound {} {}\x1b[0m", $count, $item_type);
    };
}

/// Logs token usage of a generation run.
///
/// # Example
/// ```
/// use market_research_sdk::{log_stats, TokenCount};
/// let tokens = TokenCount::new(1200, 3400, 900);
/// log_stats!(tokens);
/// ```
///
/// Outputs:
/// ```text
/// Tokens: 5500 total (personas 1200 / focus group 3400 / analysis 900)
/// ```
#[macro_export]
macro_rules! log_stats {
    ($tokens:expr) => {
        println!(
            "\x1b[2mTokens: {} total (personas {} / focus group {} / analysis {})\x1b[0m",
            $tokens.total, $tokens.personas, $tokens.focus_group, $tokens.analysis
        );
    };
}
