//! The `generate-research` capability: environment in, `ResearchResult` out

use std::time::Duration;

use anyhow::{bail, Context, Result};
use market_research_sdk::{env, ResearchRequest, ResearchResult};

use crate::research::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::research::{OpenAiClient, OpenAiConfig, ResearchPipeline, DEFAULT_PERSONA_COUNT};

pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const PERSONA_COUNT: &str = "PERSONA_COUNT";

/// Everything one generation run needs, read from named values
#[derive(Clone)]
pub struct GenerateSettings {
    pub openai: OpenAiConfig,
    pub persona_count: usize,
    pub request: ResearchRequest,
}

impl GenerateSettings {
    /// Read settings through `lookup` (the process environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = present(env::OPENAI_API_KEY).context("OPENAI_API_KEY not provided")?;
        let target_segment =
            present(env::TARGET_SEGMENT).context("TARGET_SEGMENT not provided")?;
        let product_concept =
            present(env::PRODUCT_CONCEPT).context("PRODUCT_CONCEPT not provided")?;

        let research_questions: Vec<String> = match present(env::RESEARCH_QUESTIONS) {
            Some(raw) => serde_json::from_str(&raw)
                .context("RESEARCH_QUESTIONS must be a JSON array of strings")?,
            None => Vec::new(),
        };
        if research_questions.is_empty() {
            bail!("RESEARCH_QUESTIONS not provided or empty");
        }

        let persona_count = match present(PERSONA_COUNT) {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("PERSONA_COUNT must be a positive integer, got {}", raw))?,
            None => DEFAULT_PERSONA_COUNT,
        };

        let openai = OpenAiConfig {
            api_key,
            base_url: present(OPENAI_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: present(OPENAI_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(300),
        };

        let request = ResearchRequest {
            target_segment,
            product_concept,
            research_questions,
        };
        request.validate()?;

        Ok(Self {
            openai,
            persona_count,
            request,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Run the full pipeline for `settings`
pub async fn run(settings: GenerateSettings) -> Result<ResearchResult> {
    let client = OpenAiClient::new(settings.openai)?;
    ResearchPipeline::new(client)
        .persona_count(settings.persona_count)
        .run(&settings.request)
        .await
}
