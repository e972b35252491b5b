//! Three-stage generation pipeline: personas, focus group, analysis
//!
//! Each stage emits `__CAPABILITY_EVENT__` progress lines on stderr so the invoking
//! server can log progress while the capability runs.

use anyhow::Result;
use market_research_sdk::{
    log_stage_complete, log_stage_failed, log_stage_start, ResearchRequest, ResearchResult,
    TokenCount,
};

use super::analysis::analyze_transcript;
use super::focus_group::simulate_focus_group;
use super::openai::OpenAiClient;
use super::personas::generate_personas;

pub const DEFAULT_PERSONA_COUNT: usize = 5;

const TOTAL_STAGES: usize = 3;

pub struct ResearchPipeline {
    client: OpenAiClient,
    persona_count: usize,
}

impl ResearchPipeline {
    pub fn new(client: OpenAiClient) -> Self {
        Self {
            client,
            persona_count: DEFAULT_PERSONA_COUNT,
        }
    }

    pub fn persona_count(mut self, count: usize) -> Self {
        self.persona_count = count.max(1);
        self
    }

    pub async fn run(&self, request: &ResearchRequest) -> Result<ResearchResult> {
        request.validate()?;

        let (personas, persona_tokens) = stage(
            1,
            "Personas",
            generate_personas(&self.client, &request.target_segment, self.persona_count),
        )
        .await?;

        let (transcript, focus_group_tokens) = stage(
            2,
            "Focus group",
            simulate_focus_group(
                &self.client,
                &personas,
                &request.product_concept,
                &request.research_questions,
            ),
        )
        .await?;

        let (analysis, analysis_tokens) = stage(
            3,
            "Analysis",
            analyze_transcript(
                &self.client,
                &transcript,
                &request.product_concept,
                &request.research_questions,
            ),
        )
        .await?;

        Ok(ResearchResult {
            personas,
            transcript,
            analysis,
            token_count: TokenCount::new(persona_tokens, focus_group_tokens, analysis_tokens),
        })
    }
}

/// Wrap one stage in start/complete/failed events
async fn stage<T>(
    number: usize,
    name: &str,
    work: impl std::future::Future<Output = Result<(T, u64)>>,
) -> Result<(T, u64)> {
    log_stage_start!(number, name, TOTAL_STAGES);
    match work.await {
        Ok((value, tokens)) => {
            log_stage_complete!(number, name, tokens);
            Ok((value, tokens))
        }
        Err(e) => {
            log_stage_failed!(number, name, format!("{:#}", e));
            Err(e)
        }
    }
}
