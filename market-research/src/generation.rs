//! Research generation through the `generate-research` capability

use std::sync::Arc;

use market_research_sdk::{env, names, Capability, Invocation, ResearchRequest, ResearchResult};
use tracing::info;

use crate::error::{Error, Result};
use crate::store::decode;

/// Invokes the generation capability with the caller's credential
#[derive(Clone)]
pub struct ResearchGenerator {
    capability: Arc<dyn Capability>,
}

impl ResearchGenerator {
    pub fn new(capability: Arc<dyn Capability>) -> Self {
        Self { capability }
    }

    /// Build the invocation for one generation run. The key travels as a secret env value.
    pub fn invocation(api_key: &str, request: &ResearchRequest) -> Result<Invocation> {
        let questions = serde_json::to_string(&request.research_questions)
            .map_err(|e| Error::malformed(names::GENERATE_RESEARCH, e))?;

        Ok(Invocation::new(names::GENERATE_RESEARCH)
            .secret_env(env::OPENAI_API_KEY, api_key)
            .env(env::TARGET_SEGMENT, &request.target_segment)
            .env(env::PRODUCT_CONCEPT, &request.product_concept)
            .env(env::RESEARCH_QUESTIONS, questions))
    }

    pub async fn generate(&self, api_key: &str, request: &ResearchRequest) -> Result<ResearchResult> {
        if api_key.trim().is_empty() {
            return Err(Error::MissingCredential);
        }
        request.validate()?;

        let output = self
            .capability
            .invoke(Self::invocation(api_key, request)?)
            .await?;

        let result: ResearchResult = decode(names::GENERATE_RESEARCH, output)?;
        result
            .validate()
            .map_err(|e| Error::malformed(names::GENERATE_RESEARCH, e))?;

        info!(
            personas = result.personas.len(),
            tokens = result.token_count.total,
            "research generated"
        );
        Ok(result)
    }
}
