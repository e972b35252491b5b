//! Stage 3: transcript analysis

use anyhow::{Context, Result};
use market_research_sdk::Analysis;
use tracing::info;

use super::focus_group::format_questions;
use super::openai::{ChatMessage, OpenAiClient};

const SYSTEM_PROMPT: &str = r#"You are an expert market research analyst who specializes in analyzing focus group transcripts.
Your task is to analyze a focus group transcript and extract key insights about the discussed product/service concept.

Respond with a JSON object with exactly these keys:
- "emotional_summary": string, a brief summary of the overall emotional response
- "emotional_tone": object mapping emotion labels (surprise, interest, confusion, enthusiasm, skepticism, ...) to numbers from 0.0 to 1.0
- "theme_details": object mapping 3-5 key theme labels to a detailed explanation of each theme
- "objections": array of strings, the main objections or concerns raised
- "praise": array of strings, the main positive points praised
- "pricing": object with "summary" (price sensitivity) and "price_range" (suggested range, or "" if never discussed)
- "recommendations": array of 3-5 concrete recommendations for improving the concept"#;

fn user_prompt(transcript: &str, product_concept: &str, questions: &[String]) -> String {
    format!(
        r#"Analyze this focus group transcript about the following product/service concept:

PRODUCT/SERVICE CONCEPT:
{product_concept}

RESEARCH QUESTIONS DISCUSSED:
{questions}

TRANSCRIPT:
{transcript}

Please provide a comprehensive analysis following the structure in your instructions.
Focus especially on extracting actionable insights and clear recommendations."#,
        questions = format_questions(questions),
    )
}

/// Models occasionally answer in percent; bring such values back into [0, 1]
pub fn normalize_tone(analysis: &mut Analysis) {
    for ratio in analysis.emotional_tone.values_mut() {
        if *ratio > 1.0 && *ratio <= 100.0 {
            *ratio /= 100.0;
        }
    }
}

/// Analyze the transcript, returning the analysis with the tokens used
pub async fn analyze_transcript(
    client: &OpenAiClient,
    transcript: &str,
    product_concept: &str,
    questions: &[String],
) -> Result<(Analysis, u64)> {
    info!("analyzing focus group transcript");

    let messages = [
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_prompt(transcript, product_concept, questions)),
    ];
    let completion = client.complete(&messages, 0.5, true).await?;

    let mut analysis: Analysis = completion
        .json()
        .context("Analysis response has an unexpected shape")?;
    normalize_tone(&mut analysis);
    analysis.validate()?;

    info!(tokens = completion.tokens, "completed transcript analysis");
    Ok((analysis, completion.tokens))
}
