//! Stage 1: persona generation

use anyhow::{bail, Context, Result};
use market_research_sdk::Persona;
use serde_json::Value;
use tracing::info;

use super::openai::{ChatMessage, OpenAiClient};

const SYSTEM_PROMPT: &str = r#"You are an expert market research consultant with deep understanding of consumer demographics,
psychographics, and behavior. Your task is to create realistic, diverse, and detailed personas
based on a target market segment description.

Each persona should feel like a real person with consistent traits, backgrounds, and believable characteristics.

Respond with a JSON object of the form {"personas": [...]} where every persona has exactly these string fields:
- name
- age
- occupation
- background (education, family situation, media habits, spending habits)
- interests (interests and hobbies)
- values (core values and motivations)
- pain_points (pain points relevant to the product/service category)"#;

fn user_prompt(target_segment: &str, count: usize) -> String {
    format!(
        r#"Generate {count} detailed personas that represent the target segment described below:

Target segment: {target_segment}

Ensure the personas:
- Are demographically and psychographically appropriate for the segment
- Have diverse backgrounds, needs, and preferences while still fitting the segment
- Include realistic details that would impact their purchasing decisions
- Have consistent and coherent characteristics
- Represent different perspectives within the segment"#
    )
}

/// Generate `count` personas for the segment, returning them with the tokens used
pub async fn generate_personas(
    client: &OpenAiClient,
    target_segment: &str,
    count: usize,
) -> Result<(Vec<Persona>, u64)> {
    info!(count, "generating personas");

    let messages = [
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_prompt(target_segment, count)),
    ];
    let completion = client.complete(&messages, 0.8, true).await?;
    let personas = parse_personas(completion.json()?)?;

    info!(
        personas = personas.len(),
        tokens = completion.tokens,
        "generated personas"
    );
    Ok((personas, completion.tokens))
}

/// Accept a bare array, `{"personas": [...]}`, or an object with a single array member
pub fn parse_personas(value: Value) -> Result<Vec<Persona>> {
    let list = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => map
            .remove("personas")
            .into_iter()
            .chain(map.into_iter().map(|(_, v)| v))
            .find_map(|v| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .context("Persona response contains no list of personas")?,
        _ => bail!("Persona response is not a JSON object or array"),
    };

    let personas = list
        .into_iter()
        .map(serde_json::from_value::<Persona>)
        .collect::<Result<Vec<_>, _>>()
        .context("Persona response has an unexpected shape")?;

    if personas.is_empty() {
        bail!("Persona response contains no personas");
    }
    Ok(personas)
}
