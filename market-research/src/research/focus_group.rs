//! Stage 2: focus group simulation

use anyhow::Result;
use market_research_sdk::Persona;
use tracing::info;

use super::openai::{ChatMessage, OpenAiClient};

const SYSTEM_PROMPT: &str = r#"You are an expert market research moderator who can simulate realistic focus group discussions.
Your task is to create a transcript of a focus group discussion between multiple personas discussing
a product/service concept. The discussion should follow a natural flow and address specific research questions.

For each research question:
1. Introduce the question as the moderator
2. Show how each persona responds, with their name as a prefix
3. Include follow-up questions and natural back-and-forth discussion between personas
4. Make sure personas stay true to their backgrounds, values, and communication styles
5. Include realistic group dynamics like agreement, disagreement, building on others' points

The transcript should be formatted clearly with timestamps, speaker names, and organized by discussion topics.
Include an introduction and conclusion from the moderator. Make the discussion feel authentic and insightful."#;

/// Numbered list, one question per line
pub fn format_questions(questions: &[String]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {}", i + 1, q))
        .collect::<Vec<_>>()
        .join("\n")
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Persona sheet handed to the moderator
pub fn format_personas(personas: &[Persona]) -> String {
    let mut text = String::new();
    for (i, persona) in personas.iter().enumerate() {
        text.push_str(&format!(
            "Persona {}: {}, {}, {}\n",
            i + 1,
            persona.name,
            or_na(&persona.age),
            or_na(&persona.occupation)
        ));
        text.push_str(&format!("Background: {}\n", or_na(&persona.background)));
        text.push_str(&format!("Interests: {}\n", or_na(&persona.interests)));
        text.push_str(&format!("Values: {}\n", or_na(&persona.values)));
        text.push_str(&format!("Pain Points: {}\n\n", or_na(&persona.pain_points)));
    }
    text
}

fn user_prompt(personas: &[Persona], product_concept: &str, questions: &[String]) -> String {
    format!(
        r#"Simulate a focus group discussion between the following personas discussing this product/service concept:

PRODUCT/SERVICE CONCEPT:
{product_concept}

RESEARCH QUESTIONS TO ADDRESS:
{questions}

PERSONAS:
{personas}
Create a realistic, detailed focus group transcript where these personas discuss the product/service concept
and address all the research questions. Ensure each persona speaks in a way consistent with their background,
values, and communication style. Include natural group dynamics and a mix of positive and negative feedback."#,
        questions = format_questions(questions),
        personas = format_personas(personas),
    )
}

/// Run the simulated discussion, returning the transcript with the tokens used
pub async fn simulate_focus_group(
    client: &OpenAiClient,
    personas: &[Persona],
    product_concept: &str,
    questions: &[String],
) -> Result<(String, u64)> {
    info!(personas = personas.len(), "simulating focus group");

    let messages = [
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_prompt(personas, product_concept, questions)),
    ];
    let completion = client.complete(&messages, 0.8, false).await?;

    info!(tokens = completion.tokens, "generated focus group transcript");
    Ok((completion.content, completion.tokens))
}
