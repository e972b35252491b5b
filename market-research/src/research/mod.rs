//! Research generation module
//!
//! The generation side of the `generate-research` capability: an OpenAI chat client
//! and the three stages (persona generation, focus group simulation, transcript
//! analysis) run in sequence by [`ResearchPipeline`].

pub mod analysis;
pub mod focus_group;
pub mod openai;
pub mod personas;
pub mod pipeline;

// Re-export commonly used types
pub use openai::{OpenAiClient, OpenAiConfig};
pub use pipeline::{ResearchPipeline, DEFAULT_PERSONA_COUNT};
