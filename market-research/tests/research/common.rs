//! Common utilities for research tests

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use market_research::research::{OpenAiClient, OpenAiConfig};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const PERSONA_TOKENS: u64 = 120;
pub const FOCUS_GROUP_TOKENS: u64 = 340;
pub const ANALYSIS_TOKENS: u64 = 90;

pub const TRANSCRIPT: &str = "Moderator: Would you use a meal kit on weeknights?\n\
Dana: Only if prep takes under twenty minutes.\n\
Luis: The price matters more to me than the recipes.";

/// A chat-completions request as the mock received it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub authorization: String,
    pub body: Value,
}

impl Recorded {
    pub fn user_prompt(&self) -> &str {
        self.body["messages"][1]["content"].as_str().unwrap_or_default()
    }

    pub fn temperature(&self) -> f64 {
        self.body["temperature"].as_f64().unwrap_or_default()
    }

    pub fn json_mode(&self) -> bool {
        self.body["response_format"]["type"] == "json_object"
    }
}

#[derive(Clone, Default)]
pub struct MockOpenAi {
    requests: Arc<Mutex<Vec<Recorded>>>,
    reject_key: bool,
}

impl MockOpenAi {
    /// Answers every request with 401, the way OpenAI treats a bad key
    pub fn rejecting() -> Self {
        Self {
            reject_key: true,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Serve on an ephemeral port; returns the `/v1` base URL
    pub async fn spawn(&self) -> String {
        let router = Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(self.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    pub async fn client(&self) -> OpenAiClient {
        let mut config = OpenAiConfig::new("sk-test");
        config.base_url = self.spawn().await;
        OpenAiClient::new(config).unwrap()
    }
}

fn completion(content: String, tokens: u64) -> Response {
    Json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop",
        }],
        "usage": {"total_tokens": tokens},
    }))
    .into_response()
}

async fn completions(
    State(mock): State<MockOpenAi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let recorded = Recorded {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        body,
    };
    mock.requests.lock().unwrap().push(recorded.clone());

    if mock.reject_key {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": {
                    "message": "Incorrect API key provided",
                    "type": "invalid_request_error",
                }
            })),
        )
            .into_response();
    }

    if !recorded.json_mode() {
        return completion(TRANSCRIPT.to_string(), FOCUS_GROUP_TOKENS);
    }

    if recorded.temperature() > 0.6 {
        let personas = json!({
            "personas": [
                {
                    "name": "Dana Whitfield",
                    "age": 38,
                    "occupation": "Nurse",
                    "background": "Two kids, works night shifts",
                    "interests and hobbies": "Gardening",
                    "values": "Family time",
                    "pain points": "No time to plan meals",
                },
                {
                    "name": "Luis Ortega",
                    "age": "44",
                    "occupation": "Accountant",
                    "background": "Single father",
                    "interests": "Football",
                    "core_values": "Thrift",
                    "pain_points": "Grocery bills",
                }
            ]
        });
        return completion(personas.to_string(), PERSONA_TOKENS);
    }

    let analysis = json!({
        "emotional_summary": "Interested but price-sensitive",
        "emotional_tone": {"interest": 65, "skepticism": 0.4},
        "theme_details": {"Convenience": "Weeknight prep time dominates"},
        "objections": ["Cost per serving"],
        "praise": ["Less planning"],
        "pricing": {"summary": "Sensitive", "price_range": "$8-10 per serving"},
        "recommendations": ["Offer a two-meal trial"],
    });
    completion(analysis.to_string(), ANALYSIS_TOKENS)
}
