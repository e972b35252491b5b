//! POST /api/generate/research

use super::common::*;
use market_research::client::ClientError;
use market_research_sdk::{
    env, names, CapabilityError, CapabilityOutput, ResearchRequest, ResearchResult,
};
use serde_json::{json, Value};

fn request_body() -> Value {
    json!({
        "target_segment": "students",
        "product_concept": "flashcard app",
        "research_questions": ["Would you pay $5/month?"],
    })
}

async fn post(base: &str, key: Option<&str>, body: Value) -> (u16, Value) {
    let mut request = reqwest::Client::new()
        .post(format!("{}/api/generate/research", base))
        .json(&body);
    if let Some(key) = key {
        request = request.header("X-API-KEY", key);
    }
    let response = request.send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_generate_returns_capability_result() {
    let generator = StubCapability::json(serde_json::to_value(sample_result()).unwrap());
    let store = StubCapability::json(json!([]));
    let base = spawn_api(store.clone(), generator.clone()).await;

    let (status, body) = post(&base, Some("sk-test"), request_body()).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["personas"][0]["name"], "Maya Chen");
    assert_eq!(body["analysis"]["emotional_summary"], "Cautiously positive");
    assert_eq!(body["token_count"]["total"], 350);

    // The fixed result comes back exactly, total as reported by the capability
    let echoed: ResearchResult = serde_json::from_value(body.clone()).unwrap();
    assert_eq!(echoed, sample_result());
    assert_eq!(echoed.token_count.total, echoed.token_count.sum());

    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    let invocation = &calls[0];
    assert_eq!(invocation.capability(), names::GENERATE_RESEARCH);
    assert_eq!(invocation.env_vars()[env::OPENAI_API_KEY], "sk-test");
    assert!(invocation.is_secret(env::OPENAI_API_KEY));
    assert_eq!(invocation.env_vars()[env::TARGET_SEGMENT], "students");
    assert_eq!(invocation.env_vars()[env::PRODUCT_CONCEPT], "flashcard app");

    let questions: Vec<String> =
        serde_json::from_str(&invocation.env_vars()[env::RESEARCH_QUESTIONS]).unwrap();
    assert_eq!(questions, vec!["Would you pay $5/month?".to_string()]);

    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_missing_key_is_401_without_invocation() {
    let generator = StubCapability::json(serde_json::to_value(sample_result()).unwrap());
    let base = spawn_api(StubCapability::json(json!([])), generator.clone()).await;

    let (status, body) = post(&base, None, request_body()).await;
    assert_eq!(status, 401);
    assert_eq!(body, json!({"success": false, "error": "Missing API key"}));

    let (status, _) = post(&base, Some("   "), request_body()).await;
    assert_eq!(status, 401);

    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_total_is_not_recomputed() {
    let mut result = serde_json::to_value(sample_result()).unwrap();
    result["token_count"]["total"] = json!(999);
    let base = spawn_api(StubCapability::json(json!([])), StubCapability::json(result)).await;

    let (status, body) = post(&base, Some("sk-test"), request_body()).await;
    assert_eq!(status, 200);
    assert_eq!(body["token_count"]["total"], 999);
}

#[tokio::test]
async fn test_echoed_result_is_canonical() {
    let mut result = serde_json::to_value(sample_result()).unwrap();
    result["personas"][0]["age"] = json!(21);
    result["analysis"]["emotional_tone"] = json!({"excitement": 1, "skepticism": 0});
    let base = spawn_api(StubCapability::json(json!([])), StubCapability::json(result)).await;

    let (status, body) = post(&base, Some("sk-test"), request_body()).await;
    assert_eq!(status, 200);
    assert_eq!(body["personas"][0]["age"], "21");
    assert!(body["analysis"]["emotional_tone"]["excitement"].is_f64());
    assert_eq!(body["analysis"]["emotional_tone"]["excitement"].as_f64(), Some(1.0));
}

#[tokio::test]
async fn test_missing_key_wins_over_bad_body() {
    let generator = StubCapability::json(Value::Null);
    let base = spawn_api(StubCapability::json(json!([])), generator.clone()).await;

    let (status, _) = post(&base, None, json!({})).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_empty_questions_is_400_without_invocation() {
    let generator = StubCapability::json(serde_json::to_value(sample_result()).unwrap());
    let base = spawn_api(StubCapability::json(json!([])), generator.clone()).await;

    let mut body = request_body();
    body["research_questions"] = json!([]);
    let (status, response) = post(&base, Some("sk-test"), body).await;

    assert_eq!(status, 400);
    assert_eq!(response["success"], false);
    assert!(response["error"]
        .as_str()
        .unwrap()
        .starts_with("Missing required fields"));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_blank_fields_and_bad_bodies_are_400() {
    let generator = StubCapability::json(Value::Null);
    let base = spawn_api(StubCapability::json(json!([])), generator.clone()).await;

    let mut blank_segment = request_body();
    blank_segment["target_segment"] = json!("   ");
    assert_eq!(post(&base, Some("sk-test"), blank_segment).await.0, 400);

    let mut blank_question = request_body();
    blank_question["research_questions"] = json!(["Fine", ""]);
    let (status, body) = post(&base, Some("sk-test"), blank_question).await;
    assert_eq!(status, 400);
    assert_eq!(
        body["error"],
        "research_questions must not contain empty entries"
    );

    let mut wrong_type = request_body();
    wrong_type["research_questions"] = json!("just one");
    assert_eq!(post(&base, Some("sk-test"), wrong_type).await.0, 400);

    let response = reqwest::Client::new()
        .post(format!("{}/api/generate/research", base))
        .header("X-API-KEY", "sk-test")
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body"));

    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_capability_failure_is_generic_500() {
    let generator = StubCapability::new(|invocation| {
        Err(CapabilityError::Failed {
            capability: invocation.capability().to_string(),
            code: Some(1),
            diagnostic: "Error: OpenAI API error (401): Incorrect API key provided".to_string(),
        })
    });
    let base = spawn_api(StubCapability::json(json!([])), generator).await;

    let (status, body) = post(&base, Some("sk-test"), request_body()).await;

    assert_eq!(status, 500);
    assert_eq!(
        body,
        json!({"success": false, "error": "An error occurred while generating research"})
    );
}

#[tokio::test]
async fn test_text_output_is_malformed_500() {
    let generator =
        StubCapability::new(|_| Ok(CapabilityOutput::Text("Traceback: something".to_string())));
    let base = spawn_api(StubCapability::json(json!([])), generator).await;

    let (status, body) = post(&base, Some("sk-test"), request_body()).await;
    assert_eq!(status, 500);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_out_of_range_tone_is_malformed_500() {
    let mut result = serde_json::to_value(sample_result()).unwrap();
    result["analysis"]["emotional_tone"]["excitement"] = json!(70);
    let base = spawn_api(StubCapability::json(json!([])), StubCapability::json(result)).await;

    let (status, _) = post(&base, Some("sk-test"), request_body()).await;
    assert_eq!(status, 500);
}

#[tokio::test]
async fn test_client_generate_round_trip() {
    let generator = StubCapability::json(serde_json::to_value(sample_result()).unwrap());
    let base = spawn_api(StubCapability::json(json!([])), generator).await;

    let mut client = client(&base);
    let request = ResearchRequest {
        target_segment: "University students".to_string(),
        product_concept: "Flashcard app".to_string(),
        research_questions: vec!["Would you pay $5/month?".to_string()],
    };

    let err = client.generate_research(&request).await.unwrap_err();
    assert!(matches!(err, ClientError::MissingCredential));

    client.set_api_key("sk-test");
    let result = client.generate_research(&request).await.unwrap();
    assert_eq!(result, sample_result());
}
