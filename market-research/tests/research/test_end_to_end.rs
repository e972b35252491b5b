//! `generate-research` through settings, the executable and the HTTP API

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use market_research::api::{self, AppState};
use market_research::capability::generate::{self, GenerateSettings, OPENAI_BASE_URL, PERSONA_COUNT};
use market_research::generation::ResearchGenerator;
use market_research::local::InProcessStore;
use market_research::runtime::{CapabilityRegistry, CapabilitySpec, ProcessCapability};
use market_research::store::ProjectStore;
use market_research_sdk::{env, names, Capability, CapabilityError, ResearchResult};
use serde_json::{json, Value};
use tokio::net::TcpListener;

fn capability_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_research-capability"))
}

/// Registry whose generator points the executable at `base_url`
fn runtime(base_url: &str) -> ProcessCapability {
    let mut registry = CapabilityRegistry::new();
    registry.register(
        names::GENERATE_RESEARCH,
        CapabilitySpec::new(capability_binary())
            .arg(names::GENERATE_RESEARCH)
            .env(OPENAI_BASE_URL, base_url)
            .env(PERSONA_COUNT, "2")
            .timeout(Duration::from_secs(60)),
    );
    ProcessCapability::new(registry)
}

#[tokio::test]
async fn test_generate_run_from_settings() {
    let mock = MockOpenAi::default();
    let base_url = mock.spawn().await;

    let values: HashMap<&str, String> = [
        (env::OPENAI_API_KEY, "sk-test".to_string()),
        (env::TARGET_SEGMENT, "Working parents".to_string()),
        (env::PRODUCT_CONCEPT, "Meal kits".to_string()),
        (env::RESEARCH_QUESTIONS, r#"["How often do you cook?"]"#.to_string()),
        (OPENAI_BASE_URL, base_url),
        (PERSONA_COUNT, "2".to_string()),
    ]
    .into_iter()
    .collect();
    let settings = GenerateSettings::from_lookup(|key| values.get(key).cloned()).unwrap();

    let result = generate::run(settings).await.unwrap();
    assert_eq!(result.personas.len(), 2);
    assert_eq!(mock.requests().len(), 3);
}

#[tokio::test]
async fn test_executable_prints_research_result() {
    let mock = MockOpenAi::default();
    let runtime = runtime(&mock.spawn().await);

    let invocation = ResearchGenerator::invocation(
        "sk-test",
        &market_research_sdk::ResearchRequest {
            target_segment: "Working parents".to_string(),
            product_concept: "Meal kits".to_string(),
            research_questions: vec!["How often do you cook?".to_string()],
        },
    )
    .unwrap();
    let output = runtime.invoke(invocation).await.unwrap();

    let result: ResearchResult = serde_json::from_value(output.into_json().unwrap()).unwrap();
    assert_eq!(result.transcript, TRANSCRIPT);
    assert_eq!(result.token_count.total, 550);
    assert_eq!(mock.requests()[0].authorization, "Bearer sk-test");
}

#[tokio::test]
async fn test_rejected_key_surfaces_as_failure_without_leaking_it() {
    let mock = MockOpenAi::rejecting();
    let runtime = runtime(&mock.spawn().await);

    let invocation = ResearchGenerator::invocation(
        "sk-should-not-leak",
        &market_research_sdk::ResearchRequest {
            target_segment: "Working parents".to_string(),
            product_concept: "Meal kits".to_string(),
            research_questions: vec!["How often do you cook?".to_string()],
        },
    )
    .unwrap();

    match runtime.invoke(invocation).await.unwrap_err() {
        CapabilityError::Failed {
            code, diagnostic, ..
        } => {
            assert_eq!(code, Some(1));
            assert!(diagnostic.contains("Incorrect API key provided"));
            assert!(!diagnostic.contains("sk-should-not-leak"));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_generate_with_sk_test() {
    let mock = MockOpenAi::default();
    let generator: Arc<dyn Capability> = Arc::new(runtime(&mock.spawn().await));
    let state = AppState {
        store: ProjectStore::new(Arc::new(InProcessStore::in_memory().unwrap())),
        generator: ResearchGenerator::new(generator),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api::router(state)).await.unwrap();
    });

    let body = json!({
        "target_segment": "Working parents",
        "product_concept": "Meal kits",
        "research_questions": ["How often do you cook?"],
    });
    let url = format!("http://{}/api/generate/research", addr);

    let response = reqwest::Client::new()
        .post(&url)
        .header("X-API-KEY", "sk-test")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let payload: Value = response.json().await.unwrap();
    assert_eq!(payload["success"], true);
    assert_eq!(payload["personas"].as_array().unwrap().len(), 2);
    assert_eq!(payload["analysis"]["emotional_tone"]["interest"], 0.65);

    let response = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(mock.requests().len(), 3);
}
