//! The bundled `research-capability` executable behind the store gateway

use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use market_research::error::Error;
use market_research::runtime::{CapabilityRegistry, ProcessCapability};
use market_research::store::ProjectStore;
use market_research_sdk::{env, names, Capability, CapabilityError, Invocation, NewProject};
use serde_json::json;

fn runtime() -> ProcessCapability {
    ProcessCapability::new(CapabilityRegistry::for_binary(
        &capability_binary(),
        Duration::from_secs(60),
        Duration::from_secs(30),
    ))
}

fn project(name: &str) -> NewProject {
    NewProject {
        name: name.to_string(),
        product_concept: "Meal kit subscription".to_string(),
        target_segment: "Busy parents".to_string(),
        research_questions: vec!["How often do you cook?".to_string()],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_store_round_trip_through_process() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(Arc::new(runtime())).with_database(dir.path().join("projects.db"));

    let first = store.create_project(&project("first")).await.unwrap();
    let second = store.create_project(&project("second")).await.unwrap();
    assert_ne!(first, second);

    let listed = store.list_projects().await.unwrap();
    let names: Vec<&str> = listed.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["second", "first"]);

    let fetched = store.get_project(first).await.unwrap();
    assert_eq!(fetched.to_new_project(), project("first"));

    assert!(store.delete_project(first).await.unwrap());
    assert!(!store.delete_project(first).await.unwrap());

    let err = store.get_project(first).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_missing_project_prints_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("projects.db");

    let output = runtime()
        .invoke(
            Invocation::new(names::GET_PROJECT)
                .arg("12345")
                .env(env::RESEARCH_DATABASE, db.display().to_string()),
        )
        .await
        .unwrap();
    assert_eq!(output.into_json(), Some(json!({})));
}

#[tokio::test]
async fn test_invalid_project_data_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("projects.db");

    let err = runtime()
        .invoke(
            Invocation::new(names::SAVE_PROJECT)
                .env(env::RESEARCH_DATABASE, db.display().to_string())
                .env(env::PROJECT_DATA, "{not json"),
        )
        .await
        .unwrap_err();

    match err {
        CapabilityError::Failed {
            code, diagnostic, ..
        } => {
            assert_eq!(code, Some(1));
            assert!(diagnostic.contains("PROJECT_DATA is not a valid project"));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_generation_without_key_fails_before_any_request() {
    let err = runtime()
        .invoke(
            Invocation::new(names::GENERATE_RESEARCH)
                .secret_env(env::OPENAI_API_KEY, "")
                .env(env::TARGET_SEGMENT, "Busy parents")
                .env(env::PRODUCT_CONCEPT, "Meal kits")
                .env(env::RESEARCH_QUESTIONS, r#"["How often do you cook?"]"#),
        )
        .await
        .unwrap_err();

    match err {
        CapabilityError::Failed { diagnostic, .. } => {
            assert!(diagnostic.contains("OPENAI_API_KEY not provided"));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_negative_id_is_an_absent_project() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(Arc::new(runtime())).with_database(dir.path().join("projects.db"));
    store.create_project(&project("only")).await.unwrap();

    let err = store.get_project(-1).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);
    assert!(!store.delete_project(-1).await.unwrap());

    assert_eq!(store.list_projects().await.unwrap().len(), 1);
}
