//! Remote provider tests against a mock chat-completions endpoint.

use std::collections::BTreeSet;

use chrono::Utc;
use gazette::config::{MapConfig, RemoteProviderConfig};
use gazette::error::ProviderError;
use gazette::git::CommitType;
use gazette::provider::{RemoteProvider, Summarizer, UnitContext, call_with_retry};
use gazette::summarize::prompt::build_map_prompt;
use gazette::unit::{ChangeUnit, EvidenceSet, UnitKind};
use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// An openai provider pointed at the mock server, keyed from config so
/// the process environment never leaks into the test.
fn openai_at(base_url: &str) -> RemoteProvider {
    temp_env::with_vars([("OPENAI_API_KEY", None::<&str>)], || {
        let config = RemoteProviderConfig {
            base_url: Some(base_url.to_string()),
            api_key: Some("test-key".to_string()),
            ..RemoteProviderConfig::default()
        };
        RemoteProvider::openai(&config).expect("Failed to build provider")
    })
}

fn unit() -> ChangeUnit {
    ChangeUnit {
        id: "pr-12".to_string(),
        kind: UnitKind::PullRequest,
        title: "feat: add fuzzy search".to_string(),
        author: "dev".to_string(),
        commit_shas: vec!["a".repeat(40)],
        files: ["src/search.rs".to_string()].into_iter().collect(),
        linked_issues: BTreeSet::new(),
        is_internal: false,
        category: Some(CommitType::Feat),
        breaking: false,
        merged_at: Utc::now(),
    }
}

fn context<'a>(unit: &'a ChangeUnit, evidence: &'a EvidenceSet) -> UnitContext<'a> {
    UnitContext {
        unit,
        evidence,
        prompt: build_map_prompt(unit, evidence),
    }
}

fn completion_body(text: &str) -> serde_json::Value {
    json!({
        "choices": [
            {"message": {"role": "assistant", "content": text}}
        ]
    })
}

// ====== SUCCESSFUL CALLS ======

#[tokio::test]
#[serial]
async fn test_summarize_parses_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion_body("- Added fuzzy search")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = openai_at(&server.uri());
    let unit = unit();
    let evidence = EvidenceSet::default();

    let text = provider.summarize(&context(&unit, &evidence)).await.unwrap();
    assert_eq!(text, "Added fuzzy search");
}

#[tokio::test]
#[serial]
async fn test_configured_model_reaches_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-4.1-mini"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Added search")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = temp_env::with_vars([("OPENAI_API_KEY", None::<&str>)], || {
        let config = RemoteProviderConfig {
            model: Some("gpt-4.1-mini".to_string()),
            base_url: Some(server.uri()),
            api_key: Some("test-key".to_string()),
        };
        RemoteProvider::openai(&config).expect("Failed to build provider")
    });
    assert_eq!(provider.model(), "gpt-4.1-mini");

    let unit = unit();
    let evidence = EvidenceSet::default();
    provider.summarize(&context(&unit, &evidence)).await.unwrap();
}

// ====== ERROR MAPPING ======

#[tokio::test]
#[serial]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;

    let provider = openai_at(&server.uri());
    let unit = unit();
    let evidence = EvidenceSet::default();

    let err = provider
        .summarize(&context(&unit, &evidence))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Api { status: 500, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
#[serial]
async fn test_long_error_body_is_clipped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("x".repeat(2000)))
        .mount(&server)
        .await;

    let provider = openai_at(&server.uri());
    let unit = unit();
    let evidence = EvidenceSet::default();

    let err = provider
        .summarize(&context(&unit, &evidence))
        .await
        .unwrap_err();
    match err {
        ProviderError::Api { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body.chars().count(), 300);
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn test_malformed_payload_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let provider = openai_at(&server.uri());
    let unit = unit();
    let evidence = EvidenceSet::default();

    let err = provider
        .summarize(&context(&unit, &evidence))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse { .. }));
}

#[tokio::test]
#[serial]
async fn test_empty_completion_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("")))
        .mount(&server)
        .await;

    let provider = openai_at(&server.uri());
    let unit = unit();
    let evidence = EvidenceSet::default();

    let err = provider
        .summarize(&context(&unit, &evidence))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("empty completion"));
}

// ====== RETRY INTEGRATION ======

#[tokio::test]
#[serial]
async fn test_unauthorized_fails_without_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid key"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let provider = openai_at(&server.uri());
    let unit = unit();
    let evidence = EvidenceSet::default();

    let result = call_with_retry(&provider, &context(&unit, &evidence), &MapConfig::default()).await;
    assert!(matches!(result, Err(ProviderError::Api { status: 401, .. })));
    // The mock's expect(1) verifies no second request went out.
}

#[tokio::test]
#[serial]
async fn test_retry_recovers_from_one_bad_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("hiccup"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Added search")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = openai_at(&server.uri());
    let unit = unit();
    let evidence = EvidenceSet::default();
    // Millisecond backoff keeps the retry sleep out of the test budget.
    let config = MapConfig {
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        ..MapConfig::default()
    };

    let text = call_with_retry(&provider, &context(&unit, &evidence), &config)
        .await
        .unwrap();
    assert_eq!(text, "Added search");
}
