//! Integration tests for the structured LLM exchange
//!
//! An Ollama endpoint is mocked with wiremock so the repair round can be
//! observed request by request.

use serde_json::json;
use std::sync::Arc;
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

use sdk::TravelWhen;
use wayfarer_engine::agent::{ConversationContext, IntentParser, StructuredIntent};
use wayfarer_engine::config::Config;
use wayfarer_engine::events::{EventKind, PayloadLevel, RecordingSink};
use wayfarer_engine::llm::contract::{
    exchange, ContractError, FieldKind, FieldSpec, PromptContract, ResponseSchema,
};
use wayfarer_engine::llm::{ollama::OllamaProvider, router::LLMRouter, LLMProvider};

fn ollama_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "llama3.1:8b",
        "created_at": "2026-10-16T09:12:45.499127Z",
        "message": { "role": "assistant", "content": content },
        "done": true
    }))
}

fn router_for(server: &MockServer) -> Arc<LLMRouter> {
    let mut llm = Config::default_config().llm;
    llm.default_provider = "ollama".to_string();
    llm.timeout_secs = 5;
    let provider =
        Box::new(OllamaProvider::new(server.uri(), "llama3.1:8b")) as Box<dyn LLMProvider>;
    Arc::new(LLMRouter::new(vec![provider], Arc::new(llm)))
}

fn summary_contract() -> PromptContract {
    PromptContract::new(
        "You summarise travel options.",
        json!({ "results": [{ "name": "Innsbruck", "total": 81.0 }] }),
        "Summarise the results in one sentence.",
        ResponseSchema::new(vec![FieldSpec::required("summary", FieldKind::String)]),
    )
}

#[tokio::test]
async fn test_valid_reply_needs_no_repair() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ollama_reply(r#"{"summary": "Innsbruck leads on snow."}"#))
        .expect(1)
        .mount(&server)
        .await;

    let recorder = RecordingSink::new(PayloadLevel::Debug);
    let reply = exchange(&router_for(&server), &summary_contract(), &recorder)
        .await
        .expect("valid reply");

    assert!(!reply.repaired);
    assert_eq!(reply.provider, "ollama");
    assert_eq!(reply.value["summary"], "Innsbruck leads on snow.");
    assert!(recorder.of_kind(EventKind::ContractRepair).is_empty());
}

#[tokio::test]
async fn test_single_repair_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ollama_reply("Sure! Innsbruck is great."))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("Your previous reply was invalid"))
        .respond_with(ollama_reply(
            "```json\n{\"summary\": \"Innsbruck has the most pistes.\"}\n```",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let recorder = RecordingSink::new(PayloadLevel::Debug);
    let reply = exchange(&router_for(&server), &summary_contract(), &recorder)
        .await
        .expect("repair should succeed");

    assert!(reply.repaired);
    assert_eq!(reply.value["summary"], "Innsbruck has the most pistes.");
    assert_eq!(recorder.of_kind(EventKind::ContractRepair).len(), 1);
    assert_eq!(recorder.of_kind(EventKind::LlmRequest).len(), 2);
}

#[tokio::test]
async fn test_malformed_twice_is_schema_error_after_exactly_one_repair() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ollama_reply(r#"{"headline": "wrong field"}"#))
        .expect(2)
        .mount(&server)
        .await;

    let recorder = RecordingSink::new(PayloadLevel::Debug);
    let result = exchange(&router_for(&server), &summary_contract(), &recorder).await;

    assert!(matches!(result, Err(ContractError::Schema(_))));
    assert_eq!(recorder.of_kind(EventKind::ContractRepair).len(), 1);
    assert_eq!(recorder.of_kind(EventKind::LlmFailure).len(), 1);
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(2));
}

#[tokio::test]
async fn test_transport_failure_is_not_repaired() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let recorder = RecordingSink::new(PayloadLevel::Debug);
    let result = exchange(&router_for(&server), &summary_contract(), &recorder).await;

    assert!(matches!(result, Err(ContractError::Transport(_))));
    assert!(recorder.of_kind(EventKind::ContractRepair).is_empty());
}

#[tokio::test]
async fn test_intent_parser_uses_refinement() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ollama_reply(
            r#"{"intent": "constraint_based_discovery", "destination": null, "activity": null, "travel_date_or_month": "march", "max_flight_hours": 5}"#,
        ))
        .mount(&server)
        .await;

    let recorder = RecordingSink::new(PayloadLevel::Debug);
    let parser = IntentParser::new(Some(router_for(&server)), Arc::new(recorder));
    let intent = parser
        .parse("Something sunny, not too far, early spring", ConversationContext::new())
        .await
        .expect("refined intent");

    assert_eq!(
        intent,
        StructuredIntent::ConstraintRequest {
            when: Some(TravelWhen::Month { month: 3 }),
            max_flight_hours: Some(5.0),
            activity: None,
            no_flight_limit: false,
            weather_preference: None,
        }
    );
}

#[tokio::test]
async fn test_intent_parser_degrades_to_rules_when_model_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let recorder = RecordingSink::new(PayloadLevel::Debug);
    let parser = IntentParser::new(Some(router_for(&server)), Arc::new(recorder));
    let intent = parser
        .parse("Where can I go skiing in January?", ConversationContext::new())
        .await
        .expect("rules fallback");

    assert_eq!(
        intent,
        StructuredIntent::ActivityRequest {
            activity: "skiing".to_string(),
            when: Some(TravelWhen::Month { month: 1 }),
            weather_preference: None,
        }
    );
}

#[tokio::test]
async fn test_intent_parser_surfaces_schema_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ollama_reply(r#"{"intent": "book_hotel"}"#))
        .expect(2)
        .mount(&server)
        .await;

    let recorder = RecordingSink::new(PayloadLevel::Debug);
    let parser = IntentParser::new(Some(router_for(&server)), Arc::new(recorder));
    let result = parser
        .parse("Where can I go skiing in January?", ConversationContext::new())
        .await;

    assert!(matches!(result, Err(ContractError::Schema(_))));
}
