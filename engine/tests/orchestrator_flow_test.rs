//! End-to-end session flows
//!
//! The orchestrator runs against an in-process gateway whose answers are
//! derived from the place name, so every flow is deterministic and offline.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use sdk::{
    Coordinates, FailureCause, FlightOutcome, GeocodeOutcome, Location, Origin, PoiOutcome,
    PointOfInterest, TemperatureBand, ToolGateway, TravelWhen, WeatherOutcome, WeatherSummary,
};
use wayfarer_engine::agent::{Orchestrator, SessionState, Slot, TurnResponse};
use wayfarer_engine::conductor::WeatherPreference;
use wayfarer_engine::config::Config;
use wayfarer_engine::events::{EventKind, PayloadLevel, RecordingSink};
use wayfarer_engine::llm::{ollama::OllamaProvider, router::LLMRouter, LLMProvider};

const ORIGIN: &str = "Tel Aviv, Israel";

#[derive(Default)]
struct FakeGateway {
    unknown: HashSet<String>,
    fixed_flight_hours: Option<f64>,
    slow_place: Option<String>,
    geocode_calls: AtomicUsize,
}

fn slug(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

fn location_for(name: &str, country: &str) -> Location {
    let hash = name
        .bytes()
        .fold(17u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)));
    let lat = (hash % 120) as f64 - 60.0 + 0.25;
    let lon = ((hash / 120) % 300) as f64 - 150.0 + 0.25;
    Location {
        place_id: format!("node/{}", slug(name)),
        name: name.to_string(),
        display_name: format!("{}, {}", name, country),
        country: country.to_string(),
        country_code: slug(country).chars().take(2).collect(),
        coordinates: Coordinates::new(lat, lon),
        localities: vec![name.to_string()],
    }
}

#[async_trait]
impl ToolGateway for FakeGateway {
    async fn geocode(&self, place_name: &str, _limit: usize) -> GeocodeOutcome {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        if self.slow_place.as_deref() == Some(place_name) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        if self.unknown.contains(&slug(place_name)) {
            return GeocodeOutcome::NotFound(FailureCause::NoMatch);
        }
        let location = match place_name.split_once(',') {
            Some((city, country)) => location_for(city.trim(), country.trim()),
            None => location_for(place_name, &format!("{}land", place_name)),
        };
        GeocodeOutcome::Found(vec![location])
    }

    async fn weather(&self, location: &Coordinates, _when: Option<&TravelWhen>) -> WeatherOutcome {
        let avg = 30.0 - location.lat.abs() / 2.0;
        WeatherOutcome::Summary(WeatherSummary::from_daily(avg + 4.0, avg - 4.0, 1.0))
    }

    async fn points_of_interest(&self, location: &Coordinates, _hint: Option<&str>) -> PoiOutcome {
        let count = 3 + (location.lat.abs() as usize % 10);
        PoiOutcome::from_points(
            (0..count)
                .map(|i| PointOfInterest {
                    name: format!("Spot {}", i),
                    category: "tourism=attraction".to_string(),
                })
                .collect(),
        )
    }

    async fn flight_time(&self, _origin: &Origin, destination: &Coordinates) -> FlightOutcome {
        let hours = self
            .fixed_flight_hours
            .unwrap_or_else(|| 1.0 + destination.lat.abs() % 7.0);
        FlightOutcome::Hours(hours)
    }
}

fn test_config() -> Config {
    let mut config = Config::default_config();
    config.session.ask_weather_preference = false;
    config.llm.narrate_results = false;
    config
}

fn orchestrator_with(
    gateway: FakeGateway,
    config: &Config,
) -> (Orchestrator, Arc<FakeGateway>, RecordingSink) {
    let gateway = Arc::new(gateway);
    let recorder = RecordingSink::new(PayloadLevel::Trace);
    let orchestrator = Orchestrator::new(
        Arc::clone(&gateway) as Arc<dyn ToolGateway>,
        None,
        config,
        Arc::new(recorder.clone()),
    );
    (orchestrator, gateway, recorder)
}

async fn onboarded(gateway: FakeGateway, config: &Config) -> (Orchestrator, Arc<FakeGateway>, RecordingSink) {
    let (orchestrator, gateway, recorder) = orchestrator_with(gateway, config);
    let response = orchestrator.handle_turn(ORIGIN).await;
    assert!(
        matches!(response, TurnResponse::OriginSaved { .. }),
        "origin not accepted: {:?}",
        response
    );
    (orchestrator, gateway, recorder)
}

fn ranked_ids(response: &TurnResponse) -> Vec<String> {
    assert!(
        matches!(response, TurnResponse::Ranked { .. }),
        "expected a ranking, got {:?}",
        response
    );
    response.place_ids()
}

#[tokio::test]
async fn test_no_planning_before_origin() {
    let (orchestrator, gateway, _recorder) = orchestrator_with(FakeGateway::default(), &test_config());

    let response = orchestrator.handle_turn("Where can I go skiing in January?").await;
    assert!(matches!(response, TurnResponse::OnboardingPrompt { .. }));
    assert_eq!(orchestrator.state(), SessionState::AwaitingOrigin);
    assert_eq!(gateway.geocode_calls.load(Ordering::SeqCst), 0);

    let response = orchestrator.handle_turn("Tel Aviv").await;
    assert!(matches!(response, TurnResponse::OnboardingPrompt { .. }));
    assert_eq!(orchestrator.state(), SessionState::AwaitingOrigin);
    assert!(orchestrator.origin().is_none());
}

#[tokio::test]
async fn test_onboarding_then_skiing_ranking() {
    let (orchestrator, _gateway, recorder) = onboarded(FakeGateway::default(), &test_config()).await;
    assert_eq!(orchestrator.origin(), Some(Origin::new("Tel Aviv", "Israel")));
    assert_eq!(orchestrator.state(), SessionState::Ready);

    let response = orchestrator.handle_turn("Where can I go skiing in January?").await;
    let TurnResponse::Ranked { entries, summary, prefix } = &response else {
        panic!("expected a ranking, got {:?}", response);
    };

    assert_eq!(entries.len(), 3);
    assert!(prefix.is_none());
    assert!(summary.starts_with("Best current match is"));
    for pair in entries.windows(2) {
        assert!(pair[0].score.total >= pair[1].score.total);
    }
    for entry in entries {
        assert!((0.0..=100.0).contains(&entry.score.total));
        assert!(entry.score.rationale.len() >= 4);
    }
    assert!(response.render().ends_with("What do you think about these options?"));

    assert_eq!(orchestrator.state(), SessionState::Ready);
    assert_eq!(orchestrator.memory().previous_shown().len(), 3);
    assert_eq!(recorder.of_kind(EventKind::Ranking).len(), 1);
}

#[tokio::test]
async fn test_missing_month_asks_then_merges_answer() {
    let (orchestrator, _gateway, _recorder) = onboarded(FakeGateway::default(), &test_config()).await;

    let response = orchestrator.handle_turn("Where can I go skiing?").await;
    assert_eq!(
        response,
        TurnResponse::Clarification {
            slot: Slot::TravelDateOrMonth,
            question: "What date or month are you planning to travel?".to_string(),
        }
    );
    assert_eq!(orchestrator.state(), SessionState::AwaitingClarification);

    let response = orchestrator.handle_turn("January").await;
    assert_eq!(ranked_ids(&response).len(), 3);
    assert_eq!(orchestrator.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_new_request_discards_stale_clarification() {
    let (orchestrator, _gateway, _recorder) = onboarded(FakeGateway::default(), &test_config()).await;

    let response = orchestrator.handle_turn("Where can I go skiing?").await;
    assert!(matches!(response, TurnResponse::Clarification { .. }));

    let response = orchestrator.handle_turn("Any beach trips?").await;
    assert!(matches!(
        response,
        TurnResponse::Clarification { slot: Slot::TravelDateOrMonth, .. }
    ));

    let response = orchestrator.handle_turn("July").await;
    let TurnResponse::Ranked { entries, .. } = &response else {
        panic!("expected a ranking, got {:?}", response);
    };
    assert!(entries
        .iter()
        .all(|e| e.candidate.activity.as_deref() == Some("beach")));
}

#[tokio::test]
async fn test_reject_all_regenerates_disjoint_options() {
    let (orchestrator, _gateway, _recorder) = onboarded(FakeGateway::default(), &test_config()).await;

    let first = ranked_ids(&orchestrator.handle_turn("Where can I go skiing in January?").await);

    let response = orchestrator.handle_turn("None of these work for me").await;
    let TurnResponse::Ranked { prefix, .. } = &response else {
        panic!("expected regenerated options, got {:?}", response);
    };
    assert_eq!(
        prefix.as_deref(),
        Some("I generated new options and excluded the previous destinations.")
    );
    let second = response.place_ids();
    assert!(!second.is_empty());
    assert!(second.iter().all(|id| !first.contains(id)));
    for id in &first {
        assert!(orchestrator.memory().is_excluded(id));
    }

    let third = ranked_ids(&orchestrator.handle_turn("Where can I go skiing in February?").await);
    assert!(third.iter().all(|id| !first.contains(id)));
}

#[tokio::test]
async fn test_like_raises_bias_and_activity_fit() {
    let (orchestrator, _gateway, _recorder) = onboarded(FakeGateway::default(), &test_config()).await;
    let query = "Where can I go skiing in January?";

    let TurnResponse::Ranked { entries: before, .. } = orchestrator.handle_turn(query).await else {
        panic!("expected a ranking");
    };
    assert_eq!(orchestrator.memory().profile_bias("activity:skiing"), 0.0);
    assert_eq!(orchestrator.memory().profile_bias("skiing"), 0.0);

    let response = orchestrator.handle_turn("I like the first one").await;
    assert_eq!(
        response,
        TurnResponse::Info {
            message: "Thanks, I learned from your feedback.".to_string()
        }
    );
    assert!(orchestrator.memory().profile_bias("activity:skiing") > 0.0);
    assert!(orchestrator.memory().profile_bias("skiing") > 0.0);

    let TurnResponse::Ranked { entries: after, .. } = orchestrator.handle_turn(query).await else {
        panic!("expected a ranking");
    };
    for old in &before {
        if let Some(new) = after
            .iter()
            .find(|e| e.candidate.place_id == old.candidate.place_id)
        {
            assert!(new.score.activity_fit > old.score.activity_fit);
        }
    }
}

#[tokio::test]
async fn test_feedback_before_any_ranking() {
    let (orchestrator, _gateway, _recorder) = onboarded(FakeGateway::default(), &test_config()).await;
    let response = orchestrator.handle_turn("I like the first one").await;
    assert!(matches!(response, TurnResponse::Info { message } if message.contains("not suggested")));
}

#[tokio::test]
async fn test_all_candidates_over_limit_after_one_relaxation() {
    let gateway = FakeGateway {
        fixed_flight_hours: Some(9.0),
        ..FakeGateway::default()
    };
    let (orchestrator, _gateway, recorder) = onboarded(gateway, &test_config()).await;

    let response = orchestrator
        .handle_turn("Where should I go in March within 4 hours?")
        .await;
    assert_eq!(
        response,
        TurnResponse::NoResults {
            message: "I could not find fitting destinations. Could you adjust the date or constraints?"
                .to_string(),
            prefix: None,
        }
    );

    let stages: Vec<String> = recorder
        .of_kind(EventKind::Planning)
        .iter()
        .filter_map(|e| e.payload.as_ref()?.get("stage")?.as_str().map(str::to_string))
        .collect();
    assert_eq!(stages.iter().filter(|s| *s == "relax").count(), 1);
    let failed = recorder
        .of_kind(EventKind::Planning)
        .into_iter()
        .find(|e| e.payload.as_ref().is_some_and(|p| p["stage"] == "failed"))
        .expect("failure event");
    assert_eq!(failed.payload.as_ref().map(|p| p["relaxed"].clone()), Some(json!(true)));
    assert_eq!(orchestrator.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_unknown_destination_is_reported() {
    let gateway = FakeGateway {
        unknown: HashSet::from(["atlantis".to_string()]),
        ..FakeGateway::default()
    };
    let (orchestrator, _gateway, _recorder) = onboarded(gateway, &test_config()).await;

    let response = orchestrator.handle_turn("Thinking about Atlantis in March").await;
    assert!(matches!(response, TurnResponse::NoResults { message, .. } if message.contains("Atlantis")));
}

#[tokio::test]
async fn test_acknowledgement_skips_planning() {
    let (orchestrator, gateway, _recorder) = onboarded(FakeGateway::default(), &test_config()).await;
    let calls = gateway.geocode_calls.load(Ordering::SeqCst);

    let response = orchestrator.handle_turn("thanks!").await;
    assert_eq!(
        response,
        TurnResponse::Info {
            message: "Great. Tell me your next travel request whenever you are ready.".to_string()
        }
    );
    assert_eq!(gateway.geocode_calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_weather_preference_question() {
    let mut config = test_config();
    config.session.ask_weather_preference = true;
    let gateway = FakeGateway {
        fixed_flight_hours: Some(3.0),
        ..FakeGateway::default()
    };
    let (orchestrator, _gateway, _recorder) = onboarded(gateway, &config).await;

    let response = orchestrator
        .handle_turn("Where should I go in March within 5 hours?")
        .await;
    assert!(matches!(
        response,
        TurnResponse::Clarification { slot: Slot::WeatherPreference, .. }
    ));

    let response = orchestrator.handle_turn("hmm").await;
    assert!(matches!(
        response,
        TurnResponse::Clarification { ref question, .. } if question.starts_with("Please answer with")
    ));

    let response = orchestrator.handle_turn("warm please").await;
    let TurnResponse::Ranked { prefix, .. } = &response else {
        panic!("expected a ranking, got {:?}", response);
    };
    assert_eq!(prefix.as_deref(), Some("Got it. I saved your weather preference."));
    assert_eq!(
        orchestrator.memory().preferred_weather(),
        Some(WeatherPreference::Band(TemperatureBand::Warm))
    );

    // asked once per session
    let response = orchestrator
        .handle_turn("Where should I go in April within 5 hours?")
        .await;
    assert!(matches!(response, TurnResponse::Ranked { .. }));
}

#[tokio::test]
async fn test_skiing_never_asks_about_weather() {
    let mut config = test_config();
    config.session.ask_weather_preference = true;
    let (orchestrator, _gateway, _recorder) = onboarded(FakeGateway::default(), &config).await;

    let response = orchestrator.handle_turn("Where can I go skiing in January?").await;
    assert!(matches!(response, TurnResponse::Ranked { .. }));
}

#[tokio::test]
async fn test_late_turn_is_superseded() {
    let gateway = FakeGateway {
        slow_place: Some("Slowtown".to_string()),
        ..FakeGateway::default()
    };
    let (orchestrator, _gateway, recorder) = onboarded(gateway, &test_config()).await;

    let (late, current) = tokio::join!(
        orchestrator.handle_turn("Thinking about Slowtown in March"),
        orchestrator.handle_turn("Where can I go skiing in January?"),
    );

    assert_eq!(late, TurnResponse::Superseded);
    let shown: Vec<String> = orchestrator
        .memory()
        .previous_shown()
        .into_iter()
        .map(|o| o.place_id)
        .collect();
    assert_eq!(shown, ranked_ids(&current));

    let started = recorder.of_kind(EventKind::TurnStarted);
    let ids: HashSet<&str> = started.iter().map(|e| e.correlation_id.as_str()).collect();
    assert_eq!(ids.len(), started.len());
}

#[tokio::test]
async fn test_malformed_model_reply_becomes_error_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.1:8b",
            "message": { "role": "assistant", "content": "I think you should go to Rome!" },
            "done": true
        })))
        .expect(2)
        .mount(&server)
        .await;

    let config = test_config();
    let mut llm = config.llm.clone();
    llm.default_provider = "ollama".to_string();
    let provider =
        Box::new(OllamaProvider::new(server.uri(), "llama3.1:8b")) as Box<dyn LLMProvider>;
    let router = Arc::new(LLMRouter::new(vec![provider], Arc::new(llm)));

    let recorder = RecordingSink::new(PayloadLevel::Trace);
    let orchestrator = Orchestrator::new(
        Arc::new(FakeGateway::default()),
        Some(router),
        &config,
        Arc::new(recorder.clone()),
    );
    assert!(matches!(
        orchestrator.handle_turn(ORIGIN).await,
        TurnResponse::OriginSaved { .. }
    ));

    let response = orchestrator.handle_turn("Where can I go skiing in January?").await;
    assert!(matches!(response, TurnResponse::Error { .. }));
    assert_eq!(orchestrator.state(), SessionState::Ready);
    assert_eq!(recorder.of_kind(EventKind::ContractRepair).len(), 1);
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(2));
}
