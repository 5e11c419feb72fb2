//! Session Orchestrator
//!
//! The turn state machine:
//!
//! ```text
//! AwaitingOrigin ──origin──▶ Ready ──▶ AwaitingClarification ──answer──▶ Ready
//!                              │
//!                              ├──▶ Planning ──▶ ScoringDone ──▶ Ready
//!                              └──▶ Error ─────────────────────▶ Ready
//! ```
//!
//! No query reaches the planner before an origin is saved. Feedback goes
//! straight to memory; a rejection re-runs the last query with the new
//! exclusions. Each turn runs under its own correlation id, and a turn whose
//! results arrive after a newer turn started is discarded as `Superseded`
//! without touching memory.

use sdk::{Origin, ToolGateway};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::context::ConversationContext;
use super::intent::{FeedbackPolarity, IntentParser, StructuredIntent};
use super::onboarding::{validate_origin, OnboardingOutcome, ONBOARDING_PROMPT};
use super::slots::{
    is_acknowledgement, is_clarification_like_answer, looks_like_new_travel_query, merge_answer,
    Slot,
};
use crate::conductor::{
    scorer, ActivityCategory, FeedbackMemory, Planner, PlanningFailure, RankedEntry, ShownOption,
    TripQuery, WeatherPreference,
};
use crate::config::{Config, SessionConfig};
use crate::events::{new_correlation_id, with_correlation_id, EventKind, SharedSink};
use crate::llm::contract::{self, FieldKind, FieldSpec, PromptContract, ResponseSchema};
use crate::llm::router::LLMRouter;

const ACK_REPLY: &str = "Great. Tell me your next travel request whenever you are ready.";
const EMPTY_REPLY: &str = "Tell me where or when you would like to travel.";
const WEATHER_SAVED: &str = "Got it. I saved your weather preference.";
const WEATHER_RETRY: &str = "Please answer with: cold, mild, warm, or no preference.";
const FEEDBACK_THANKS: &str = "Thanks, I learned from your feedback.";
const NOTHING_SHOWN: &str =
    "I have not suggested any destinations yet. Tell me where or when you want to travel.";
const REGENERATED: &str = "I generated new options and excluded the previous destinations.";
const NEED_MORE_DETAIL: &str = "I need one more detail before regenerating options.";
const NO_RESULTS: &str =
    "I could not find fitting destinations. Could you adjust the date or constraints?";
const PROVIDER_ERROR: &str = "I hit a temporary data/provider issue while building recommendations. Please try again in a few seconds.";
const FEEDBACK_PROMPT: &str = "What do you think about these options?";

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    AwaitingOrigin,
    Ready,
    AwaitingClarification,
    Planning,
    ScoringDone,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::AwaitingOrigin => "awaiting_origin",
            SessionState::Ready => "ready",
            SessionState::AwaitingClarification => "awaiting_clarification",
            SessionState::Planning => "planning",
            SessionState::ScoringDone => "scoring_done",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// What one turn produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnResponse {
    OnboardingPrompt {
        message: String,
    },
    OriginSaved {
        origin: Origin,
        message: String,
    },
    Clarification {
        slot: Slot,
        question: String,
    },
    Ranked {
        entries: Vec<RankedEntry>,
        summary: String,
        prefix: Option<String>,
    },
    NoResults {
        message: String,
        prefix: Option<String>,
    },
    Info {
        message: String,
    },
    Error {
        message: String,
    },
    /// A newer turn started before this one finished
    Superseded,
}

impl TurnResponse {
    fn info(message: impl Into<String>) -> Self {
        TurnResponse::Info {
            message: message.into(),
        }
    }

    fn clarification(slot: Slot) -> Self {
        TurnResponse::Clarification {
            slot,
            question: slot.question().to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TurnResponse::OnboardingPrompt { .. } => "onboarding_prompt",
            TurnResponse::OriginSaved { .. } => "origin_saved",
            TurnResponse::Clarification { .. } => "clarification",
            TurnResponse::Ranked { .. } => "ranked",
            TurnResponse::NoResults { .. } => "no_results",
            TurnResponse::Info { .. } => "info",
            TurnResponse::Error { .. } => "error",
            TurnResponse::Superseded => "superseded",
        }
    }

    /// Place ids of the ranked entries, best first.
    pub fn place_ids(&self) -> Vec<String> {
        match self {
            TurnResponse::Ranked { entries, .. } => entries
                .iter()
                .map(|e| e.candidate.place_id.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Chat transcript text.
    pub fn render(&self) -> String {
        match self {
            TurnResponse::OnboardingPrompt { message }
            | TurnResponse::OriginSaved { message, .. }
            | TurnResponse::Info { message }
            | TurnResponse::Error { message } => message.clone(),
            TurnResponse::Clarification { question, .. } => question.clone(),
            TurnResponse::NoResults { message, prefix } => match prefix {
                Some(prefix) => format!("{}\n\n{}", prefix, message),
                None => message.clone(),
            },
            TurnResponse::Ranked {
                entries,
                summary,
                prefix,
            } => {
                let mut out = String::new();
                if let Some(prefix) = prefix {
                    out.push_str(prefix);
                    out.push_str("\n\n");
                }
                out.push_str(summary);
                out.push_str("\n\n");
                for (i, entry) in entries.iter().enumerate() {
                    let c = &entry.candidate;
                    out.push_str(&format!(
                        "{}. {}, {} ({:.0}/100)\n",
                        i + 1,
                        c.name,
                        c.country,
                        entry.score.total
                    ));
                    for line in &entry.score.rationale {
                        out.push_str(&format!("   - {}\n", line));
                    }
                }
                out.push('\n');
                out.push_str(FEEDBACK_PROMPT);
                out
            }
            TurnResponse::Superseded => String::new(),
        }
    }
}

/// A question waiting for its answer.
#[derive(Debug, Clone, PartialEq)]
struct PendingClarification {
    draft: String,
    slot: Slot,
}

#[derive(Debug)]
struct SessionData {
    state: SessionState,
    origin: Option<Origin>,
    context: ConversationContext,
    pending_slot: Option<PendingClarification>,
    /// Draft query parked behind the weather-preference question
    pending_weather: Option<String>,
    last_query: Option<String>,
}

impl SessionData {
    fn new(context_turns: usize) -> Self {
        Self {
            state: SessionState::AwaitingOrigin,
            origin: None,
            context: ConversationContext::with_limit(context_turns),
            pending_slot: None,
            pending_weather: None,
            last_query: None,
        }
    }
}

/// Deterministic summary used when narration is off or fails.
pub fn fallback_summary(query: &TripQuery, entries: &[RankedEntry]) -> String {
    let Some(best) = entries.first() else {
        return NO_RESULTS.to_string();
    };
    if query.is_opinion() {
        return format!(
            "{} scores {:.0}/100 for your trip.",
            best.candidate.name, best.score.total
        );
    }
    let mut summary = format!(
        "Best current match is {} with score {:.0}.",
        best.candidate.name, best.score.total
    );
    if entries.len() > 1 {
        summary.push_str(" I also included alternatives with clear tradeoffs.");
    }
    summary
}

fn failure_message(failure: &PlanningFailure) -> String {
    match failure {
        PlanningFailure::NoFeasibleDestinations { .. } => NO_RESULTS.to_string(),
        PlanningFailure::UnknownDestination(name) => format!(
            "I could not find a place called {}. Could you check the spelling or name a nearby city?",
            name
        ),
    }
}

pub struct Orchestrator {
    gateway: Arc<dyn ToolGateway>,
    router: Option<Arc<LLMRouter>>,
    parser: IntentParser,
    planner: Planner,
    memory: FeedbackMemory,
    sink: SharedSink,
    session_config: SessionConfig,
    narrate: bool,
    session: Mutex<SessionData>,
    latest_turn: AtomicU64,
}

impl Orchestrator {
    /// `router` is `None` when no model is configured.
    pub fn new(
        gateway: Arc<dyn ToolGateway>,
        router: Option<Arc<LLMRouter>>,
        config: &Config,
        sink: SharedSink,
    ) -> Self {
        let parser = IntentParser::new(router.as_ref().map(Arc::clone), Arc::clone(&sink));
        let planner = Planner::new(Arc::clone(&gateway), config.planner.clone(), Arc::clone(&sink));
        Self {
            gateway,
            router,
            parser,
            planner,
            memory: FeedbackMemory::new(),
            sink,
            session_config: config.session.clone(),
            narrate: config.llm.narrate_results,
            session: Mutex::new(SessionData::new(config.session.context_turns)),
            latest_turn: AtomicU64::new(0),
        }
    }

    fn session(&self) -> MutexGuard<'_, SessionData> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        let mut session = self.session();
        if session.state != state {
            tracing::debug!("Session state {} -> {}", session.state, state);
            session.state = state;
        }
    }

    fn is_current(&self, turn: u64) -> bool {
        self.latest_turn.load(Ordering::SeqCst) == turn
    }

    pub fn state(&self) -> SessionState {
        self.session().state
    }

    pub fn origin(&self) -> Option<Origin> {
        self.session().origin.clone()
    }

    pub fn memory(&self) -> &FeedbackMemory {
        &self.memory
    }

    /// First message of a session.
    pub fn greeting(&self) -> &'static str {
        if self.origin().is_some() {
            EMPTY_REPLY
        } else {
            ONBOARDING_PROMPT
        }
    }

    /// Forget feedback and the conversation, keeping the origin.
    pub fn reset(&self) {
        self.memory.reset();
        let mut session = self.session();
        session.context.clear();
        session.pending_slot = None;
        session.pending_weather = None;
        session.last_query = None;
        if session.origin.is_some() {
            session.state = SessionState::Ready;
        }
    }

    /// Process one user utterance.
    pub async fn handle_turn(&self, utterance: &str) -> TurnResponse {
        let turn = self.latest_turn.fetch_add(1, Ordering::SeqCst) + 1;

        with_correlation_id(new_correlation_id(), async {
            self.sink.record(
                EventKind::TurnStarted,
                json!({ "turn": turn, "utterance": utterance }),
            );

            let response = self.run_turn(turn, utterance.trim()).await;

            {
                let mut session = self.session();
                if matches!(
                    session.state,
                    SessionState::Planning | SessionState::ScoringDone | SessionState::Error
                ) {
                    tracing::debug!("Session state {} -> {}", session.state, SessionState::Ready);
                    session.state = SessionState::Ready;
                }
                if response != TurnResponse::Superseded {
                    session.context.push_turn(utterance, response.render());
                }
            }

            self.sink.record(
                EventKind::TurnCompleted,
                json!({ "turn": turn, "response": response.kind(), "state": self.state() }),
            );
            response
        })
        .await
    }

    async fn run_turn(&self, turn: u64, text: &str) -> TurnResponse {
        let origin = self.origin();
        let Some(origin) = origin else {
            if text.is_empty() {
                return TurnResponse::OnboardingPrompt {
                    message: ONBOARDING_PROMPT.to_string(),
                };
            }
            return self.onboard(turn, text).await;
        };

        if text.is_empty() {
            return TurnResponse::info(EMPTY_REPLY);
        }

        if is_acknowledgement(text) {
            let mut session = self.session();
            session.pending_slot = None;
            session.pending_weather = None;
            session.state = SessionState::Ready;
            return TurnResponse::info(ACK_REPLY);
        }

        let parked = self.session().pending_weather.take();
        if let Some(draft) = parked {
            match WeatherPreference::parse(text) {
                Some(preference) => {
                    self.memory.set_preferred_weather(preference);
                    self.set_state(SessionState::Ready);
                    return self.answer(turn, &draft, &origin, Some(WEATHER_SAVED)).await;
                }
                None if looks_like_new_travel_query(text) => {
                    tracing::debug!("Weather question abandoned for a new request");
                }
                None => {
                    self.session().pending_weather = Some(draft);
                    return TurnResponse::Clarification {
                        slot: Slot::WeatherPreference,
                        question: WEATHER_RETRY.to_string(),
                    };
                }
            }
        }

        let pending = self.session().pending_slot.take();
        let query_text = match pending {
            Some(p) if is_clarification_like_answer(p.slot, text) || !looks_like_new_travel_query(text) => {
                merge_answer(&p.draft, p.slot, text)
            }
            Some(p) => {
                tracing::debug!("Discarding stale clarification for {}", p.slot);
                text.to_string()
            }
            None => text.to_string(),
        };
        self.set_state(SessionState::Ready);

        self.answer(turn, &query_text, &origin, None).await
    }

    async fn onboard(&self, turn: u64, text: &str) -> TurnResponse {
        match validate_origin(self.gateway.as_ref(), text).await {
            OnboardingOutcome::Accepted(origin) => {
                if !self.is_current(turn) {
                    return TurnResponse::Superseded;
                }
                let message = OnboardingOutcome::confirmation(&origin);
                {
                    let mut session = self.session();
                    session.origin = Some(origin.clone());
                    session.state = SessionState::Ready;
                }
                TurnResponse::OriginSaved { origin, message }
            }
            OnboardingOutcome::Rejected(message) => TurnResponse::OnboardingPrompt {
                message: message.to_string(),
            },
        }
    }

    /// Parse a (possibly merged) request and act on it.
    async fn answer(
        &self,
        turn: u64,
        text: &str,
        origin: &Origin,
        prefix: Option<&str>,
    ) -> TurnResponse {
        let context = self.session().context.clone();
        let intent = match self.parser.parse(text, context).await {
            Ok(intent) => intent,
            Err(e) => {
                tracing::error!("Intent exchange failed: {}", e);
                self.set_state(SessionState::Error);
                return TurnResponse::Error {
                    message: PROVIDER_ERROR.to_string(),
                };
            }
        };
        if !self.is_current(turn) {
            return TurnResponse::Superseded;
        }
        tracing::info!("Intent: {}", intent.name());

        match intent {
            StructuredIntent::FeedbackStatement {
                polarity,
                option_index,
            } => self.apply_feedback(turn, polarity, option_index, origin).await,
            StructuredIntent::ClarificationNeeded { slot } => {
                let mut session = self.session();
                session.pending_slot = Some(PendingClarification {
                    draft: text.to_string(),
                    slot,
                });
                session.state = SessionState::AwaitingClarification;
                TurnResponse::clarification(slot)
            }
            request => {
                let Some(query) = request.to_query() else {
                    return TurnResponse::info(EMPTY_REPLY);
                };
                if self.should_ask_weather(&query) {
                    let mut session = self.session();
                    session.pending_weather = Some(text.to_string());
                    session.state = SessionState::AwaitingClarification;
                    return TurnResponse::clarification(Slot::WeatherPreference);
                }
                self.plan_and_rank(turn, text, &query, origin, prefix).await
            }
        }
    }

    fn should_ask_weather(&self, query: &TripQuery) -> bool {
        self.session_config.ask_weather_preference
            && !query.is_opinion()
            && query.weather_preference.is_none()
            && query.category() != ActivityCategory::Skiing
            && self.memory.preferred_weather().is_none()
    }

    async fn plan_and_rank(
        &self,
        turn: u64,
        text: &str,
        query: &TripQuery,
        origin: &Origin,
        prefix: Option<&str>,
    ) -> TurnResponse {
        self.set_state(SessionState::Planning);
        let planned = self.planner.plan(query, origin, &self.memory).await;
        if !self.is_current(turn) {
            return TurnResponse::Superseded;
        }

        let candidates = match planned {
            Ok(candidates) => candidates,
            Err(failure) => {
                tracing::info!("Planning failed: {}", failure);
                self.session().last_query = Some(text.to_string());
                return TurnResponse::NoResults {
                    message: failure_message(&failure),
                    prefix: prefix.map(str::to_string),
                };
            }
        };

        let ranked = scorer::score(candidates, query, &self.memory);
        self.set_state(SessionState::ScoringDone);
        let top = ranked.top(self.session_config.results_shown).to_vec();
        let summary = self.summarize(query, &top).await;

        if !self.is_current(turn) {
            return TurnResponse::Superseded;
        }

        let shown: Vec<ShownOption> = top
            .iter()
            .map(|e| ShownOption {
                place_id: e.candidate.place_id.clone(),
                name: e.candidate.name.clone(),
                country_code: e.candidate.country_code.clone(),
                feature_tags: e.candidate.feature_tags(),
            })
            .collect();
        self.memory.record_shown(shown.clone());
        {
            let mut session = self.session();
            session.context.set_shown(shown);
            session.last_query = Some(text.to_string());
        }

        self.sink.record(
            EventKind::Ranking,
            json!({
                "considered": ranked.len(),
                "shown": top.iter().map(|e| json!({
                    "place_id": e.candidate.place_id,
                    "name": e.candidate.name,
                    "total": e.score.total,
                    "degraded": e.candidate.degraded,
                })).collect::<Vec<_>>(),
            }),
        );

        TurnResponse::Ranked {
            entries: top,
            summary,
            prefix: prefix.map(str::to_string),
        }
    }

    async fn apply_feedback(
        &self,
        turn: u64,
        polarity: FeedbackPolarity,
        option_index: Option<usize>,
        origin: &Origin,
    ) -> TurnResponse {
        let shown = self.memory.previous_shown();
        if shown.is_empty() {
            return TurnResponse::info(NOTHING_SHOWN);
        }
        if !self.is_current(turn) {
            return TurnResponse::Superseded;
        }

        match polarity {
            FeedbackPolarity::Like => {
                let Some(option) = option_index.and_then(|i| shown.get(i)) else {
                    return TurnResponse::info(format!(
                        "Which option did you like? Reply with a number from 1 to {}, for example: like 1.",
                        shown.len()
                    ));
                };
                self.memory.record_like(&option.place_id, &option.feature_tags);
                self.sink.record(
                    EventKind::Feedback,
                    json!({ "polarity": polarity, "place_id": option.place_id, "tags": option.feature_tags }),
                );
                TurnResponse::info(FEEDBACK_THANKS)
            }
            FeedbackPolarity::Reject => {
                let ids: Vec<String> = shown.iter().map(|o| o.place_id.clone()).collect();
                self.memory.record_reject_all(&ids);
                self.sink.record(
                    EventKind::Feedback,
                    json!({ "polarity": polarity, "place_ids": &ids }),
                );

                let last_query = self.session().last_query.clone();
                match last_query {
                    Some(last) => self.regenerate(turn, &last, origin).await,
                    None => TurnResponse::info(FEEDBACK_THANKS),
                }
            }
        }
    }

    /// Re-run the last request with the fresh exclusions applied.
    async fn regenerate(&self, turn: u64, last_query: &str, origin: &Origin) -> TurnResponse {
        let context = self.session().context.clone();
        let intent = match self.parser.parse(last_query, context).await {
            Ok(intent) => intent,
            Err(e) => {
                tracing::error!("Intent exchange failed while regenerating: {}", e);
                self.set_state(SessionState::Error);
                return TurnResponse::Error {
                    message: PROVIDER_ERROR.to_string(),
                };
            }
        };
        match intent.to_query() {
            Some(query) => {
                self.plan_and_rank(turn, last_query, &query, origin, Some(REGENERATED))
                    .await
            }
            None => TurnResponse::info(NEED_MORE_DETAIL),
        }
    }

    /// One- or two-sentence summary of the ranking.
    async fn summarize(&self, query: &TripQuery, entries: &[RankedEntry]) -> String {
        let fallback = fallback_summary(query, entries);
        if !self.narrate || entries.is_empty() {
            return fallback;
        }
        let Some(router) = self.router.as_ref().filter(|r| r.has_providers()) else {
            return fallback;
        };

        let contract = PromptContract::new(
            "You are a travel assistant summarising ranked destination results for a traveller.",
            json!({
                "request": query,
                "results": entries.iter().map(|e| json!({
                    "name": e.candidate.name,
                    "country": e.candidate.country,
                    "total": (e.score.total * 10.0).round() / 10.0,
                    "rationale": e.score.rationale,
                })).collect::<Vec<_>>(),
            }),
            "In at most two sentences, say why the first result leads and what the alternatives offer. Use only facts present in DATA.",
            ResponseSchema::new(vec![FieldSpec::required("summary", FieldKind::String)]),
        );

        match contract::exchange(router, &contract, self.sink.as_ref()).await {
            Ok(reply) => reply
                .value
                .get("summary")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or(fallback),
            Err(e) => {
                tracing::warn!("Narration failed, using deterministic summary: {}", e);
                fallback
            }
        }
    }
}
