//! Intent Parser
//!
//! Two stages. A deterministic rule pass extracts slots with regexes and picks
//! an intent; when a model is configured, a structured exchange refines the
//! result and any non-null field it returns overrides the rule value. Explicit
//! `slot: value` fragments (merged clarification answers) always win.
//!
//! The parser never returns a silent default: a request missing a required
//! slot becomes [`StructuredIntent::ClarificationNeeded`].

use regex::Regex;
use sdk::types::MONTH_NAMES;
use sdk::{TemperatureBand, TravelWhen};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::context::ConversationContext;
use super::slots::Slot;
use crate::conductor::TripQuery;
use crate::events::{EventKind, SharedSink};
use crate::llm::contract::{self, ContractError, FieldKind, FieldSpec, PromptContract, ResponseSchema};
use crate::llm::router::LLMRouter;

/// Request family, named as the model sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum IntentKind {
    #[default]
    #[serde(rename = "destination_opinion")]
    DestinationOpinion,
    #[serde(rename = "activity_based_discovery")]
    ActivityDiscovery,
    #[serde(rename = "constraint_based_discovery")]
    ConstraintDiscovery,
}

impl IntentKind {
    pub const ALL: [IntentKind; 3] = [
        IntentKind::DestinationOpinion,
        IntentKind::ActivityDiscovery,
        IntentKind::ConstraintDiscovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::DestinationOpinion => "destination_opinion",
            IntentKind::ActivityDiscovery => "activity_based_discovery",
            IntentKind::ConstraintDiscovery => "constraint_based_discovery",
        }
    }

    /// Accept an exact name or a reply that embeds one.
    pub fn sanitize(value: &str) -> Option<Self> {
        let lowered = value.trim().to_lowercase();
        IntentKind::ALL
            .iter()
            .find(|k| k.as_str() == lowered)
            .or_else(|| IntentKind::ALL.iter().find(|k| lowered.contains(k.as_str())))
            .copied()
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackPolarity {
    Like,
    Reject,
}

/// Exactly one per turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum StructuredIntent {
    DestinationOpinion {
        place: String,
        when: Option<TravelWhen>,
    },
    ActivityRequest {
        activity: String,
        when: Option<TravelWhen>,
        weather_preference: Option<TemperatureBand>,
    },
    ConstraintRequest {
        when: Option<TravelWhen>,
        max_flight_hours: Option<f64>,
        activity: Option<String>,
        no_flight_limit: bool,
        weather_preference: Option<TemperatureBand>,
    },
    FeedbackStatement {
        polarity: FeedbackPolarity,
        /// Zero-based index into the options shown last
        option_index: Option<usize>,
    },
    ClarificationNeeded {
        slot: Slot,
    },
}

impl StructuredIntent {
    pub fn name(&self) -> &'static str {
        match self {
            StructuredIntent::DestinationOpinion { .. } => "destination_opinion",
            StructuredIntent::ActivityRequest { .. } => "activity_request",
            StructuredIntent::ConstraintRequest { .. } => "constraint_request",
            StructuredIntent::FeedbackStatement { .. } => "feedback_statement",
            StructuredIntent::ClarificationNeeded { .. } => "clarification_needed",
        }
    }

    /// Planning view of a travel request; `None` for feedback and clarifications.
    pub fn to_query(&self) -> Option<TripQuery> {
        match self {
            StructuredIntent::DestinationOpinion { place, when } => Some(TripQuery {
                destination: Some(place.clone()),
                when: *when,
                ..TripQuery::default()
            }),
            StructuredIntent::ActivityRequest {
                activity,
                when,
                weather_preference,
            } => Some(TripQuery {
                activity: Some(activity.clone()),
                when: *when,
                weather_preference: *weather_preference,
                ..TripQuery::default()
            }),
            StructuredIntent::ConstraintRequest {
                when,
                max_flight_hours,
                activity,
                no_flight_limit,
                weather_preference,
            } => Some(TripQuery {
                destination: None,
                activity: activity.clone(),
                when: *when,
                max_flight_hours: if *no_flight_limit { None } else { *max_flight_hours },
                weather_preference: *weather_preference,
            }),
            StructuredIntent::FeedbackStatement { .. }
            | StructuredIntent::ClarificationNeeded { .. } => None,
        }
    }

    /// Activity named by the request, if any.
    pub fn activity(&self) -> Option<&str> {
        match self {
            StructuredIntent::ActivityRequest { activity, .. } => Some(activity),
            StructuredIntent::ConstraintRequest { activity, .. } => activity.as_deref(),
            _ => None,
        }
    }

    pub fn weather_preference(&self) -> Option<TemperatureBand> {
        match self {
            StructuredIntent::ActivityRequest {
                weather_preference, ..
            }
            | StructuredIntent::ConstraintRequest {
                weather_preference, ..
            } => *weather_preference,
            _ => None,
        }
    }
}

struct RulePatterns {
    explicit_slot: Regex,
    month: Regex,
    numeric_date: Regex,
    hours: Regex,
    like_option: Regex,
}

fn patterns() -> &'static RulePatterns {
    static PATTERNS: OnceLock<RulePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| RulePatterns {
        explicit_slot: Regex::new(
            r"(destination|activity|travel_date_or_month|max_flight_hours):\s*([^|]+)",
        )
        .expect("Invalid explicit slot pattern"),
        month: Regex::new(&format!(r"\b({})\b", MONTH_NAMES.join("|")))
            .expect("Invalid month pattern"),
        numeric_date: Regex::new(r"\b(?:\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[./-]\d{1,2}(?:[./-]\d{2,4})?)\b")
            .expect("Invalid date pattern"),
        hours: Regex::new(r"(\d+(?:\.\d+)?)\s*(?:h\b|hour|hr)").expect("Invalid hours pattern"),
        like_option: Regex::new(
            r"\b(?:like|liked|love|loved|prefer|pick|choose)\s+(?:the\s+)?(?:(?:option|number)\s*#?([1-5])\b|#([1-5])\b|(first|second|third|fourth|fifth)\s+(?:one|option)\b|([1-5])\s*[.!]*\s*$)",
        )
        .expect("Invalid like pattern"),
    })
}

const REJECT_PHRASES: &[&str] = &[
    "didn't like",
    "did not like",
    "don't like these",
    "don't like them",
    "don't like any",
    "do not like these",
    "do not like them",
    "do not like any",
    "none of",
    "new options",
    "not good",
    "other options",
];

const NO_LIMIT_PHRASES: &[&str] = &[
    "no limit",
    "without limit",
    "without duration limitation",
    "without duration limit",
    "no duration limit",
    "no flight limit",
    "without flight limit",
];

const DISCOVERY_PHRASES: &[&str] = &[
    "where should i go",
    "where to go",
    "recommend destination",
    "places to go",
    "offer me places",
    "sunny place",
    "warm place",
];

/// A captured place phrase is cut at the first of these words.
const PLACE_STOP_WORDS: &[&str] = &[
    "for", "during", "with", "on", "at", "next", "this", "and", "under", "within", "by", "from",
    "around", "max", "maximum", "no", "without", "in", "to", "is", "it", "worth", "or", "if",
    "about", "visit", "visiting",
];

/// Captures starting with one of these are verbs, not places.
const NON_PLACE_STARTS: &[&str] = &["go", "travel", "fly", "visit", "be", "ski", "see", "do", "the", "a"];

/// True when the text names a month, a date, a flight limit, an activity or a weather band.
fn carries_travel_slots(lowered: &str) -> bool {
    date_or_month(lowered).is_some()
        || max_hours(lowered).is_some()
        || has_no_limit_phrase(lowered)
        || activity_from_text(lowered).is_some()
        || weather_from_text(lowered).is_some()
}

/// Detect feedback on the options shown last.
///
/// Only explicit option references count as a like ("option 2", "the first
/// one", a trailing "like 3"). An utterance that also carries travel slots is
/// a new request, not feedback.
pub fn detect_feedback(text: &str) -> Option<(FeedbackPolarity, Option<usize>)> {
    let lowered = text.to_lowercase().replace('’', "'");
    if carries_travel_slots(&lowered) {
        return None;
    }
    if REJECT_PHRASES.iter().any(|p| lowered.contains(p)) {
        return Some((FeedbackPolarity::Reject, None));
    }
    let captures = patterns().like_option.captures(lowered.trim())?;
    let reference = (1..=4).find_map(|i| captures.get(i))?;
    let index = match reference.as_str() {
        "first" | "1" => 0,
        "second" | "2" => 1,
        "third" | "3" => 2,
        "fourth" | "4" => 3,
        _ => 4,
    };
    Some((FeedbackPolarity::Like, Some(index)))
}

/// True for phrases that describe a kind of place rather than name one.
pub fn is_generic_destination(value: &str) -> bool {
    const GENERIC: &[&str] = &[
        "place", "places", "destination", "somewhere", "anywhere", "sunny place", "warm place",
        "cold place",
    ];
    let lowered = value.trim().to_lowercase();
    GENERIC.contains(&lowered.as_str())
        || [" place", "destination", "somewhere", "anywhere"]
            .iter()
            .any(|t| lowered.contains(t))
}

pub fn has_no_limit_phrase(lowered: &str) -> bool {
    NO_LIMIT_PHRASES.iter().any(|p| lowered.contains(p))
}

/// Weather band named in the query itself ("warm places", "cold weather").
pub fn weather_from_text(lowered: &str) -> Option<TemperatureBand> {
    let mentions = |band: &str| {
        [" place", " weather"]
            .iter()
            .any(|suffix| lowered.contains(&format!("{}{}", band, suffix)))
    };
    if mentions("cold") {
        Some(TemperatureBand::Cold)
    } else if mentions("warm") {
        Some(TemperatureBand::Warm)
    } else if mentions("mild") {
        Some(TemperatureBand::Mild)
    } else {
        None
    }
}

fn activity_from_text(lowered: &str) -> Option<String> {
    if lowered.contains("ski") {
        Some("skiing".to_string())
    } else if lowered.contains("beach") {
        Some("beach".to_string())
    } else if lowered.contains("museum") {
        Some("museums".to_string())
    } else {
        None
    }
}

fn date_or_month(lowered: &str) -> Option<String> {
    let p = patterns();
    if let Some(month) = p.month.find(lowered) {
        return Some(month.as_str().to_string());
    }
    // "4.5 hours" is a duration, not a date
    p.numeric_date
        .find_iter(lowered)
        .find(|m| !lowered[m.end()..].trim_start().starts_with('h'))
        .map(|m| m.as_str().to_string())
}

fn max_hours(lowered: &str) -> Option<f64> {
    patterns()
        .hours
        .captures(lowered)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Words after which a place name may follow.
const PLACE_MARKERS: &[&str] = &["to", "in", "about", "visit", "visiting"];

/// Split into words, turning punctuation and digits into a `.` boundary token.
fn place_tokens(text: &str) -> Vec<String> {
    let mut spaced = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphabetic() || c == '\'' || c == '-' {
            spaced.push(c);
        } else if c.is_whitespace() {
            spaced.push(' ');
        } else {
            spaced.push_str(" . ");
        }
    }
    spaced.split_whitespace().map(str::to_string).collect()
}

/// A place named in the utterance.
#[derive(Debug, Clone, PartialEq)]
enum PlaceMention {
    Named(String),
    /// "somewhere warm", "a sunny place"
    Generic,
    Absent,
}

/// Find a named place. `allow_bare` accepts a short bare phrase ("crete").
fn extract_destination(lowered: &str, allow_bare: bool) -> PlaceMention {
    let without_slots = lowered.split('|').next().unwrap_or(lowered);
    let cleaned = patterns().month.replace_all(without_slots, " ");
    let tokens = place_tokens(&cleaned);
    let mut generic = false;

    for (i, token) in tokens.iter().enumerate() {
        if !PLACE_MARKERS.contains(&token.as_str()) {
            continue;
        }
        let phrase: Vec<&str> = tokens[i + 1..]
            .iter()
            .map(String::as_str)
            .take_while(|w| *w != "." && !PLACE_STOP_WORDS.contains(w))
            .collect();
        let Some(first) = phrase.first() else {
            continue;
        };
        let candidate = phrase.join(" ");
        if is_generic_destination(&candidate) {
            generic = true;
            continue;
        }
        if NON_PLACE_STARTS.contains(first) {
            continue;
        }
        if candidate.chars().count() > 2 {
            return PlaceMention::Named(title_case(&candidate));
        }
    }

    if allow_bare {
        let bare = cleaned.trim().trim_matches(|c: char| "?.,!".contains(c)).trim();
        let short = !bare.is_empty()
            && bare.split_whitespace().count() <= 3
            && bare.chars().all(|c| c.is_alphabetic() || c.is_whitespace());
        if short {
            if is_generic_destination(bare) {
                return PlaceMention::Generic;
            }
            return PlaceMention::Named(title_case(bare));
        }
    }

    if generic {
        PlaceMention::Generic
    } else {
        PlaceMention::Absent
    }
}

/// Resolve a month name, a numeric date or a season word.
pub fn parse_when(text: &str) -> Option<TravelWhen> {
    if let Some(when) = TravelWhen::parse(text) {
        return Some(when);
    }
    let lowered = text.to_lowercase();
    if let Some(found) = patterns().month.find(&lowered) {
        return TravelWhen::parse(found.as_str());
    }
    if let Some(found) = patterns().numeric_date.find(&lowered) {
        return TravelWhen::parse(found.as_str());
    }
    let season_month = if lowered.contains("winter") {
        1
    } else if lowered.contains("spring") {
        4
    } else if lowered.contains("summer") {
        7
    } else if lowered.contains("autumn") || lowered.contains("fall") {
        10
    } else {
        return None;
    };
    Some(TravelWhen::Month {
        month: season_month,
    })
}

/// `slot: value` fragments appended to a draft by clarification merges.
#[derive(Debug, Clone, Default, PartialEq)]
struct ExplicitSlots {
    destination: Option<String>,
    activity: Option<String>,
    travel_date_or_month: Option<String>,
    max_flight_hours: Option<f64>,
}

fn explicit_slots(lowered: &str) -> ExplicitSlots {
    let mut slots = ExplicitSlots::default();
    for captures in patterns().explicit_slot.captures_iter(lowered) {
        let (Some(key), Some(value)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let value = value.as_str().trim_matches(|c: char| " .,?".contains(c)).to_string();
        if value.is_empty() {
            continue;
        }
        match key.as_str() {
            "destination" => slots.destination = Some(title_case(&value)),
            "activity" => slots.activity = Some(value),
            "travel_date_or_month" => slots.travel_date_or_month = Some(value),
            "max_flight_hours" => {
                if let Ok(hours) = value.parse::<f64>() {
                    slots.max_flight_hours = Some(hours);
                } else if let Some(hours) = max_hours(&value) {
                    slots.max_flight_hours = Some(hours);
                }
            }
            _ => {}
        }
    }
    slots
}

/// Slot values gathered so far for a travel request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntentDraft {
    pub kind: IntentKind,
    pub destination: Option<String>,
    pub activity: Option<String>,
    pub travel_date_or_month: Option<String>,
    pub max_flight_hours: Option<f64>,
    pub no_flight_limit: bool,
    pub weather_preference: Option<TemperatureBand>,
    /// The utterance describes a kind of place instead of naming one
    #[serde(skip)]
    mentions_generic_place: bool,
}

impl IntentDraft {
    /// Deterministic extraction.
    pub fn from_rules(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let explicit = explicit_slots(&lowered);
        let request = lowered.split('|').next().unwrap_or(&lowered);

        let activity = explicit.activity.clone().or_else(|| activity_from_text(request));
        let weather_preference = weather_from_text(request);
        let no_flight_limit = has_no_limit_phrase(&lowered);
        let max_flight_hours = if no_flight_limit {
            None
        } else {
            explicit.max_flight_hours.or_else(|| max_hours(request))
        };
        let travel_date_or_month = explicit
            .travel_date_or_month
            .clone()
            .or_else(|| date_or_month(request));

        let allow_bare = activity.is_none()
            && max_flight_hours.is_none()
            && !no_flight_limit
            && weather_preference.is_none();
        let (destination, mentions_generic_place) = match explicit.destination.clone() {
            Some(destination) => (Some(destination), false),
            None => match extract_destination(&lowered, allow_bare) {
                PlaceMention::Named(name) => (Some(name), false),
                PlaceMention::Generic => (None, true),
                PlaceMention::Absent => (None, false),
            },
        };

        let mut draft = Self {
            kind: IntentKind::DestinationOpinion,
            destination,
            activity,
            travel_date_or_month,
            max_flight_hours,
            no_flight_limit,
            weather_preference,
            mentions_generic_place,
        };
        draft.kind = draft.infer_kind(&lowered);
        draft
    }

    fn infer_kind(&self, lowered: &str) -> IntentKind {
        if self.activity.is_some() {
            return IntentKind::ActivityDiscovery;
        }
        let asks_discovery = DISCOVERY_PHRASES.iter().any(|p| lowered.contains(p))
            || self.weather_preference.is_some()
            || self.mentions_generic_place;
        let has_constraint = self.max_flight_hours.is_some()
            || self.no_flight_limit
            || lowered.contains("not more than")
            || lowered.contains("max flight")
            || (lowered.contains("within") && lowered.contains("hour"));
        if asks_discovery || (has_constraint && self.destination.is_none()) {
            IntentKind::ConstraintDiscovery
        } else {
            IntentKind::DestinationOpinion
        }
    }

    /// Override with the model's non-null fields.
    pub fn apply_refinement(&mut self, value: &Value) {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        if let Some(kind) = value.get("intent").and_then(Value::as_str).and_then(IntentKind::sanitize) {
            self.kind = kind;
        }
        if let Some(destination) = text("destination") {
            self.destination = Some(destination);
        }
        if let Some(activity) = text("activity") {
            self.activity = Some(activity);
        }
        if let Some(when) = text("travel_date_or_month") {
            self.travel_date_or_month = Some(when);
        }
        if !self.no_flight_limit {
            if let Some(hours) = value.get("max_flight_hours").and_then(Value::as_f64) {
                self.max_flight_hours = Some(hours);
            }
        }
    }

    fn apply_explicit(&mut self, explicit: ExplicitSlots) {
        if explicit.destination.is_some() {
            self.destination = explicit.destination;
        }
        if explicit.activity.is_some() {
            self.activity = explicit.activity;
        }
        if explicit.travel_date_or_month.is_some() {
            self.travel_date_or_month = explicit.travel_date_or_month;
        }
        if explicit.max_flight_hours.is_some() && !self.no_flight_limit {
            self.max_flight_hours = explicit.max_flight_hours;
        }
    }

    /// Reconcile the intent with the slots actually present.
    pub fn normalize(&mut self) {
        if self.max_flight_hours.is_some_and(|h| h <= 0.0 || !h.is_finite()) {
            self.max_flight_hours = None;
        }
        if self.kind == IntentKind::ConstraintDiscovery
            && self.destination.is_some()
            && self.max_flight_hours.is_none()
            && !self.no_flight_limit
            && self.weather_preference.is_none()
        {
            self.kind = IntentKind::DestinationOpinion;
        }
        if self.no_flight_limit {
            self.kind = IntentKind::ConstraintDiscovery;
        }
        if self
            .destination
            .as_deref()
            .is_some_and(is_generic_destination)
        {
            self.destination = None;
            if self.kind == IntentKind::DestinationOpinion {
                self.kind = IntentKind::ConstraintDiscovery;
            }
        }
    }

    /// First required slot that is still empty or unusable.
    pub fn missing_slot(&self) -> Option<Slot> {
        let has_when = self
            .travel_date_or_month
            .as_deref()
            .and_then(parse_when)
            .is_some();
        match self.kind {
            IntentKind::DestinationOpinion => {
                if self.destination.is_none() {
                    Some(Slot::Destination)
                } else if !has_when {
                    Some(Slot::TravelDateOrMonth)
                } else {
                    None
                }
            }
            IntentKind::ActivityDiscovery => {
                if self.activity.is_none() {
                    Some(Slot::Activity)
                } else if !has_when {
                    Some(Slot::TravelDateOrMonth)
                } else {
                    None
                }
            }
            IntentKind::ConstraintDiscovery => {
                if !has_when {
                    Some(Slot::TravelDateOrMonth)
                } else if self.max_flight_hours.is_none() && !self.no_flight_limit {
                    Some(Slot::MaxFlightHours)
                } else {
                    None
                }
            }
        }
    }

    /// Apply the slot policy and build the final intent.
    pub fn into_intent(self) -> StructuredIntent {
        if let Some(slot) = self.missing_slot() {
            return StructuredIntent::ClarificationNeeded { slot };
        }
        let when = self.travel_date_or_month.as_deref().and_then(parse_when);
        match self.kind {
            IntentKind::DestinationOpinion => match self.destination {
                Some(place) => StructuredIntent::DestinationOpinion { place, when },
                None => StructuredIntent::ClarificationNeeded {
                    slot: Slot::Destination,
                },
            },
            IntentKind::ActivityDiscovery => match self.activity {
                Some(activity) => StructuredIntent::ActivityRequest {
                    activity,
                    when,
                    weather_preference: self.weather_preference,
                },
                None => StructuredIntent::ClarificationNeeded {
                    slot: Slot::Activity,
                },
            },
            IntentKind::ConstraintDiscovery => StructuredIntent::ConstraintRequest {
                when,
                max_flight_hours: self.max_flight_hours,
                activity: self.activity,
                no_flight_limit: self.no_flight_limit,
                weather_preference: self.weather_preference,
            },
        }
    }
}

/// Response shape for the refinement exchange.
pub fn intent_schema() -> ResponseSchema {
    ResponseSchema::new(vec![
        FieldSpec::required(
            "intent",
            FieldKind::Enum(IntentKind::ALL.iter().map(|k| k.as_str()).collect()),
        ),
        FieldSpec::nullable("destination", FieldKind::String),
        FieldSpec::nullable("activity", FieldKind::String),
        FieldSpec::nullable("travel_date_or_month", FieldKind::String),
        FieldSpec::nullable("max_flight_hours", FieldKind::Number),
    ])
}

pub struct IntentParser {
    router: Option<Arc<LLMRouter>>,
    sink: SharedSink,
}

impl IntentParser {
    /// `router` is `None` when no model is configured; parsing is then rules only.
    pub fn new(router: Option<Arc<LLMRouter>>, sink: SharedSink) -> Self {
        Self { router, sink }
    }

    /// Rules-only parse. Never fails.
    pub fn parse_rules(utterance: &str) -> StructuredIntent {
        if let Some((polarity, option_index)) = detect_feedback(utterance) {
            return StructuredIntent::FeedbackStatement {
                polarity,
                option_index,
            };
        }
        let mut draft = IntentDraft::from_rules(utterance);
        draft.normalize();
        draft.into_intent()
    }

    /// Parse one utterance.
    ///
    /// A model that cannot be reached degrades to the rule result. A reply that
    /// fails schema validation after its repair round is returned as
    /// [`ContractError::Schema`].
    pub async fn parse(
        &self,
        utterance: &str,
        context: ConversationContext,
    ) -> Result<StructuredIntent, ContractError> {
        if let Some((polarity, option_index)) = detect_feedback(utterance) {
            return Ok(StructuredIntent::FeedbackStatement {
                polarity,
                option_index,
            });
        }

        let mut draft = IntentDraft::from_rules(utterance);

        if let Some(router) = self.router.as_ref().filter(|r| r.has_providers()) {
            let contract = Self::contract(utterance, &context);
            match contract::exchange(router, &contract, self.sink.as_ref()).await {
                Ok(reply) => {
                    tracing::debug!(
                        "Intent refined by {}{}",
                        reply.provider,
                        if reply.repaired { " after repair" } else { "" }
                    );
                    draft.apply_refinement(&reply.value);
                    draft.apply_explicit(explicit_slots(&utterance.to_lowercase()));
                }
                Err(ContractError::Transport(e)) => {
                    tracing::warn!("Intent refinement unavailable, using rules: {}", e);
                }
                Err(e @ ContractError::Schema(_)) => return Err(e),
            }
        }

        draft.normalize();
        self.sink.record(
            EventKind::Planning,
            json!({ "stage": "intent", "draft": &draft }),
        );
        Ok(draft.into_intent())
    }

    fn contract(utterance: &str, context: &ConversationContext) -> PromptContract {
        let recent: Vec<Value> = context
            .turns()
            .map(|t| json!({ "user": t.user, "assistant": t.assistant }))
            .collect();
        PromptContract::new(
            "You are an intent and slot extractor for a travel assistant.",
            json!({
                "user_text": utterance,
                "allowed_intents": IntentKind::ALL.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
                "recent_turns": recent,
            }),
            "Classify the intent and extract destination, activity, travel_date_or_month, and max_flight_hours if present. Use null for anything not stated.",
            intent_schema(),
        )
    }
}
