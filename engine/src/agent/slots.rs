//! Slot policy
//!
//! Which slots each intent needs before planning, the question asked for a
//! missing one, and how a follow-up answer is recognised and merged back into
//! the draft query.

use regex::Regex;
use sdk::types::MONTH_NAMES;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// A piece of information the user may be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Destination,
    Activity,
    TravelDateOrMonth,
    MaxFlightHours,
    WeatherPreference,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Destination => "destination",
            Slot::Activity => "activity",
            Slot::TravelDateOrMonth => "travel_date_or_month",
            Slot::MaxFlightHours => "max_flight_hours",
            Slot::WeatherPreference => "weather_preference",
        }
    }

    /// Question shown to the user when this slot is missing.
    pub fn question(&self) -> &'static str {
        match self {
            Slot::Destination => "Which destination are you considering?",
            Slot::Activity => "Which activity are you most interested in?",
            Slot::TravelDateOrMonth => "What date or month are you planning to travel?",
            Slot::MaxFlightHours => "What is your maximum flight duration in hours?",
            Slot::WeatherPreference => "Do you prefer cold, mild, warm weather, or no preference?",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn numeric_date() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b\d{1,2}[./-]\d{1,2}[./-]\d{2,4}\b").expect("Invalid date pattern")
    })
}

fn contains_month(lowered: &str) -> bool {
    lowered
        .split(|c: char| !c.is_alphabetic())
        .any(|word| MONTH_NAMES.contains(&word))
}

/// Whether `text` plausibly answers the question for `slot`.
pub fn is_clarification_like_answer(slot: Slot, text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return false;
    }
    match slot {
        Slot::TravelDateOrMonth => contains_month(&lowered) || numeric_date().is_match(&lowered),
        Slot::MaxFlightHours => lowered.parse::<f64>().is_ok() || lowered.contains("hour"),
        Slot::Destination => lowered.chars().count() > 2 && lowered.split_whitespace().count() <= 5,
        Slot::Activity => lowered.chars().count() > 2,
        Slot::WeatherPreference => {
            ["cold", "mild", "warm"].iter().any(|w| lowered.contains(w))
                || (lowered.contains("no") && lowered.contains("preference"))
        }
    }
}

/// Words that mark an utterance as a fresh travel request.
const TRAVEL_TERMS: &[&str] = &[
    "where", "go to", "trip", "travel", "ski", "beach", "hours", "flight",
];

/// True when `text` reads like a new request rather than a slot answer.
pub fn looks_like_new_travel_query(text: &str) -> bool {
    let lowered = text.to_lowercase();
    TRAVEL_TERMS.iter().any(|t| lowered.contains(t)) || contains_month(&lowered)
}

/// Fold an answer into the draft as an explicit `slot: value` fragment.
pub fn merge_answer(draft: &str, slot: Slot, answer: &str) -> String {
    let answer = answer.trim();
    if slot == Slot::MaxFlightHours {
        if let Ok(hours) = answer.parse::<f64>() {
            return format!("{} | {}: {}", draft, slot, hours);
        }
    }
    format!("{} | {}: {}", draft, slot, answer)
}

const ACKNOWLEDGEMENTS: &[&str] = &[
    "ok", "okay", "cool", "great", "nice", "good", "thanks", "thank you", "perfect", "sounds good",
];

/// Short replies that need no planning ("ok", "thanks").
pub fn is_acknowledgement(text: &str) -> bool {
    let cleaned: String = text
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    ACKNOWLEDGEMENTS.contains(&cleaned.as_str())
}
