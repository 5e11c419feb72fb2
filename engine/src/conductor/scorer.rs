//! Destination Scorer
//!
//! Four bounded factors per candidate:
//!
//! | factor             | band  |
//! |--------------------|-------|
//! | activity fit       | 0–40  |
//! | weather fit        | 0–30  |
//! | flight feasibility | 0–20  |
//! | diversity/novelty  | 0–10  |
//!
//! The scorer reads Feedback Memory once, up front, and never writes to it.

use sdk::{Season, TemperatureBand};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use super::memory::FeedbackMemory;
use super::types::{ActivityCategory, CandidateDestination, RankedEntry, RankedResult, Score, TripQuery};

pub const ACTIVITY_MAX: f64 = 40.0;
pub const WEATHER_MAX: f64 = 30.0;
pub const FLIGHT_MAX: f64 = 20.0;
pub const DIVERSITY_MAX: f64 = 10.0;

/// Share of the activity band earned from POI evidence; the rest is preference.
const ACTIVITY_POI_CAP: f64 = 32.0;
const ACTIVITY_PREFERENCE_CAP: f64 = ACTIVITY_MAX - ACTIVITY_POI_CAP;

const WEATHER_NEUTRAL: f64 = 15.0;
const FLIGHT_UNKNOWN: f64 = 8.0;

const VARIETY_CAP: f64 = 6.0;
const NEW_COUNTRY_BONUS: f64 = 2.0;
const ALIGNMENT_CAP: f64 = 2.0;

/// Everything the factors need, captured once per ranking.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub category: ActivityCategory,
    pub season: Season,
    /// Weather band the user asked for; `None` scores weather neutrally
    pub weather_band: Option<TemperatureBand>,
    /// Country codes of the preceding ranking
    pub previous_countries: HashSet<String>,
    pub profile: BTreeMap<String, f64>,
}

impl ScoringContext {
    pub fn new(query: &TripQuery, memory: &FeedbackMemory) -> Self {
        let snapshot = memory.snapshot();
        let weather_band = query
            .weather_preference
            .or_else(|| snapshot.preferred_weather.and_then(|p| p.band()));
        let previous_countries = memory
            .previous_shown()
            .into_iter()
            .map(|o| o.country_code.to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        Self {
            category: query.category(),
            season: query.season(),
            weather_band,
            previous_countries,
            profile: snapshot.preference_profile,
        }
    }

    fn weight(&self, tag: &str) -> f64 {
        self.profile.get(tag).copied().unwrap_or(0.0)
    }

    /// Preference weight of the candidate's activity tag.
    fn activity_bias(&self, tags: &[String]) -> f64 {
        tags.iter()
            .filter(|t| t.starts_with("activity:"))
            .map(|t| self.weight(t))
            .sum()
    }

    /// Preference weight of the candidate's remaining tags.
    fn alignment_bias(&self, tags: &[String]) -> f64 {
        tags.iter()
            .filter(|t| !t.starts_with("activity:"))
            .map(|t| self.weight(t))
            .sum()
    }
}

/// Saturating map of an unbounded weight onto `(-cap, cap)`; strictly increasing.
fn saturate(weight: f64, cap: f64) -> f64 {
    cap * weight / (1.0 + weight.abs())
}

/// POI evidence plus the preference bias for the candidate's activity tag.
pub fn activity_fit(candidate: &CandidateDestination, ctx: &ScoringContext, bias: f64) -> (f64, String) {
    let poi_count = candidate.points_of_interest.len();
    let mut evidence = (poi_count as f64 / 5.0).min(ACTIVITY_POI_CAP);
    let mut note = String::new();

    if ctx.category == ActivityCategory::Skiing {
        match ctx.season {
            Season::Winter => {
                evidence = (evidence + 12.0).min(ACTIVITY_POI_CAP);
                note.push_str(", in ski season");
            }
            Season::Unknown => {}
            _ => {
                evidence = (evidence - 15.0).max(5.0);
                note.push_str(", outside ski season");
            }
        }
    }

    let preference = saturate(bias, ACTIVITY_PREFERENCE_CAP);
    if bias > 0.0 {
        note.push_str(", matches activities you liked");
    }

    let value = (evidence + preference).clamp(0.0, ACTIVITY_MAX);
    let subject = match ctx.category {
        ActivityCategory::General => "things to do".to_string(),
        other => format!("{} spots", other),
    };
    (value, format!("Activity: {} {} nearby{}", poi_count, subject, note))
}

/// Distance between the preferred band and the forecast, minus a rain penalty.
/// Without a preference every forecast scores the neutral mid band.
pub fn weather_fit(candidate: &CandidateDestination, ctx: &ScoringContext) -> (f64, String) {
    let Some(weather) = &candidate.weather else {
        return (
            WEATHER_NEUTRAL,
            "Weather: forecast unavailable, scored neutral".to_string(),
        );
    };

    let avg = weather.average_temp_c();
    let rain = weather.precipitation_mm.max(0.0);

    let (value, wanted) = match ctx.weather_band {
        Some(band) => {
            let dryness = 20.0 - (rain * 1.2).min(10.0);
            let closeness = (10.0 - (avg - band.target_celsius()).abs()).max(0.0);
            (dryness + closeness, format!(" vs your {} preference", band))
        }
        None => (WEATHER_NEUTRAL, String::new()),
    };

    (
        value.clamp(0.0, WEATHER_MAX),
        format!(
            "Weather: avg {:.1}°C ({}, {}){}",
            avg, weather.temperature_band, weather.precipitation_summary, wanted
        ),
    )
}

/// Shorter flights score higher.
pub fn flight_feasibility(candidate: &CandidateDestination) -> (f64, String) {
    match candidate.estimated_flight_hours {
        Some(hours) => (
            (FLIGHT_MAX - 1.6 * hours).clamp(0.0, FLIGHT_MAX),
            format!("Flight: about {:.1} h from your origin", hours),
        ),
        None => (
            FLIGHT_UNKNOWN,
            "Flight: duration could not be estimated".to_string(),
        ),
    }
}

/// Attraction variety, a bonus for a country not shown last time, and profile alignment.
pub fn diversity_novelty(
    candidate: &CandidateDestination,
    ctx: &ScoringContext,
    alignment: f64,
) -> (f64, String) {
    let unique = candidate.unique_poi_names();
    let variety = (unique as f64 / 2.0).min(VARIETY_CAP);

    let repeated = ctx
        .previous_countries
        .contains(&candidate.country_code.to_lowercase());
    let novelty = if repeated { 0.0 } else { NEW_COUNTRY_BONUS };

    let aligned = saturate(alignment.max(0.0), ALIGNMENT_CAP);

    let value = (variety + novelty + aligned).clamp(0.0, DIVERSITY_MAX);
    let country_note = if repeated {
        "same country as your previous options"
    } else {
        "adds a new country"
    };
    (
        value,
        format!("Variety: {} distinct attractions, {}", unique, country_note),
    )
}

/// Score one candidate.
pub fn score_candidate(candidate: &CandidateDestination, ctx: &ScoringContext) -> Score {
    let tags = candidate.feature_tags();

    let (activity_fit, activity_line) = activity_fit(candidate, ctx, ctx.activity_bias(&tags));
    let (weather_fit, weather_line) = weather_fit(candidate, ctx);
    let (flight_feasibility, flight_line) = flight_feasibility(candidate);
    let (diversity_novelty, diversity_line) =
        diversity_novelty(candidate, ctx, ctx.alignment_bias(&tags));

    let mut rationale = vec![activity_line, weather_line, flight_line, diversity_line];
    if candidate.degraded {
        rationale.push(format!(
            "Partial data: {}",
            candidate.degraded_reasons.join("; ")
        ));
    }

    Score {
        activity_fit,
        weather_fit,
        flight_feasibility,
        diversity_novelty,
        total: activity_fit + weather_fit + flight_feasibility + diversity_novelty,
        rationale,
    }
}

/// Descending by total, then lower flight hours (unknown last), then discovery order.
fn rank_order(a: &RankedEntry, b: &RankedEntry) -> Ordering {
    b.score
        .total
        .partial_cmp(&a.score.total)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            let ha = a.candidate.estimated_flight_hours.unwrap_or(f64::INFINITY);
            let hb = b.candidate.estimated_flight_hours.unwrap_or(f64::INFINITY);
            ha.partial_cmp(&hb).unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.candidate.discovery_index.cmp(&b.candidate.discovery_index))
}

/// Score and rank every candidate.
pub fn score(
    candidates: Vec<CandidateDestination>,
    query: &TripQuery,
    memory: &FeedbackMemory,
) -> RankedResult {
    let ctx = ScoringContext::new(query, memory);

    let mut entries: Vec<RankedEntry> = candidates
        .into_iter()
        .map(|candidate| {
            let score = score_candidate(&candidate, &ctx);
            RankedEntry { candidate, score }
        })
        .collect();
    entries.sort_by(rank_order);

    if let Some(best) = entries.first() {
        tracing::debug!(
            "Ranked {} candidates, best {} ({:.1})",
            entries.len(),
            best.candidate.name,
            best.score.total
        );
    }

    RankedResult { entries }
}
