//! Conductor data types
//!
//! Shapes shared by the planner, the scorer and the orchestrator.

use sdk::{Coordinates, Location, PointOfInterest, Season, TemperatureBand, TravelWhen, WeatherSummary};
use serde::Serialize;
use std::fmt;

/// The planning view of a travel request.
///
/// Built from the parsed intent once its required slots are filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TripQuery {
    /// A single named place to evaluate; `None` means discovery
    pub destination: Option<String>,
    pub activity: Option<String>,
    pub when: Option<TravelWhen>,
    pub max_flight_hours: Option<f64>,
    /// Weather band named in the utterance itself ("warm places")
    pub weather_preference: Option<TemperatureBand>,
}

impl TripQuery {
    /// True when the request names one place rather than asking for options.
    pub fn is_opinion(&self) -> bool {
        self.destination.is_some()
    }

    pub fn season(&self) -> Season {
        self.when.map(|w| w.season()).unwrap_or(Season::Unknown)
    }

    /// Activity category used to pick seed pools and to score activity fit.
    pub fn category(&self) -> ActivityCategory {
        ActivityCategory::classify(self.activity.as_deref())
    }
}

/// Coarse activity classes the seed table and scorer know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    Skiing,
    Beach,
    Museum,
    General,
}

impl ActivityCategory {
    pub fn classify(activity: Option<&str>) -> Self {
        let Some(activity) = activity else {
            return ActivityCategory::General;
        };
        let lowered = activity.to_lowercase();
        if lowered.contains("ski") {
            ActivityCategory::Skiing
        } else if lowered.contains("beach") {
            ActivityCategory::Beach
        } else if lowered.contains("museum") {
            ActivityCategory::Museum
        } else {
            ActivityCategory::General
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityCategory::Skiing => "skiing",
            ActivityCategory::Beach => "beach",
            ActivityCategory::Museum => "museum",
            ActivityCategory::General => "general",
        }
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A destination with the facts gathered for it during one planning pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateDestination {
    /// Unique id from the geocoder
    pub place_id: String,
    pub name: String,
    pub country: String,
    pub country_code: String,
    pub coordinates: Coordinates,
    pub season_signal: Season,
    pub weather: Option<WeatherSummary>,
    /// In upstream order
    pub points_of_interest: Vec<PointOfInterest>,
    pub estimated_flight_hours: Option<f64>,
    /// Activity the candidate was planned for
    pub activity: Option<String>,
    /// Set when a weather or POI lookup failed
    pub degraded: bool,
    pub degraded_reasons: Vec<String>,
    /// Position in which the planner discovered the candidate
    pub discovery_index: usize,
}

impl CandidateDestination {
    pub fn from_location(location: &Location, query: &TripQuery, discovery_index: usize) -> Self {
        Self {
            place_id: location.place_id.clone(),
            name: location.name.clone(),
            country: location.country.clone(),
            country_code: location.country_code.clone(),
            coordinates: location.coordinates,
            season_signal: query.season(),
            weather: None,
            points_of_interest: Vec::new(),
            estimated_flight_hours: None,
            activity: query.activity.clone(),
            degraded: false,
            degraded_reasons: Vec::new(),
            discovery_index,
        }
    }

    pub fn mark_degraded(&mut self, reason: impl Into<String>) {
        self.degraded = true;
        self.degraded_reasons.push(reason.into());
    }

    /// Feature tags used by the preference profile.
    ///
    /// `activity:<category>`, `country:<code>`, `weather:<band>` and
    /// `season:<season>`, omitting what is unknown.
    pub fn feature_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        if self.activity.is_some() {
            let category = ActivityCategory::classify(self.activity.as_deref());
            let label = match category {
                ActivityCategory::General => self
                    .activity
                    .as_deref()
                    .map(|a| a.trim().to_lowercase())
                    .unwrap_or_default(),
                other => other.as_str().to_string(),
            };
            tags.push(format!("activity:{}", label));
        }
        let country = if self.country_code.is_empty() {
            self.country.to_lowercase()
        } else {
            self.country_code.to_lowercase()
        };
        if !country.is_empty() {
            tags.push(format!("country:{}", country));
        }
        if let Some(weather) = &self.weather {
            tags.push(format!("weather:{}", weather.temperature_band));
        }
        if self.season_signal != Season::Unknown {
            tags.push(format!("season:{}", self.season_signal));
        }
        tags
    }

    /// Distinct POI names, used for the variety part of the novelty score.
    pub fn unique_poi_names(&self) -> usize {
        let mut names: Vec<String> = self
            .points_of_interest
            .iter()
            .map(|p| p.name.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        names.sort();
        names.dedup();
        names.len()
    }
}

/// Four-factor score with one rationale line per factor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    /// 0–40
    pub activity_fit: f64,
    /// 0–30
    pub weather_fit: f64,
    /// 0–20
    pub flight_feasibility: f64,
    /// 0–10
    pub diversity_novelty: f64,
    /// 0–100
    pub total: f64,
    pub rationale: Vec<String>,
}

/// One ranked entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub candidate: CandidateDestination,
    pub score: Score,
}

/// Candidates ordered by descending total.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankedResult {
    pub entries: Vec<RankedEntry>,
}

impl RankedResult {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The first `n` entries.
    pub fn top(&self, n: usize) -> &[RankedEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn best(&self) -> Option<&RankedEntry> {
        self.entries.first()
    }
}

/// Why planning produced no candidates.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanningFailure {
    /// Nothing survived exclusion and filtering, even after relaxation
    #[error("no feasible destinations (relaxed: {relaxed})")]
    NoFeasibleDestinations { relaxed: bool },

    /// The single named destination could not be geocoded
    #[error("destination '{0}' could not be located")]
    UnknownDestination(String),
}
