//! Tool gateway contract
//!
//! One operation per data capability. Every operation returns a typed outcome:
//! either the success payload or a named failure variant carrying its cause.
//! Implementations must never panic or surface transport errors to callers;
//! timeouts and malformed upstream payloads map onto the failure variant.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Coordinates, Location, Origin, PointOfInterest, TravelWhen, WeatherSummary};

/// Why a gateway call produced its failure variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", content = "detail", rename_all = "snake_case")]
pub enum FailureCause {
    /// The upstream answered but had nothing for this request
    NoMatch,
    /// The call exceeded its time budget
    Timeout,
    /// Transport failure or non-success HTTP status
    Upstream(String),
    /// The upstream payload did not have the expected shape
    Malformed(String),
}

impl FailureCause {
    /// True for causes that indicate the data source itself is unhealthy.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, FailureCause::NoMatch)
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::NoMatch => write!(f, "no match"),
            FailureCause::Timeout => write!(f, "timeout"),
            FailureCause::Upstream(msg) => write!(f, "upstream error: {}", msg),
            FailureCause::Malformed(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

/// Result of a geocoding lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    /// Matches ordered by geocoder relevance; never empty
    Found(Vec<Location>),
    NotFound(FailureCause),
}

impl GeocodeOutcome {
    /// Build from a result list, mapping an empty list onto `NotFound(NoMatch)`.
    pub fn from_matches(matches: Vec<Location>) -> Self {
        if matches.is_empty() {
            GeocodeOutcome::NotFound(FailureCause::NoMatch)
        } else {
            GeocodeOutcome::Found(matches)
        }
    }

    /// The best match, if any.
    pub fn best(&self) -> Option<&Location> {
        match self {
            GeocodeOutcome::Found(matches) => matches.first(),
            GeocodeOutcome::NotFound(_) => None,
        }
    }

    pub fn into_matches(self) -> Vec<Location> {
        match self {
            GeocodeOutcome::Found(matches) => matches,
            GeocodeOutcome::NotFound(_) => Vec::new(),
        }
    }
}

/// Result of a weather lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherOutcome {
    Summary(WeatherSummary),
    Unavailable(FailureCause),
}

/// Result of a points-of-interest lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum PoiOutcome {
    /// Points of interest in upstream order; never empty
    Found(Vec<PointOfInterest>),
    Empty(FailureCause),
}

impl PoiOutcome {
    /// Build from a result list, mapping an empty list onto `Empty(NoMatch)`.
    pub fn from_points(points: Vec<PointOfInterest>) -> Self {
        if points.is_empty() {
            PoiOutcome::Empty(FailureCause::NoMatch)
        } else {
            PoiOutcome::Found(points)
        }
    }
}

/// Result of a flight-time estimate.
#[derive(Debug, Clone, PartialEq)]
pub enum FlightOutcome {
    Hours(f64),
    Unestimable(FailureCause),
}

/// Uniform interface over the four travel data sources.
///
/// Implementations are expected to be read-only and idempotent so callers may
/// issue requests for independent candidates concurrently.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Resolve a free-form place name into up to `limit` locations.
    async fn geocode(&self, place_name: &str, limit: usize) -> GeocodeOutcome;

    /// Daily weather at `location` for the travel date.
    async fn weather(&self, location: &Coordinates, when: Option<&TravelWhen>) -> WeatherOutcome;

    /// Points of interest around `location`, filtered by an optional activity hint.
    async fn points_of_interest(
        &self,
        location: &Coordinates,
        activity_hint: Option<&str>,
    ) -> PoiOutcome;

    /// Estimated flight duration in hours from the origin's airport.
    async fn flight_time(&self, origin: &Origin, destination: &Coordinates) -> FlightOutcome;
}
