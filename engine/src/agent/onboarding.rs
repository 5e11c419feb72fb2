//! Origin onboarding
//!
//! The session cannot plan until the user's origin is known. Input must be
//! `city, country`; the pair is geocoded and accepted only when a result
//! matches both the city and the country.

use sdk::{GeocodeOutcome, Location, Origin, ToolGateway};

use crate::tools::normalize_place_name;

pub const ONBOARDING_PROMPT: &str =
    "Before we start, please provide your origin as: city, country (example: Tel Aviv, Israel).";

const FORMAT_HINT: &str =
    "Please provide your origin in this exact format: city, country (example: Tel Aviv, Israel).";
const BOTH_REQUIRED: &str = "Both city and country are required. Please send: city, country.";
const NOT_VALIDATED: &str =
    "I could not validate that city/country pair. Please try again in the format: city, country.";
const LOW_CONFIDENCE: &str = "I found a location, but it does not confidently match both city and country. Please provide a clearer pair, for example: Florence, Italy.";
const LOOKUP_DOWN: &str =
    "I could not reach the location service to check your origin. Please try again in a few seconds.";

/// Geocoder rows considered per origin lookup.
const ORIGIN_LOOKUP_LIMIT: usize = 3;

/// Result of one onboarding attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum OnboardingOutcome {
    Accepted(Origin),
    /// The message explains what to send instead
    Rejected(&'static str),
}

impl OnboardingOutcome {
    pub fn confirmation(origin: &Origin) -> String {
        format!(
            "Origin saved: {}, {}. Now ask me where to travel.",
            origin.city, origin.country
        )
    }
}

/// ISO code for country names users commonly type.
fn country_code_alias(country: &str) -> Option<&'static str> {
    match country {
        "israel" => Some("il"),
        "united states" | "united states of america" | "usa" | "us" => Some("us"),
        "uk" | "united kingdom" | "great britain" | "england" => Some("gb"),
        _ => None,
    }
}

/// True when `location` matches both halves of `origin`.
pub fn is_confident_match(origin: &Origin, location: &Location) -> bool {
    let city = normalize_place_name(&origin.city);
    let country = normalize_place_name(&origin.country);
    let display = normalize_place_name(&location.display_name);
    let row_country = normalize_place_name(&location.country);

    let country_ok = (!row_country.is_empty()
        && (row_country.contains(&country) || country.contains(&row_country)))
        || display.contains(&country)
        || country_code_alias(&country)
            .is_some_and(|code| location.country_code.eq_ignore_ascii_case(code));

    let city_ok = location
        .localities
        .iter()
        .chain(std::iter::once(&location.name))
        .map(|l| normalize_place_name(l))
        .any(|l| !l.is_empty() && (l.contains(&city) || city.contains(&l)))
        || display.contains(&city);

    country_ok && city_ok
}

/// Validate a `city, country` answer against the geocoder.
pub async fn validate_origin(gateway: &dyn ToolGateway, input: &str) -> OnboardingOutcome {
    let Some((city, country)) = input.split_once(',') else {
        return OnboardingOutcome::Rejected(FORMAT_HINT);
    };
    let origin = Origin::new(city, country);
    if origin.city.is_empty() || origin.country.is_empty() {
        return OnboardingOutcome::Rejected(BOTH_REQUIRED);
    }

    let query = format!("{}, {}", origin.city, origin.country);
    match gateway.geocode(&query, ORIGIN_LOOKUP_LIMIT).await {
        GeocodeOutcome::Found(rows) => {
            if rows.iter().any(|row| is_confident_match(&origin, row)) {
                tracing::info!("Origin accepted: {}", origin);
                OnboardingOutcome::Accepted(origin)
            } else {
                tracing::debug!("No confident match for origin '{}' in {} rows", origin, rows.len());
                OnboardingOutcome::Rejected(LOW_CONFIDENCE)
            }
        }
        GeocodeOutcome::NotFound(cause) if cause.is_unavailable() => {
            tracing::warn!("Origin lookup failed: {}", cause);
            OnboardingOutcome::Rejected(LOOKUP_DOWN)
        }
        GeocodeOutcome::NotFound(_) => OnboardingOutcome::Rejected(NOT_VALIDATED),
    }
}
