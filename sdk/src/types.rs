//! Travel data types shared by the gateway contract and the engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Month names in calendar order, lowercase.
pub const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// The user's fixed departure location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub city: String,
    pub country: String,
}

impl Origin {
    /// Create an origin, trimming surrounding whitespace.
    pub fn new(city: impl AsRef<str>, country: impl AsRef<str>) -> Self {
        Self {
            city: city.as_ref().trim().to_string(),
            country: country.as_ref().trim().to_string(),
        }
    }

    /// Parse the onboarding format `city, country`.
    ///
    /// Returns `None` when the comma is missing or either side is empty.
    pub fn parse(input: &str) -> Option<Self> {
        let (city, country) = input.split_once(',')?;
        let origin = Self::new(city, country);
        if origin.city.is_empty() || origin.country.is_empty() {
            return None;
        }
        Some(origin)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}

/// WGS84 coordinates in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// A geocoded place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Stable identifier assigned by the geocoder
    pub place_id: String,

    /// Short display name (first component of the full name)
    pub name: String,

    /// Full display name as returned by the geocoder
    pub display_name: String,

    /// Country name (may be empty when the geocoder omits it)
    pub country: String,

    /// ISO 3166-1 alpha-2 code, lowercase
    pub country_code: String,

    pub coordinates: Coordinates,

    /// City/town/village/municipality/county names from the address breakdown
    #[serde(default)]
    pub localities: Vec<String>,
}

/// A point of interest near a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub name: String,
    pub category: String,
}

/// Coarse temperature band derived from the daily average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureBand {
    Cold,
    Mild,
    Warm,
}

impl TemperatureBand {
    /// Ideal average temperature for this band, in Celsius.
    pub fn target_celsius(&self) -> f64 {
        match self {
            TemperatureBand::Cold => 8.0,
            TemperatureBand::Mild => 18.0,
            TemperatureBand::Warm => 27.0,
        }
    }

    pub fn from_average(avg_celsius: f64) -> Self {
        if avg_celsius < 12.0 {
            TemperatureBand::Cold
        } else if avg_celsius <= 22.0 {
            TemperatureBand::Mild
        } else {
            TemperatureBand::Warm
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "cold" => Some(TemperatureBand::Cold),
            "mild" => Some(TemperatureBand::Mild),
            "warm" => Some(TemperatureBand::Warm),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureBand::Cold => "cold",
            TemperatureBand::Mild => "mild",
            TemperatureBand::Warm => "warm",
        }
    }
}

impl fmt::Display for TemperatureBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Daily weather for a location and travel date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub precipitation_mm: f64,
    pub temperature_band: TemperatureBand,
    pub precipitation_summary: String,
}

impl WeatherSummary {
    pub fn from_daily(max_temp_c: f64, min_temp_c: f64, precipitation_mm: f64) -> Self {
        let avg = (max_temp_c + min_temp_c) / 2.0;
        let precipitation_summary = if precipitation_mm <= 0.2 {
            "dry"
        } else if precipitation_mm < 5.0 {
            "light rain"
        } else {
            "wet"
        };
        Self {
            max_temp_c,
            min_temp_c,
            precipitation_mm,
            temperature_band: TemperatureBand::from_average(avg),
            precipitation_summary: precipitation_summary.to_string(),
        }
    }

    pub fn average_temp_c(&self) -> f64 {
        (self.max_temp_c + self.min_temp_c) / 2.0
    }
}

/// Meteorological season (northern-hemisphere month mapping).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
    Unknown,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Unknown,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// When the user intends to travel: a month name or a concrete day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TravelWhen {
    Month { month: u32 },
    Day { year: Option<i32>, month: u32, day: u32 },
}

impl TravelWhen {
    /// Parse a month name or a numeric date.
    ///
    /// Accepted: `march`, `15.03.26`, `15.03.2026`, `15/03/2026`, `15-03-2026`,
    /// `15.03`, `2026-03-15`.
    pub fn parse(text: &str) -> Option<Self> {
        let lowered = text.trim().trim_matches(|c: char| c == '.' || c == ',').to_lowercase();
        if let Some(idx) = MONTH_NAMES.iter().position(|m| *m == lowered) {
            return Some(TravelWhen::Month {
                month: idx as u32 + 1,
            });
        }

        let parts: Vec<&str> = lowered.split(['.', '/', '-']).collect();
        let numbers: Option<Vec<i64>> = parts.iter().map(|p| p.parse::<i64>().ok()).collect();
        let numbers = numbers?;

        let (year, month, day) = match (parts.first().map(|p| p.len()), numbers.as_slice()) {
            (Some(4), [y, m, d]) => (Some(*y as i32), *m, *d),
            (_, [d, m]) => (None, *m, *d),
            (_, [d, m, y]) => {
                let year = if *y < 100 { 2000 + *y } else { *y };
                (Some(year as i32), *m, *d)
            }
            _ => return None,
        };

        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }

        Some(TravelWhen::Day {
            year,
            month: month as u32,
            day: day as u32,
        })
    }

    pub fn month(&self) -> u32 {
        match self {
            TravelWhen::Month { month } => *month,
            TravelWhen::Day { month, .. } => *month,
        }
    }

    pub fn season(&self) -> Season {
        Season::from_month(self.month())
    }
}

impl fmt::Display for TravelWhen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TravelWhen::Month { month } => {
                let name = MONTH_NAMES
                    .get((*month as usize).saturating_sub(1))
                    .copied()
                    .unwrap_or("unknown");
                f.write_str(name)
            }
            TravelWhen::Day {
                year: Some(year),
                month,
                day,
            } => write!(f, "{:04}-{:02}-{:02}", year, month, day),
            TravelWhen::Day {
                year: None,
                month,
                day,
            } => write!(f, "{:02}.{:02}", day, month),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_parse() {
        let origin = Origin::parse(" Tel Aviv ,  Israel ").unwrap();
        assert_eq!(origin.city, "Tel Aviv");
        assert_eq!(origin.country, "Israel");
        assert_eq!(origin.to_string(), "Tel Aviv, Israel");

        assert!(Origin::parse("Tel Aviv").is_none());
        assert!(Origin::parse(", Israel").is_none());
        assert!(Origin::parse("Tel Aviv, ").is_none());
    }

    #[test]
    fn test_distance_km() {
        let london = Coordinates::new(51.47, -0.4543);
        let paris = Coordinates::new(49.0097, 2.5479);
        let d = london.distance_km(&paris);
        assert!(d > 300.0 && d < 400.0, "got {}", d);
        assert_eq!(london.distance_km(&london), 0.0);
    }

    #[test]
    fn test_temperature_band() {
        assert_eq!(TemperatureBand::from_average(2.0), TemperatureBand::Cold);
        assert_eq!(TemperatureBand::from_average(17.0), TemperatureBand::Mild);
        assert_eq!(TemperatureBand::from_average(29.0), TemperatureBand::Warm);
        assert_eq!(TemperatureBand::parse(" Warm "), Some(TemperatureBand::Warm));
        assert_eq!(TemperatureBand::parse("hot"), None);
    }

    #[test]
    fn test_weather_summary() {
        let summary = WeatherSummary::from_daily(30.0, 22.0, 0.0);
        assert_eq!(summary.temperature_band, TemperatureBand::Warm);
        assert_eq!(summary.precipitation_summary, "dry");
        assert_eq!(summary.average_temp_c(), 26.0);

        let wet = WeatherSummary::from_daily(10.0, 4.0, 12.0);
        assert_eq!(wet.temperature_band, TemperatureBand::Cold);
        assert_eq!(wet.precipitation_summary, "wet");
    }

    #[test]
    fn test_travel_when_month() {
        assert_eq!(
            TravelWhen::parse("March"),
            Some(TravelWhen::Month { month: 3 })
        );
        assert_eq!(TravelWhen::parse("december").unwrap().season(), Season::Winter);
        assert_eq!(TravelWhen::Month { month: 7 }.to_string(), "july");
    }

    #[test]
    fn test_travel_when_dates() {
        assert_eq!(
            TravelWhen::parse("15.03.26"),
            Some(TravelWhen::Day {
                year: Some(2026),
                month: 3,
                day: 15
            })
        );
        assert_eq!(
            TravelWhen::parse("2026-08-01"),
            Some(TravelWhen::Day {
                year: Some(2026),
                month: 8,
                day: 1
            })
        );
        assert_eq!(
            TravelWhen::parse("1/2"),
            Some(TravelWhen::Day {
                year: None,
                month: 2,
                day: 1
            })
        );
        assert_eq!(TravelWhen::parse("15.13.2026"), None);
        assert_eq!(TravelWhen::parse("soon"), None);
        assert_eq!(TravelWhen::parse("2026-08-01").unwrap().season(), Season::Summer);
    }
}
