//! Flight duration estimates from a static airport table
//!
//! Hours are the great-circle distance at an average block speed of 800 km/h
//! plus a fixed 0.6 h for taxi, climb and descent.

use sdk::errors::TravelError;
use sdk::{Coordinates, Origin};
use std::path::Path;

use super::normalize_place_name;

const CRUISE_KMH: f64 = 800.0;
const FIXED_OVERHEAD_HOURS: f64 = 0.6;

const BUILTIN_AIRPORTS: &str = include_str!("../../data/airports.csv");

#[derive(Debug, Clone, PartialEq)]
pub struct Airport {
    pub city: String,
    pub country: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, Default)]
pub struct AirportTable {
    airports: Vec<Airport>,
}

impl AirportTable {
    /// The table bundled with the binary.
    pub fn builtin() -> Self {
        // validated by test_builtin_table_parses
        Self::parse(BUILTIN_AIRPORTS).unwrap_or_default()
    }

    /// Load a `city,country,lat,lon` CSV with a header row.
    pub fn load(path: &Path) -> Result<Self, TravelError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TravelError::Config(format!(
                "Failed to read airport table {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, TravelError> {
        let mut airports = Vec::new();
        for (idx, line) in text.lines().enumerate().skip(1) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let [city, country, lat, lon] = fields.as_slice() else {
                return Err(TravelError::Config(format!(
                    "airport table line {}: expected 4 fields",
                    idx + 1
                )));
            };
            let (Ok(lat), Ok(lon)) = (lat.parse::<f64>(), lon.parse::<f64>()) else {
                return Err(TravelError::Config(format!(
                    "airport table line {}: invalid coordinates",
                    idx + 1
                )));
            };
            airports.push(Airport {
                city: normalize_place_name(city),
                country: normalize_place_name(country),
                coordinates: Coordinates::new(lat, lon),
            });
        }
        Ok(Self { airports })
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }

    /// Match by city and country, then by city alone.
    pub fn find(&self, origin: &Origin) -> Option<&Airport> {
        let city = normalize_place_name(&origin.city);
        let country = normalize_place_name(&origin.country);
        self.airports
            .iter()
            .find(|a| a.city == city && a.country == country)
            .or_else(|| self.airports.iter().find(|a| a.city == city))
    }

    /// Estimated hours from the origin's airport, rounded to two decimals.
    pub fn estimate_hours(&self, origin: &Origin, destination: &Coordinates) -> Option<f64> {
        let airport = self.find(origin)?;
        Some(estimate_from(&airport.coordinates, destination))
    }
}

/// Hours between two points at cruise speed plus fixed overhead.
pub fn estimate_from(from: &Coordinates, to: &Coordinates) -> f64 {
    let hours = from.distance_km(to) / CRUISE_KMH + FIXED_OVERHEAD_HOURS;
    (hours * 100.0).round() / 100.0
}
