//! Nominatim geocoding client

use reqwest::Client;
use sdk::{Coordinates, FailureCause, Location};
use serde::Deserialize;
use serde_json::Value;

/// Address parts that name the settlement, most specific first.
const LOCALITY_KEYS: &[&str] = &["city", "town", "village", "municipality", "county", "state"];

#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Request parameters, also used for the request event payload.
    pub fn params(place_name: &str, limit: usize) -> Vec<(&'static str, String)> {
        vec![
            ("q", place_name.to_string()),
            ("format", "jsonv2".to_string()),
            ("limit", limit.max(1).to_string()),
            ("addressdetails", "1".to_string()),
            ("accept-language", "en".to_string()),
        ]
    }

    pub async fn search(&self, place_name: &str, limit: usize) -> Result<Vec<Location>, FailureCause> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&Self::params(place_name, limit))
            .send()
            .await
            .map_err(super::transport_cause)?;

        if !response.status().is_success() {
            return Err(FailureCause::Upstream(format!(
                "nominatim returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FailureCause::Malformed(e.to_string()))?;

        parse_results(&body)
    }
}

#[derive(Debug, Deserialize)]
struct NominatimRow {
    #[serde(default)]
    place_id: Option<Value>,
    #[serde(default)]
    osm_type: Option<String>,
    #[serde(default)]
    osm_id: Option<Value>,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    name: Option<String>,
    lat: String,
    lon: String,
    #[serde(default)]
    address: serde_json::Map<String, Value>,
}

/// Convert a Nominatim `jsonv2` result array into locations.
///
/// Rows with unparseable coordinates are skipped; a payload that is not an
/// array is malformed.
pub fn parse_results(body: &Value) -> Result<Vec<Location>, FailureCause> {
    let rows = body
        .as_array()
        .ok_or_else(|| FailureCause::Malformed("expected a JSON array".to_string()))?;

    let mut locations = Vec::with_capacity(rows.len());
    for raw in rows {
        let row: NominatimRow = match serde_json::from_value(raw.clone()) {
            Ok(row) => row,
            Err(e) => {
                tracing::debug!("Skipping geocoder row: {}", e);
                continue;
            }
        };
        let (Ok(lat), Ok(lon)) = (row.lat.parse::<f64>(), row.lon.parse::<f64>()) else {
            continue;
        };

        let address_str = |key: &str| {
            row.address
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let place_id = match (&row.osm_type, &row.osm_id, &row.place_id) {
            (Some(kind), Some(id), _) => format!("{}/{}", kind, id_text(id)),
            (_, _, Some(id)) => format!("place/{}", id_text(id)),
            _ => format!("coord/{:.4},{:.4}", lat, lon),
        };

        let name = row
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| {
                row.display_name
                    .split(',')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string()
            });

        let localities = LOCALITY_KEYS
            .iter()
            .map(|key| address_str(*key))
            .filter(|v| !v.is_empty())
            .collect();

        locations.push(Location {
            place_id,
            name,
            display_name: row.display_name.clone(),
            country: address_str("country"),
            country_code: address_str("country_code").to_lowercase(),
            coordinates: Coordinates::new(lat, lon),
            localities,
        });
    }

    Ok(locations)
}

fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_results() {
        let body = json!([{
            "place_id": 123,
            "osm_type": "relation",
            "osm_id": 1675815,
            "display_name": "Innsbruck, Tyrol, Austria",
            "name": "Innsbruck",
            "lat": "47.2654296",
            "lon": "11.3927685",
            "address": {"city": "Innsbruck", "state": "Tyrol", "country": "Austria", "country_code": "at"}
        }]);

        let locations = parse_results(&body).unwrap();
        assert_eq!(locations.len(), 1);
        let loc = &locations[0];
        assert_eq!(loc.place_id, "relation/1675815");
        assert_eq!(loc.name, "Innsbruck");
        assert_eq!(loc.country, "Austria");
        assert_eq!(loc.country_code, "at");
        assert_eq!(loc.localities, vec!["Innsbruck", "Tyrol"]);
        assert!((loc.coordinates.lat - 47.2654).abs() < 1e-3);
    }

    #[test]
    fn test_parse_results_falls_back_to_display_name() {
        let body = json!([
            {"place_id": "9", "display_name": "Lisbon, Portugal", "lat": "38.7", "lon": "-9.1"},
            {"display_name": "Broken", "lat": "north", "lon": "-9.1"}
        ]);
        let locations = parse_results(&body).unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].name, "Lisbon");
        assert_eq!(locations[0].place_id, "place/9");
    }

    #[test]
    fn test_parse_results_rejects_object() {
        assert!(matches!(
            parse_results(&json!({"error": "rate limited"})),
            Err(FailureCause::Malformed(_))
        ));
    }

    #[test]
    fn test_params() {
        let params = NominatimClient::params("Tel Aviv, Israel", 0);
        assert!(params.contains(&("limit", "1".to_string())));
        assert!(params.contains(&("format", "jsonv2".to_string())));
        assert!(params.contains(&("addressdetails", "1".to_string())));
    }
}
