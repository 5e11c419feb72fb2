//! Overpass points-of-interest client

use reqwest::Client;
use sdk::{Coordinates, FailureCause, PointOfInterest};
use serde_json::Value;

/// Tag keys inspected, in order, to categorise an element.
const CATEGORY_KEYS: &[&str] = &["piste:type", "natural", "tourism", "leisure", "amenity", "historic"];

#[derive(Debug, Clone)]
pub struct OverpassClient {
    client: Client,
    base_url: String,
    radius_m: u32,
    limit: usize,
}

impl OverpassClient {
    pub fn new(client: Client, base_url: impl Into<String>, radius_m: u32, limit: usize) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            radius_m,
            limit,
        }
    }

    /// Overpass QL for nodes and ways carrying the activity tag around a point.
    pub fn build_query(&self, location: &Coordinates, activity_hint: Option<&str>) -> String {
        let tag = activity_tag(activity_hint);
        let around = format!(
            "around:{},{:.5},{:.5}",
            self.radius_m, location.lat, location.lon
        );
        format!(
            "[out:json][timeout:25];(node({around})[{tag}];way({around})[{tag}];);out center {limit};",
            around = around,
            tag = tag,
            limit = self.limit
        )
    }

    pub async fn search(
        &self,
        location: &Coordinates,
        activity_hint: Option<&str>,
    ) -> Result<Vec<PointOfInterest>, FailureCause> {
        let query = self.build_query(location, activity_hint);
        let response = self
            .client
            .post(&self.base_url)
            .form(&[("data", query)])
            .send()
            .await
            .map_err(super::transport_cause)?;

        if !response.status().is_success() {
            return Err(FailureCause::Upstream(format!(
                "overpass returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FailureCause::Malformed(e.to_string()))?;

        parse_elements(&body, self.limit)
    }
}

/// Map an activity onto the Overpass tag filter.
pub fn activity_tag(activity_hint: Option<&str>) -> &'static str {
    let Some(activity) = activity_hint.map(str::to_lowercase) else {
        return r#""tourism""#;
    };
    if activity.contains("ski") {
        r#""piste:type""#
    } else if activity.contains("beach") {
        r#""natural"="beach""#
    } else if activity.contains("museum") {
        r#""tourism"="museum""#
    } else {
        r#""tourism""#
    }
}

/// Convert Overpass `elements` into points of interest, keeping upstream order.
pub fn parse_elements(body: &Value, limit: usize) -> Result<Vec<PointOfInterest>, FailureCause> {
    let elements = body
        .get("elements")
        .and_then(Value::as_array)
        .ok_or_else(|| FailureCause::Malformed("missing 'elements' array".to_string()))?;

    Ok(elements
        .iter()
        .take(limit)
        .map(|element| {
            let tags = element.get("tags");
            let tag = |key: &str| {
                tags.and_then(|t| t.get(key))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            let category = CATEGORY_KEYS
                .iter()
                .find_map(|key| tag(*key).map(|value| format!("{}={}", key, value)))
                .unwrap_or_else(|| "unknown".to_string());
            PointOfInterest {
                name: tag("name").unwrap_or_default(),
                category,
            }
        })
        .collect())
}
