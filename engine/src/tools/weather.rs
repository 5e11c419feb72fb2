//! Open-Meteo daily forecast client

use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use sdk::{Coordinates, FailureCause, TravelWhen, WeatherSummary};
use serde_json::Value;

/// Day of the month used when only a month is known.
const MONTH_ANCHOR_DAY: u32 = 15;

#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn params(location: &Coordinates, date: NaiveDate) -> Vec<(&'static str, String)> {
        let day = date.format("%Y-%m-%d").to_string();
        vec![
            ("latitude", format!("{:.4}", location.lat)),
            ("longitude", format!("{:.4}", location.lon)),
            (
                "daily",
                "temperature_2m_max,temperature_2m_min,precipitation_sum".to_string(),
            ),
            ("timezone", "auto".to_string()),
            ("start_date", day.clone()),
            ("end_date", day),
        ]
    }

    pub async fn daily(
        &self,
        location: &Coordinates,
        date: NaiveDate,
    ) -> Result<WeatherSummary, FailureCause> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&Self::params(location, date))
            .send()
            .await
            .map_err(super::transport_cause)?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("reason").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_default();
            return Err(FailureCause::Upstream(format!(
                "open-meteo returned {} {}",
                status, reason
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FailureCause::Malformed(e.to_string()))?;

        parse_daily(&body)
    }
}

/// Resolve the travel date to a calendar day.
///
/// A month maps to the 15th of that month in `today`'s year, a day without a
/// year takes `today`'s year, and no date at all means today.
pub fn resolve_date(when: Option<&TravelWhen>, today: NaiveDate) -> Option<NaiveDate> {
    match when {
        None => Some(today),
        Some(TravelWhen::Month { month }) => {
            NaiveDate::from_ymd_opt(today.year(), *month, MONTH_ANCHOR_DAY)
        }
        Some(TravelWhen::Day { year, month, day }) => {
            NaiveDate::from_ymd_opt(year.unwrap_or_else(|| today.year()), *month, *day)
        }
    }
}

/// Read the first day of an Open-Meteo `daily` block.
pub fn parse_daily(body: &Value) -> Result<WeatherSummary, FailureCause> {
    let daily = body
        .get("daily")
        .ok_or_else(|| FailureCause::Malformed("missing 'daily' block".to_string()))?;

    let first = |key: &str| -> Option<f64> {
        daily
            .get(key)
            .and_then(Value::as_array)
            .and_then(|values| values.first())
            .and_then(Value::as_f64)
    };

    let max = first("temperature_2m_max")
        .ok_or_else(|| FailureCause::Malformed("no maximum temperature for date".to_string()))?;
    let min = first("temperature_2m_min")
        .ok_or_else(|| FailureCause::Malformed("no minimum temperature for date".to_string()))?;
    let rain = first("precipitation_sum").unwrap_or(0.0);

    Ok(WeatherSummary::from_daily(max, min, rain))
}
