//! HTTP tool gateway
//!
//! [`HttpToolGateway`] implements the SDK's [`ToolGateway`] over the public
//! geocoding, forecast and points-of-interest services plus the static airport
//! table. Every call runs under the configured timeout, is reported to the
//! event sink, and maps every fault onto the operation's failure variant.

pub mod flight_time;
pub mod geocoding;
pub mod places;
pub mod weather;

pub use flight_time::AirportTable;
pub use geocoding::NominatimClient;
pub use places::OverpassClient;
pub use weather::OpenMeteoClient;

use async_trait::async_trait;
use reqwest::Client;
use sdk::errors::TravelError;
use sdk::{
    Coordinates, FailureCause, FlightOutcome, GeocodeOutcome, Origin, PoiOutcome, ToolGateway,
    TravelWhen, WeatherOutcome,
};
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::config::ToolsConfig;
use crate::events::{EventKind, SharedSink};

/// Lowercase, trim, collapse whitespace and fold common Latin diacritics.
pub fn normalize_place_name(name: &str) -> String {
    let folded: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(fold_diacritic)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'ğ' => 'g',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'ı' => 'i',
        'ł' | 'ľ' => 'l',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'ř' => 'r',
        'ś' | 'š' | 'ş' | 'ș' => 's',
        'ť' | 'ţ' | 'ț' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

/// Map a reqwest transport error onto a failure cause.
pub(crate) fn transport_cause(e: reqwest::Error) -> FailureCause {
    if e.is_timeout() {
        FailureCause::Timeout
    } else {
        FailureCause::Upstream(e.to_string())
    }
}

/// Gateway over the live travel data services.
pub struct HttpToolGateway {
    geocoder: NominatimClient,
    forecast: OpenMeteoClient,
    places: OverpassClient,
    airports: AirportTable,
    timeout: Duration,
    sink: SharedSink,
}

impl HttpToolGateway {
    /// Build the gateway from config, loading the airport table override if set.
    pub fn from_config(config: &ToolsConfig, sink: SharedSink) -> Result<Self, TravelError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()
            .map_err(|e| TravelError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let airports = match &config.airports_path {
            Some(path) => AirportTable::load(path)?,
            None => AirportTable::builtin(),
        };

        Ok(Self {
            geocoder: NominatimClient::new(client.clone(), config.geocoding_url.clone()),
            forecast: OpenMeteoClient::new(client.clone(), config.weather_url.clone()),
            places: OverpassClient::new(
                client,
                config.places_url.clone(),
                config.poi_radius_m,
                config.poi_limit,
            ),
            airports,
            timeout,
            sink,
        })
    }

    pub fn airports(&self) -> &AirportTable {
        &self.airports
    }

    /// Run one upstream call under the timeout and report it to the sink.
    async fn observed<T, F>(
        &self,
        tool: &'static str,
        request: serde_json::Value,
        call: F,
    ) -> Result<T, FailureCause>
    where
        T: Serialize,
        F: Future<Output = Result<T, FailureCause>>,
    {
        self.sink.record(
            EventKind::ToolRequest,
            json!({ "tool": tool, "request": request }),
        );
        let start = Instant::now();

        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(FailureCause::Timeout),
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(value) => self.sink.record(
                EventKind::ToolResponse,
                json!({ "tool": tool, "latency_ms": latency_ms, "response": value }),
            ),
            Err(cause) => {
                tracing::warn!("{} call failed: {}", tool, cause);
                self.sink.record(
                    EventKind::ToolFailure,
                    json!({ "tool": tool, "latency_ms": latency_ms, "cause": cause }),
                )
            }
        }

        result
    }
}

#[async_trait]
impl ToolGateway for HttpToolGateway {
    async fn geocode(&self, place_name: &str, limit: usize) -> GeocodeOutcome {
        let request = json!({ "q": place_name, "limit": limit });
        match self
            .observed("geocoding", request, self.geocoder.search(place_name, limit))
            .await
        {
            Ok(matches) => GeocodeOutcome::from_matches(matches),
            Err(cause) => GeocodeOutcome::NotFound(cause),
        }
    }

    async fn weather(&self, location: &Coordinates, when: Option<&TravelWhen>) -> WeatherOutcome {
        let today = chrono::Local::now().date_naive();
        let Some(date) = weather::resolve_date(when, today) else {
            return WeatherOutcome::Unavailable(FailureCause::Malformed(format!(
                "not a calendar date: {}",
                when.map(|w| w.to_string()).unwrap_or_default()
            )));
        };

        let request = json!({
            "lat": location.lat,
            "lon": location.lon,
            "date": date.format("%Y-%m-%d").to_string(),
        });
        match self
            .observed("weather", request, self.forecast.daily(location, date))
            .await
        {
            Ok(summary) => WeatherOutcome::Summary(summary),
            Err(cause) => WeatherOutcome::Unavailable(cause),
        }
    }

    async fn points_of_interest(
        &self,
        location: &Coordinates,
        activity_hint: Option<&str>,
    ) -> PoiOutcome {
        let request = json!({ "query": self.places.build_query(location, activity_hint) });
        match self
            .observed(
                "places",
                request,
                self.places.search(location, activity_hint),
            )
            .await
        {
            Ok(points) => PoiOutcome::from_points(points),
            Err(cause) => PoiOutcome::Empty(cause),
        }
    }

    async fn flight_time(&self, origin: &Origin, destination: &Coordinates) -> FlightOutcome {
        let request = json!({
            "origin": origin.to_string(),
            "lat": destination.lat,
            "lon": destination.lon,
        });
        let estimate = self.airports.estimate_hours(origin, destination);
        let lookup = async { estimate.ok_or(FailureCause::NoMatch) };
        match self.observed("flight_time", request, lookup).await {
            Ok(hours) => FlightOutcome::Hours(hours),
            Err(cause) => FlightOutcome::Unestimable(cause),
        }
    }
}
