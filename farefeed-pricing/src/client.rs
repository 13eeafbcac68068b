use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

use farefeed_core::{CoreError, CoreResult, Flight, FlightSearcher, SearchParams};

use crate::format;

const CHEAP_PRICES_PATH: &str = "/v1/prices/cheap";

/// Client for the Travelpayouts flight prices API.
pub struct TravelpayoutsClient {
    base_url: String,
    token: String,
    marker: String,
    http: reqwest::Client,
}

/// Response envelope of /v1/prices/cheap. `data` maps destination codes to
/// numbered route objects whose shape varies, so routes stay raw JSON until
/// parsed leniently field by field.
#[derive(Debug, Deserialize)]
struct PricesResponse {
    success: bool,
    #[serde(default)]
    data: HashMap<String, HashMap<String, serde_json::Value>>,
    #[serde(default)]
    error: String,
}

impl TravelpayoutsClient {
    pub fn new(base_url: &str, token: &str, marker: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            marker: marker.to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn fetch_cheap(&self, params: &SearchParams) -> CoreResult<Vec<Flight>> {
        let mut query: Vec<(&str, String)> = vec![
            ("origin", params.origin.clone()),
            ("destination", params.destination.clone()),
            ("depart_date", params.depart_date.clone()),
        ];
        if !params.return_date.is_empty() {
            query.push(("return_date", params.return_date.clone()));
        }
        if !params.currency.is_empty() {
            query.push(("currency", params.currency.clone()));
        }
        query.push(("token", self.token.clone()));
        if !self.marker.is_empty() {
            query.push(("marker", self.marker.clone()));
        }

        let url = format!("{}{}", self.base_url, CHEAP_PRICES_PATH);
        let started = Instant::now();
        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| CoreError::Search(format!("pricing request failed: {e}")))?;

        let status = response.status();
        debug!(
            endpoint = CHEAP_PRICES_PATH,
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            origin = %params.origin,
            destination = %params.destination,
            "Pricing API call"
        );

        if !status.is_success() {
            return Err(CoreError::Search(format!("unexpected status: {status}")));
        }

        let body: PricesResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Search(format!("pricing response did not decode: {e}")))?;

        if !body.success {
            return Err(CoreError::Search(format!("API error: {}", body.error)));
        }

        let mut flights = parse_flights(&body.data);
        if params.limit > 0 && flights.len() > params.limit {
            flights.truncate(params.limit);
        }
        Ok(flights)
    }
}

#[async_trait]
impl FlightSearcher for TravelpayoutsClient {
    async fn search_cheap(&self, params: &SearchParams) -> CoreResult<Vec<Flight>> {
        self.fetch_cheap(params).await
    }

    /// Aviasales deep link: /search/{ORIGIN}{DDMM}{DEST}{DDMM}.
    fn partner_link(&self, flight: &Flight, passengers: u32) -> String {
        let depart = flight
            .depart_date
            .map(|d| d.format("%d%m").to_string())
            .unwrap_or_default();
        let ret = flight
            .return_date
            .map(|d| d.format("%d%m").to_string())
            .unwrap_or_default();
        format!(
            "https://www.aviasales.com/search/{}{}{}{}?marker={}&passengers={}",
            flight.origin, depart, flight.destination, ret, self.marker, passengers
        )
    }

    fn format_message(
        &self,
        origin_city: &str,
        dest_city: &str,
        flights: &[Flight],
        passengers: u32,
    ) -> String {
        format::flight_message(self, origin_city, dest_city, flights, passengers)
    }
}

fn parse_flights(data: &HashMap<String, HashMap<String, serde_json::Value>>) -> Vec<Flight> {
    let mut flights = Vec::new();
    for (destination, routes) in data {
        for route in routes.values() {
            let Some(route) = route.as_object() else {
                warn!(destination = %destination, "Skipping non-object route entry");
                continue;
            };
            flights.push(parse_flight(destination, route));
        }
    }
    flights
}

/// Parse one route object. Fields that are missing or of the wrong type
/// fall back to defaults instead of failing the whole response.
fn parse_flight(destination: &str, data: &serde_json::Map<String, serde_json::Value>) -> Flight {
    let str_field = |key: &str| {
        data.get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let int_field = |key: &str| data.get(key).and_then(serde_json::Value::as_i64).unwrap_or(0);

    Flight {
        origin: str_field("origin"),
        destination: destination.to_string(),
        depart_date: parse_api_time(data.get("departure_at")),
        return_date: parse_api_time(data.get("return_at")),
        price: int_field("price"),
        airline: str_field("airline"),
        flight_number: int_field("flight_number"),
        duration: int_field("duration"),
        distance: int_field("distance"),
        gate: str_field("gate"),
        expires_at: parse_api_time(data.get("expires_at")),
        actual: data
            .get("actual")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false),
    }
}

fn parse_api_time(value: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    let raw = value?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
