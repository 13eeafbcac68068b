use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Search parameters carried by an inbound request, either from the request
/// stream's `params` field or from HTTP query parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub depart_date: String,
    #[serde(default)]
    pub return_date: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub passengers: u32,
    #[serde(default)]
    pub limit: usize,
}

/// A unit of work decoded from the request stream. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub request_id: String,
    pub correlation_id: String,
    pub chat_id: String,
    pub params: SearchParams,
}

/// One priced itinerary as the upstream pricing API reports it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flight {
    pub origin: String,
    pub destination: String,
    pub depart_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub price: i64,
    pub airline: String,
    pub flight_number: i64,
    pub duration: i64,
    pub distance: i64,
    pub gate: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub actual: bool,
}

/// The trimmed projection of a [`Flight`] published on the result stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightResult {
    pub origin: String,
    pub destination: String,
    pub depart_date: String,
    pub return_date: String,
    pub price: i64,
    pub currency: String,
    pub link: String,
}

/// The terminal result of processing one request: flights on success, an
/// error message on failure. `timestamp` stays `None` until the producer
/// assigns one at publish time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub request_id: String,
    pub correlation_id: String,
    pub chat_id: String,
    pub count: usize,
    pub results: Vec<FlightResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl SearchOutcome {
    pub fn success(
        request_id: &str,
        correlation_id: &str,
        chat_id: &str,
        results: Vec<FlightResult>,
    ) -> Self {
        Self {
            request_id: request_id.to_string(),
            correlation_id: correlation_id.to_string(),
            chat_id: chat_id.to_string(),
            count: results.len(),
            results,
            error: None,
            timestamp: None,
        }
    }

    pub fn failure(request_id: &str, correlation_id: &str, chat_id: &str, message: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            correlation_id: correlation_id.to_string(),
            chat_id: chat_id.to_string(),
            count: 0,
            results: Vec::new(),
            error: Some(message.to_string()),
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_deserialization_with_defaults() {
        let json = r#"
            {
                "origin": "MOW",
                "destination": "PAR",
                "depart_date": "2024-12-15"
            }
        "#;
        let params: SearchParams = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(params.origin, "MOW");
        assert_eq!(params.destination, "PAR");
        assert_eq!(params.depart_date, "2024-12-15");
        assert_eq!(params.return_date, "");
        assert_eq!(params.passengers, 0);
        assert_eq!(params.limit, 0);
    }

    #[test]
    fn test_flight_result_round_trip() {
        let result = FlightResult {
            origin: "MOW".to_string(),
            destination: "PAR".to_string(),
            depart_date: "2024-12-15".to_string(),
            return_date: "2024-12-22".to_string(),
            price: 15000,
            currency: "rub".to_string(),
            link: "https://example.com/f1".to_string(),
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: FlightResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_failure_outcome_has_empty_results() {
        let outcome = SearchOutcome::failure("r1", "c1", "chat-1", "API timeout");
        assert_eq!(outcome.count, 0);
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.error.as_deref(), Some("API timeout"));
        assert!(outcome.timestamp.is_none());
    }
}
