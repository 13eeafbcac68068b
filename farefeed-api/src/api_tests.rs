use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use farefeed_core::{CoreError, CoreResult, Flight, FlightSearcher, SearchParams};
use farefeed_streams::ConsumerHealthMonitor;

use crate::state::AppState;

struct StubSearcher {
    fail: bool,
}

#[async_trait]
impl FlightSearcher for StubSearcher {
    async fn search_cheap(&self, params: &SearchParams) -> CoreResult<Vec<Flight>> {
        if self.fail {
            return Err(CoreError::Search("API error: upstream down".to_string()));
        }
        Ok(vec![Flight {
            origin: params.origin.clone(),
            destination: params.destination.clone(),
            depart_date: Some(Utc.with_ymd_and_hms(2024, 12, 15, 10, 30, 0).unwrap()),
            price: 15000,
            airline: "SU".to_string(),
            ..Flight::default()
        }])
    }

    fn partner_link(&self, flight: &Flight, passengers: u32) -> String {
        format!(
            "https://example.com/{}{}?passengers={passengers}",
            flight.origin, flight.destination
        )
    }

    fn format_message(&self, origin_city: &str, dest_city: &str, flights: &[Flight], _: u32) -> String {
        format!("{origin_city} → {dest_city}: {} options", flights.len())
    }
}

fn test_app(fail: bool) -> (axum::Router, Arc<ConsumerHealthMonitor>) {
    let monitor = Arc::new(ConsumerHealthMonitor::new());
    let state = AppState {
        searcher: Arc::new(StubSearcher { fail }),
        monitor: monitor.clone(),
    };
    (crate::app(state), monitor)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reflects_monitor_state() {
    let (app, monitor) = test_app(false);
    monitor.record_processing("r1", true, Duration::from_millis(100));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["healthy"], true);
    assert_eq!(body["processed_count"], 1);
    assert_eq!(body["success_rate"], 100.0);
}

#[tokio::test]
async fn test_search_requires_route_parameters() {
    let (app, _) = test_app(false);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/flights/search?origin=MOW")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "origin, destination and depart_date are required");
}

#[tokio::test]
async fn test_search_returns_flights() {
    let (app, _) = test_app(false);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/flights/search?origin=MOW&destination=PAR&depart_date=2024-12")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 1);
    assert_eq!(body["flights"][0]["origin"], "MOW");
}

#[tokio::test]
async fn test_upstream_failure_maps_to_bad_gateway() {
    let (app, _) = test_app(true);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/flights/search?origin=MOW&destination=PAR&depart_date=2024-12")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_message_endpoint_formats_flights() {
    let (app, _) = test_app(false);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/flights/message?origin=MOW&destination=PAR&depart_date=2024-12&origin_city=Moscow&dest_city=Paris")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Moscow → Paris: 1 options");
    assert_eq!(body["passengers"], 1);
}
