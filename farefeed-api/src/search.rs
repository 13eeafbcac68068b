use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use farefeed_core::SearchParams;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/flights/search", get(search_flights))
        .route("/flights/message", get(flight_message))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub depart_date: String,
    #[serde(default)]
    pub return_date: String,
    pub currency: Option<String>,
    pub limit: Option<usize>,
    pub passengers: Option<u32>,
    pub origin_city: Option<String>,
    pub dest_city: Option<String>,
}

impl SearchQuery {
    fn into_params(self, default_limit: usize) -> Result<SearchParams, AppError> {
        if self.origin.is_empty() || self.destination.is_empty() || self.depart_date.is_empty() {
            return Err(AppError::ValidationError(
                "origin, destination and depart_date are required".to_string(),
            ));
        }
        Ok(SearchParams {
            origin: self.origin,
            destination: self.destination,
            depart_date: self.depart_date,
            return_date: self.return_date,
            currency: self.currency.unwrap_or_else(|| "rub".to_string()),
            passengers: self.passengers.unwrap_or(1),
            limit: self.limit.unwrap_or(default_limit),
        })
    }
}

async fn search_flights(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let params = query.into_params(10)?;

    let flights = state
        .searcher
        .search_cheap(&params)
        .await
        .map_err(|e| AppError::UpstreamError(e.to_string()))?;

    info!(
        origin = %params.origin,
        destination = %params.destination,
        count = flights.len(),
        "Flight search served"
    );
    Ok(Json(json!({
        "success": true,
        "flights": flights,
        "count": flights.len(),
    })))
}

async fn flight_message(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let origin_city = query.origin_city.clone();
    let dest_city = query.dest_city.clone();
    let passengers = query.passengers.unwrap_or(1);
    let params = query.into_params(3)?;

    let flights = state
        .searcher
        .search_cheap(&params)
        .await
        .map_err(|e| AppError::UpstreamError(e.to_string()))?;

    let message = state.searcher.format_message(
        origin_city.as_deref().unwrap_or(&params.origin),
        dest_city.as_deref().unwrap_or(&params.destination),
        &flights,
        passengers,
    );

    Ok(Json(json!({
        "success": true,
        "message": message,
        "flights": flights,
        "count": flights.len(),
        "passengers": passengers,
    })))
}
