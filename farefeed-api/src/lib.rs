use axum::{extract::State, http::Method, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod search;
pub mod state;

#[cfg(test)]
mod api_tests;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .merge(search::routes())
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness plus the consumer health snapshot, for operational tooling.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.monitor.health_status();
    Json(json!({
        "status": "ok",
        "service": "farefeed",
        "healthy": status.healthy,
        "processed_count": status.processed_count,
        "error_count": status.error_count,
        "success_rate": status.success_rate,
        "average_latency_ms": status.average_latency_ms,
    }))
}
