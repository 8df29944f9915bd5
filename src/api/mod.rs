//! HTTP surface consumed by the web front-end

use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::aggregator::Aggregator;
use crate::normalize::normalize_query;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
}

#[derive(Debug, Deserialize)]
pub struct ScrapeParams {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    fn bad_request(message: &str) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(Self {
                error: message.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthData<'a> {
    status: &'static str,
    sources: Vec<&'a str>,
}

pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/api/scrape", get(scrape))
        .route("/api/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /api/scrape?q=<term>`
async fn scrape(State(state): State<AppState>, Query(params): Query<ScrapeParams>) -> Response {
    let term = normalize_query(params.q.as_deref().unwrap_or_default());
    if term.is_empty() {
        return ApiError::bad_request("Missing q parameter");
    }

    info!(term = %term, "Search request");
    let response = state.aggregator.search(&term).await;
    (StatusCode::OK, Json(response)).into_response()
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthData {
        status: "ok",
        sources: state.aggregator.sources(),
    })
    .into_response()
}
