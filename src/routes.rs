use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::aggregator::Aggregator;
use crate::summarizer::{SummarizeRequest, SummarizeResponse, Summarizer, FAILED};

pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub summarizer: Arc<Summarizer>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/news", get(news))
        .route("/api/summarize", post(summarize))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Error fetching news: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": "Failed to fetch news" })),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

#[derive(Debug, Default)]
pub struct NewsQuery {
    pub refresh: Option<String>,
}

impl NewsQuery {
    /// The first `refresh` value wins; repeats are ignored.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            refresh: pairs
                .iter()
                .find(|(key, _)| key == "refresh")
                .map(|(_, value)| value.clone()),
        }
    }

    /// Only the literal `true` forces a refresh.
    pub fn force_refresh(&self) -> bool {
        self.refresh.as_deref() == Some("true")
    }
}

// Route handlers
pub async fn news(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let query = NewsQuery::from_pairs(&params);
    let response = state.aggregator.get_articles(query.force_refresh()).await?;
    Ok(([(header::CACHE_CONTROL, "no-store")], Json(response)))
}

pub async fn summarize(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Json<SummarizeResponse> {
    match body {
        Ok(Json(request)) => Json(state.summarizer.summarize(&request).await),
        Err(rejection) => {
            warn!("Rejected summarize request: {}", rejection);
            Json(SummarizeResponse {
                summary: FAILED.to_string(),
            })
        }
    }
}

pub async fn health() -> impl IntoResponse {
    "OK"
}
