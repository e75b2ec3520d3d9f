//! HTTP surface: `POST /ask` and `GET /health`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use explainer_core::Orchestrator;
use explainer_shared::FinalAnswer;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

#[derive(Debug, Deserialize)]
struct AskRequest {
    #[serde(default)]
    query: String,
}

/// Error body is always `{"detail": ...}`. Failures expose only their
/// category; the full error goes to the log.
enum ApiError {
    InvalidQuery(&'static str),
    Failed(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::InvalidQuery(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.to_string()),
            Self::Failed(category) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("request failed ({category})"),
            ),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Routes mounted at the root, or nested under `api_prefix` when non-empty.
pub(crate) fn router(orchestrator: Arc<Orchestrator>, api_prefix: &str) -> Router {
    let api = Router::new()
        .route("/ask", post(ask))
        .route("/health", get(health))
        .with_state(orchestrator);

    if api_prefix.is_empty() {
        api
    } else {
        Router::new().nest(api_prefix, api)
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn ask(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<FinalAnswer>, ApiError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::InvalidQuery("query must not be empty"));
    }

    match orchestrator.process_query(query).await {
        Ok(answer) => Ok(Json(answer)),
        Err(e) => {
            error!(error = %e, "request failed");
            Err(ApiError::Failed(e.category()))
        }
    }
}
