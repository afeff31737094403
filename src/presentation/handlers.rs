// HTTP request handlers
use crate::application::errors::{FetchError, SessionError};
use crate::application::fetch_coordinator::RenderRequest;
use crate::application::renderer::ChartSize;
use crate::domain::source::SourceRef;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RenderBody {
    #[serde(flatten)]
    pub request: RenderRequest,
    /// Plot height in pixels; the configured default when missing.
    pub height: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct GuideQuery {
    pub x: f64,
}

#[derive(Debug, Deserialize)]
pub struct SourcesBody {
    pub sources: Vec<SourceRef>,
    #[serde(default)]
    pub token: String,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

fn session_error(error: SessionError) -> Response {
    let status = match error {
        SessionError::Superseded => return StatusCode::NO_CONTENT.into_response(),
        SessionError::Failed(_) => StatusCode::BAD_GATEWAY,
        SessionError::NotRendered => StatusCode::NOT_FOUND,
        SessionError::WorkerGone => StatusCode::SERVICE_UNAVAILABLE,
    };
    let message = match error {
        SessionError::Failed(message) => message,
        other => other.to_string(),
    };
    (status, Json(json!({ "error": message }))).into_response()
}

fn fetch_error(error: FetchError) -> Response {
    let status = match error {
        FetchError::UnknownServer(_) | FetchError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

fn unknown_chart(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("unknown chart {id}") })),
    )
        .into_response()
}

/// Fetch and draw a chart. Responds once this request's cycle has been drawn.
pub async fn render_chart(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<RenderBody>,
) -> Response {
    let size = ChartSize {
        width: f64::from(body.request.width),
        height: body.height.unwrap_or(state.default_height),
    };
    let session = state.session(&id, size).await;

    match session.render(body.request, size).await {
        Ok(frame) => Json(frame).into_response(),
        Err(e) => {
            tracing::debug!(chart = %id, "Render did not produce a frame: {}", e);
            session_error(e)
        }
    }
}

/// Redraw the last payload at a new size without fetching.
pub async fn resize_chart(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(size): Json<ChartSize>,
) -> Response {
    let Some(session) = state.existing(&id).await else {
        return unknown_chart(&id);
    };
    match session.resize(size).await {
        Ok(frame) => Json(frame).into_response(),
        Err(e) => session_error(e),
    }
}

/// Guide dots for the pointer at plot x.
pub async fn chart_guide(
    Path(id): Path<String>,
    Query(query): Query<GuideQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(session) = state.existing(&id).await else {
        return unknown_chart(&id);
    };
    match session.guide(query.x).await {
        Ok(dots) => Json(dots).into_response(),
        Err(e) => session_error(e),
    }
}

pub async fn chart_legend(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<SourcesBody>,
) -> Response {
    match state.coordinator.legend(&body.sources, &body.token).await {
        Ok(legend) => Json(json!({ "legend": legend })).into_response(),
        Err(e) => {
            tracing::warn!(chart = %id, "Legend request failed: {}", e);
            fetch_error(e)
        }
    }
}

pub async fn chart_title(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<SourcesBody>,
) -> Response {
    match state.coordinator.title(&body.sources, &body.token).await {
        Ok(title) => Json(json!({ "title": title })).into_response(),
        Err(e) => {
            tracing::warn!(chart = %id, "Title request failed: {}", e);
            fetch_error(e)
        }
    }
}

/// Stop a chart's worker and forget its frame.
pub async fn delete_chart(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    match state.remove(&id).await {
        Some(session) => {
            session.shutdown().await;
            tracing::info!(chart = %id, "Chart session stopped");
            StatusCode::NO_CONTENT.into_response()
        }
        None => unknown_chart(&id),
    }
}
