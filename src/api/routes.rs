use crate::api::api_error::APIError;
use crate::api::model::{CacheCleared, CacheStatus, CloseSessionParams};
use crate::api::server::AppState;
use crate::session::events::{SessionClosed, SessionCreated};
use crate::session::Session;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub(super) fn new(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/cache", get(cache_status).delete(clear_cache))
        .route("/cache/:key", delete(evict_cache_key))
        .route("/sessions", post(create_session))
        .route("/sessions/:session_id", delete(close_session))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.api_timeout))
        .with_state(state)
}

#[allow(clippy::unused_async)]
async fn health_check() -> impl IntoResponse {
    Json(json!({"status":"healthy","service":"tunneldns"}))
}

#[allow(clippy::unused_async)]
async fn cache_status(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(CacheStatus {
        enabled: state.cache.is_enabled(),
        entries: state.cache.len(),
    })
}

#[allow(clippy::unused_async)]
async fn clear_cache(State(state): State<AppState>) -> Json<CacheCleared> {
    Json(CacheCleared {
        evicted: state.cache.clear(),
    })
}

#[allow(clippy::unused_async)]
async fn evict_cache_key(State(state): State<AppState>, Path(key): Path<String>) -> StatusCode {
    if state.cache.remove(&key.to_ascii_lowercase()) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn create_session(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<SessionCreated>, APIError>,
) -> Result<Json<Session>, APIError> {
    Ok(Json(state.events.created(payload).await?))
}

async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<CloseSessionParams>,
) -> Result<Json<Session>, APIError> {
    let event = SessionClosed {
        session_id,
        reason: params.reason,
    };
    Ok(Json(state.events.closed(event).await?))
}
