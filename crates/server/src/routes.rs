use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;

use moodlens_core::classification::domain::emotion_classifier::Prediction;
use moodlens_core::classification::domain::emotion_label::EmotionLabel;
use moodlens_core::history::emotion_counts::EmotionCounts;
use moodlens_core::history::prediction_logger::PredictionRecord;
use moodlens_core::streaming::stream_encoder::STREAM_CONTENT_TYPE;

use crate::error::ApiError;
use crate::payload::ImagePayload;
use crate::state::AppState;
use crate::stream_bridge;

const INDEX_HTML: &str = include_str!("../static/index.html");
const VIDEO_BUFFER_PARTS: usize = 2;

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/video", get(video))
        .route("/predict", post(predict))
        .route("/emotion", post(emotion))
        .route("/predict_emotion", post(emotion))
        .route("/logs", get(logs))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Serialize)]
struct PredictResponse {
    results: Vec<Prediction>,
}

#[derive(Serialize)]
struct EmotionResponse {
    label: Option<EmotionLabel>,
    emoji: Option<&'static str>,
}

#[derive(Serialize)]
struct StatsResponse {
    counts: EmotionCounts,
    total: usize,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Unbounded `multipart/x-mixed-replace` body fed by the camera hub. The
/// body ends when the camera does; dropping it unsubscribes via the bridge.
async fn video(State(state): State<AppState>) -> impl IntoResponse {
    let rx = stream_bridge::bridge(state.hub.subscribe(), VIDEO_BUFFER_PARTS);
    let parts = futures_util::stream::unfold(rx, |mut rx| async move {
        let part = rx.recv().await?;
        Some((Ok::<_, Infallible>(Bytes::copy_from_slice(&part)), rx))
    });
    (
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(parts),
    )
}

async fn predict(
    State(state): State<AppState>,
    payload: ImagePayload,
) -> Result<Json<PredictResponse>, ApiError> {
    let classify = state.classify.clone();
    let results = tokio::task::spawn_blocking(move || classify.execute(payload.as_input()))
        .await
        .map_err(|e| ApiError::internal(format!("prediction task failed: {e}")))??;
    Ok(Json(PredictResponse { results }))
}

async fn emotion(
    State(state): State<AppState>,
    payload: ImagePayload,
) -> Result<Json<EmotionResponse>, ApiError> {
    let classify = state.classify.clone();
    let best = tokio::task::spawn_blocking(move || classify.execute_single(payload.as_input()))
        .await
        .map_err(|e| ApiError::internal(format!("prediction task failed: {e}")))??;
    Ok(Json(EmotionResponse {
        label: best.map(|p| p.label),
        emoji: best.map(|p| p.label.emoji()),
    }))
}

async fn logs(State(state): State<AppState>) -> Json<Vec<PredictionRecord>> {
    Json(state.logger.snapshot())
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let counts = state.logger.aggregate();
    let total = counts.total();
    Json(StatsResponse { counts, total })
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}
