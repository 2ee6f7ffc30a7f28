use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tower_http::validate_request::ValidateRequestHeaderLayer;
use tracing::{error, info, warn};

use crate::config::settings::{ApiSettings, Settings};
use crate::tags::engine::TagEngine;
use crate::tags::ingest::{parse_raw, IngestError};
use crate::tags::structures::{TagKey, TagUpdate, TagValue};

#[derive(Clone)]
pub struct SharedAppState {
    pub tag_engine: Arc<TagEngine>,
    pub driver_count: usize,
    pub start_time: tokio::time::Instant,
    pub settings: Arc<RwLock<Settings>>,
    pub config_path: Arc<PathBuf>,
}

#[derive(Deserialize)]
pub struct SampleRequest {
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Serialize)]
pub struct TagSnapshot {
    pub device_id: String,
    pub tag_id: String,
    pub name: String,
    pub current: TagValue,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = match self {
            IngestError::Unparsable(_) => StatusCode::BAD_REQUEST,
            IngestError::UnknownTag { .. } => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn create_api_routes() -> Router<SharedAppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/tags", get(get_tags))
        .route("/api/tags/:device_id/:tag_id", get(get_tag))
        .route("/api/tags/:device_id/:tag_id/samples", post(ingest_sample))
        .route("/api/config", get(get_config).put(update_config))
}

/// Full router with request tracing and basic auth.
pub fn build_app(state: SharedAppState, api: &ApiSettings) -> Router {
    create_api_routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(ValidateRequestHeaderLayer::basic(&api.username, &api.password))
}

// Simple health check endpoint
async fn health() -> &'static str {
    "Driver SDK Running"
}

async fn stats(State(state): State<SharedAppState>) -> impl IntoResponse {
    let tag_count = state.tag_engine.get_all_tag_paths().len();
    let uptime = state.start_time.elapsed().as_secs();
    Json(json!({
        "uptime_seconds": uptime,
        "tag_count": tag_count,
        "driver_count": state.driver_count,
        "validate_on": state.tag_engine.validate_on(),
    }))
}

async fn get_tags(State(state): State<SharedAppState>) -> impl IntoResponse {
    let mut tags: Vec<TagSnapshot> = state
        .tag_engine
        .get_all_tags()
        .into_iter()
        .map(|(config, current)| TagSnapshot {
            device_id: config.device_id.clone(),
            tag_id: config.id.clone(),
            name: config.name.clone(),
            current,
        })
        .collect();
    tags.sort_by(|a, b| (&a.device_id, &a.tag_id).cmp(&(&b.device_id, &b.tag_id)));
    Json(tags)
}

async fn get_tag(
    State(state): State<SharedAppState>,
    Path((device_id, tag_id)): Path<(String, String)>,
) -> Result<Json<TagSnapshot>, IngestError> {
    let key = TagKey::new(device_id, tag_id);
    let config = state.tag_engine.get_tag_details(&key);
    let current = state.tag_engine.read_tag(&key);
    match config.zip(current) {
        Some((config, current)) => Ok(Json(TagSnapshot {
            device_id: key.device_id,
            tag_id: key.tag_id,
            name: config.name.clone(),
            current,
        })),
        None => Err(IngestError::UnknownTag {
            device: key.device_id,
            tag: key.tag_id,
        }),
    }
}

async fn ingest_sample(
    State(state): State<SharedAppState>,
    Path((device_id, tag_id)): Path<(String, String)>,
    Json(body): Json<SampleRequest>,
) -> Result<Json<TagUpdate>, IngestError> {
    let raw = parse_raw(&body.value).map_err(|e| {
        warn!("Rejected sample for {}/{}: {}", device_id, tag_id, e);
        e
    })?;
    let key = TagKey::new(device_id, tag_id);
    state
        .tag_engine
        .process(&key, raw)
        .map(Json)
        .ok_or(IngestError::UnknownTag {
            device: key.device_id,
            tag: key.tag_id,
        })
}

async fn get_config(State(state): State<SharedAppState>) -> impl IntoResponse {
    let cfg = state.settings.read().await.clone();
    Json(cfg)
}

async fn update_config(
    State(state): State<SharedAppState>,
    Json(new_cfg): Json<Settings>,
) -> impl IntoResponse {
    if let Err(e) = new_cfg.save(&state.config_path) {
        error!("Failed to save configuration to {:?}: {}", state.config_path, e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        );
    }
    state.tag_engine.load_tags(new_cfg.tags.clone());
    info!("Configuration reloaded: {} tags", new_cfg.tags.len());

    let mut cfg_lock = state.settings.write().await;
    *cfg_lock = new_cfg;
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
