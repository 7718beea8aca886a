use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::gateway::{IssuedToken, RecordingStarted, RoomEnded};
use crate::livekit::{EgressInfo, RoomInfo};
use crate::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Request / Response DTOs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub identity: String,
}

#[derive(Deserialize)]
pub struct StartEgressRequest {
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Deserialize)]
pub struct StopEgressRequest {
    #[serde(default, rename = "egressId")]
    pub egress_id: String,
}

#[derive(Deserialize)]
pub struct RoomExistsRequest {
    #[serde(default)]
    pub room: String,
}

#[derive(Serialize)]
pub struct RoomExistsResponse {
    pub exists: bool,
}

#[derive(Deserialize)]
pub struct EndRoomRequest {
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub identity: Option<String>,
}

// ---------------------------------------------------------------------------
// GET / — liveness
// ---------------------------------------------------------------------------

pub async fn liveness() -> &'static str {
    "Room gateway is running"
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": VERSION,
        "rooms_tracked": state.gateway.hosts().len(),
    }))
}

// ---------------------------------------------------------------------------
// POST /room
// ---------------------------------------------------------------------------

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<Json<RoomInfo>, ApiError> {
    let Json(body) = payload?;
    let room = state.gateway.create_room(&body.name).await?;
    Ok(Json(room))
}

// ---------------------------------------------------------------------------
// POST /token
// ---------------------------------------------------------------------------

pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<IssuedToken>, ApiError> {
    let Json(body) = payload?;
    let issued = state.gateway.issue_token(&body.room, &body.identity)?;
    Ok(Json(issued))
}

// ---------------------------------------------------------------------------
// POST /start-egress, POST /stop-egress
// ---------------------------------------------------------------------------

pub async fn start_egress(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StartEgressRequest>, JsonRejection>,
) -> Result<Json<RecordingStarted>, ApiError> {
    let Json(body) = payload?;
    let started = state
        .gateway
        .start_recording(&body.room, &body.filename)
        .await?;
    Ok(Json(started))
}

pub async fn stop_egress(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StopEgressRequest>, JsonRejection>,
) -> Result<Json<EgressInfo>, ApiError> {
    let Json(body) = payload?;
    let info = state.gateway.stop_recording(&body.egress_id).await?;
    Ok(Json(info))
}

// ---------------------------------------------------------------------------
// POST /room-exists — always 200
// ---------------------------------------------------------------------------

pub async fn room_exists(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RoomExistsRequest>, JsonRejection>,
) -> Json<RoomExistsResponse> {
    let room = payload.map(|Json(body)| body.room).unwrap_or_default();
    let exists = state.gateway.room_exists(&room).await;
    Json(RoomExistsResponse { exists })
}

// ---------------------------------------------------------------------------
// POST /end-room
// ---------------------------------------------------------------------------

pub async fn end_room(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EndRoomRequest>, JsonRejection>,
) -> Result<Json<RoomEnded>, ApiError> {
    let Json(body) = payload?;
    let ended = state
        .gateway
        .end_room(&body.room, body.identity.as_deref())
        .await?;
    Ok(Json(ended))
}

// ─── Version header middleware ──────────────────────────────────────────────

async fn version_header_middleware(request: Request, next: Next) -> impl IntoResponse {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        HeaderName::from_static("x-gateway-version"),
        HeaderValue::from_static(VERSION),
    );
    response
}

// ─── CORS configuration ────────────────────────────────────────────────────

pub fn build_cors_layer(allowed_origins: &str) -> CorsLayer {
    if allowed_origins == "*" {
        warn!("CORS: permissive mode (allow all origins) — not suitable for production");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("CORS: ignoring invalid origin '{s}'");
                None
            }
        })
        .collect();

    info!("CORS: restricted to {} origin(s)", origins.len());

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([HeaderName::from_static("content-type")])
}

// ─── Router ─────────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>, allowed_origins: &str) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/health", get(health))
        .route("/room", post(create_room))
        .route("/token", post(issue_token))
        .route("/start-egress", post(start_egress))
        .route("/stop-egress", post(stop_egress))
        .route("/room-exists", post(room_exists))
        .route("/end-room", post(end_room))
        .layer(middleware::from_fn(version_header_middleware))
        .layer(build_cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
