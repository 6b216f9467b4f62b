//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::{HeaderValue, header},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::Serialize;

use crate::registry::SessionRegistry;
use crate::version::VersionInfo;

use super::ws::handle_socket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Ready,
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: HealthStatus,
    pub sessions: usize,
    pub pending_handoff: bool,
    pub version: VersionInfo,
}

impl HealthCheckResponse {
    fn from_registry(registry: &SessionRegistry) -> Self {
        Self {
            status: HealthStatus::Ready,
            sessions: registry.len(),
            pending_handoff: registry.pending().is_some(),
            version: VersionInfo::new(),
        }
    }
}

async fn health_check(State(registry): State<Arc<SessionRegistry>>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse::from_registry(&registry))
}

/// Lobby endpoint: plain-text id of the session the caller should join.
async fn allocate_game(State(registry): State<Arc<SessionRegistry>>) -> String {
    registry.allocate().to_string()
}

async fn game_socket(
    ws: WebSocketUpgrade,
    State(registry): State<Arc<SessionRegistry>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

/// Browser clients are served from another origin.
async fn allow_any_origin(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

pub fn routes(registry: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/game", get(allocate_game))
        .route("/ws", get(game_socket))
        .route("/health-check", get(health_check))
        .layer(middleware::map_response(allow_any_origin))
        .with_state(registry)
}
