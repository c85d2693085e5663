//! Control API: a thin axum adapter (REST + WebSocket) over the
//! [`TransferCoordinator`] and [`SessionManager`], mirroring the
//! operation table external callers (HTTP/CLI) are meant to bind to.
//! CLI/process supervision/auth remain out of scope entirely.

mod error;
mod rest;
mod types;
mod websocket;

pub use error::{ApiError, ApiResult};
pub use rest::{ApiState, RestApi};
pub use types::*;
pub use websocket::websocket_handler;

use crate::coordinator::TransferCoordinator;
use crate::session::SessionManager;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Builds the complete API server: REST control-plane routes plus a
/// `/ws` status-push endpoint, merged under permissive CORS so a
/// browser-based dashboard can reach it from another origin.
pub fn create_api_server(coordinator: Arc<TransferCoordinator>, sessions: Arc<SessionManager>) -> Router {
    let rest_api = RestApi::new(coordinator, sessions);
    let state = rest_api.state();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let ws_router = Router::new().route("/ws", get(websocket_handler)).with_state(state);

    Router::new().merge(rest_api.router()).merge(ws_router).layer(cors)
}
