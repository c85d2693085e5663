use crate::api::error::{ApiError, ApiResult};
use crate::api::types::*;
use crate::coordinator::TransferCoordinator;
use crate::model::{FileId, NodeId};
use crate::session::SessionManager;
use crate::transfer::TransferEvent;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;

/// Thin axum adapter binding 1:1 to the control-API operations:
/// `start_transfer`, `pause_transfer`, `resume_transfer`, `cancel_transfer`,
/// `get_status`, `list_active`, `connect_peer`, `disconnect_peer`.
pub struct RestApi {
    state: ApiState,
}

#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<TransferCoordinator>,
    pub sessions: Arc<SessionManager>,
}

impl RestApi {
    pub fn new(coordinator: Arc<TransferCoordinator>, sessions: Arc<SessionManager>) -> Self {
        Self {
            state: ApiState { coordinator, sessions },
        }
    }

    pub fn state(&self) -> ApiState {
        self.state.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/api/v1/transfers", post(start_transfer).get(list_active))
            .route("/api/v1/transfers/:file_id", get(get_status))
            .route("/api/v1/transfers/:file_id/pause", post(pause_transfer))
            .route("/api/v1/transfers/:file_id/resume", post(resume_transfer))
            .route("/api/v1/transfers/:file_id/cancel", post(cancel_transfer))
            .route("/api/v1/peers/connect", post(connect_peer))
            .route("/api/v1/peers/:node_id/disconnect", post(disconnect_peer))
            .with_state(self.state.clone())
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn start_transfer(
    State(state): State<ApiState>,
    Json(req): Json<StartTransferRequest>,
) -> ApiResult<(StatusCode, Json<StartedResponse>)> {
    let event = state
        .coordinator
        .start(req.file_id, req.meta, req.initiator)
        .await?;
    match event {
        TransferEvent::Started {
            file_id,
            initiator,
            started_at,
        } => Ok((
            StatusCode::CREATED,
            Json(StartedResponse {
                file_id,
                initiator,
                started_at,
            }),
        )),
        other => Err(ApiError::InvalidRequest(format!("unexpected event from start: {other:?}"))),
    }
}

async fn list_active(State(state): State<ApiState>) -> Json<ListActiveResponse> {
    let transfers: Vec<TransferStatusResponse> = state
        .coordinator
        .active_transfers()
        .await
        .into_iter()
        .map(TransferStatusResponse::from)
        .collect();
    let total_count = transfers.len();
    Json(ListActiveResponse { transfers, total_count })
}

async fn get_status(
    State(state): State<ApiState>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<TransferStatusResponse>> {
    let status = state.coordinator.status(&FileId::new(file_id)).await?;
    Ok(Json(status.into()))
}

async fn pause_transfer(
    State(state): State<ApiState>,
    Path(file_id): Path<String>,
    body: Option<Json<RequesterBody>>,
) -> ApiResult<Json<LifecycleResponse>> {
    let requester = body.map(|Json(b)| b.requester).unwrap_or(None);
    let file_id = FileId::new(file_id);
    state.coordinator.pause(&file_id, requester).await?;
    Ok(Json(LifecycleResponse { file_id }))
}

async fn resume_transfer(
    State(state): State<ApiState>,
    Path(file_id): Path<String>,
    body: Option<Json<RequesterBody>>,
) -> ApiResult<Json<LifecycleResponse>> {
    let requester = body.map(|Json(b)| b.requester).unwrap_or(None);
    let file_id = FileId::new(file_id);
    state.coordinator.resume(&file_id, requester).await?;
    Ok(Json(LifecycleResponse { file_id }))
}

async fn cancel_transfer(
    State(state): State<ApiState>,
    Path(file_id): Path<String>,
    body: Option<Json<RequesterBody>>,
) -> ApiResult<Json<LifecycleResponse>> {
    let requester = body.map(|Json(b)| b.requester).unwrap_or(None);
    let file_id = FileId::new(file_id);
    state.coordinator.cancel(&file_id, requester).await?;
    Ok(Json(LifecycleResponse { file_id }))
}

async fn connect_peer(
    State(state): State<ApiState>,
    Json(req): Json<ConnectPeerRequest>,
) -> ApiResult<Json<PeerConnectedResponse>> {
    let addr: SocketAddr = format!("{}:{}", req.host, req.port)
        .parse()
        .map_err(|e| ApiError::InvalidRequest(format!("invalid host/port: {e}")))?;
    state.sessions.connect(addr).await?;
    Ok(Json(PeerConnectedResponse {
        host: req.host,
        port: req.port,
    }))
}

async fn disconnect_peer(
    State(state): State<ApiState>,
    Path(node_id): Path<String>,
) -> Json<PeerDisconnectedResponse> {
    let node_id = NodeId::new(node_id);
    state.sessions.disconnect(&node_id);
    Json(PeerDisconnectedResponse { node_id })
}
