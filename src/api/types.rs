use crate::model::{FileId, FileMeta, NodeId, Status};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTransferRequest {
    pub file_id: FileId,
    pub meta: FileMeta,
    pub initiator: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartedResponse {
    pub file_id: FileId,
    pub initiator: Option<NodeId>,
    pub started_at: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RequesterBody {
    pub requester: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleResponse {
    pub file_id: FileId,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferStatusResponse {
    pub file_id: FileId,
    pub status: Status,
    pub percent: f64,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
    pub duration_secs: Option<i64>,
    pub sources: Vec<NodeId>,
    pub degraded: bool,
}

impl From<crate::coordinator::TransferStatus> for TransferStatusResponse {
    fn from(s: crate::coordinator::TransferStatus) -> Self {
        Self {
            file_id: s.file_id,
            status: s.status,
            percent: s.percent,
            transferred_bytes: s.transferred_bytes,
            total_bytes: s.total_bytes,
            duration_secs: s.duration_secs,
            sources: s.sources,
            degraded: s.degraded,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListActiveResponse {
    pub transfers: Vec<TransferStatusResponse>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectPeerRequest {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerConnectedResponse {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerDisconnectedResponse {
    pub node_id: NodeId,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Periodic push sent to every connected WebSocket client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WebSocketMessage {
    StatusSnapshot { transfers: Vec<TransferStatusResponse> },
}
