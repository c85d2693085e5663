use crate::model::{FileId, NodeId, Status};
use serde::{Deserialize, Serialize};

/// A status snapshot merging the state machine's received-chunk progress
/// with the coordinator's outbound counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferStatus {
    pub file_id: FileId,
    pub status: Status,
    pub percent: f64,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
    pub duration_secs: Option<i64>,
    pub sources: Vec<NodeId>,
    /// Set when this entry was synthesized from stored metadata after its
    /// state machine did not respond within the query deadline.
    pub degraded: bool,
}
