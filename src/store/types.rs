use crate::model::{ChecksumAlgorithm, FileId, FileMeta, NodeId, Status};
use serde::{Deserialize, Serialize};

/// On-disk sidecar record for one stored chunk, kept alongside (not inside)
/// the raw payload file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunkSidecar {
    pub file_id: FileId,
    pub offset: u64,
    pub original_size: u64,
    pub compressed_size: u64,
    pub is_compressed: bool,
    pub checksum_alg: ChecksumAlgorithm,
    pub checksum_value: [u8; 32],
    pub created_at: i64,
    pub last_accessed_at: i64,
}

/// Durable `files/<file_id>.json` sidecar for a `Transfer`.
///
/// Deliberately does not carry per-chunk `received`/`retry_count`/
/// `current_source` state: on reload that bookkeeping is rebuilt by
/// listing the chunk store's per-chunk sidecars for this file, which is
/// always consistent with what actually landed on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferDescriptor {
    pub file_id: FileId,
    pub meta: FileMeta,
    pub status: Status,
    pub initiator: Option<NodeId>,
    pub sources: Vec<NodeId>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}
