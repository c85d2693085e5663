use crate::model::{FileId, FileMeta, NodeId, Status};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Per-chunk bookkeeping held by a `Transfer`. Lives for the transfer's
/// entire duration, one record per chunk offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkState {
    pub offset: u64,
    pub received: bool,
    pub received_at: Option<i64>,
    pub available_from: HashSet<NodeId>,
    pub current_source: Option<NodeId>,
    pub retry_count: u32,
    pub priority: u8,
    pub last_requested_at: Option<i64>,
}

impl ChunkState {
    pub fn new(offset: u64) -> Self {
        Self {
            offset,
            received: false,
            received_at: None,
            available_from: HashSet::new(),
            current_source: None,
            retry_count: 0,
            priority: 0,
            last_requested_at: None,
        }
    }
}

/// Owns the bookkeeping for a single in-flight (or terminal) file
/// transfer: status, progress, sources, and per-chunk state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: FileId,
    pub meta: FileMeta,
    pub status: Status,
    pub initiator: Option<NodeId>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub chunks: Vec<ChunkState>,
    pub sources: HashSet<NodeId>,
}

impl Transfer {
    pub fn new(id: FileId, meta: FileMeta, now: i64) -> Self {
        let chunks = meta.chunk_offsets().map(ChunkState::new).collect();
        Self {
            id,
            meta,
            status: Status::Pending,
            initiator: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            chunks,
            sources: HashSet::new(),
        }
    }

    pub fn received_chunks(&self) -> u64 {
        self.chunks.iter().filter(|c| c.received).count() as u64
    }

    pub fn total_chunks(&self) -> u64 {
        self.chunks.len() as u64
    }

    /// `received_chunks * chunk_size`, capped at `meta.size` to account
    /// for a short final chunk.
    pub fn transferred_bytes(&self) -> u64 {
        (self.received_chunks() * self.meta.chunk_size as u64).min(self.meta.size)
    }

    /// A zero-chunk file is reported complete at 0%, by convention.
    pub fn completion_percentage(&self) -> f64 {
        let total = self.total_chunks();
        if total == 0 {
            return 0.0;
        }
        (self.received_chunks() as f64 / total as f64) * 100.0
    }

    pub fn all_chunks_received(&self) -> bool {
        self.total_chunks() > 0 && self.chunks.iter().all(|c| c.received)
    }

    pub fn chunk_mut(&mut self, offset: u64) -> Option<&mut ChunkState> {
        self.chunks.iter_mut().find(|c| c.offset == offset)
    }

    pub fn chunk(&self, offset: u64) -> Option<&ChunkState> {
        self.chunks.iter().find(|c| c.offset == offset)
    }
}

/// Result of a state machine operation, reported back to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Started {
        file_id: FileId,
        initiator: Option<NodeId>,
        started_at: i64,
    },
    Paused {
        file_id: FileId,
    },
    Resumed {
        file_id: FileId,
    },
    Cancelled {
        file_id: FileId,
    },
    Progress {
        file_id: FileId,
        received_chunks: u64,
        total_chunks: u64,
    },
    Completed {
        file_id: FileId,
        completed_at: i64,
    },
    SourceAdded {
        file_id: FileId,
        node: NodeId,
    },
    SourceRemoved {
        file_id: FileId,
        node: NodeId,
    },
    ChunkRequestFailed {
        file_id: FileId,
        offset: u64,
        reason: String,
    },
}
