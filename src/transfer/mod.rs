//! Per-Transfer State Machine: owns chunk bookkeeping, progress, and
//! lifecycle transitions for a single `FileId`.

pub mod error;
pub mod types;

pub use error::{Result, TransferError};
pub use types::{ChunkState, Transfer, TransferEvent};

use crate::model::{FileId, FileMeta, NodeId, Status};
use parking_lot::RwLock;
use std::sync::Arc;

/// Thread-safe handle around one `Transfer`. Cloning shares the same
/// underlying state — the coordinator hands clones to callers while
/// keeping a single logical owner of the mutation path.
#[derive(Clone)]
pub struct TransferStateMachine {
    inner: Arc<RwLock<Transfer>>,
}

impl TransferStateMachine {
    pub fn new(id: FileId, meta: FileMeta, now: i64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Transfer::new(id, meta, now))),
        }
    }

    pub fn from_transfer(transfer: Transfer) -> Self {
        Self {
            inner: Arc::new(RwLock::new(transfer)),
        }
    }

    pub fn snapshot(&self) -> Transfer {
        self.inner.read().clone()
    }

    pub fn status(&self) -> Status {
        self.inner.read().status
    }

    /// `start(initiator)`: Pending -> InProgress. No-op (not an error) if
    /// the precondition fails.
    pub fn start(&self, initiator: Option<NodeId>, now: i64) -> Option<TransferEvent> {
        let mut t = self.inner.write();
        if t.status != Status::Pending {
            return None;
        }
        t.status = Status::InProgress;
        t.started_at.get_or_insert(now);
        if t.initiator.is_none() {
            t.initiator = initiator.clone();
        }
        Some(TransferEvent::Started {
            file_id: t.id.clone(),
            initiator: t.initiator.clone(),
            started_at: t.started_at.unwrap(),
        })
    }

    pub fn pause(&self, _requester: Option<NodeId>) -> Option<TransferEvent> {
        let mut t = self.inner.write();
        if t.status != Status::InProgress {
            return None;
        }
        t.status = Status::Paused;
        Some(TransferEvent::Paused {
            file_id: t.id.clone(),
        })
    }

    pub fn resume(&self, _requester: Option<NodeId>) -> Option<TransferEvent> {
        let mut t = self.inner.write();
        if t.status != Status::Paused {
            return None;
        }
        t.status = Status::InProgress;
        Some(TransferEvent::Resumed {
            file_id: t.id.clone(),
        })
    }

    /// `cancel`: any non-terminal status -> Failed (cancelled).
    pub fn cancel(&self, _requester: Option<NodeId>) -> Option<TransferEvent> {
        let mut t = self.inner.write();
        if t.status.is_terminal() {
            return None;
        }
        t.status = Status::Failed;
        Some(TransferEvent::Cancelled {
            file_id: t.id.clone(),
        })
    }

    /// `mark_chunk_received`: idempotent on an already-received chunk.
    /// Errors only if the offset is not part of this transfer at all.
    pub fn mark_chunk_received(
        &self,
        offset: u64,
        source: Option<NodeId>,
        now: i64,
    ) -> Result<(TransferEvent, Option<TransferEvent>)> {
        let mut t = self.inner.write();
        {
            let chunk = t
                .chunk(offset)
                .ok_or(TransferError::ChunkNotFound(offset))?;
            if chunk.received {
                return Ok((
                    TransferEvent::Progress {
                        file_id: t.id.clone(),
                        received_chunks: t.received_chunks(),
                        total_chunks: t.total_chunks(),
                    },
                    None,
                ));
            }
        }

        {
            let chunk = t.chunk_mut(offset).expect("checked present above");
            chunk.received = true;
            chunk.received_at = Some(now);
            chunk.current_source = source;
        }

        let progress = TransferEvent::Progress {
            file_id: t.id.clone(),
            received_chunks: t.received_chunks(),
            total_chunks: t.total_chunks(),
        };

        let completed = if t.all_chunks_received() && t.status != Status::Completed {
            t.status = Status::Completed;
            t.completed_at = Some(now);
            Some(TransferEvent::Completed {
                file_id: t.id.clone(),
                completed_at: now,
            })
        } else {
            None
        };

        Ok((progress, completed))
    }

    pub fn add_source(&self, node: NodeId) -> Option<TransferEvent> {
        let mut t = self.inner.write();
        if t.status.is_terminal() {
            return None;
        }
        t.sources.insert(node.clone());
        for chunk in t.chunks.iter_mut().filter(|c| !c.received) {
            chunk.available_from.insert(node.clone());
        }
        Some(TransferEvent::SourceAdded {
            file_id: t.id.clone(),
            node,
        })
    }

    pub fn remove_source(&self, node: NodeId) -> Option<TransferEvent> {
        let mut t = self.inner.write();
        if t.status.is_terminal() {
            return None;
        }
        t.sources.remove(&node);
        for chunk in t.chunks.iter_mut().filter(|c| !c.received) {
            chunk.available_from.remove(&node);
            if chunk.current_source.as_ref() == Some(&node) {
                chunk.current_source = None;
            }
        }
        Some(TransferEvent::SourceRemoved {
            file_id: t.id.clone(),
            node,
        })
    }

    /// Picks the highest-priority, lowest-retry un-received chunk whose
    /// `available_from` contains `from` and whose `current_source` is
    /// empty.
    pub fn next_chunk_to_request(&self, from: &NodeId, now: i64) -> Option<u64> {
        let mut t = self.inner.write();
        let offset = t
            .chunks
            .iter()
            .filter(|c| {
                !c.received && c.current_source.is_none() && c.available_from.contains(from)
            })
            .max_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(b.retry_count.cmp(&a.retry_count))
            })
            .map(|c| c.offset)?;

        let chunk = t.chunk_mut(offset)?;
        chunk.current_source = Some(from.clone());
        chunk.last_requested_at = Some(now);
        Some(offset)
    }

    pub fn mark_request_failed(&self, offset: u64, reason: impl Into<String>) -> Result<TransferEvent> {
        let reason = reason.into();
        let mut t = self.inner.write();
        let chunk = t
            .chunk_mut(offset)
            .ok_or(TransferError::ChunkNotFound(offset))?;
        chunk.retry_count += 1;
        chunk.current_source = None;
        Ok(TransferEvent::ChunkRequestFailed {
            file_id: t.id.clone(),
            offset,
            reason,
        })
    }
}
