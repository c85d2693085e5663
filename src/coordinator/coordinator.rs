use crate::coordinator::error::{CoordinatorError, CoordinatorResult};
use crate::coordinator::types::TransferStatus;
use crate::metrics;
use crate::model::{ChunkId, FileId, FileMeta, NodeId};
use crate::store::{ChunkStore, TransferDescriptor};
use crate::transfer::{Transfer, TransferEvent, TransferStateMachine};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Acknowledgement returned to the caller of `store_chunk`.
#[derive(Debug, Clone)]
pub struct ChunkStored {
    pub chunk_id: ChunkId,
}

/// Registry of active transfers; creates/destroys state machines, fans
/// out status queries, and records outbound-sender progress. Mutations to
/// the registry and outbound counters are expected to be driven from a
/// single logical executor (the session layer and control API call into
/// this type from their own tasks, but each call here completes without
/// yielding across a registry mutation).
pub struct TransferCoordinator {
    store: Arc<ChunkStore>,
    active: Arc<DashMap<FileId, TransferStateMachine>>,
    outbound_progress: Arc<DashMap<FileId, u64>>,
    status_timeout: Duration,
}

impl Clone for TransferCoordinator {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            active: self.active.clone(),
            outbound_progress: self.outbound_progress.clone(),
            status_timeout: self.status_timeout,
        }
    }
}

impl TransferCoordinator {
    pub fn new(store: Arc<ChunkStore>) -> Self {
        Self {
            store,
            active: Arc::new(DashMap::new()),
            outbound_progress: Arc::new(DashMap::new()),
            status_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    /// Rebuilds the active-transfer registry from durable state: every
    /// non-terminal `files/<file_id>.json` descriptor gets its chunk
    /// bookkeeping reconstructed from the chunk store's per-chunk
    /// sidecars, so a restarted node does not re-request chunks it
    /// already has on disk.
    pub async fn restore(store: Arc<ChunkStore>) -> CoordinatorResult<Self> {
        let coordinator = Self::new(store.clone());
        for descriptor in store.list_transfer_descriptors().await? {
            if descriptor.status.is_terminal() {
                continue;
            }
            let mut transfer = Transfer::new(
                descriptor.file_id.clone(),
                descriptor.meta.clone(),
                descriptor.created_at,
            );
            transfer.status = descriptor.status;
            transfer.initiator = descriptor.initiator.clone();
            transfer.started_at = descriptor.started_at;
            transfer.sources = descriptor.sources.iter().cloned().collect();

            let stored_chunks = store.list_for_file(&descriptor.file_id).await?;
            for chunk_id in stored_chunks {
                if let Some(chunk) = transfer.chunk_mut(chunk_id.offset) {
                    chunk.received = true;
                    chunk.received_at = Some(descriptor.created_at);
                }
            }

            coordinator
                .active
                .insert(descriptor.file_id.clone(), TransferStateMachine::from_transfer(transfer));
        }
        Ok(coordinator)
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    async fn persist(&self, sm: &TransferStateMachine) -> CoordinatorResult<()> {
        let t = sm.snapshot();
        let descriptor = TransferDescriptor {
            file_id: t.id,
            meta: t.meta,
            status: t.status,
            initiator: t.initiator,
            sources: t.sources.into_iter().collect(),
            created_at: t.created_at,
            started_at: t.started_at,
            completed_at: t.completed_at,
        };
        self.store.save_transfer_descriptor(&descriptor).await?;
        Ok(())
    }

    /// `start(file_id, meta, initiator)`: rejects with `TransferAlreadyActive`
    /// if a transfer for `file_id` already exists. Uses `DashMap::entry` so
    /// the occupied-check and insert happen under the same shard lock —
    /// two concurrent `start()` calls for the same `file_id` can't both
    /// observe an empty slot.
    pub async fn start(
        &self,
        file_id: FileId,
        meta: FileMeta,
        initiator: Option<NodeId>,
    ) -> CoordinatorResult<TransferEvent> {
        let sm = TransferStateMachine::new(file_id.clone(), meta, Self::now());
        let event = sm
            .start(initiator, Self::now())
            .expect("freshly created transfer is always Pending");

        match self.active.entry(file_id.clone()) {
            Entry::Occupied(_) => return Err(CoordinatorError::TransferAlreadyActive(file_id.0)),
            Entry::Vacant(slot) => {
                slot.insert(sm.clone());
            }
        }

        self.persist(&sm).await?;
        metrics::record_transfer_started(&file_id.0);
        Ok(event)
    }

    fn lookup(&self, file_id: &FileId) -> CoordinatorResult<TransferStateMachine> {
        self.active
            .get(file_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| CoordinatorError::TransferNotFound(file_id.0.clone()))
    }

    pub async fn pause(
        &self,
        file_id: &FileId,
        requester: Option<NodeId>,
    ) -> CoordinatorResult<Option<TransferEvent>> {
        let sm = self.lookup(file_id)?;
        let event = sm.pause(requester);
        self.persist(&sm).await?;
        Ok(event)
    }

    pub async fn resume(
        &self,
        file_id: &FileId,
        requester: Option<NodeId>,
    ) -> CoordinatorResult<Option<TransferEvent>> {
        let sm = self.lookup(file_id)?;
        let event = sm.resume(requester);
        self.persist(&sm).await?;
        Ok(event)
    }

    pub async fn cancel(
        &self,
        file_id: &FileId,
        requester: Option<NodeId>,
    ) -> CoordinatorResult<Option<TransferEvent>> {
        let sm = self.lookup(file_id)?;
        let event = sm.cancel(requester);
        if event.is_some() {
            metrics::record_transfer_failed(&file_id.0, "cancelled");
        }
        self.persist(&sm).await?;
        self.terminate_if_done(file_id, &sm).await?;
        Ok(event)
    }

    /// `store_chunk`: routes by `chunk_id.file_id`, persists the bytes in
    /// the chunk store, and forwards the receipt to the matching state
    /// machine.
    pub async fn store_chunk(
        &self,
        chunk_id: ChunkId,
        bytes: &[u8],
        source: Option<NodeId>,
    ) -> CoordinatorResult<ChunkStored> {
        let sm = self.lookup(&chunk_id.file_id)?;
        self.store.store(&chunk_id, bytes).await?;
        metrics::record_chunk_received(&chunk_id.file_id.0, bytes.len());

        let (_, completed) = sm
            .mark_chunk_received(chunk_id.offset, source, Self::now())
            .map_err(|e| CoordinatorError::PreconditionViolated(e.to_string()))?;
        self.persist(&sm).await?;

        if completed.is_some() {
            let t = sm.snapshot();
            let duration = Duration::from_secs(
                (t.completed_at.unwrap_or(Self::now()) - t.started_at.unwrap_or(Self::now())).max(0) as u64,
            );
            metrics::record_transfer_complete(&chunk_id.file_id.0, duration, t.transferred_bytes());
            self.terminate_if_done(&chunk_id.file_id, &sm).await?;
        }

        Ok(ChunkStored { chunk_id })
    }

    async fn terminate_if_done(
        &self,
        file_id: &FileId,
        sm: &TransferStateMachine,
    ) -> CoordinatorResult<()> {
        if sm.status().is_terminal() {
            self.active.remove(file_id);
            self.outbound_progress.remove(file_id);
        }
        Ok(())
    }

    fn status_of(&self, file_id: &FileId, sm: &TransferStateMachine) -> TransferStatus {
        let t = sm.snapshot();
        let received_bytes = t.transferred_bytes();
        let sent_bytes = self.outbound_progress.get(file_id).map(|v| *v).unwrap_or(0);
        let transferred_bytes = received_bytes.max(sent_bytes.min(t.meta.size));
        let percent = if t.meta.size == 0 {
            0.0
        } else {
            (transferred_bytes as f64 / t.meta.size as f64) * 100.0
        };
        let duration_secs = t.started_at.map(|started| Self::now() - started);

        TransferStatus {
            file_id: t.id,
            status: t.status,
            percent,
            transferred_bytes,
            total_bytes: t.meta.size,
            duration_secs,
            sources: t.sources.into_iter().collect(),
            degraded: false,
        }
    }

    pub async fn status(&self, file_id: &FileId) -> CoordinatorResult<TransferStatus> {
        let sm = self.lookup(file_id)?;
        Ok(self.status_of(file_id, &sm))
    }

    /// Queries every active transfer with a bounded timeout; non-responders
    /// (in practice: entries whose lock could not be taken promptly)
    /// contribute a degraded `InProgress` entry synthesized from the last
    /// known outbound progress rather than failing the whole aggregation.
    pub async fn active_transfers(&self) -> Vec<TransferStatus> {
        if let Ok(bytes) = self.store.total_bytes_stored().await {
            metrics::set_store_bytes_used(bytes);
        }

        let entries: Vec<(FileId, TransferStateMachine)> = self
            .active
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let mut out = Vec::with_capacity(entries.len());
        for (file_id, sm) in entries {
            let status = time::timeout(self.status_timeout, async { self.status_of(&file_id, &sm) }).await;
            match status {
                Ok(status) => out.push(status),
                Err(_) => {
                    let sent = self.outbound_progress.get(&file_id).map(|v| *v).unwrap_or(0);
                    out.push(TransferStatus {
                        file_id,
                        status: crate::model::Status::InProgress,
                        percent: 0.0,
                        transferred_bytes: sent,
                        total_bytes: 0,
                        duration_secs: None,
                        sources: vec![],
                        degraded: true,
                    });
                }
            }
        }
        out
    }

    /// Monotonic merge: `progress[file_id] <- max(existing, bytes_sent_so_far)`,
    /// capped at `meta.size`.
    pub fn outbound_progress_notice(&self, file_id: &FileId, bytes_sent_so_far: u64) {
        let cap = self
            .active
            .get(file_id)
            .map(|e| e.value().snapshot().meta.size)
            .unwrap_or(u64::MAX);
        let capped = bytes_sent_so_far.min(cap);
        self.outbound_progress
            .entry(file_id.clone())
            .and_modify(|v| *v = (*v).max(capped))
            .or_insert(capped);
    }

    pub fn list_active(&self) -> Vec<FileId> {
        self.active.iter().map(|e| e.key().clone()).collect()
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }
}
