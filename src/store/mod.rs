//! Chunk Store: content-addressed persistence of chunk payloads plus a
//! sidecar metadata index, with optional transparent compression. Also
//! hosts the durable transfer-descriptor sidecar (`files/<file_id>.json`),
//! since both live under the same storage root and share the same
//! crash-consistent write technique.

pub mod compression;
pub mod error;
pub mod types;

pub use error::{Result, StoreError};
pub use types::{StoredChunkSidecar, TransferDescriptor};

use crate::model::{ChecksumAlgorithm, ChunkId, FileId};
use bytes::Bytes;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub struct ChunkStore {
    base_dir: PathBuf,
    enable_compression: bool,
}

impl ChunkStore {
    /// Opens (creating if needed) a chunk store rooted at `base_dir`, and
    /// recovers from any payload left behind by a crash between writing
    /// the payload and committing its sidecar.
    pub async fn open(base_dir: impl Into<PathBuf>, enable_compression: bool) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(base_dir.join("files")).await?;
        fs::create_dir_all(base_dir.join("chunks")).await?;

        let store = Self {
            base_dir,
            enable_compression,
        };
        store.recover_dangling_payloads().await?;
        Ok(store)
    }

    fn files_dir(&self) -> PathBuf {
        self.base_dir.join("files")
    }

    fn chunks_dir(&self) -> PathBuf {
        self.base_dir.join("chunks")
    }

    fn payload_path(&self, chunk_id: &ChunkId) -> PathBuf {
        self.chunks_dir().join(format!("{}.chunk", chunk_id.path_key()))
    }

    fn sidecar_path(&self, chunk_id: &ChunkId) -> PathBuf {
        self.chunks_dir().join(format!("{}.json", chunk_id.path_key()))
    }

    fn descriptor_path(&self, file_id: &FileId) -> PathBuf {
        self.files_dir().join(format!("{}.json", file_id.0))
    }

    /// Writes `bytes` to `path` via create-temp + rename so readers never
    /// observe a partially written file.
    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp_path = PathBuf::from(format!("{}.tmp", path.display()));
        {
            let mut tmp = fs::File::create(&tmp_path).await?;
            tmp.write_all(bytes).await?;
            tmp.flush().await?;
        }
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    async fn recover_dangling_payloads(&self) -> Result<()> {
        let mut entries = fs::read_dir(self.chunks_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("chunk") {
                continue;
            }
            let sidecar = path.with_extension("json");
            if !sidecar.exists() {
                tracing::warn!(path = %path.display(), "removing dangling chunk payload with no sidecar");
                let _ = fs::remove_file(&path).await;
            }
        }
        Ok(())
    }

    pub async fn store(&self, chunk_id: &ChunkId, bytes: &[u8]) -> Result<()> {
        let checksum = blake3::hash(bytes);
        let compressed = compression::try_compress(bytes, self.enable_compression);
        let (payload, is_compressed, compressed_size) = match &compressed {
            Some(c) => (c.as_ref(), true, c.len() as u64),
            None => (bytes, false, bytes.len() as u64),
        };

        Self::write_atomic(&self.payload_path(chunk_id), payload).await?;

        let now = chrono::Utc::now().timestamp();
        let sidecar = StoredChunkSidecar {
            file_id: chunk_id.file_id.clone(),
            offset: chunk_id.offset,
            original_size: bytes.len() as u64,
            compressed_size,
            is_compressed,
            checksum_alg: ChecksumAlgorithm::Blake3,
            checksum_value: *checksum.as_bytes(),
            created_at: now,
            last_accessed_at: now,
        };
        let sidecar_json = serde_json::to_vec_pretty(&sidecar).expect("sidecar always serializes");
        Self::write_atomic(&self.sidecar_path(chunk_id), &sidecar_json).await?;

        Ok(())
    }

    pub async fn get(&self, chunk_id: &ChunkId) -> Result<Option<Bytes>> {
        let sidecar = match self.read_sidecar(chunk_id).await? {
            Some(s) => s,
            None => return Ok(None),
        };

        let raw = match fs::read(self.payload_path(chunk_id)).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::DanglingSidecar(chunk_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = if sidecar.is_compressed {
            compression::decompress(&raw)
                .map_err(|e| StoreError::Decompress(chunk_id.to_string(), e.to_string()))?
        } else {
            Bytes::from(raw)
        };

        self.touch_last_accessed(chunk_id, &sidecar).await;
        Ok(Some(bytes))
    }

    async fn touch_last_accessed(&self, chunk_id: &ChunkId, sidecar: &StoredChunkSidecar) {
        let mut updated = sidecar.clone();
        updated.last_accessed_at = chrono::Utc::now().timestamp();
        if let Ok(json) = serde_json::to_vec_pretty(&updated) {
            let _ = Self::write_atomic(&self.sidecar_path(chunk_id), &json).await;
        }
    }

    async fn read_sidecar(&self, chunk_id: &ChunkId) -> Result<Option<StoredChunkSidecar>> {
        match fs::read(self.sidecar_path(chunk_id)).await {
            Ok(bytes) => {
                let sidecar = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::CorruptSidecar(chunk_id.to_string(), e))?;
                Ok(Some(sidecar))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn has(&self, chunk_id: &ChunkId) -> bool {
        fs::metadata(self.sidecar_path(chunk_id)).await.is_ok()
    }

    pub async fn delete(&self, chunk_id: &ChunkId) -> Result<()> {
        let _ = fs::remove_file(self.payload_path(chunk_id)).await;
        let _ = fs::remove_file(self.sidecar_path(chunk_id)).await;
        Ok(())
    }

    pub async fn list_for_file(&self, file_id: &FileId) -> Result<Vec<ChunkId>> {
        let mut out = Vec::new();
        let mut entries = fs::read_dir(self.chunks_dir()).await?;
        let prefix = format!("{}_", file_id.0);
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if let Some(offset_str) = stem.strip_prefix(&prefix) {
                if let Ok(offset) = offset_str.parse::<u64>() {
                    out.push(ChunkId::new(file_id.clone(), offset));
                }
            }
        }
        out.sort_by_key(|c| c.offset);
        Ok(out)
    }

    pub async fn total_bytes_stored(&self) -> Result<u64> {
        let mut total = 0u64;
        let mut entries = fs::read_dir(self.chunks_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("chunk") {
                total += entry.metadata().await?.len();
            }
        }
        Ok(total)
    }

    /// Deletes sidecar+payload pairs whose `file_id` has no corresponding
    /// transfer descriptor.
    pub async fn sweep_orphans(&self) -> Result<usize> {
        let live: HashSet<String> = self
            .list_transfer_descriptors()
            .await?
            .into_iter()
            .map(|d| d.file_id.0)
            .collect();

        let mut removed = 0;
        let mut entries = fs::read_dir(self.chunks_dir()).await?;
        let mut seen_file_ids: HashSet<String> = HashSet::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if let Some(idx) = stem.rfind('_') {
                let file_id = &stem[..idx];
                seen_file_ids.insert(file_id.to_string());
            }
        }
        for file_id in seen_file_ids {
            if !live.contains(&file_id) {
                let chunk_ids = self.list_for_file(&FileId::new(file_id)).await?;
                for chunk_id in chunk_ids {
                    self.delete(&chunk_id).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    // -- transfer descriptor persistence -------------------------------

    pub async fn save_transfer_descriptor(&self, descriptor: &TransferDescriptor) -> Result<()> {
        let json = serde_json::to_vec_pretty(descriptor).expect("descriptor always serializes");
        Self::write_atomic(&self.descriptor_path(&descriptor.file_id), &json).await
    }

    pub async fn load_transfer_descriptor(
        &self,
        file_id: &FileId,
    ) -> Result<Option<TransferDescriptor>> {
        match fs::read(self.descriptor_path(file_id)).await {
            Ok(bytes) => {
                let descriptor = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::CorruptSidecar(file_id.to_string(), e))?;
                Ok(Some(descriptor))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_transfer_descriptor(&self, file_id: &FileId) -> Result<()> {
        let _ = fs::remove_file(self.descriptor_path(file_id)).await;
        Ok(())
    }

    pub async fn list_transfer_descriptors(&self) -> Result<Vec<TransferDescriptor>> {
        let mut out = Vec::new();
        let mut entries = fs::read_dir(self.files_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            match serde_json::from_slice::<TransferDescriptor>(&bytes) {
                Ok(descriptor) => out.push(descriptor),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping corrupt transfer descriptor"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Checksum, FileMeta, Status};
    use tempfile::TempDir;

    async fn store_at(dir: &TempDir) -> ChunkStore {
        ChunkStore::open(dir.path(), true).await.unwrap()
    }

    #[tokio::test]
    async fn store_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir).await;
        let id = ChunkId::new(FileId::new("f1"), 0);
        let payload = vec![7u8; 5000];

        store.store(&id, &payload).await.unwrap();
        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(&fetched[..], &payload[..]);
    }

    #[tokio::test]
    async fn get_on_missing_chunk_is_absent_not_error() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir).await;
        let id = ChunkId::new(FileId::new("nope"), 0);
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn small_payload_stored_raw_regardless_of_compression_toggle() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir).await;
        let id = ChunkId::new(FileId::new("f1"), 0);
        let payload = vec![1u8; 10];
        store.store(&id, &payload).await.unwrap();
        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(&fetched[..], &payload[..]);
    }

    #[tokio::test]
    async fn delete_removes_both_payload_and_sidecar() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir).await;
        let id = ChunkId::new(FileId::new("f1"), 0);
        store.store(&id, b"hello world").await.unwrap();
        assert!(store.has(&id).await);
        store.delete(&id).await.unwrap();
        assert!(!store.has(&id).await);
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_for_file_returns_offsets_ascending() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir).await;
        let file_id = FileId::new("f1");
        for offset in [2048, 0, 1024] {
            store
                .store(&ChunkId::new(file_id.clone(), offset), b"x")
                .await
                .unwrap();
        }
        let ids = store.list_for_file(&file_id).await.unwrap();
        let offsets: Vec<u64> = ids.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 1024, 2048]);
    }

    #[tokio::test]
    async fn sweep_orphans_deletes_chunks_with_no_descriptor() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir).await;
        let orphan_file = FileId::new("orphan");
        store
            .store(&ChunkId::new(orphan_file.clone(), 0), b"x")
            .await
            .unwrap();

        let live_file = FileId::new("live");
        store
            .store(&ChunkId::new(live_file.clone(), 0), b"y")
            .await
            .unwrap();
        store
            .save_transfer_descriptor(&TransferDescriptor {
                file_id: live_file.clone(),
                meta: FileMeta::new("a.bin", 1, 4096, Checksum::blake3([0; 32])).unwrap(),
                status: Status::InProgress,
                initiator: None,
                sources: vec![],
                created_at: 0,
                started_at: None,
                completed_at: None,
            })
            .await
            .unwrap();

        let removed = store.sweep_orphans().await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.list_for_file(&orphan_file).await.unwrap().is_empty());
        assert_eq!(store.list_for_file(&live_file).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transfer_descriptor_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir).await;
        let file_id = FileId::new("f1");
        let descriptor = TransferDescriptor {
            file_id: file_id.clone(),
            meta: FileMeta::new("a.bin", 100, 4096, Checksum::blake3([0; 32])).unwrap(),
            status: Status::Pending,
            initiator: None,
            sources: vec![],
            created_at: 0,
            started_at: None,
            completed_at: None,
        };
        store.save_transfer_descriptor(&descriptor).await.unwrap();
        let loaded = store.load_transfer_descriptor(&file_id).await.unwrap().unwrap();
        assert_eq!(loaded.file_id, file_id);
        store.delete_transfer_descriptor(&file_id).await.unwrap();
        assert!(store.load_transfer_descriptor(&file_id).await.unwrap().is_none());
    }
}
