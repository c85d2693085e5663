//! Outbound Transfer Orchestrator: streams one file to one peer, in
//! ascending chunk-offset order, over an already-connected session.

pub mod error;

pub use error::{OutboundError, OutboundResult};

use crate::coordinator::TransferCoordinator;
use crate::model::{FileId, FileMeta, NodeId};
use crate::session::{Envelope, SessionManager};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Sends `file_init` followed by one `file_chunk` per chunk of `meta`, read
/// sequentially from `source_path`. Reports progress to the coordinator
/// after each chunk is fully written. Stops and returns the error on the
/// first I/O or send failure; the spec leaves resend to a higher layer.
pub async fn send_file(
    sessions: &SessionManager,
    coordinator: &TransferCoordinator,
    file_id: FileId,
    target: &NodeId,
    local_node_id: NodeId,
    meta: &FileMeta,
    source_path: &Path,
) -> OutboundResult<()> {
    sessions
        .send_to(target, &Envelope::file_init(file_id.clone(), meta, local_node_id.clone()))
        .await?;

    let mut file = File::open(source_path).await?;
    let mut buf = vec![0u8; meta.chunk_size as usize];

    for offset in meta.chunk_offsets() {
        let len = meta.chunk_len_at(offset) as usize;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        file.read_exact(&mut buf[..len]).await?;

        sessions
            .send_to(
                target,
                &Envelope::FileChunk {
                    file_id: file_id.clone(),
                    offset,
                    source_node_id: local_node_id.clone(),
                    data: buf[..len].to_vec(),
                },
            )
            .await?;

        crate::metrics::record_chunk_sent(&file_id.0, len);
        coordinator.outbound_progress_notice(&file_id, offset + len as u64);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Checksum;
    use crate::store::ChunkStore;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    async fn coordinator_and_sessions(node_id: &str) -> (TempDir, Arc<TransferCoordinator>, SessionManager) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ChunkStore::open(dir.path(), true).await.unwrap());
        let coordinator = Arc::new(TransferCoordinator::new(store));
        let sessions = SessionManager::new(NodeId::new(node_id), coordinator.clone());
        (dir, coordinator, sessions)
    }

    #[tokio::test]
    async fn send_file_streams_chunks_in_order_and_completes_receiver() {
        let (_recv_dir, recv_coordinator, recv_sessions) = coordinator_and_sessions("receiver").await;
        let addr = recv_sessions.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let (_send_dir, send_coordinator, send_sessions) = coordinator_and_sessions("sender").await;
        send_sessions.connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let source_dir = TempDir::new().unwrap();
        let source_path = source_dir.path().join("payload.bin");
        let payload = vec![42u8; 5000];
        let mut f = tokio::fs::File::create(&source_path).await.unwrap();
        f.write_all(&payload).await.unwrap();
        f.flush().await.unwrap();
        drop(f);

        let meta = FileMeta::new("payload.bin", payload.len() as u64, 1024, Checksum::blake3([0; 32])).unwrap();
        let file_id = FileId::new("f1");
        let peers = send_sessions.connected_peers();
        let target = &peers[0];

        send_file(
            &send_sessions,
            &send_coordinator,
            file_id.clone(),
            target,
            NodeId::new("sender"),
            &meta,
            &source_path,
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let status = recv_coordinator.status(&file_id).await.unwrap();
        assert_eq!(status.status, crate::model::Status::Completed);
    }
}
