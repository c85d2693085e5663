//! Framed Session Layer: one task per TCP peer connection, length-prefixed
//! JSON envelopes, dispatching `file_init`/`file_chunk` into the
//! coordinator.

pub mod error;
pub mod types;

pub use error::{SessionError, SessionResult};
pub use types::Envelope;

use crate::coordinator::TransferCoordinator;
use crate::model::{ChunkId, NodeId};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// Upper bound on a single frame's JSON payload, per the wire protocol.
pub const MAX_FRAME_LEN: u32 = 50_000_000;

/// One peer connection. The write half is behind a lock so concurrent
/// senders on the same session never interleave frames.
pub struct Session {
    addr: SocketAddr,
    remote_node_id: parking_lot::RwLock<Option<NodeId>>,
    writer: Mutex<OwnedWriteHalf>,
    connected_at: i64,
}

impl Session {
    pub fn remote_node_id(&self) -> Option<NodeId> {
        self.remote_node_id.read().clone()
    }

    pub fn connected_at(&self) -> i64 {
        self.connected_at
    }

    /// Serializes `envelope`, prefixes its length, and writes both under
    /// the send lock. A failed write should be treated by the caller as
    /// session-terminating.
    pub async fn send(&self, envelope: &Envelope) -> SessionResult<()> {
        let json = serde_json::to_vec(envelope)?;
        let len = json.len() as u32;
        if json.is_empty() || len > MAX_FRAME_LEN {
            return Err(SessionError::FrameTooLarge(len));
        }
        let mut writer = self.writer.lock().await;
        writer.write_u32_le(len).await?;
        writer.write_all(&json).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Registry of live sessions plus the dependencies their receive loops
/// dispatch into. Cheap to clone: every field is an `Arc`.
#[derive(Clone)]
pub struct SessionManager {
    local_node_id: NodeId,
    coordinator: Arc<TransferCoordinator>,
    by_addr: Arc<DashMap<SocketAddr, Arc<Session>>>,
    by_node: Arc<DashMap<NodeId, SocketAddr>>,
}

impl SessionManager {
    pub fn new(local_node_id: NodeId, coordinator: Arc<TransferCoordinator>) -> Self {
        Self {
            local_node_id,
            coordinator,
            by_addr: Arc::new(DashMap::new()),
            by_node: Arc::new(DashMap::new()),
        }
    }

    /// Binds `bind_addr` and spawns a background accept loop, one task per
    /// connection. Returns the bound address (useful when `bind_addr`'s
    /// port is 0).
    pub async fn listen(&self, bind_addr: SocketAddr) -> SessionResult<SocketAddr> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => this.spawn_session(stream, addr),
                    Err(e) => {
                        tracing::warn!(error = %e, "listener accept failed, stopping");
                        break;
                    }
                }
            }
        });
        Ok(local_addr)
    }

    /// Opens an outbound connection and spawns its receive loop.
    pub async fn connect(&self, addr: SocketAddr) -> SessionResult<()> {
        let stream = TcpStream::connect(addr).await?;
        self.spawn_session(stream, addr);
        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.run_session(stream, addr).await {
                tracing::warn!(%addr, error = %e, "session terminated");
            }
        });
    }

    async fn run_session(&self, stream: TcpStream, addr: SocketAddr) -> SessionResult<()> {
        let (reader, writer) = stream.into_split();
        let session = Arc::new(Session {
            addr,
            remote_node_id: parking_lot::RwLock::new(None),
            writer: Mutex::new(writer),
            connected_at: chrono::Utc::now().timestamp(),
        });
        self.by_addr.insert(addr, session.clone());

        let outcome = async {
            session
                .send(&Envelope::Hello {
                    node_id: self.local_node_id.clone(),
                })
                .await?;
            self.receive_loop(reader, &session).await
        }
        .await;

        self.by_addr.remove(&addr);
        if let Some(remote) = session.remote_node_id() {
            self.by_node.remove(&remote);
        }
        outcome
    }

    async fn receive_loop(&self, mut reader: OwnedReadHalf, session: &Arc<Session>) -> SessionResult<()> {
        loop {
            let len = match reader.read_u32_le().await {
                Ok(len) => len,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            if len == 0 || len > MAX_FRAME_LEN {
                return Err(SessionError::FrameTooLarge(len));
            }
            let mut buf = vec![0u8; len as usize];
            reader.read_exact(&mut buf).await?;
            let envelope: Envelope = serde_json::from_slice(&buf)?;
            self.dispatch(session, envelope).await;
        }
    }

    async fn dispatch(&self, session: &Arc<Session>, envelope: Envelope) {
        match envelope {
            Envelope::Hello { node_id } => {
                *session.remote_node_id.write() = Some(node_id.clone());
                self.by_node.insert(node_id, session.addr);
            }
            Envelope::FileInit {
                file_id,
                file_name,
                file_size,
                chunk_size,
                source_node_id,
                checksum,
                checksum_algorithm,
            } => {
                match types::file_meta_from_init(file_name, file_size, chunk_size, checksum, checksum_algorithm) {
                    Ok(meta) => {
                        if let Err(e) = self.coordinator.start(file_id, meta, Some(source_node_id)).await {
                            tracing::warn!(error = %e, "failed to start transfer from file_init");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "rejected malformed file_init"),
                }
            }
            Envelope::FileChunk {
                file_id,
                offset,
                source_node_id,
                data,
            } => {
                let chunk_id = ChunkId::new(file_id, offset);
                if let Err(e) = self
                    .coordinator
                    .store_chunk(chunk_id, &data, Some(source_node_id))
                    .await
                {
                    tracing::warn!(error = %e, "failed to record received chunk");
                }
            }
            Envelope::Unknown => {
                tracing::debug!("ignoring envelope with unrecognized type");
            }
        }
    }

    /// Sends `envelope` to the session registered under `node`, if any.
    pub async fn send_to(&self, node: &NodeId, envelope: &Envelope) -> SessionResult<()> {
        let addr = *self
            .by_node
            .get(node)
            .ok_or(SessionError::PeerNotConnected)?
            .value();
        let session = self
            .by_addr
            .get(&addr)
            .map(|e| e.value().clone())
            .ok_or(SessionError::PeerNotConnected)?;
        session.send(envelope).await
    }

    /// Fans `envelope` out to every connected session; individual failures
    /// are logged and do not abort the broadcast.
    pub async fn broadcast(&self, envelope: &Envelope) {
        for entry in self.by_addr.iter() {
            let session = entry.value().clone();
            if let Err(e) = session.send(envelope).await {
                tracing::warn!(addr = %entry.key(), error = %e, "broadcast send failed");
            }
        }
    }

    pub fn connected_peers(&self) -> Vec<NodeId> {
        self.by_node.iter().map(|e| e.key().clone()).collect()
    }

    /// Drops the session registered for `node`, if any. The underlying
    /// socket closes when its last `Arc<Session>` is dropped, which in
    /// turn ends that connection's receive loop on its next read.
    pub fn disconnect(&self, node: &NodeId) {
        if let Some((_, addr)) = self.by_node.remove(node) {
            self.by_addr.remove(&addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Checksum, FileMeta};
    use crate::store::ChunkStore;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn manager() -> (TempDir, SessionManager) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ChunkStore::open(dir.path(), true).await.unwrap());
        let coordinator = Arc::new(TransferCoordinator::new(store));
        (dir, SessionManager::new(NodeId::new("local"), coordinator))
    }

    #[tokio::test]
    async fn hello_is_recorded_as_remote_node_id() {
        let (_dir, server) = manager().await;
        let addr = server.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let (_dir2, client) = manager().await;
        client.connect(addr).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(server.connected_peers(), vec![NodeId::new("local")]);
    }

    #[tokio::test]
    async fn file_init_then_file_chunk_completes_transfer_via_coordinator() {
        let (_dir, server) = manager().await;
        let addr = server.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let (_dir2, client) = manager().await;
        client.connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let file_id = crate::model::FileId::new("f1");
        let meta = FileMeta::new("a.bin", 5, 4096, Checksum::blake3([1u8; 32])).unwrap();
        let peers = client.connected_peers();
        let target = &peers[0];
        client
            .send_to(target, &Envelope::file_init(file_id.clone(), &meta, NodeId::new("client")))
            .await
            .unwrap();
        client
            .send_to(
                target,
                &Envelope::FileChunk {
                    file_id: file_id.clone(),
                    offset: 0,
                    source_node_id: NodeId::new("client"),
                    data: vec![9u8; 5],
                },
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let status = server.coordinator.status(&file_id).await.unwrap();
        assert_eq!(status.status, crate::model::Status::Completed);
    }
}
