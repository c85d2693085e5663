use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_CHUNK_SIZE: u32 = 4 * 1024;
pub const MAX_CHUNK_SIZE: u32 = 16 * 1024 * 1024;

/// Opaque identifier for a node participating in the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier for a file being transferred.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chunk is one `[offset, offset + chunk_size)` byte range of a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    pub file_id: FileId,
    pub offset: u64,
}

impl ChunkId {
    pub fn new(file_id: FileId, offset: u64) -> Self {
        Self { file_id, offset }
    }

    /// A filesystem/URL-safe string suitable for deriving storage paths.
    pub fn path_key(&self) -> String {
        format!("{}_{}", self.file_id.0, self.offset)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.file_id, self.offset)
    }
}

pub type ByteSize = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumAlgorithm {
    Blake3,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumAlgorithm::Blake3 => write!(f, "blake3"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: ChecksumAlgorithm,
    #[serde(with = "checksum_bytes")]
    pub bytes: [u8; 32],
}

impl Checksum {
    pub fn blake3(bytes: [u8; 32]) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Blake3,
            bytes,
        }
    }
}

/// Serializes checksum bytes as base64, matching the wire representation
/// mandated for `file_init`/`file_chunk` envelopes.
mod checksum_bytes {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)?;
        decoded
            .try_into()
            .map_err(|_| serde::de::Error::custom("checksum must be 32 bytes"))
    }
}

/// Describes a file before/while it is transferred. Immutable after
/// construction: `name`, `size` and `chunk_size` never change over the
/// transfer's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub size: ByteSize,
    pub chunk_size: u32,
    pub checksum: Checksum,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FileMetaError {
    #[error("file name must not be empty")]
    EmptyName,
    #[error("chunk_size {0} outside allowed range [{MIN_CHUNK_SIZE}, {MAX_CHUNK_SIZE}]")]
    ChunkSizeOutOfRange(u32),
}

impl FileMeta {
    pub fn new(
        name: impl Into<String>,
        size: ByteSize,
        chunk_size: u32,
        checksum: Checksum,
    ) -> Result<Self, FileMetaError> {
        let name = name.into();
        if name.is_empty() {
            return Err(FileMetaError::EmptyName);
        }
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
            return Err(FileMetaError::ChunkSizeOutOfRange(chunk_size));
        }
        Ok(Self {
            name,
            size,
            chunk_size,
            checksum,
        })
    }

    /// Number of chunks this file is split into, including a possibly
    /// short final chunk.
    pub fn total_chunks(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.size.div_ceil(self.chunk_size as u64)
    }

    /// Offsets of every chunk, ascending.
    pub fn chunk_offsets(&self) -> impl Iterator<Item = u64> + '_ {
        let chunk_size = self.chunk_size as u64;
        (0..self.total_chunks()).map(move |i| i * chunk_size)
    }

    /// Length in bytes of the chunk starting at `offset` (the final chunk
    /// may be shorter than `chunk_size`).
    pub fn chunk_len_at(&self, offset: u64) -> u64 {
        let remaining = self.size.saturating_sub(offset);
        remaining.min(self.chunk_size as u64)
    }
}

/// Lifecycle status of a `Transfer`. `Cancelled` is represented as
/// `Failed` carrying a cancellation cause, per the domain's status table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pending,
    InProgress,
    Paused,
    Completed,
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "Pending",
            Status::InProgress => "InProgress",
            Status::Paused => "Paused",
            Status::Completed => "Completed",
            Status::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}
