//! Pure value types shared by every other module.
//!
//! Nothing here performs I/O; these are the identifiers and small structs
//! that travel between the store, the state machine, the coordinator and
//! the wire.

mod types;

pub use types::{
    ByteSize, Checksum, ChecksumAlgorithm, ChunkId, FileId, FileMeta, FileMetaError, NodeId,
    Status, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
};
