use crate::model::{Checksum, ChecksumAlgorithm, FileId, FileMeta, FileMetaError, NodeId};
use serde::{Deserialize, Serialize};

/// Wire envelope set for the framed session layer. `type` tags the variant;
/// unknown tags decode to `Unknown` rather than failing so a peer running a
/// newer protocol version doesn't kill the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "hello")]
    Hello {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
    },
    #[serde(rename = "file_init")]
    FileInit {
        #[serde(rename = "fileId")]
        file_id: FileId,
        #[serde(rename = "fileName")]
        file_name: String,
        #[serde(rename = "fileSize")]
        file_size: u64,
        #[serde(rename = "chunkSize")]
        chunk_size: u32,
        #[serde(rename = "sourceNodeId")]
        source_node_id: NodeId,
        #[serde(with = "base64_vec")]
        checksum: Vec<u8>,
        #[serde(rename = "checksumAlgorithm")]
        checksum_algorithm: ChecksumAlgorithm,
    },
    #[serde(rename = "file_chunk")]
    FileChunk {
        #[serde(rename = "fileId")]
        file_id: FileId,
        offset: u64,
        #[serde(rename = "sourceNodeId")]
        source_node_id: NodeId,
        #[serde(with = "base64_vec")]
        data: Vec<u8>,
    },
    #[serde(other)]
    Unknown,
}

impl Envelope {
    pub fn file_init(file_id: FileId, meta: &FileMeta, source_node_id: NodeId) -> Self {
        Envelope::FileInit {
            file_id,
            file_name: meta.name.clone(),
            file_size: meta.size,
            chunk_size: meta.chunk_size,
            source_node_id,
            checksum: meta.checksum.bytes.to_vec(),
            checksum_algorithm: meta.checksum.algorithm,
        }
    }
}

/// Builds the `FileMeta` a `file_init` envelope describes, rejecting a
/// checksum payload that isn't exactly 32 bytes.
pub fn file_meta_from_init(
    file_name: String,
    file_size: u64,
    chunk_size: u32,
    checksum: Vec<u8>,
    checksum_algorithm: ChecksumAlgorithm,
) -> Result<FileMeta, String> {
    let bytes: [u8; 32] = checksum
        .try_into()
        .map_err(|v: Vec<u8>| format!("checksum must be 32 bytes, got {}", v.len()))?;
    let ChecksumAlgorithm::Blake3 = checksum_algorithm;
    let checksum = Checksum::blake3(bytes);
    FileMeta::new(file_name, file_size, chunk_size, checksum).map_err(|e: FileMetaError| e.to_string())
}

mod base64_vec {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}
