use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("sidecar corrupt for {0}: {1}")]
    CorruptSidecar(String, serde_json::Error),

    #[error("chunk payload missing for {0} despite sidecar present")]
    DanglingSidecar(String),

    #[error("decompression failed for {0}: {1}")]
    Decompress(String, String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
