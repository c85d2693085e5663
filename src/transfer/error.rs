use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransferError {
    #[error("chunk not present in transfer: offset {0}")]
    ChunkNotFound(u64),

    #[error("precondition violated: {0}")]
    PreconditionViolated(String),
}

pub type Result<T> = std::result::Result<T, TransferError>;
