use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("transfer not found: {0}")]
    TransferNotFound(String),

    #[error("transfer already active: {0}")]
    TransferAlreadyActive(String),

    #[error("storage failed: {0}")]
    StorageFailed(#[from] crate::store::StoreError),

    #[error("precondition violated: {0}")]
    PreconditionViolated(String),
}

pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;
