use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("checksum mismatch: expected {expected:?}, got {actual:?}")]
    ChecksumMismatch { expected: [u8; 32], actual: [u8; 32] },

    #[error("i/o error reading {0}: {1}")]
    Io(String, #[source] std::io::Error),
}

pub type IntegrityResult<T> = Result<T, IntegrityError>;
