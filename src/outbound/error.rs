use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutboundError {
    #[error("i/o error reading source file: {0}")]
    Io(#[from] std::io::Error),

    #[error("session send failed: {0}")]
    Session(#[from] crate::session::SessionError),
}

pub type OutboundResult<T> = Result<T, OutboundError>;
