use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame length {0} outside allowed range (0, 50000000]")]
    FrameTooLarge(u32),

    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("no session for peer")]
    PeerNotConnected,
}

pub type SessionResult<T> = Result<T, SessionError>;
