use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("fingerprint has no hashes to match")]
    EmptyFingerprint,

    #[error("invalid verbosity level {0}, expected 0, 1 or 2")]
    InvalidVerbose(u8),

    #[error("fingerprint is not bound to a song")]
    UnboundFingerprint,

    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,

    #[error("hash index unavailable: {0}")]
    Index(#[from] diesel::result::Error),

    #[error("hash index connection failed: {0}")]
    Connection(#[from] diesel::result::ConnectionError),

    #[error("audio decode failed: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
