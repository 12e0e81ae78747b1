use thiserror::Error;

/// Failure reported by the scan collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("channel not found")]
    NotFound,
    #[error("channel is private")]
    Private,
    #[error("channel was removed")]
    Removed,
    #[error("invalid channel: {0}")]
    Invalid(String),
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("network error: {0}")]
    Network(String),
}

impl ScanError {
    /// Worth retrying later. Rate limits are treated like network trouble.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScanError::RateLimited { .. } | ScanError::Network(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

/// The snapshot cannot be scored at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    #[error("snapshot has no posts")]
    NoPosts,
    #[error("snapshot reports zero members")]
    NoMembers,
    #[error("no post carries a view counter")]
    NoViews,
    #[error("non-finite {0}")]
    NonFinite(&'static str),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
