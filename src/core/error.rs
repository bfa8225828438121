use thiserror::Error;

/// Failures the cache core can run into. None of them are fatal: every
/// request path turns one of these into a degraded response.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("network request failed for {url}: {reason}")]
    NetworkFailure { url: String, reason: String },

    #[error("orphan partition found: {0}")]
    OrphanPartition(String),

    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("sync task {id} ({domain}) failed: {reason}")]
    SyncTaskFailure {
        id: u64,
        domain: String,
        reason: String,
    },

    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("failed to encode or decode cache data: {0}")]
    Codec(String),
}

impl CacheError {
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        CacheError::NetworkFailure {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn storage(reason: impl ToString) -> Self {
        CacheError::StorageUnavailable(reason.to_string())
    }
}

impl From<fjall::Error> for CacheError {
    fn from(err: fjall::Error) -> Self {
        CacheError::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Codec(err.to_string())
    }
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
