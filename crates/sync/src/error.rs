use metashare_primitives::digest::Digest;
use metashare_primitives::identifier::StorageId;
use metashare_storage::error::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error("content of {id} hashes to {actual}, peer advertised {expected}")]
    DigestMismatch {
        id: StorageId,
        expected: Digest,
        actual: Digest,
    },
    #[error("none of the requested protocol versions {0:?} is supported")]
    ProtocolNotSupported(Vec<String>),
    #[error("object {0} is not available")]
    NotAvailable(StorageId),
    #[error("object {0} is unknown to the peer")]
    UnknownObject(StorageId),
    #[error("peer refused access")]
    Forbidden,
    #[error("request to peer timed out")]
    Timeout,
    #[error("a pass against node `{0}` is already running")]
    Busy(String),
    #[error("invalid response from peer: {0}")]
    InvalidResponse(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// Whether the next scheduled pass may succeed without operator action.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DigestMismatch { .. } | Self::Timeout | Self::Busy(_) | Self::Transport(_)
        )
    }
}
