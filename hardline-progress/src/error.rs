use hardline_cloud::RemoteError;
use hardline_sync::SyncError;
use thiserror::Error;

pub type ProgressResult<T> = Result<T, ProgressError>;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0} requires a connection")]
    Offline(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
