use hardline_storage::StorageError;
use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync engine not running")]
    EngineStopped,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
