use thiserror::Error;

/// Errors raised while parsing domain values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),

    #[error("unknown mutation action: {0}")]
    UnknownAction(String),

    #[error("unknown task: {0}")]
    UnknownTask(String),
}
