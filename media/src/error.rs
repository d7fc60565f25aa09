use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media entry not found: {0}")]
    NotFound(String),

    #[error("media entry already exists: {0}")]
    AlreadyExists(String),

    #[error("catalog is empty")]
    Empty,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
