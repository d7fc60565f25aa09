use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no current media to {0}")]
    NoCurrentMedia(&'static str),

    #[error(transparent)]
    Media(#[from] media::MediaError),

    #[error(transparent)]
    Pipeline(#[from] pipeline::PipelineError),
}
