use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error("heartbeat already started")]
    AlreadyStarted,

    #[error("heartbeat not started")]
    NotStarted,

    #[error("invalid heartbeat configuration: {0}")]
    InvalidConfig(String),

    #[error("heartbeat interrupted")]
    Interrupted,
}
