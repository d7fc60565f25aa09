use thiserror::Error;

#[derive(Debug, Error)]
pub enum JitterError {
    #[error("jitter buffer is flushing, no more blocks will be handed out")]
    Flushed,

    #[error("no block currently pulled/peered by this caller")]
    NotPulled,

    #[error("block length {0} exceeds the configured block size {1}")]
    BlockTooLarge(usize, usize),

    #[error("invalid jitter configuration: {0}")]
    InvalidConfig(String),

    #[error("heartbeat pacing interrupted: {0}")]
    Heartbeat(#[from] heartbeat::HeartbeatError),
}
