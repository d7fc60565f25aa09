//! Player state machine, mirroring `state_t`: `Stop`/`Play`/`Change`/
//! `Error`/`Unknown`, with `Pause` modeled as an orthogonal flag on top
//! of `Play` the way `STATE_PAUSE = STATE_PLAY | STATE_PAUSE_MASK` was.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Unknown,
    Stop,
    Play,
    Change,
    Error,
}

impl PlayerState {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerState::Unknown => "unknown",
            PlayerState::Stop => "stop",
            PlayerState::Play => "play",
            PlayerState::Change => "change",
            PlayerState::Error => "error",
        }
    }
}
