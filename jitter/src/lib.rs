//! Thread-blocking producer/consumer ring used to decouple pipeline
//! stages running on their own OS threads, mirroring `jitter_ctx_t` /
//! `jitter_ops_t`. Two backing stores are provided: [`sg`] keeps one
//! heap block per descriptor (scatter-gather, good for compressed
//! elementary streams of variable frame size) and [`ring`] keeps a
//! single contiguous byte ring (good for fixed-stride PCM).
//!
//! Both expose the same six operations: `pull`/`push` for the producer
//! side, `peer`/`pop` for the consumer side, plus `flush`/`reset`/
//! `pause`/`length`. Unlike the async channels used elsewhere in this
//! workspace, these calls block the calling thread with
//! `std::sync::{Mutex, Condvar}` on purpose: the spec this buffer
//! implements requires true backpressure, not a bounded-channel
//! approximation of it. Async callers should drive it from
//! `tokio::task::spawn_blocking`.
//!
//! A jitter buffer can have a [`Heartbeat`] attached via
//! `attach_heartbeat`. When one is attached, `push` takes a `beat`
//! describing the real-time duration the pushed block represents, and
//! `peer` blocks on `heartbeat.wait(beat)` before handing the block
//! back — this is what keeps a consumer thread (a sink, or an RTP mux)
//! from draining the buffer faster than real time.

mod error;
mod format;
pub mod ring;
pub mod sg;

pub use error::JitterError;
pub use format::JitterFormat;
pub use heartbeat::{Beat, Heartbeat};
pub use ring::RingJitter;
pub use sg::ScatterGatherJitter;

/// Lifecycle state of a jitter buffer, mirroring the FILLING/RUNNING
/// distinction driven by `jitter->ctx->thresholdLow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterState {
    /// Consumers block in `peer`/`pop`: not enough data has accumulated.
    Filling,
    /// Fill level is above the low threshold; consumers proceed normally.
    Running,
    /// `flush()` was called: `pull`/`peer` return `Err(JitterError::Flushed)`
    /// until `reset()`.
    Flushed,
}

/// State of a single descriptor slot in the scatter-gather backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DescriptorState {
    /// Available for a producer to `pull`.
    Free,
    /// Handed to a producer, not yet `push`ed back.
    Pull,
    /// Holds committed data, available for a consumer to `peer`.
    Ready,
    /// Handed to a consumer, not yet `pop`ped.
    Pop,
}

/// Per-call statistics surfaced by `length()`, used by callers (notably
/// the heartbeat-driven sink threads) to decide whether to keep pacing.
#[derive(Debug, Clone, Copy, Default)]
pub struct JitterLength {
    pub ready_blocks: usize,
    pub capacity_blocks: usize,
    pub filled_bytes: usize,
}
