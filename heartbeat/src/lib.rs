//! Pacing primitives that keep producer threads emitting media at the
//! cadence their format implies, rather than as fast as the CPU allows.
//!
//! Mirrors the `beat_samples_t` / `beat_bitrate_t` / `beat_pulse_t` family:
//! a heartbeat accumulates a monotonic `target_time` and blocks the caller
//! until that instant is reached, so drift does not accumulate across
//! many small waits the way a naive `sleep(interval)` loop would.

mod error;

pub use error::HeartbeatError;

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::trace;

/// A unit of progress to pace. Each variant maps to one of the original
/// heartbeat kinds: PCM sample count, encoded byte length at a known
/// bitrate, or a fixed-period pulse with no notion of payload size.
#[derive(Debug, Clone, Copy)]
pub enum Beat {
    Samples(u32),
    Bytes(u32),
    Pulse,
}

/// Common contract shared by the three heartbeat kinds.
///
/// `wait` is the hot path: it blocks the calling thread until the next
/// `target_time`, then advances `target_time` by the duration this beat
/// represents. `lock`/`unlock` let a caller suspend pacing (e.g. while a
/// jitter buffer is empty) without losing the accumulated schedule.
pub trait Heartbeat: Send + Sync {
    fn start(&self);
    fn wait(&self, beat: Beat) -> Result<(), HeartbeatError>;
    fn lock(&self);
    fn unlock(&self);
    fn reset(&self);
}

struct Pacer {
    target: Mutex<Option<Instant>>,
    locked: Mutex<bool>,
    cv: Condvar,
}

impl Pacer {
    fn new() -> Self {
        Self {
            target: Mutex::new(None),
            locked: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn start(&self) {
        *self.target.lock().unwrap() = Some(Instant::now());
    }

    fn reset(&self) {
        *self.target.lock().unwrap() = None;
    }

    /// Suspend pacing. A thread inside `wait_step` blocks here until
    /// `unlock` is called, instead of sleeping out the current deadline.
    fn lock(&self) {
        *self.locked.lock().unwrap() = true;
    }

    /// Resume pacing and drop the accumulated `target_time`, so the next
    /// `wait_step` schedules relative to now rather than bursting through
    /// every beat that elapsed while locked.
    fn unlock(&self) {
        *self.locked.lock().unwrap() = false;
        *self.target.lock().unwrap() = None;
        self.cv.notify_all();
    }

    /// Advance `target_time` by `step` and block until it elapses, the way
    /// `heartbeat_samples.c` retries `clock_nanosleep` across `EINTR`: here
    /// a spurious wakeup just re-checks the deadline and the lock flag.
    fn wait_step(&self, step: Duration) -> Result<(), HeartbeatError> {
        {
            let mut locked = self.locked.lock().unwrap();
            while *locked {
                locked = self.cv.wait(locked).unwrap();
            }
        }

        let mut target_guard = self.target.lock().unwrap();
        let now = Instant::now();
        let target = target_guard.unwrap_or(now);
        let target = if target < now { now } else { target };
        let next = target + step;
        *target_guard = Some(next);
        drop(target_guard);

        loop {
            if *self.locked.lock().unwrap() {
                return Err(HeartbeatError::Interrupted);
            }
            let now = Instant::now();
            if now >= next {
                break;
            }
            std::thread::sleep((next - now).min(Duration::from_millis(50)));
        }
        trace!(?step, "heartbeat step elapsed");
        Ok(())
    }
}

/// Paces a sample-oriented PCM stream: `wait(Beat::Samples(n))` sleeps for
/// `n / samplerate` seconds, matching `beat_samples_t`.
pub struct SamplesHeartbeat {
    samplerate: u32,
    pacer: Pacer,
}

impl SamplesHeartbeat {
    pub fn new(samplerate: u32) -> Result<Self, HeartbeatError> {
        if samplerate == 0 {
            return Err(HeartbeatError::InvalidConfig("samplerate must be > 0".into()));
        }
        Ok(Self {
            samplerate,
            pacer: Pacer::new(),
        })
    }
}

impl Heartbeat for SamplesHeartbeat {
    fn start(&self) {
        self.pacer.start();
    }

    fn wait(&self, beat: Beat) -> Result<(), HeartbeatError> {
        let nsamples = match beat {
            Beat::Samples(n) => n,
            _ => return Err(HeartbeatError::InvalidConfig("expected Beat::Samples".into())),
        };
        let nanos = (nsamples as u64) * 1_000_000_000 / self.samplerate as u64;
        self.pacer.wait_step(Duration::from_nanos(nanos))
    }

    fn lock(&self) {
        self.pacer.lock();
    }

    fn unlock(&self) {
        self.pacer.unlock();
    }

    fn reset(&self) {
        self.pacer.reset();
    }
}

/// Paces a compressed stream of known average bitrate:
/// `wait(Beat::Bytes(n))` sleeps for `n * 8 / bitrate` seconds.
pub struct BitrateHeartbeat {
    bitrate_bps: u32,
    pacer: Pacer,
}

impl BitrateHeartbeat {
    pub fn new(bitrate_bps: u32) -> Result<Self, HeartbeatError> {
        if bitrate_bps == 0 {
            return Err(HeartbeatError::InvalidConfig("bitrate must be > 0".into()));
        }
        Ok(Self {
            bitrate_bps,
            pacer: Pacer::new(),
        })
    }
}

impl Heartbeat for BitrateHeartbeat {
    fn start(&self) {
        self.pacer.start();
    }

    fn wait(&self, beat: Beat) -> Result<(), HeartbeatError> {
        let nbytes = match beat {
            Beat::Bytes(n) => n,
            _ => return Err(HeartbeatError::InvalidConfig("expected Beat::Bytes".into())),
        };
        let nanos = (nbytes as u64) * 8 * 1_000_000_000 / self.bitrate_bps as u64;
        self.pacer.wait_step(Duration::from_nanos(nanos))
    }

    fn lock(&self) {
        self.pacer.lock();
    }

    fn unlock(&self) {
        self.pacer.unlock();
    }

    fn reset(&self) {
        self.pacer.reset();
    }
}

/// Paces at a fixed period regardless of payload, for sinks/sources that
/// carry no notion of sample count (e.g. a control pulse or video frame).
pub struct PulseHeartbeat {
    period: Duration,
    pacer: Pacer,
}

impl PulseHeartbeat {
    pub fn new(period: Duration) -> Result<Self, HeartbeatError> {
        if period.is_zero() {
            return Err(HeartbeatError::InvalidConfig("period must be > 0".into()));
        }
        Ok(Self {
            period,
            pacer: Pacer::new(),
        })
    }
}

impl Heartbeat for PulseHeartbeat {
    fn start(&self) {
        self.pacer.start();
    }

    fn wait(&self, beat: Beat) -> Result<(), HeartbeatError> {
        match beat {
            Beat::Pulse => self.pacer.wait_step(self.period),
            _ => Err(HeartbeatError::InvalidConfig("expected Beat::Pulse".into())),
        }
    }

    fn lock(&self) {
        self.pacer.lock();
    }

    fn unlock(&self) {
        self.pacer.unlock();
    }

    fn reset(&self) {
        self.pacer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn samples_heartbeat_paces_roughly_to_duration() {
        let hb = SamplesHeartbeat::new(48_000).unwrap();
        hb.start();
        let start = Instant::now();
        for _ in 0..10 {
            hb.wait(Beat::Samples(4_800)).unwrap();
        }
        // 10 * 4800/48000s = 1s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(900));
        assert!(elapsed <= Duration::from_millis(1300));
    }

    #[test]
    fn rejects_wrong_beat_kind() {
        let hb = SamplesHeartbeat::new(48_000).unwrap();
        hb.start();
        assert!(hb.wait(Beat::Pulse).is_err());
    }

    #[test]
    fn unlock_releases_a_locked_wait() {
        let hb = Arc::new(PulseHeartbeat::new(Duration::from_millis(50)).unwrap());
        hb.start();
        hb.lock();
        let hb2 = hb.clone();
        let handle = thread::spawn(move || hb2.wait(Beat::Pulse));
        thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        hb.unlock();
        handle.join().unwrap().unwrap();
        assert!(start.elapsed() <= Duration::from_millis(300));
    }

    #[test]
    fn zero_samplerate_rejected() {
        assert!(SamplesHeartbeat::new(0).is_err());
    }
}
