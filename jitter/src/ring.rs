//! Contiguous-buffer backing store: a single byte ring sized
//! `count * block_size`. Good for fixed-stride PCM where every block is
//! the same size and a plain circular buffer is cheaper than one
//! allocation per descriptor.
//!
//! Unlike [`crate::sg`], slots here are not handed out by reference:
//! `pull`/`peer` copy into/out of a scratch buffer, since the underlying
//! storage can wrap mid-block. That copy is the price paid for a single
//! contiguous allocation; callers that need true zero-copy should reach
//! for the scatter-gather variant instead.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use crate::{Beat, Heartbeat, JitterError, JitterFormat, JitterLength, JitterState};

struct Inner {
    buf: Vec<u8>,
    write_pos: usize,
    read_pos: usize,
    filled: usize,
    state: JitterState,
    paused: bool,
    ended: bool,
    /// One entry per `push`, consumed in order by `peer`. Correctness of
    /// the beat-to-block association assumes callers push roughly one
    /// block at a time, which is how every caller in this workspace uses
    /// the ring variant.
    beats: VecDeque<Option<Beat>>,
}

pub struct RingJitter {
    block_size: usize,
    capacity_bytes: usize,
    threshold_low_bytes: usize,
    format: JitterFormat,
    inner: Mutex<Inner>,
    free_cv: Condvar,
    ready_cv: Condvar,
    heartbeat: Mutex<Option<Arc<dyn Heartbeat>>>,
}

impl RingJitter {
    pub fn new(
        format: JitterFormat,
        count: usize,
        block_size: usize,
        threshold_low: usize,
    ) -> Result<Self, JitterError> {
        if count == 0 || block_size == 0 {
            return Err(JitterError::InvalidConfig(
                "count and block_size must be > 0".into(),
            ));
        }
        let capacity_bytes = count * block_size;
        Ok(Self {
            block_size,
            capacity_bytes,
            threshold_low_bytes: threshold_low.min(count) * block_size,
            format,
            inner: Mutex::new(Inner {
                buf: vec![0u8; capacity_bytes],
                write_pos: 0,
                read_pos: 0,
                filled: 0,
                state: JitterState::Filling,
                paused: false,
                ended: false,
                beats: VecDeque::new(),
            }),
            free_cv: Condvar::new(),
            ready_cv: Condvar::new(),
            heartbeat: Mutex::new(None),
        })
    }

    pub fn format(&self) -> JitterFormat {
        self.format
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Attach a heartbeat that paces every subsequent `peer()` call, the
    /// same contract as [`crate::sg::ScatterGatherJitter::attach_heartbeat`].
    pub fn attach_heartbeat(&self, hb: Arc<dyn Heartbeat>) {
        hb.start();
        *self.heartbeat.lock().unwrap() = Some(hb);
    }

    /// Block until at least one block's worth of free space exists, then
    /// hand back a scratch buffer to fill.
    pub fn pull(&self) -> Result<PullGuard<'_>, JitterError> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.state == JitterState::Flushed {
                return Err(JitterError::Flushed);
            }
            if self.capacity_bytes - inner.filled >= self.block_size {
                return Ok(PullGuard {
                    jitter: self,
                    scratch: vec![0u8; self.block_size],
                });
            }
            inner = self.free_cv.wait(inner).unwrap();
        }
    }

    /// Block until a full block is available, then copy it out for
    /// reading.
    pub fn peer(&self) -> Result<PeerGuard<'_>, JitterError> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.state == JitterState::Flushed && inner.filled == 0 {
                return Err(JitterError::Flushed);
            }
            if inner.state != JitterState::Filling && !inner.paused && inner.filled >= self.block_size {
                let mut scratch = vec![0u8; self.block_size];
                let cap = self.capacity_bytes;
                let first = (cap - inner.read_pos).min(self.block_size);
                scratch[..first].copy_from_slice(&inner.buf[inner.read_pos..inner.read_pos + first]);
                if first < self.block_size {
                    scratch[first..].copy_from_slice(&inner.buf[..self.block_size - first]);
                }
                let eos = inner.ended && inner.filled == self.block_size;
                let beat = inner.beats.pop_front().flatten();
                drop(inner);

                if let Some(beat) = beat {
                    if let Some(hb) = self.heartbeat.lock().unwrap().clone() {
                        hb.wait(beat)?;
                    }
                }

                return Ok(PeerGuard {
                    jitter: self,
                    scratch,
                    eos,
                });
            }
            inner = self.ready_cv.wait(inner).unwrap();
        }
    }

    pub fn flush(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = JitterState::Flushed;
        self.free_cv.notify_all();
        self.ready_cv.notify_all();
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.buf.iter_mut().for_each(|b| *b = 0);
        inner.write_pos = 0;
        inner.read_pos = 0;
        inner.filled = 0;
        inner.state = JitterState::Filling;
        inner.ended = false;
        inner.beats.clear();
        self.free_cv.notify_all();
    }

    pub fn pause(&self, paused: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.paused = paused;
        if !paused {
            self.ready_cv.notify_all();
        }
    }

    pub fn length(&self) -> JitterLength {
        let inner = self.inner.lock().unwrap();
        JitterLength {
            ready_blocks: inner.filled / self.block_size,
            capacity_blocks: self.capacity_bytes / self.block_size,
            filled_bytes: inner.filled,
        }
    }
}

/// Scratch buffer checked out via [`RingJitter::pull`]. Write up to
/// `block_size` bytes, then [`push`](Self::push) to copy them into the
/// ring. Dropping without pushing discards the write silently, same as
/// never having pulled.
pub struct PullGuard<'j> {
    jitter: &'j RingJitter,
    scratch: Vec<u8>,
}

impl<'j> PullGuard<'j> {
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.scratch
    }

    pub fn push(self, len: usize, eos: bool, beat: Option<Beat>) -> Result<(), JitterError> {
        if len > self.scratch.len() {
            return Err(JitterError::BlockTooLarge(len, self.scratch.len()));
        }
        let j = self.jitter;
        let mut inner = j.inner.lock().unwrap();
        let cap = j.capacity_bytes;
        let first = (cap - inner.write_pos).min(len);
        let write_pos = inner.write_pos;
        inner.buf[write_pos..write_pos + first].copy_from_slice(&self.scratch[..first]);
        if first < len {
            inner.buf[..len - first].copy_from_slice(&self.scratch[first..len]);
        }
        inner.write_pos = (inner.write_pos + len) % cap.max(1);
        inner.filled += len;
        inner.beats.push_back(beat);
        if eos {
            inner.ended = true;
        }
        if inner.state == JitterState::Filling && inner.filled >= j.threshold_low_bytes {
            inner.state = JitterState::Running;
        }
        drop(inner);
        j.ready_cv.notify_all();
        Ok(())
    }
}

/// A block copied out via [`RingJitter::peer`]. Call [`pop`](Self::pop)
/// with the number of bytes actually consumed (usually the full block)
/// to advance the read cursor.
pub struct PeerGuard<'j> {
    jitter: &'j RingJitter,
    scratch: Vec<u8>,
    eos: bool,
}

impl<'j> PeerGuard<'j> {
    pub fn as_slice(&self) -> &[u8] {
        &self.scratch
    }

    pub fn eos(&self) -> bool {
        self.eos
    }

    pub fn pop(self, consumed: usize) {
        let j = self.jitter;
        let consumed = consumed.min(self.scratch.len());
        let mut inner = j.inner.lock().unwrap();
        inner.read_pos = (inner.read_pos + consumed) % j.capacity_bytes.max(1);
        inner.filled = inner.filled.saturating_sub(consumed);
        if inner.state == JitterState::Running && inner.filled == 0 {
            inner.state = JitterState::Filling;
        }
        drop(inner);
        j.free_cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn make(count: usize, block_size: usize, threshold: usize) -> RingJitter {
        RingJitter::new(JitterFormat::Pcm16LeStereo, count, block_size, threshold).unwrap()
    }

    #[test]
    fn push_then_pop_round_trips_payload() {
        let j = make(4, 8, 1);
        let mut g = j.pull().unwrap();
        g.as_mut_slice()[..5].copy_from_slice(b"hello");
        g.push(8, false, None).unwrap();

        let p = j.peer().unwrap();
        assert_eq!(&p.as_slice()[..5], b"hello");
        p.pop(8);
        assert_eq!(j.length().filled_bytes, 0);
    }

    #[test]
    fn wraps_around_the_end_of_the_buffer() {
        let j = make(2, 8, 1);
        for i in 0..5u8 {
            let mut g = j.pull().unwrap();
            g.as_mut_slice().iter_mut().for_each(|b| *b = i);
            g.push(8, false, None).unwrap();
            let p = j.peer().unwrap();
            assert!(p.as_slice().iter().all(|&b| b == i));
            p.pop(8);
        }
    }

    #[test]
    fn eos_reported_on_final_drained_block() {
        let j = make(2, 4, 1);
        let mut g = j.pull().unwrap();
        g.as_mut_slice().copy_from_slice(b"last");
        g.push(4, true, None).unwrap();
        let p = j.peer().unwrap();
        assert!(p.eos());
        p.pop(4);
    }

    #[test]
    fn blocks_until_threshold_reached() {
        let j = Arc::new(make(4, 4, 2));
        let mut g = j.pull().unwrap();
        g.as_mut_slice().copy_from_slice(b"aaaa");
        g.push(4, false, None).unwrap();

        let j2 = j.clone();
        let handle = thread::spawn(move || j2.peer().unwrap().pop(4));
        thread::sleep(Duration::from_millis(50));
        let mut g2 = j.pull().unwrap();
        g2.as_mut_slice().copy_from_slice(b"bbbb");
        g2.push(4, false, None).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn peer_paces_on_the_attached_heartbeat() {
        let j = make(4, 16, 1);
        j.attach_heartbeat(Arc::new(heartbeat::SamplesHeartbeat::new(48_000).unwrap()));
        let mut g = j.pull().unwrap();
        g.as_mut_slice()[..1].copy_from_slice(b"x");
        // 4800 samples at 48kHz is 100ms.
        g.push(1, false, Some(Beat::Samples(4_800))).unwrap();

        let start = std::time::Instant::now();
        j.peer().unwrap().pop(1);
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
