//! Scatter-gather backing store: one heap-allocated block per descriptor
//! slot, handed to producer/consumer by value while it is checked out.
//! Good for elementary streams whose frames vary in size (compressed
//! audio) since each slot's `len` can be anything up to `block_size`.

use std::mem;
use std::sync::{Arc, Condvar, Mutex};

use crate::{Beat, DescriptorState, Heartbeat, JitterError, JitterFormat, JitterLength, JitterState};

struct Slot {
    state: DescriptorState,
    buf: Vec<u8>,
    len: usize,
    eos: bool,
    beat: Option<Beat>,
}

struct Inner {
    slots: Vec<Slot>,
    state: JitterState,
    write_cursor: usize,
    read_cursor: usize,
    ready_count: usize,
    paused: bool,
}

/// A scatter-gather jitter buffer with `count` slots of `block_size`
/// bytes each. `threshold_low` is the number of ready blocks required
/// before `Filling` transitions to `Running`.
pub struct ScatterGatherJitter {
    block_size: usize,
    threshold_low: usize,
    format: JitterFormat,
    inner: Mutex<Inner>,
    free_cv: Condvar,
    ready_cv: Condvar,
    heartbeat: Mutex<Option<Arc<dyn Heartbeat>>>,
}

impl ScatterGatherJitter {
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
        let slots = (0..count)
            .map(|_| Slot {
                state: DescriptorState::Free,
                buf: vec![0u8; block_size],
                len: 0,
                eos: false,
                beat: None,
            })
            .collect();
        Ok(Self {
            block_size,
            threshold_low: threshold_low.min(count),
            format,
            inner: Mutex::new(Inner {
                slots,
                state: JitterState::Filling,
                write_cursor: 0,
                read_cursor: 0,
                ready_count: 0,
                paused: false,
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

    /// Attach a heartbeat that paces every subsequent `peer()` call: a
    /// block pushed with `Some(beat)` makes the consumer that peers it
    /// block on `heartbeat.wait(beat)` before the data is handed back.
    pub fn attach_heartbeat(&self, hb: Arc<dyn Heartbeat>) {
        hb.start();
        *self.heartbeat.lock().unwrap() = Some(hb);
    }

    /// Block until a free slot is available, then hand it to the caller
    /// for writing. Mirrors `jitter_ops_t::pull`.
    pub fn pull(&self) -> Result<PullGuard<'_>, JitterError> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.state == JitterState::Flushed {
                return Err(JitterError::Flushed);
            }
            let count = inner.slots.len();
            let start = inner.write_cursor;
            if let Some(idx) = (0..count)
                .map(|o| (start + o) % count)
                .find(|&i| inner.slots[i].state == DescriptorState::Free)
            {
                inner.slots[idx].state = DescriptorState::Pull;
                let buf = mem::take(&mut inner.slots[idx].buf);
                inner.write_cursor = (idx + 1) % count;
                return Ok(PullGuard {
                    jitter: self,
                    index: idx,
                    buf: Some(buf),
                    committed: false,
                });
            }
            inner = self.free_cv.wait(inner).unwrap();
        }
    }

    /// Block until a ready slot is available for reading. Mirrors
    /// `jitter_ops_t::peer`.
    pub fn peer(&self) -> Result<PeerGuard<'_>, JitterError> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.state == JitterState::Flushed && inner.ready_count == 0 {
                return Err(JitterError::Flushed);
            }
            if inner.state != JitterState::Filling && !inner.paused && inner.ready_count > 0 {
                let idx = inner.read_cursor;
                if inner.slots[idx].state == DescriptorState::Ready {
                    inner.slots[idx].state = DescriptorState::Pop;
                    let buf = mem::take(&mut inner.slots[idx].buf);
                    let len = inner.slots[idx].len;
                    let eos = inner.slots[idx].eos;
                    let beat = inner.slots[idx].beat.take();
                    drop(inner);

                    if let Some(beat) = beat {
                        if let Some(hb) = self.heartbeat.lock().unwrap().clone() {
                            hb.wait(beat)?;
                        }
                    }

                    return Ok(PeerGuard {
                        jitter: self,
                        index: idx,
                        buf: Some(buf),
                        len,
                        eos,
                        popped: false,
                    });
                }
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
        for slot in inner.slots.iter_mut() {
            slot.state = DescriptorState::Free;
            slot.len = 0;
            slot.eos = false;
            slot.beat = None;
            if slot.buf.len() != self.block_size {
                slot.buf = vec![0u8; self.block_size];
            }
        }
        inner.state = JitterState::Filling;
        inner.write_cursor = 0;
        inner.read_cursor = 0;
        inner.ready_count = 0;
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
            ready_blocks: inner.ready_count,
            capacity_blocks: inner.slots.len(),
            filled_bytes: inner.ready_count * self.block_size,
        }
    }
}

/// A slot checked out via [`ScatterGatherJitter::pull`]. Write up to
/// `block_size` bytes into [`as_mut_slice`](Self::as_mut_slice), then call
/// [`push`](Self::push) to commit it. Dropping without committing
/// returns the slot to `Free` untouched.
pub struct PullGuard<'j> {
    jitter: &'j ScatterGatherJitter,
    index: usize,
    buf: Option<Vec<u8>>,
    committed: bool,
}

impl<'j> PullGuard<'j> {
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buf.as_mut().unwrap()
    }

    pub fn capacity(&self) -> usize {
        self.buf.as_ref().unwrap().len()
    }

    /// Commit `len` bytes of payload as one ready block. `eos` marks end
    /// of stream, surfaced to the consumer via [`PeerGuard::eos`]. `beat`
    /// describes the real-time duration this block represents; if a
    /// heartbeat is attached to the jitter, the consumer's `peer()` call
    /// blocks on it before returning this block.
    pub fn push(mut self, len: usize, eos: bool, beat: Option<Beat>) -> Result<(), JitterError> {
        let cap = self.buf.as_ref().unwrap().len();
        if len > cap {
            return Err(JitterError::BlockTooLarge(len, cap));
        }
        let mut inner = self.jitter.inner.lock().unwrap();
        let slot = &mut inner.slots[self.index];
        slot.buf = self.buf.take().unwrap();
        slot.len = len;
        slot.eos = eos;
        slot.beat = beat;
        slot.state = DescriptorState::Ready;
        inner.ready_count += 1;
        if inner.state == JitterState::Filling && inner.ready_count >= self.jitter.threshold_low {
            inner.state = JitterState::Running;
        }
        self.committed = true;
        drop(inner);
        self.jitter.ready_cv.notify_all();
        Ok(())
    }
}

impl<'j> Drop for PullGuard<'j> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Some(buf) = self.buf.take() {
            let mut inner = self.jitter.inner.lock().unwrap();
            let slot = &mut inner.slots[self.index];
            slot.buf = buf;
            slot.state = DescriptorState::Free;
            drop(inner);
            self.jitter.free_cv.notify_all();
        }
    }
}

/// A slot checked out via [`ScatterGatherJitter::peer`]. Read the data
/// with [`as_slice`](Self::as_slice), then call [`pop`](Self::pop) to
/// release it back to `Free`. Dropping without popping leaves the slot
/// `Pop`-held (no data loss, but the slot will not be reused); callers
/// should always pop.
pub struct PeerGuard<'j> {
    jitter: &'j ScatterGatherJitter,
    index: usize,
    buf: Option<Vec<u8>>,
    len: usize,
    eos: bool,
}

impl<'j> PeerGuard<'j> {
    pub fn as_slice(&self) -> &[u8] {
        &self.buf.as_ref().unwrap()[..self.len]
    }

    pub fn eos(&self) -> bool {
        self.eos
    }

    pub fn pop(mut self) {
        let mut inner = self.jitter.inner.lock().unwrap();
        let count = inner.slots.len();
        let slot = &mut inner.slots[self.index];
        slot.buf = self.buf.take().unwrap();
        slot.len = 0;
        slot.eos = false;
        slot.state = DescriptorState::Free;
        inner.read_cursor = (self.index + 1) % count;
        inner.ready_count -= 1;
        if inner.state == JitterState::Running && inner.ready_count == 0 {
            inner.state = JitterState::Filling;
        }
        drop(inner);
        self.jitter.free_cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn make(count: usize, block_size: usize, threshold: usize) -> ScatterGatherJitter {
        ScatterGatherJitter::new(JitterFormat::Pcm16LeStereo, count, block_size, threshold).unwrap()
    }

    #[test]
    fn push_then_pop_round_trips_payload() {
        let j = make(4, 16, 1);
        let mut g = j.pull().unwrap();
        g.as_mut_slice()[..5].copy_from_slice(b"hello");
        g.push(5, false, None).unwrap();

        let p = j.peer().unwrap();
        assert_eq!(p.as_slice(), b"hello");
        assert!(!p.eos());
        p.pop();

        assert_eq!(j.length().ready_blocks, 0);
    }

    #[test]
    fn filling_until_threshold_then_running() {
        let j = make(4, 16, 2);
        assert_eq!(j.length().ready_blocks, 0);
        let g = j.pull().unwrap();
        g.push(1, false, None).unwrap();
        assert_eq!(j.length().ready_blocks, 1);
        // one block ready, threshold is 2: peer must not be satisfiable yet.
        // Push a second block from another thread and confirm peer unblocks.
        let j = Arc::new(j);
        let j2 = j.clone();
        let handle = thread::spawn(move || j2.peer().unwrap().pop());
        thread::sleep(std::time::Duration::from_millis(50));
        let g2 = j.pull().unwrap();
        g2.push(1, false, None).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn flush_wakes_blocked_peer_with_error() {
        let j = Arc::new(make(4, 16, 1));
        let j2 = j.clone();
        let handle = thread::spawn(move || j2.peer().is_err());
        thread::sleep(std::time::Duration::from_millis(50));
        j.flush();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn dropping_pull_guard_without_push_frees_the_slot() {
        let j = make(1, 16, 1);
        {
            let _g = j.pull().unwrap();
        }
        // slot must be free again, so a second pull does not block.
        let g = j.pull().unwrap();
        g.push(0, false, None).unwrap();
    }

    #[test]
    fn oversized_push_is_rejected() {
        let j = make(1, 4, 1);
        let g = j.pull().unwrap();
        assert!(g.push(5, false, None).is_err());
    }

    #[test]
    fn reset_clears_flushed_state() {
        let j = make(2, 16, 1);
        j.flush();
        assert!(j.pull().is_err());
        j.reset();
        let g = j.pull().unwrap();
        g.push(1, false, None).unwrap();
    }

    #[test]
    fn peer_paces_on_the_attached_heartbeat() {
        let j = make(4, 16, 1);
        j.attach_heartbeat(Arc::new(heartbeat::SamplesHeartbeat::new(48_000).unwrap()));
        let g = j.pull().unwrap();
        // 4800 samples at 48kHz is 100ms.
        g.push(1, false, Some(Beat::Samples(4_800))).unwrap();

        let start = std::time::Instant::now();
        j.peer().unwrap().pop();
        assert!(start.elapsed() >= std::time::Duration::from_millis(80));
    }
}
