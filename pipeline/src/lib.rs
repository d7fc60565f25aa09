//! Wires source → (demux) → decoder → filter → encoder → (mux) → sink
//! stages together, each running on its own OS thread and handing off
//! work through [`jitter`] buffers. This crate owns the thread
//! lifecycles; `player` owns the state machine that decides which
//! stages to build for a given media entry.

pub mod error;
pub mod events;
pub mod filter;
pub mod nodes;
pub mod source;

pub use error::PipelineError;
pub use events::{EventBus, PipelineEvent};

use std::sync::Arc;
use std::thread::JoinHandle;

use jitter::sg::ScatterGatherJitter;
use jitter::JitterFormat;

/// A running pipeline: the jitter buffers stitching stages together and
/// the join handles of every worker thread, so `stop` can tear it all
/// down deterministically.
pub struct Pipeline {
    pub events: Arc<EventBus>,
    handles: Vec<JoinHandle<()>>,
    jitters: Vec<Arc<ScatterGatherJitter>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            events: Arc::new(EventBus::new()),
            handles: Vec::new(),
            jitters: Vec::new(),
        }
    }

    pub fn new_jitter(
        &mut self,
        format: JitterFormat,
        count: usize,
        block_size: usize,
        threshold_low: usize,
    ) -> Result<Arc<ScatterGatherJitter>, PipelineError> {
        let j = Arc::new(ScatterGatherJitter::new(format, count, block_size, threshold_low)?);
        self.jitters.push(j.clone());
        Ok(j)
    }

    pub fn track(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    /// Flushes every jitter buffer, which wakes up any thread blocked in
    /// `pull`/`peer` with an error, then joins all worker threads.
    pub fn stop(mut self) {
        for j in &self.jitters {
            j.flush();
        }
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_flushes_jitters_and_joins_threads() {
        let mut pipeline = Pipeline::new();
        let j = pipeline
            .new_jitter(JitterFormat::Pcm16LeStereo, 4, 16, 1)
            .unwrap();
        let j2 = j.clone();
        let handle = std::thread::spawn(move || {
            let _ = j2.peer();
        });
        pipeline.track(handle);
        pipeline.stop();
    }
}
