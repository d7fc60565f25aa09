use std::sync::Arc;
use std::thread::{self, JoinHandle};

use codec::Decoder;
use jitter::sg::ScatterGatherJitter;
use jitter::Beat;
use tracing::{debug, error};

use crate::events::{EventBus, PipelineEvent};

/// Pulls compressed frames from `input`, decodes them, and pushes the
/// resulting PCM into `output` as one block per decode call. Runs until
/// `input` is flushed or yields an `eos` block.
pub fn spawn(
    es_id: u32,
    mut decoder: Box<dyn Decoder>,
    input: Arc<ScatterGatherJitter>,
    output: Arc<ScatterGatherJitter>,
    events: Arc<EventBus>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("decoder-{es_id}"))
        .spawn(move || {
            events.publish(PipelineEvent::SrcNewEs { es_id });
            loop {
                let block = match input.peer() {
                    Ok(b) => b,
                    Err(_) => break,
                };
                let compressed = block.as_slice().to_vec();
                let eos = block.eos();
                block.pop();

                match decoder.decode(&compressed) {
                    Ok(pcm) => {
                        events.publish(PipelineEvent::SrcDecodeEs {
                            es_id,
                            bytes: compressed.len(),
                        });
                        if !pcm.samples.is_empty() {
                            let bytes: Vec<u8> = pcm
                                .samples
                                .iter()
                                .flat_map(|s| s.to_le_bytes())
                                .collect();
                            let frames = pcm.samples.len() / pcm.channels.max(1) as usize;
                            let beat = Beat::Samples(frames as u32);
                            if let Ok(mut g) = output.pull() {
                                let len = bytes.len().min(g.capacity());
                                g.as_mut_slice()[..len].copy_from_slice(&bytes[..len]);
                                let _ = g.push(len, eos, Some(beat));
                            }
                        }
                    }
                    Err(e) => error!(es_id, %e, "decode error"),
                }

                if eos {
                    break;
                }
            }
            events.publish(PipelineEvent::SrcEndEs { es_id });
            debug!(es_id, "decoder thread exiting");
        })
        .expect("failed to spawn decoder thread")
}
