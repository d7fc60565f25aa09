use std::sync::Arc;
use std::thread::{self, JoinHandle};

use codec::{Encoder, PcmBuffer};
use jitter::sg::ScatterGatherJitter;
use jitter::Beat;
use tracing::{debug, error};

use crate::events::{EventBus, PipelineEvent};

/// Mirror of [`crate::nodes::decoder::spawn`]: pulls PCM blocks from
/// `input`, encodes them, and pushes compressed frames into `output`.
pub fn spawn(
    sample_rate: u32,
    channels: u16,
    mut encoder: Box<dyn Encoder>,
    input: Arc<ScatterGatherJitter>,
    output: Arc<ScatterGatherJitter>,
    events: Arc<EventBus>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("encoder".to_string())
        .spawn(move || {
            events.publish(PipelineEvent::SinkEncodeStart);
            loop {
                let block = match input.peer() {
                    Ok(b) => b,
                    Err(_) => break,
                };
                let samples: Vec<i16> = block
                    .as_slice()
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]))
                    .collect();
                let eos = block.eos();
                block.pop();

                let frame_count = samples.len() / channels.max(1) as usize;
                let beat = Beat::Samples(frame_count as u32);

                let pcm = PcmBuffer {
                    sample_rate,
                    channels,
                    samples,
                };
                match encoder.encode(&pcm) {
                    Ok(frame) if !frame.is_empty() => push_frame(&output, &frame, eos, Some(beat)),
                    Ok(_) => {}
                    Err(e) => error!(%e, "encode error"),
                }

                if eos {
                    if let Ok(tail) = encoder.finish() {
                        if !tail.is_empty() {
                            push_frame(&output, &tail, true, None);
                        }
                    }
                    break;
                }
            }
            events.publish(PipelineEvent::SinkEncodeEnd);
            debug!("encoder thread exiting");
        })
        .expect("failed to spawn encoder thread")
}

fn push_frame(output: &Arc<ScatterGatherJitter>, frame: &[u8], eos: bool, beat: Option<Beat>) {
    if let Ok(mut g) = output.pull() {
        let len = frame.len().min(g.capacity());
        g.as_mut_slice()[..len].copy_from_slice(&frame[..len]);
        let _ = g.push(len, eos, beat);
    }
}
