//! Sink nodes: the consumer end of a pipeline. Each drains a jitter
//! buffer and writes the bytes somewhere — a file, a live ALSA output
//! device via `cpal`, or a raw UDP/Unix socket for a downstream relay.

use std::fs::File;
use std::io::Write;
use std::net::UdpSocket;
use std::os::unix::net::UnixDatagram;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};
use jitter::sg::ScatterGatherJitter;
use tracing::warn;

use crate::error::PipelineError;

pub trait Sink: Send {
    fn write_chunk(&mut self, data: &[u8]) -> Result<(), PipelineError>;
}

pub struct FileSink {
    file: File,
}

impl FileSink {
    pub fn create(path: &str) -> Result<Self, PipelineError> {
        Ok(Self {
            file: File::create(path)?,
        })
    }
}

impl Sink for FileSink {
    fn write_chunk(&mut self, data: &[u8]) -> Result<(), PipelineError> {
        self.file.write_all(data)?;
        Ok(())
    }
}

pub struct UdpSink {
    socket: UdpSocket,
    dest: std::net::SocketAddr,
}

impl UdpSink {
    pub fn connect(bind: &str, dest: std::net::SocketAddr) -> Result<Self, PipelineError> {
        Ok(Self {
            socket: UdpSocket::bind(bind)?,
            dest,
        })
    }
}

impl Sink for UdpSink {
    fn write_chunk(&mut self, data: &[u8]) -> Result<(), PipelineError> {
        self.socket.send_to(data, self.dest)?;
        Ok(())
    }
}

pub struct UnixSink {
    socket: UnixDatagram,
    dest: std::path::PathBuf,
}

impl UnixSink {
    pub fn connect(dest: impl Into<std::path::PathBuf>) -> Result<Self, PipelineError> {
        Ok(Self {
            socket: UnixDatagram::unbound()?,
            dest: dest.into(),
        })
    }
}

impl Sink for UnixSink {
    fn write_chunk(&mut self, data: &[u8]) -> Result<(), PipelineError> {
        self.socket.send_to(data, &self.dest)?;
        Ok(())
    }
}

/// Live playback on the default output device. PCM blocks pulled off
/// the jitter buffer are handed to `cpal`'s realtime callback over a
/// bounded channel, the same shape used by [`crate::source::AlsaCaptureSource`]
/// in reverse.
pub struct AlsaPlaybackSink {
    tx: Sender<Vec<i16>>,
    _stream: cpal::Stream,
}

impl AlsaPlaybackSink {
    pub fn open_default() -> Result<Self, PipelineError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PipelineError::Device("no default output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| PipelineError::Device(e.to_string()))?;

        let (tx, rx) = bounded::<Vec<i16>>(64);
        let mut pending: Vec<i16> = Vec::new();
        let stream = device
            .build_output_stream(
                &config.config(),
                move |data: &mut [i16], _| {
                    let mut written = 0;
                    while written < data.len() {
                        if pending.is_empty() {
                            match rx.try_recv() {
                                Ok(chunk) => pending = chunk,
                                Err(_) => {
                                    data[written..].iter_mut().for_each(|s| *s = 0);
                                    return;
                                }
                            }
                        }
                        let take = pending.len().min(data.len() - written);
                        data[written..written + take].copy_from_slice(&pending[..take]);
                        pending.drain(..take);
                        written += take;
                    }
                },
                move |err| warn!(%err, "alsa playback stream error"),
                None,
            )
            .map_err(|e| PipelineError::Device(e.to_string()))?;
        stream.play().map_err(|e| PipelineError::Device(e.to_string()))?;

        Ok(Self { tx, _stream: stream })
    }
}

impl Sink for AlsaPlaybackSink {
    fn write_chunk(&mut self, data: &[u8]) -> Result<(), PipelineError> {
        let samples: Vec<i16> = data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        self.tx
            .send(samples)
            .map_err(|_| PipelineError::Device("alsa playback channel closed".into()))
    }
}

/// Drains `input` one block at a time and writes each into `sink`,
/// until the buffer is flushed or an `eos` block is consumed.
pub fn spawn(mut sink: Box<dyn Sink>, input: Arc<ScatterGatherJitter>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("sink".to_string())
        .spawn(move || loop {
            let block = match input.peer() {
                Ok(b) => b,
                Err(_) => break,
            };
            let data = block.as_slice().to_vec();
            let eos = block.eos();
            block.pop();
            if let Err(e) = sink.write_chunk(&data) {
                warn!(%e, "sink write failed");
                break;
            }
            if eos {
                break;
            }
        })
        .expect("failed to spawn sink thread")
}
