//! Source nodes: the producer end of a pipeline. Each variant reads raw
//! bytes from somewhere (file, HTTP, UDP socket, or a live ALSA capture
//! device via `cpal`) and hands back one chunk at a time; a decoder
//! stage downstream turns those chunks into PCM.

use std::fs::File;
use std::io::{BufReader, Read};
use std::net::UdpSocket;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver};
use tracing::warn;

use crate::error::PipelineError;

const CHUNK_SIZE: usize = 4096;

pub trait Source: Send {
    /// Returns `Ok(None)` once the source is exhausted.
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, PipelineError>;
}

pub struct FileSource {
    reader: BufReader<File>,
}

impl FileSource {
    pub fn open(path: &str) -> Result<Self, PipelineError> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
        })
    }
}

impl Source for FileSource {
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, PipelineError> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = self.reader.read(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }
}

pub struct HttpSource {
    response: reqwest::blocking::Response,
}

impl HttpSource {
    pub fn open(url: &str) -> Result<Self, PipelineError> {
        let response = reqwest::blocking::get(url)?.error_for_status()?;
        Ok(Self { response })
    }
}

impl Source for HttpSource {
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, PipelineError> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = self.response.read(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }
}

pub struct UdpSource {
    socket: UdpSocket,
}

impl UdpSource {
    pub fn bind(addr: &str) -> Result<Self, PipelineError> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self { socket })
    }
}

impl Source for UdpSource {
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, PipelineError> {
        let mut buf = vec![0u8; 2048];
        let (n, _from) = self.socket.recv_from(&mut buf)?;
        buf.truncate(n);
        Ok(Some(buf))
    }
}

/// Live capture from the default input device. `cpal`'s callback runs
/// on its own real-time thread, so captured frames are handed over a
/// bounded channel rather than written to directly from `read_chunk`.
pub struct AlsaCaptureSource {
    rx: Receiver<Vec<u8>>,
    _stream: cpal::Stream,
}

impl AlsaCaptureSource {
    pub fn open_default() -> Result<Self, PipelineError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| PipelineError::Device("no default input device".into()))?;
        let config = device
            .default_input_config()
            .map_err(|e| PipelineError::Device(e.to_string()))?;

        let (tx, rx) = bounded::<Vec<u8>>(64);
        let err_tx = tx.clone();
        let stream = device
            .build_input_stream(
                &config.config(),
                move |data: &[i16], _| {
                    let mut bytes = Vec::with_capacity(data.len() * 2);
                    for s in data {
                        bytes.extend_from_slice(&s.to_le_bytes());
                    }
                    let _ = tx.send(bytes);
                },
                move |err| {
                    warn!(%err, "alsa capture stream error");
                    let _ = err_tx.send(Vec::new());
                },
                None,
            )
            .map_err(|e| PipelineError::Device(e.to_string()))?;
        stream.play().map_err(|e| PipelineError::Device(e.to_string()))?;

        Ok(Self { rx, _stream: stream })
    }
}

impl Source for AlsaCaptureSource {
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, PipelineError> {
        match self.rx.recv() {
            Ok(chunk) => Ok(Some(chunk)),
            Err(_) => Ok(None),
        }
    }
}

/// Dispatches on a URI scheme the way the original source node picks
/// its backing implementation from a URL prefix.
pub fn open(uri: &str) -> Result<Box<dyn Source>, PipelineError> {
    if let Some(path) = uri.strip_prefix("file://") {
        Ok(Box::new(FileSource::open(path)?))
    } else if uri.starts_with("http://") || uri.starts_with("https://") {
        Ok(Box::new(HttpSource::open(uri)?))
    } else if let Some(addr) = uri.strip_prefix("udp://") {
        Ok(Box::new(UdpSource::bind(addr)?))
    } else if uri == "alsa://default" {
        Ok(Box::new(AlsaCaptureSource::open_default()?))
    } else {
        Ok(Box::new(FileSource::open(uri)?))
    }
}

/// A `Source` shareable across threads, for the common case of a
/// decoder thread owning the only reader.
pub type SharedSource = Arc<Mutex<Box<dyn Source>>>;
