//! Codec adapters: a small `Decoder`/`Encoder` contract plus one
//! implementation per format the pipeline understands. Each wraps a
//! real decode/encode crate rather than hand-rolling the format; the
//! adapters exist only to present those crates through one shared
//! trait the `pipeline` crate's decoder/encoder nodes can hold as
//! `Box<dyn Decoder>` / `Box<dyn Encoder>`.

pub mod aac;
mod error;
pub mod flac;
pub mod mp3;
pub mod passthrough;

pub use error::CodecError;

/// Interleaved PCM, always decoded to 16-bit signed for simplicity; the
/// `filter` stage in `pipeline` is responsible for any further format
/// conversion a sink requires.
#[derive(Debug, Clone, Default)]
pub struct PcmBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

/// One elementary-stream frame's worth of decoded audio, or `None` when
/// the input did not yet contain a complete frame.
pub trait Decoder: Send {
    /// Feed one chunk of compressed bytes (as produced by a jitter
    /// buffer block) and return any PCM it yielded.
    fn decode(&mut self, input: &[u8]) -> Result<PcmBuffer, CodecError>;

    fn reset(&mut self) {}
}

pub trait Encoder: Send {
    /// Encode one chunk of interleaved PCM into zero or more compressed
    /// frames, ready to be pushed into an outgoing jitter buffer.
    fn encode(&mut self, pcm: &PcmBuffer) -> Result<Vec<u8>, CodecError>;

    /// Flush any buffered frames once the source has ended.
    fn finish(&mut self) -> Result<Vec<u8>, CodecError> {
        Ok(Vec::new())
    }
}
