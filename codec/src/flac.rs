//! FLAC decode via `claxon` and encode via the native `libflac-sys`
//! bindings. FLAC frames are not self-delimiting the way MP3 frames
//! are, so unlike [`crate::mp3`] this adapter expects the whole file to
//! arrive in one `decode`/`encode` call rather than being fed
//! incrementally — a source node reading a local FLAC file hands over
//! the complete byte blob it read, rather than streaming it block by
//! block through a jitter buffer.

use std::io::Cursor;
use std::os::raw::c_void;

use claxon::FlacReader;

use crate::{CodecError, Decoder, Encoder, PcmBuffer};

#[derive(Default)]
pub struct FlacDecoder;

impl Decoder for FlacDecoder {
    fn decode(&mut self, input: &[u8]) -> Result<PcmBuffer, CodecError> {
        let mut reader = FlacReader::new(Cursor::new(input))
            .map_err(|e| CodecError::FormatMismatch {
                expected: "flac".into(),
                actual: e.to_string(),
            })?;
        let info = reader.streaminfo();
        let shift = info.bits_per_sample.saturating_sub(16);
        let mut samples = Vec::new();
        for sample in reader.samples() {
            let sample = sample.map_err(|e| CodecError::Transient(e.to_string()))?;
            samples.push((sample >> shift) as i16);
        }
        Ok(PcmBuffer {
            sample_rate: info.sample_rate,
            channels: info.channels as u16,
            samples,
        })
    }
}

/// Safe-ish wrapper around `FLAC__StreamEncoder`. The C API writes
/// encoded bytes through a callback, so `user_data` points back at the
/// `Vec<u8>` we accumulate output into.
pub struct FlacEncoder {
    sample_rate: u32,
    channels: u16,
    compression_level: u32,
}

impl FlacEncoder {
    pub fn new(sample_rate: u32, channels: u16, compression_level: u32) -> Self {
        Self {
            sample_rate,
            channels,
            compression_level,
        }
    }
}

unsafe extern "C" fn write_callback(
    _encoder: *const libflac_sys::FLAC__StreamEncoder,
    buffer: *const u8,
    bytes: usize,
    _samples: u32,
    _current_frame: u32,
    client_data: *mut c_void,
) -> libflac_sys::FLAC__StreamEncoderWriteStatus {
    let out = &mut *(client_data as *mut Vec<u8>);
    out.extend_from_slice(std::slice::from_raw_parts(buffer, bytes));
    libflac_sys::FLAC__STREAM_ENCODER_WRITE_STATUS_OK
}

impl Encoder for FlacEncoder {
    fn encode(&mut self, pcm: &PcmBuffer) -> Result<Vec<u8>, CodecError> {
        unsafe {
            let enc = libflac_sys::FLAC__stream_encoder_new();
            if enc.is_null() {
                return Err(CodecError::Fatal("FLAC__stream_encoder_new failed".into()));
            }
            libflac_sys::FLAC__stream_encoder_set_channels(enc, self.channels as u32);
            libflac_sys::FLAC__stream_encoder_set_bits_per_sample(enc, 16);
            libflac_sys::FLAC__stream_encoder_set_sample_rate(enc, self.sample_rate);
            libflac_sys::FLAC__stream_encoder_set_compression_level(enc, self.compression_level);
            libflac_sys::FLAC__stream_encoder_set_total_samples_estimate(
                enc,
                (pcm.samples.len() / self.channels.max(1) as usize) as u64,
            );

            let mut out: Vec<u8> = Vec::new();
            let init_status = libflac_sys::FLAC__stream_encoder_init_stream(
                enc,
                Some(write_callback),
                None,
                None,
                None,
                &mut out as *mut Vec<u8> as *mut c_void,
            );
            if init_status != libflac_sys::FLAC__STREAM_ENCODER_INIT_STATUS_OK {
                libflac_sys::FLAC__stream_encoder_delete(enc);
                return Err(CodecError::Fatal(format!(
                    "FLAC__stream_encoder_init_stream failed: {init_status}"
                )));
            }

            let samples_i32: Vec<i32> = pcm.samples.iter().map(|&s| s as i32).collect();
            let frames = (samples_i32.len() / self.channels.max(1) as usize) as u32;
            let ok = libflac_sys::FLAC__stream_encoder_process_interleaved(
                enc,
                samples_i32.as_ptr(),
                frames,
            );
            if ok == 0 {
                libflac_sys::FLAC__stream_encoder_delete(enc);
                return Err(CodecError::Transient("FLAC encode of chunk failed".into()));
            }

            libflac_sys::FLAC__stream_encoder_finish(enc);
            libflac_sys::FLAC__stream_encoder_delete(enc);
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_rejects_non_flac_input() {
        let mut dec = FlacDecoder;
        assert!(dec.decode(b"not a flac file").is_err());
    }
}
