//! AAC decode/encode via `fdk-aac` (Fraunhofer FDK AAC bindings).

use fdk_aac::dec::{Decoder as FdkDecoder, DecoderError, Transport};
use fdk_aac::enc::{ChannelMode, Encoder as FdkEncoder, EncoderParams};

use crate::{CodecError, Decoder, Encoder, PcmBuffer};

pub struct AacDecoder {
    inner: FdkDecoder,
    sample_rate: u32,
    channels: u16,
}

impl AacDecoder {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            inner: FdkDecoder::new(Transport::Adts),
            sample_rate,
            channels,
        }
    }
}

impl Decoder for AacDecoder {
    fn decode(&mut self, input: &[u8]) -> Result<PcmBuffer, CodecError> {
        self.inner
            .fill(input)
            .map_err(|e| map_decoder_error(e))?;

        let mut pcm = vec![0i16; 8192];
        let mut samples = Vec::new();
        loop {
            match self.inner.decode_frame(&mut pcm) {
                Ok(()) => {
                    let n = self.inner.decoded_frame_size();
                    samples.extend_from_slice(&pcm[..n]);
                }
                Err(DecoderError::NOT_ENOUGH_BITS) => break,
                Err(e) => return Err(map_decoder_error(e)),
            }
        }
        Ok(PcmBuffer {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples,
        })
    }

    fn reset(&mut self) {
        self.inner = FdkDecoder::new(Transport::Adts);
    }
}

fn map_decoder_error(e: DecoderError) -> CodecError {
    match e {
        DecoderError::NOT_ENOUGH_BITS => CodecError::Transient("not enough bits".into()),
        other => CodecError::ProtocolError(format!("{other:?}")),
    }
}

pub struct AacEncoder {
    inner: FdkEncoder,
}

impl AacEncoder {
    pub fn new(sample_rate: u32, channels: u16, bitrate_bps: u32) -> Result<Self, CodecError> {
        let channel_mode = if channels == 1 {
            ChannelMode::Mono
        } else {
            ChannelMode::Stereo
        };
        let params = EncoderParams {
            bit_rate: fdk_aac::enc::BitRate::Cbr(bitrate_bps),
            sample_rate,
            transport: fdk_aac::enc::Transport::Adts,
            channels: channel_mode,
        };
        let inner = FdkEncoder::new(params).map_err(|e| CodecError::Fatal(format!("{e:?}")))?;
        Ok(Self { inner })
    }
}

impl Encoder for AacEncoder {
    fn encode(&mut self, pcm: &PcmBuffer) -> Result<Vec<u8>, CodecError> {
        let mut out = vec![0u8; pcm.samples.len() * 2 + 2048];
        let info = self
            .inner
            .encode(&pcm.samples, &mut out)
            .map_err(|e| CodecError::Transient(format!("{e:?}")))?;
        out.truncate(info.output_size);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_reset_rebuilds_underlying_state() {
        let mut dec = AacDecoder::new(48_000, 2);
        dec.reset();
    }
}
