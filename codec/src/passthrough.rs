//! No-op codec used when source and sink already agree on format (e.g.
//! raw PCM sent straight to an ALSA sink, or an already-AAC elementary
//! stream muxed unchanged into RTP).

use crate::{CodecError, Decoder, Encoder, PcmBuffer};

pub struct PassthroughDecoder {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Decoder for PassthroughDecoder {
    fn decode(&mut self, input: &[u8]) -> Result<PcmBuffer, CodecError> {
        let samples = input
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        Ok(PcmBuffer {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples,
        })
    }
}

pub struct PassthroughEncoder;

impl Encoder for PassthroughEncoder {
    fn encode(&mut self, pcm: &PcmBuffer) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(pcm.samples.len() * 2);
        for s in &pcm.samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_then_encode_round_trips() {
        let mut dec = PassthroughDecoder { sample_rate: 48_000, channels: 2 };
        let mut enc = PassthroughEncoder;
        let bytes = [1i16, -2, 3, -4]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect::<Vec<u8>>();
        let pcm = dec.decode(&bytes).unwrap();
        assert_eq!(pcm.samples, vec![1, -2, 3, -4]);
        let re_encoded = enc.encode(&pcm).unwrap();
        assert_eq!(re_encoded, bytes);
    }
}
