//! Block format carried by a jitter buffer, mirroring `jitter_format_t`.

/// Sample width and endianness for raw PCM, or a tag for a compressed
/// elementary stream. `nchannels`/`samplesize` let callers compute block
/// byte sizes the way `FORMAT_NCHANNELS`/`FORMAT_SAMPLESIZE` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JitterFormat {
    Pcm8Mono,
    Pcm8Stereo,
    Pcm16LeMono,
    Pcm16LeStereo,
    Pcm16BeMono,
    Pcm16BeStereo,
    Pcm24LeMono,
    Pcm24LeStereo,
    Pcm24BeMono,
    Pcm24BeStereo,
    Pcm32LeMono,
    Pcm32LeStereo,
    Pcm32BeMono,
    Pcm32BeStereo,
    Mpeg3Mp3,
    Flac,
    Mpeg4Aac,
    DvbFrame,
    SinkBitstream,
}

impl JitterFormat {
    pub fn nchannels(self) -> usize {
        use JitterFormat::*;
        match self {
            Pcm8Mono | Pcm16LeMono | Pcm16BeMono | Pcm24LeMono | Pcm24BeMono | Pcm32LeMono
            | Pcm32BeMono => 1,
            Pcm8Stereo | Pcm16LeStereo | Pcm16BeStereo | Pcm24LeStereo | Pcm24BeStereo
            | Pcm32LeStereo | Pcm32BeStereo => 2,
            Mpeg3Mp3 | Flac | Mpeg4Aac | DvbFrame | SinkBitstream => 0,
        }
    }

    /// Bytes per sample per channel; 0 for compressed/opaque formats where
    /// the notion does not apply.
    pub fn samplesize(self) -> usize {
        use JitterFormat::*;
        match self {
            Pcm8Mono | Pcm8Stereo => 1,
            Pcm16LeMono | Pcm16LeStereo | Pcm16BeMono | Pcm16BeStereo => 2,
            Pcm24LeMono | Pcm24LeStereo | Pcm24BeMono | Pcm24BeStereo => 3,
            Pcm32LeMono | Pcm32LeStereo | Pcm32BeMono | Pcm32BeStereo => 4,
            Mpeg3Mp3 | Flac | Mpeg4Aac | DvbFrame | SinkBitstream => 0,
        }
    }

    pub fn is_pcm(self) -> bool {
        self.nchannels() > 0
    }
}
