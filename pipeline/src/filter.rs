//! In-pipeline PCM transforms applied between decode and encode/sink:
//! channel-count normalization and linear-interpolation resampling.

use codec::PcmBuffer;

/// Duplicates mono to stereo or averages stereo down to mono; higher
/// channel counts are left untouched (the original multichannel path
/// is out of scope here, see the Non-goals this pipeline implements).
pub fn normalize_channels(pcm: &PcmBuffer, target_channels: u16) -> PcmBuffer {
    if pcm.channels == target_channels || pcm.channels == 0 {
        return pcm.clone();
    }
    let samples = match (pcm.channels, target_channels) {
        (1, 2) => pcm.samples.iter().flat_map(|&s| [s, s]).collect(),
        (2, 1) => pcm
            .samples
            .chunks_exact(2)
            .map(|c| (((c[0] as i32) + (c[1] as i32)) / 2) as i16)
            .collect(),
        _ => pcm.samples.clone(),
    };
    PcmBuffer {
        sample_rate: pcm.sample_rate,
        channels: target_channels,
        samples,
    }
}

/// Linear-interpolation resample to `target_rate`, applied per channel.
pub fn resample(pcm: &PcmBuffer, target_rate: u32) -> PcmBuffer {
    if pcm.sample_rate == target_rate || pcm.sample_rate == 0 || pcm.channels == 0 {
        return pcm.clone();
    }
    let channels = pcm.channels as usize;
    let frames_in = pcm.samples.len() / channels;
    if frames_in == 0 {
        return PcmBuffer {
            sample_rate: target_rate,
            channels: pcm.channels,
            samples: Vec::new(),
        };
    }
    let ratio = pcm.sample_rate as f64 / target_rate as f64;
    let frames_out = ((frames_in as f64) / ratio).floor() as usize;
    let mut samples = Vec::with_capacity(frames_out * channels);

    for out_frame in 0..frames_out {
        let src_pos = out_frame as f64 * ratio;
        let idx0 = src_pos.floor() as usize;
        let idx1 = (idx0 + 1).min(frames_in - 1);
        let frac = src_pos - idx0 as f64;
        for ch in 0..channels {
            let a = pcm.samples[idx0 * channels + ch] as f64;
            let b = pcm.samples[idx1 * channels + ch] as f64;
            let interpolated = a + (b - a) * frac;
            samples.push(interpolated.round() as i16);
        }
    }

    PcmBuffer {
        sample_rate: target_rate,
        channels: pcm.channels,
        samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_to_stereo_duplicates_each_sample() {
        let pcm = PcmBuffer {
            sample_rate: 48_000,
            channels: 1,
            samples: vec![1, 2, 3],
        };
        let out = normalize_channels(&pcm, 2);
        assert_eq!(out.samples, vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn stereo_to_mono_averages_channels() {
        let pcm = PcmBuffer {
            sample_rate: 48_000,
            channels: 2,
            samples: vec![0, 10, 4, 6],
        };
        let out = normalize_channels(&pcm, 1);
        assert_eq!(out.samples, vec![5, 5]);
    }

    #[test]
    fn resample_preserves_endpoints_on_upsample() {
        let pcm = PcmBuffer {
            sample_rate: 1,
            channels: 1,
            samples: vec![0, 100],
        };
        let out = resample(&pcm, 2);
        assert_eq!(out.sample_rate, 2);
        assert_eq!(out.samples[0], 0);
    }

    #[test]
    fn resample_noop_when_rate_matches() {
        let pcm = PcmBuffer {
            sample_rate: 48_000,
            channels: 2,
            samples: vec![1, 2, 3, 4],
        };
        let out = resample(&pcm, 48_000);
        assert_eq!(out.samples, pcm.samples);
    }
}
