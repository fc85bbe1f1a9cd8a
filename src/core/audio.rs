//! Sample conversion helpers for the capture path.
//!
//! The service expects mono 16-bit little-endian PCM at a fixed rate; the
//! hardware delivers interleaved floating point at whatever rate the device
//! opened with. Everything here is pure so it can be exercised without a
//! microphone attached.

/// Convert floating point samples in [-1, 1] to 16-bit PCM.
///
/// Input outside the nominal range is clamped rather than allowed to wrap
/// around the 16-bit boundary.
pub fn pcm16_from_f32(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|sample| (sample.clamp(-1.0, 1.0) * 32_767.0).round() as i16)
        .collect()
}

/// Serialize PCM samples into little-endian bytes for the wire.
pub fn encode_pcm16(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Collapse interleaved multi-channel audio to mono by averaging frames.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation rate conversion.
///
/// Good enough for speech at the rates involved here; callers that need
/// anti-aliased conversion should capture at the target rate instead.
pub fn resample_linear(samples: &[f32], from_hz: u32, to_hz: u32) -> Vec<f32> {
    if from_hz == to_hz || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_hz as f64 / to_hz as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);
    for index in 0..out_len {
        let position = index as f64 * ratio;
        let base = position as usize;
        let frac = (position - base as f64) as f32;
        let current = samples[base.min(samples.len() - 1)];
        let next = if base + 1 < samples.len() {
            samples[base + 1]
        } else {
            current
        };
        out.push(current + (next - current) * frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_conversion_rounds_in_range_samples() {
        let pcm = pcm16_from_f32(&[0.0, 1.0, -1.0, 0.5]);
        assert_eq!(pcm, vec![0, 32_767, -32_767, 16_384]);
    }

    #[test]
    fn pcm_conversion_clamps_out_of_range_samples() {
        // Values beyond +/-1.0 saturate instead of wrapping around i16.
        let pcm = pcm16_from_f32(&[1.5, -2.0]);
        assert_eq!(pcm, vec![32_767, -32_767]);
    }

    #[test]
    fn encoding_is_little_endian() {
        let bytes = encode_pcm16(&[1, -2]);
        assert_eq!(bytes, vec![0x01, 0x00, 0xFE, 0xFF]);
    }

    #[test]
    fn downmix_averages_channel_pairs() {
        let mono = downmix_to_mono(&[1.0, 0.0, 0.5, 0.5], 2);
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn downmix_passes_mono_through() {
        let samples = [0.25, -0.25];
        assert_eq!(downmix_to_mono(&samples, 1), samples.to_vec());
    }

    #[test]
    fn resample_is_identity_at_equal_rates() {
        let samples = [0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&samples, 16_000, 16_000), samples.to_vec());
    }

    #[test]
    fn resample_halves_sample_count_when_downsampling_by_two() {
        let samples: Vec<f32> = (0..64).map(|i| i as f32 / 64.0).collect();
        let out = resample_linear(&samples, 32_000, 16_000);
        assert_eq!(out.len(), 32);
        assert_eq!(out[0], samples[0]);
        assert_eq!(out[1], samples[2]);
    }
}
