/// Conversion of platform float audio into the pipeline's PCM layout.
///
/// Backends that capture interleaved f32 at the device's native rate run every
/// buffer through `PcmConverter::process` before pushing it to a `PcmSink`.
#[derive(Debug, Clone)]
pub struct PcmConverter {
    pub target_sample_rate: f64,
    pub target_channels: u16,
}

impl PcmConverter {
    pub fn new(target_sample_rate: f64, target_channels: u16) -> Self {
        Self {
            target_sample_rate,
            target_channels,
        }
    }

    /// Downmix, resample and convert one captured buffer to s16le bytes.
    pub fn process(&self, samples: &[f32], source_sample_rate: f64, source_channels: u16) -> Vec<u8> {
        let mono = downmix_to_mono(samples, source_channels as usize);
        let resampled = self.resample(&mono, source_sample_rate);
        if self.target_channels == 2 {
            let stereo: Vec<f32> = resampled.iter().flat_map(|&s| [s, s]).collect();
            return convert_to_int16_pcm(&stereo);
        }
        convert_to_int16_pcm(&resampled)
    }

    /// Linear interpolation resampling for mono audio.
    ///
    /// Returns input unchanged if rates match.
    pub fn resample(&self, samples: &[f32], source_sample_rate: f64) -> Vec<f32> {
        if (source_sample_rate - self.target_sample_rate).abs() < 0.01 || samples.is_empty() {
            return samples.to_vec();
        }

        let ratio = self.target_sample_rate / source_sample_rate;
        let output_count = (samples.len() as f64 * ratio) as usize;
        if output_count == 0 {
            return Vec::new();
        }

        let mut output = vec![0.0f32; output_count];
        for (i, sample) in output.iter_mut().enumerate() {
            let source_index = i as f64 / ratio;
            let index = source_index as usize;
            let fraction = (source_index - index as f64) as f32;

            if index + 1 < samples.len() {
                *sample = samples[index] * (1.0 - fraction) + samples[index + 1] * fraction;
            } else if index < samples.len() {
                *sample = samples[index];
            }
        }
        output
    }
}

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let frame_count = samples.len() / channels;
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .take(frame_count)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Convert f32 samples `[-1.0, 1.0]` to 16-bit PCM (little-endian bytes).
///
/// Clamps out-of-range values. Output length = `samples.len() * 2` bytes.
pub fn convert_to_int16_pcm(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = (clamped * i16::MAX as f32) as i16;
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

/// Decode s16le bytes into samples. A trailing odd byte is ignored.
pub fn int16_samples_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
