use std::path::PathBuf;

use super::audio_models::{aac_sampling_frequency_index, EncoderFormat, PcmFormat, DEFAULT_BIT_RATE};

/// Configuration for a recording pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfiguration {
    /// PCM layout requested from the frame source (default: 44100 Hz mono).
    pub pcm: PcmFormat,

    /// Target encoder bit rate in bits per second (default: 196000).
    pub bit_rate: u32,

    /// Working directory for the container file while it is being written.
    pub output_directory: PathBuf,

    /// Write a `.metadata.json` sidecar next to a finalized recording (default: true).
    pub write_metadata: bool,
}

impl PipelineConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.pcm.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if aac_sampling_frequency_index(self.pcm.sample_rate).is_none() {
            return Err(format!("unsupported sample rate: {}", self.pcm.sample_rate));
        }
        if ![1, 2].contains(&self.pcm.channels) {
            return Err(format!("unsupported channel count: {}", self.pcm.channels));
        }
        if self.bit_rate == 0 {
            return Err("bit rate must be positive".into());
        }
        Ok(())
    }

    pub fn encoder_format(&self) -> EncoderFormat {
        EncoderFormat::aac_lc(self.pcm, self.bit_rate)
    }
}

impl Default for PipelineConfiguration {
    fn default() -> Self {
        Self {
            pcm: PcmFormat::default(),
            bit_rate: DEFAULT_BIT_RATE,
            output_directory: std::env::temp_dir(),
            write_metadata: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = PipelineConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bit_rate, 196_000);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = PipelineConfiguration::default();
        config.pcm.sample_rate = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfiguration::default();
        config.pcm.channels = 6;
        assert!(config.validate().is_err());

        let mut config = PipelineConfiguration::default();
        config.bit_rate = 0;
        assert!(config.validate().is_err());
    }
}
