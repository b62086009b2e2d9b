use serde::{Deserialize, Serialize};

/// Bytes per PCM sample. Source encoding is fixed at 16-bit signed little-endian.
pub const BYTES_PER_SAMPLE: u16 = 2;

/// Samples per AAC-LC access unit.
pub const AAC_FRAME_SIZE: u32 = 1024;

/// Default target bit rate for the encoder.
pub const DEFAULT_BIT_RATE: u32 = 196_000;

/// Sampling frequencies addressable by an AAC AudioSpecificConfig, by index.
const AAC_SAMPLING_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Raw PCM layout delivered by a frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Bytes occupied by one sample across all channels.
    pub fn bytes_per_frame(&self) -> u32 {
        self.channels as u32 * BYTES_PER_SAMPLE as u32
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::new(44100, 1)
    }
}

/// Compressed codecs an encoder can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioCodecKind {
    #[serde(rename = "aac-lc")]
    AacLc,
}

impl AudioCodecKind {
    /// MPEG-4 audio object type written into the AudioSpecificConfig.
    pub fn audio_object_type(&self) -> u8 {
        match self {
            Self::AacLc => 2,
        }
    }
}

/// Container formats a muxer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Mpeg4,
}

impl ContainerKind {
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Mpeg4 => "m4a",
        }
    }
}

/// Output format requested from the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderFormat {
    pub codec: AudioCodecKind,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_rate: u32,
}

impl EncoderFormat {
    /// AAC-LC at the PCM format's rate and channel count.
    pub fn aac_lc(pcm: PcmFormat, bit_rate: u32) -> Self {
        Self {
            codec: AudioCodecKind::AacLc,
            sample_rate: pcm.sample_rate,
            channels: pcm.channels,
            bit_rate,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if aac_sampling_frequency_index(self.sample_rate).is_none() {
            return Err(format!("unsupported AAC sample rate: {}", self.sample_rate));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.bit_rate == 0 {
            return Err("bit rate must be positive".into());
        }
        Ok(())
    }
}

/// Output format negotiated by the codec.
///
/// Only known once the codec has processed enough input. Required before
/// the muxer may be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    pub codec: AudioCodecKind,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_rate: u32,
    /// Samples per encoded access unit.
    pub frame_size: u32,
    /// Decoder configuration (AudioSpecificConfig for AAC).
    pub codec_config: Vec<u8>,
}

impl TrackDescriptor {
    /// Descriptor for the given format with a derived AudioSpecificConfig.
    pub fn from_format(format: &EncoderFormat) -> Self {
        Self {
            codec: format.codec,
            sample_rate: format.sample_rate,
            channels: format.channels,
            bit_rate: format.bit_rate,
            frame_size: AAC_FRAME_SIZE,
            codec_config: audio_specific_config(format.codec, format.sample_rate, format.channels),
        }
    }

    /// Duration of one access unit in microseconds.
    pub fn frame_duration_us(&self) -> u64 {
        self.frame_size as u64 * 1_000_000 / self.sample_rate as u64
    }
}

/// Index of `sample_rate` in the AAC sampling-frequency table.
pub fn aac_sampling_frequency_index(sample_rate: u32) -> Option<u8> {
    AAC_SAMPLING_FREQUENCIES
        .iter()
        .position(|&rate| rate == sample_rate)
        .map(|i| i as u8)
}

/// Build a two-byte AudioSpecificConfig.
///
/// Layout: 5 bits object type, 4 bits frequency index, 4 bits channel
/// configuration, 3 bits GASpecificConfig flags (all zero).
/// Rates outside the table map to the escape index `0xF`; validate the
/// format first.
pub fn audio_specific_config(codec: AudioCodecKind, sample_rate: u32, channels: u16) -> Vec<u8> {
    let object_type = codec.audio_object_type();
    let freq_index = aac_sampling_frequency_index(sample_rate).unwrap_or(0x0F);
    let channel_config = (channels & 0x0F) as u8;

    vec![
        (object_type << 3) | (freq_index >> 1),
        ((freq_index & 0x01) << 7) | (channel_config << 3),
    ]
}

/// Counters for debugging a recording session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineDiagnostics {
    pub input_buffers: u64,
    pub bytes_read: u64,
    pub output_buffers: u64,
    pub samples_muxed: u64,
    pub bytes_muxed: u64,
}
