use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_models::{AudioCodecKind, TrackDescriptor};

/// Finished recording handed to the export collaborator.
///
/// Only produced once the pipeline reached `Finalized`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub metadata: RecordingMetadata,
    pub checksum: String,
}

/// Metadata stored alongside a recording.
///
/// Serializable for the JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub created_at: String,
    pub codec: AudioCodecKind,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_rate: u32,
    pub pcm_bytes_captured: u64,
    pub encoded_samples: u64,
}

impl RecordingMetadata {
    pub fn new(
        track: &TrackDescriptor,
        duration_secs: f64,
        file_path: &str,
        checksum: &str,
        pcm_bytes_captured: u64,
        encoded_samples: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_secs,
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            codec: track.codec,
            sample_rate: track.sample_rate,
            channels: track.channels,
            bit_rate: track.bit_rate,
            pcm_bytes_captured,
            encoded_samples,
        }
    }
}
