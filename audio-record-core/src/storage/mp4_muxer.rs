use std::fs::{self, File};
use std::path::{Path, PathBuf};

use muxide::api::{AacProfile, AudioCodec as MuxAudioCodec, Muxer, MuxerBuilder};

use crate::models::audio_models::{ContainerKind, TrackDescriptor};
use crate::models::error::MuxError;
use crate::models::sample::EncodedSample;
use crate::storage::adts::adts_frame;

/// Identifier returned by `add_track`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxerState {
    Initialized,
    Started,
    Stopped,
    Released,
}

impl MuxerState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Released => "released",
        }
    }
}

/// Totals reported when the container is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct MuxSummary {
    pub sample_count: u64,
    /// Track duration in sample-rate ticks: first sample to end of the last frame.
    pub duration_ticks: u64,
    pub duration_secs: f64,
    /// AAC payload bytes, excluding ADTS headers.
    pub bytes_written: u64,
}

/// Single-track MPEG-4 audio writer on top of `muxide`.
///
/// Call order is enforced here: `add_track` → `start` → `write_sample`* →
/// `stop` → `release`. Anything else fails with a `MuxError` before the
/// stream reaches muxide. Raw access units are wrapped in ADTS on the way
/// in. Not synchronized; the encode worker is the only writer.
pub struct Mp4Muxer {
    file_path: PathBuf,
    file: Option<File>,
    writer: Option<Muxer<File>>,
    state: MuxerState,
    track: Option<TrackDescriptor>,
    bytes_written: u64,
    sample_times_us: Vec<u64>,
    finalized: bool,
}

const TRACK_ID: TrackId = TrackId(1);

impl Mp4Muxer {
    /// Create the output file. Nothing is written until `start`.
    pub fn open(file_path: impl Into<PathBuf>, container: ContainerKind) -> Result<Self, MuxError> {
        let ContainerKind::Mpeg4 = container;
        let file_path = file_path.into();

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).map_err(|e| MuxError::Io(format!("failed to create directory: {}", e)))?;
        }
        let file = File::create(&file_path).map_err(|e| MuxError::Io(format!("failed to create file: {}", e)))?;
        log::debug!("muxer opened {}", file_path.display());

        Ok(Self {
            file_path,
            file: Some(file),
            writer: None,
            state: MuxerState::Initialized,
            track: None,
            bytes_written: 0,
            sample_times_us: Vec::new(),
            finalized: false,
        })
    }

    /// Register the audio track. Only one track, only before `start`.
    pub fn add_track(&mut self, track: &TrackDescriptor) -> Result<TrackId, MuxError> {
        match self.state {
            MuxerState::Initialized => {}
            MuxerState::Started => return Err(MuxError::TrackAfterStart),
            other => return Err(MuxError::NotWritable(other.name())),
        }
        if self.track.is_some() {
            return Err(MuxError::TrackLimitExceeded);
        }
        if track.sample_rate == 0 {
            return Err(MuxError::Container("track sample rate must be positive".into()));
        }
        self.track = Some(track.clone());
        Ok(TRACK_ID)
    }

    /// Build the audio-only muxide writer for the registered track.
    pub fn start(&mut self) -> Result<(), MuxError> {
        if self.state != MuxerState::Initialized {
            return Err(MuxError::NotWritable(self.state.name()));
        }
        let track = self.track.as_ref().ok_or(MuxError::NoTrack)?;
        let file = self
            .file
            .take()
            .ok_or_else(|| MuxError::Io("file is not open".into()))?;

        let writer = MuxerBuilder::new(file)
            .audio(MuxAudioCodec::Aac(AacProfile::Lc), track.sample_rate, track.channels)
            .build()
            .map_err(|e| MuxError::Container(e.to_string()))?;
        self.writer = Some(writer);
        self.state = MuxerState::Started;
        Ok(())
    }

    /// Append one encoded sample.
    ///
    /// Timestamps must be non-decreasing. Empty end-of-stream markers are
    /// accepted and skipped.
    pub fn write_sample(&mut self, track: TrackId, sample: &EncodedSample) -> Result<(), MuxError> {
        match self.state {
            MuxerState::Started => {}
            MuxerState::Initialized => return Err(MuxError::NotStarted),
            other => return Err(MuxError::NotWritable(other.name())),
        }
        if track != TRACK_ID {
            return Err(MuxError::UnknownTrack(track.0));
        }
        if sample.is_end_of_stream() && sample.is_empty() {
            return Ok(());
        }
        if let Some(&previous_us) = self.sample_times_us.last() {
            if sample.presentation_time_us < previous_us {
                return Err(MuxError::TimestampRegression {
                    previous_us,
                    current_us: sample.presentation_time_us,
                });
            }
        }

        let descriptor = self.track.as_ref().ok_or(MuxError::NoTrack)?;
        let frame = adts_frame(descriptor, &sample.data)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or(MuxError::NotWritable(MuxerState::Started.name()))?;
        writer
            .write_audio(sample.presentation_time_us as f64 / 1_000_000.0, &frame)
            .map_err(|e| MuxError::Container(e.to_string()))?;

        self.bytes_written += sample.data.len() as u64;
        self.sample_times_us.push(sample.presentation_time_us);
        Ok(())
    }

    /// Finalize the container. The file is complete and playable afterwards.
    pub fn stop(&mut self) -> Result<MuxSummary, MuxError> {
        match self.state {
            MuxerState::Started => {}
            MuxerState::Initialized => return Err(MuxError::NotStarted),
            other => return Err(MuxError::NotWritable(other.name())),
        }
        let track = self.track.clone().ok_or(MuxError::NoTrack)?;
        let writer = self
            .writer
            .take()
            .ok_or(MuxError::NotWritable(MuxerState::Started.name()))?;
        self.state = MuxerState::Stopped;
        writer.finish().map_err(|e| MuxError::Container(e.to_string()))?;
        self.finalized = true;

        let duration_ticks = self.duration_ticks(&track);
        let summary = MuxSummary {
            sample_count: self.sample_count(),
            duration_ticks,
            duration_secs: duration_ticks as f64 / track.sample_rate as f64,
            bytes_written: self.bytes_written,
        };
        log::info!(
            "muxer finalized {}: {} samples, {:.3}s",
            self.file_path.display(),
            summary.sample_count,
            summary.duration_secs
        );
        Ok(summary)
    }

    /// Close the file handle. Idempotent.
    ///
    /// A muxer released without a successful `stop` leaves an unplayable
    /// file behind; `is_finalized` reports which case applies.
    pub fn release(&mut self) {
        if self.state == MuxerState::Released {
            return;
        }
        self.writer = None;
        self.file = None;
        if !self.finalized {
            log::warn!("muxer released without finalizing {}", self.file_path.display());
        }
        self.state = MuxerState::Released;
    }

    pub fn state(&self) -> MuxerState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_times_us.len() as u64
    }

    /// Span from the first sample to the end of the last one, which lasts
    /// one codec frame.
    fn duration_ticks(&self, track: &TrackDescriptor) -> u64 {
        match (self.sample_times_us.first(), self.sample_times_us.last()) {
            (Some(&first), Some(&last)) => {
                us_to_ticks(last, track.sample_rate) - us_to_ticks(first, track.sample_rate)
                    + track.frame_size as u64
            }
            _ => 0,
        }
    }
}

impl Drop for Mp4Muxer {
    fn drop(&mut self) {
        self.release();
    }
}

fn us_to_ticks(us: u64, timescale: u32) -> u64 {
    (us * timescale as u64 + 500_000) / 1_000_000
}
