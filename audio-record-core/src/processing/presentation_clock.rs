use crate::models::audio_models::PcmFormat;

/// Presentation timestamps derived from the number of PCM bytes consumed.
///
/// `pts_us = 1_000_000 × (total_bytes / bytes_per_frame) / sample_rate`
///
/// Time follows the data, not the wall clock: a source that underruns
/// produces timestamps that lag real elapsed time. The value only ever grows,
/// so the sequence handed to the muxer is non-decreasing.
///
/// Mutated only by the encode worker's input handling.
#[derive(Debug, Clone)]
pub struct PresentationClock {
    sample_rate: u64,
    bytes_per_frame: u64,
    total_bytes: u64,
}

impl PresentationClock {
    pub fn new(format: PcmFormat) -> Self {
        Self {
            sample_rate: format.sample_rate.max(1) as u64,
            bytes_per_frame: format.bytes_per_frame().max(1) as u64,
            total_bytes: 0,
        }
    }

    /// Timestamp for the next buffer, from everything consumed so far.
    pub fn current_us(&self) -> u64 {
        Self::timestamp_for(self.total_bytes, self.bytes_per_frame, self.sample_rate)
    }

    /// Account for `bytes` just submitted and return the updated timestamp.
    pub fn advance(&mut self, bytes: usize) -> u64 {
        self.total_bytes += bytes as u64;
        self.current_us()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn total_samples(&self) -> u64 {
        self.total_bytes / self.bytes_per_frame
    }

    /// Captured duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.total_samples() as f64 / self.sample_rate as f64
    }

    fn timestamp_for(total_bytes: u64, bytes_per_frame: u64, sample_rate: u64) -> u64 {
        1_000_000 * (total_bytes / bytes_per_frame) / sample_rate
    }
}
