//! ADTS framing for raw AAC access units.
//!
//! The MP4 writer takes AAC as ADTS frames and builds the track's `esds`
//! from the first header.

use crate::models::audio_models::{aac_sampling_frequency_index, TrackDescriptor};
use crate::models::error::MuxError;

/// Header length with `protection_absent = 1` (no CRC).
pub const ADTS_HEADER_LEN: usize = 7;

/// Largest frame the 13-bit `aac_frame_length` field can describe.
const MAX_FRAME_LEN: usize = 0x1FFF;

/// Prefix `payload` with an ADTS header describing `track`.
pub fn adts_frame(track: &TrackDescriptor, payload: &[u8]) -> Result<Vec<u8>, MuxError> {
    let frame_len = payload.len() + ADTS_HEADER_LEN;
    if frame_len > MAX_FRAME_LEN {
        return Err(MuxError::FrameTooLarge(payload.len()));
    }
    let freq_index = aac_sampling_frequency_index(track.sample_rate)
        .ok_or_else(|| MuxError::Container(format!("no ADTS index for {} Hz", track.sample_rate)))?;
    let profile = track.codec.audio_object_type() - 1;
    let channels = (track.channels & 0x07) as u8;

    let mut frame = Vec::with_capacity(frame_len);
    frame.extend_from_slice(&[
        0xFF,
        0xF1, // MPEG-4, layer 0, no CRC
        (profile << 6) | (freq_index << 2) | (channels >> 2),
        ((channels & 0x03) << 6) | (frame_len >> 11) as u8,
        (frame_len >> 3) as u8,
        (((frame_len & 0x07) as u8) << 5) | 0x1F,
        0xFC, // buffer fullness 0x7FF, one raw data block
    ]);
    frame.extend_from_slice(payload);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::{EncoderFormat, PcmFormat, DEFAULT_BIT_RATE};

    fn track(pcm: PcmFormat) -> TrackDescriptor {
        TrackDescriptor::from_format(&EncoderFormat::aac_lc(pcm, DEFAULT_BIT_RATE))
    }

    #[test]
    fn header_for_44k_mono_lc() {
        let frame = adts_frame(&track(PcmFormat::default()), &[0x21; 6]).unwrap();
        assert_eq!(&frame[..ADTS_HEADER_LEN], &[0xFF, 0xF1, 0x50, 0x40, 0x01, 0xBF, 0xFC]);
        assert_eq!(&frame[ADTS_HEADER_LEN..], &[0x21; 6]);
    }

    #[test]
    fn header_for_48k_stereo_lc() {
        let frame = adts_frame(&track(PcmFormat::new(48000, 2)), &[0; 393]).unwrap();
        // 400-byte frame: length bits 0b0_0011_0010_000
        assert_eq!(&frame[..ADTS_HEADER_LEN], &[0xFF, 0xF1, 0x4C, 0x80, 0x32, 0x1F, 0xFC]);
        assert_eq!(frame.len(), 400);
    }

    #[test]
    fn oversized_frame_rejected() {
        assert_eq!(
            adts_frame(&track(PcmFormat::default()), &vec![0; 8192]),
            Err(MuxError::FrameTooLarge(8192))
        );
    }
}
