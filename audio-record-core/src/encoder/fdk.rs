//! AAC-LC software codec backed by libfdk-aac.
//!
//! Enabled with the `fdk-aac` cargo feature.

use std::collections::VecDeque;

use fdk_aac::enc::{AudioObjectType, BitRate, ChannelMode, Encoder as FdkEncoder, EncoderParams, Transport};

use crate::models::audio_models::{EncoderFormat, TrackDescriptor};
use crate::models::error::EncoderError;
use crate::models::sample::{EncodedSample, SampleFlags};
use crate::processing::pcm::int16_samples_from_le_bytes;
use crate::traits::codec::{AudioCodec, CodecBackend, CodecOutput};

/// Upper bound on silent frames fed while flushing the encoder's look-ahead.
const MAX_FLUSH_FRAMES: usize = 8;

/// Creates `FdkAacCodec`s.
#[derive(Debug, Default, Clone, Copy)]
pub struct FdkAacBackend;

impl CodecBackend for FdkAacBackend {
    type Codec = FdkAacCodec;

    fn create(&self, format: &EncoderFormat) -> Result<FdkAacCodec, EncoderError> {
        FdkAacCodec::new(format)
    }
}

/// Synchronous AAC-LC encoder producing raw access units.
///
/// Input is framed into 1024-sample blocks. Output timestamps advance by one
/// frame from the first input timestamp. On end of stream the last partial
/// frame is zero-padded, and any output past the captured length is dropped.
pub struct FdkAacCodec {
    encoder: Option<FdkEncoder>,
    track: TrackDescriptor,
    channels: usize,
    frame_samples: usize,
    out_buf: Vec<u8>,
    pending: Vec<i16>,
    /// Low byte of a sample split across two input buffers.
    carry: Option<u8>,
    outputs: VecDeque<CodecOutput>,
    announced: bool,
    first_pts_us: Option<u64>,
    frames_queued: u64,
    samples_queued: u64,
    frames_emitted: u64,
    draining: bool,
}

impl FdkAacCodec {
    pub fn new(format: &EncoderFormat) -> Result<Self, EncoderError> {
        format.validate().map_err(EncoderError::ConfigurationRejected)?;

        let channel_mode = match format.channels {
            1 => ChannelMode::Mono,
            _ => ChannelMode::Stereo,
        };
        let params = EncoderParams {
            bit_rate: BitRate::Cbr(format.bit_rate),
            sample_rate: format.sample_rate,
            transport: Transport::Raw,
            channels: channel_mode,
            audio_object_type: AudioObjectType::Mpeg4LowComplexity,
        };
        let encoder = FdkEncoder::new(params)
            .map_err(|e| EncoderError::ConfigurationRejected(format!("fdk-aac init failed: {:?}", e)))?;
        let info = encoder
            .info()
            .map_err(|e| EncoderError::ConfigurationRejected(format!("fdk-aac info failed: {:?}", e)))?;

        let mut track = TrackDescriptor::from_format(format);
        track.frame_size = info.frameLength as u32;
        let config_len = (info.confSize as usize).min(info.confBuf.len());
        if config_len > 0 {
            track.codec_config = info.confBuf[..config_len].to_vec();
        }

        let channels = format.channels as usize;
        log::debug!(
            "fdk-aac ready: frame {} samples, delay {}, max output {} bytes",
            info.frameLength,
            info.nDelay,
            info.maxOutBufBytes
        );

        Ok(Self {
            encoder: Some(encoder),
            frame_samples: track.frame_size as usize * channels,
            track,
            channels,
            out_buf: vec![0; (info.maxOutBufBytes as usize).max(768 * channels)],
            pending: Vec::new(),
            carry: None,
            outputs: VecDeque::new(),
            announced: false,
            first_pts_us: None,
            frames_queued: 0,
            samples_queued: 0,
            frames_emitted: 0,
            draining: false,
        })
    }

    /// Access units that cover the captured input.
    fn frames_needed(&self) -> u64 {
        let per_channel = self.samples_queued / self.channels as u64;
        per_channel.div_ceil(self.track.frame_size as u64)
    }

    fn encode_frame(&mut self, frame: &[i16]) -> Result<(), EncoderError> {
        self.frames_queued += 1;
        let mut offset = 0;
        while offset < frame.len() {
            let encoder = self
                .encoder
                .as_ref()
                .ok_or_else(|| EncoderError::CodecFault("codec already released".into()))?;
            let info = encoder
                .encode(&frame[offset..], &mut self.out_buf)
                .map_err(|e| EncoderError::CodecFault(format!("{:?}", e)))?;
            offset += info.input_consumed;
            if info.output_size > 0 {
                let data = self.out_buf[..info.output_size].to_vec();
                self.emit(data);
            }
            if info.input_consumed == 0 && info.output_size == 0 {
                break;
            }
        }
        Ok(())
    }

    fn emit(&mut self, data: Vec<u8>) {
        if self.draining && self.frames_emitted >= self.frames_needed() {
            return;
        }
        if !self.announced {
            self.outputs.push_back(CodecOutput::FormatChanged(self.track.clone()));
            self.announced = true;
        }
        let pts = self.frame_pts(self.frames_emitted);
        self.frames_emitted += 1;
        self.outputs
            .push_back(CodecOutput::Sample(EncodedSample::new(data, pts, SampleFlags::KEY_FRAME)));
    }

    fn frame_pts(&self, index: u64) -> u64 {
        self.first_pts_us.unwrap_or(0) + index * self.track.frame_size as u64 * 1_000_000 / self.track.sample_rate as u64
    }
}

impl AudioCodec for FdkAacCodec {
    fn input_capacity(&self) -> usize {
        self.frame_samples * 2
    }

    fn queue_input(&mut self, pcm: &[u8], presentation_time_us: u64) -> Result<(), EncoderError> {
        if self.draining {
            return Err(EncoderError::InvalidState {
                operation: "queue_input",
                state: "draining",
            });
        }
        self.first_pts_us.get_or_insert(presentation_time_us);

        let mut bytes = Vec::with_capacity(pcm.len() + 1);
        bytes.extend(self.carry.take());
        bytes.extend_from_slice(pcm);
        if bytes.len() % 2 == 1 {
            self.carry = bytes.pop();
        }

        let samples = int16_samples_from_le_bytes(&bytes);
        self.samples_queued += samples.len() as u64;
        self.pending.extend_from_slice(&samples);

        while self.pending.len() >= self.frame_samples {
            let frame: Vec<i16> = self.pending.drain(..self.frame_samples).collect();
            self.encode_frame(&frame)?;
        }
        Ok(())
    }

    fn queue_end_of_stream(&mut self) -> Result<(), EncoderError> {
        if self.draining {
            return Ok(());
        }
        self.draining = true;
        if self.carry.take().is_some() {
            log::warn!("fdk-aac dropped a trailing half sample at end of stream");
        }

        if !self.pending.is_empty() {
            let mut frame = std::mem::take(&mut self.pending);
            frame.resize(self.frame_samples, 0);
            self.encode_frame(&frame)?;
        }

        let silence = vec![0i16; self.frame_samples];
        let mut flushed = 0;
        while self.frames_emitted < self.frames_needed() && flushed < MAX_FLUSH_FRAMES {
            self.encode_frame(&silence)?;
            flushed += 1;
        }
        if self.frames_emitted < self.frames_needed() {
            log::warn!(
                "fdk-aac flush produced {} of {} frames",
                self.frames_emitted,
                self.frames_needed()
            );
        }

        let end_pts = self.frame_pts(self.frames_emitted);
        self.outputs
            .push_back(CodecOutput::Sample(EncodedSample::end_of_stream(end_pts)));
        Ok(())
    }

    fn dequeue_output(&mut self) -> Result<Option<CodecOutput>, EncoderError> {
        Ok(self.outputs.pop_front())
    }

    fn release(&mut self) {
        self.encoder = None;
        self.pending.clear();
        self.carry = None;
        self.outputs.clear();
        log::debug!(
            "fdk-aac released after {} frames in, {} frames out",
            self.frames_queued,
            self.frames_emitted
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::{PcmFormat, DEFAULT_BIT_RATE};

    fn codec() -> FdkAacCodec {
        FdkAacCodec::new(&EncoderFormat::aac_lc(PcmFormat::default(), DEFAULT_BIT_RATE)).unwrap()
    }

    fn drain(codec: &mut FdkAacCodec) -> (Option<TrackDescriptor>, Vec<EncodedSample>) {
        let mut track = None;
        let mut samples = Vec::new();
        while let Some(output) = codec.dequeue_output().unwrap() {
            match output {
                CodecOutput::FormatChanged(t) => track = Some(t),
                CodecOutput::Sample(s) => samples.push(s),
            }
        }
        (track, samples)
    }

    #[test]
    fn one_second_of_silence_yields_one_second_of_frames() {
        let mut codec = codec();
        let pcm = vec![0u8; 44100 * 2];
        for (i, chunk) in pcm.chunks(2048).enumerate() {
            codec.queue_input(chunk, i as u64 * 1024 * 1_000_000 / 44100).unwrap();
        }
        codec.queue_end_of_stream().unwrap();

        let (track, samples) = drain(&mut codec);
        let track = track.expect("format announced");
        assert_eq!(track.frame_size, 1024);
        assert_eq!(track.codec_config, vec![0x12, 0x08]);

        let (eos, frames) = samples.split_last().unwrap();
        assert!(eos.is_end_of_stream());
        assert_eq!(frames.len() as u64, 44100u64.div_ceil(1024));
        assert!(frames.windows(2).all(|w| w[0].presentation_time_us <= w[1].presentation_time_us));
    }

    fn sine_pcm(samples: usize) -> Vec<u8> {
        (0..samples)
            .map(|n| ((n as f32 * 440.0 * std::f32::consts::TAU / 44100.0).sin() * 12_000.0) as i16)
            .flat_map(|s| s.to_le_bytes())
            .collect()
    }

    fn encode_in_chunks(pcm: &[u8], sizes: &[usize]) -> Vec<EncodedSample> {
        let mut codec = codec();
        let mut offset = 0;
        for &size in sizes.iter().cycle() {
            if offset >= pcm.len() {
                break;
            }
            let end = (offset + size).min(pcm.len());
            let pts = (offset / 2) as u64 * 1_000_000 / 44100;
            codec.queue_input(&pcm[offset..end], pts).unwrap();
            offset = end;
        }
        codec.queue_end_of_stream().unwrap();
        drain(&mut codec).1
    }

    #[test]
    fn odd_length_reads_encode_like_aligned_reads() {
        let pcm = sine_pcm(44100);
        let aligned = encode_in_chunks(&pcm, &[2048]);
        let split = encode_in_chunks(&pcm, &[2047, 2049]);

        assert_eq!(aligned.len(), 44 + 1);
        assert_eq!(aligned, split);
    }

    #[test]
    fn rejects_unsupported_rate() {
        let format = EncoderFormat::aac_lc(PcmFormat::new(44000, 1), DEFAULT_BIT_RATE);
        assert!(matches!(
            FdkAacCodec::new(&format),
            Err(EncoderError::ConfigurationRejected(_))
        ));
    }
}
