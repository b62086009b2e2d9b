use crate::models::audio_models::{EncoderFormat, TrackDescriptor};
use crate::models::error::EncoderError;
use crate::models::sample::EncodedSample;
use crate::traits::codec::{AudioCodec, CodecOutput};

/// Output buffers the codec may have outstanding before the caller releases them.
pub const OUTPUT_SLOTS: usize = 4;

/// Encoder lifecycle.
///
/// ```text
/// configured → running → draining → stopped → released
///                  ↓         ↓
///                failed ─────┴──────────────→ released
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Configured,
    Running,
    Draining,
    Stopped,
    Failed,
    Released,
}

impl EncoderState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
            Self::Released => "released",
        }
    }
}

/// An encoded sample on loan from the encoder.
///
/// Must be handed back through `Encoder::release_output`; the encoder stops
/// producing output once every slot is held.
#[derive(Debug)]
pub struct OutputBuffer {
    slot: usize,
    sample: EncodedSample,
}

impl OutputBuffer {
    pub fn sample(&self) -> &EncodedSample {
        &self.sample
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Notifications produced by the encode loop.
#[derive(Debug)]
pub enum EncoderEvent {
    /// A free input slot of `capacity` bytes is waiting for PCM.
    InputReady { capacity: usize },
    /// Negotiated output format. Precedes every `OutputReady`.
    FormatReady(TrackDescriptor),
    OutputReady(OutputBuffer),
    /// Unrecoverable codec failure. The encoder is failed afterwards.
    Error(EncoderError),
}

/// Drives an `AudioCodec` through its lifecycle and exposes its activity as
/// a sequence of `EncoderEvent`s.
///
/// All events for one encoder are consumed by a single worker, so callbacks
/// never run concurrently with themselves.
pub struct Encoder<C: AudioCodec> {
    codec: C,
    format: EncoderFormat,
    state: EncoderState,
    track: Option<TrackDescriptor>,
    held_slots: [bool; OUTPUT_SLOTS],
}

impl<C: AudioCodec> Encoder<C> {
    /// Wrap `codec` targeting `format`. Transitions: → configured.
    pub fn configure(mut codec: C, format: EncoderFormat) -> Result<Self, EncoderError> {
        if let Err(reason) = format.validate() {
            codec.release();
            return Err(EncoderError::ConfigurationRejected(reason));
        }
        log::debug!(
            "encoder configured: {:?} {} Hz, {} ch, {} bps",
            format.codec,
            format.sample_rate,
            format.channels,
            format.bit_rate
        );
        Ok(Self {
            codec,
            format,
            state: EncoderState::Configured,
            track: None,
            held_slots: [false; OUTPUT_SLOTS],
        })
    }

    /// Begin asynchronous operation. Transitions: configured → running.
    pub fn start(&mut self) -> Result<(), EncoderError> {
        self.require(EncoderState::Configured, "start")?;
        self.state = EncoderState::Running;
        Ok(())
    }

    /// Produce the next event, or `None` once the drain has completed.
    ///
    /// Output is preferred over input so encoded samples leave the codec as
    /// soon as they exist.
    pub fn next_event(&mut self) -> Option<EncoderEvent> {
        match self.state {
            EncoderState::Running | EncoderState::Draining => {}
            EncoderState::Configured => {
                return Some(EncoderEvent::Error(EncoderError::InvalidState {
                    operation: "next_event",
                    state: self.state.name(),
                }))
            }
            EncoderState::Stopped | EncoderState::Failed | EncoderState::Released => return None,
        }

        match self.free_slot() {
            Some(slot) => match self.codec.dequeue_output() {
                Err(e) => return Some(self.fail(e)),
                Ok(Some(CodecOutput::FormatChanged(track))) => {
                    if self.track.is_some() {
                        return Some(self.fail(EncoderError::FormatChangedTwice));
                    }
                    log::debug!(
                        "encoder output format ready: {:?} {} Hz, {} ch, config {:02x?}",
                        track.codec,
                        track.sample_rate,
                        track.channels,
                        track.codec_config
                    );
                    self.track = Some(track.clone());
                    return Some(EncoderEvent::FormatReady(track));
                }
                Ok(Some(CodecOutput::Sample(sample))) => {
                    if sample.is_end_of_stream() {
                        log::debug!("encoder reached end of stream at {}us", sample.presentation_time_us);
                        self.state = EncoderState::Stopped;
                        if sample.is_empty() {
                            return None;
                        }
                    }
                    self.held_slots[slot] = true;
                    return Some(EncoderEvent::OutputReady(OutputBuffer { slot, sample }));
                }
                Ok(None) => {
                    if self.state == EncoderState::Draining {
                        log::debug!("encoder drained without an end-of-stream marker");
                        self.state = EncoderState::Stopped;
                        return None;
                    }
                }
            },
            None if self.state == EncoderState::Draining => {
                return Some(self.fail(EncoderError::OutputBuffersExhausted));
            }
            None => {}
        }

        Some(EncoderEvent::InputReady {
            capacity: self.codec.input_capacity(),
        })
    }

    /// Queue PCM for encoding. Legal only while running.
    pub fn submit_input(&mut self, pcm: &[u8], presentation_time_us: u64) -> Result<(), EncoderError> {
        self.require(EncoderState::Running, "submit_input")?;
        if let Err(e) = self.codec.queue_input(pcm, presentation_time_us) {
            self.fail(e.clone());
            return Err(e);
        }
        Ok(())
    }

    /// Hand an output buffer back for reuse.
    pub fn release_output(&mut self, buffer: OutputBuffer) {
        match self.held_slots.get_mut(buffer.slot) {
            Some(held) if *held => *held = false,
            _ => log::warn!("output buffer slot {} released twice", buffer.slot),
        }
    }

    /// Stop accepting input and start draining. Transitions: running → draining.
    ///
    /// Remaining output keeps flowing from `next_event` until it returns
    /// `None`, at which point the encoder is stopped. Idempotent.
    pub fn stop(&mut self) -> Result<(), EncoderError> {
        match self.state {
            EncoderState::Running => {
                if let Err(e) = self.codec.queue_end_of_stream() {
                    self.fail(e.clone());
                    return Err(e);
                }
                self.state = EncoderState::Draining;
                Ok(())
            }
            EncoderState::Configured => {
                self.state = EncoderState::Stopped;
                Ok(())
            }
            EncoderState::Draining | EncoderState::Stopped | EncoderState::Failed => Ok(()),
            EncoderState::Released => Err(EncoderError::InvalidState {
                operation: "stop",
                state: self.state.name(),
            }),
        }
    }

    /// Abandon the stream without draining. Only `release` is legal afterwards.
    pub fn abort(&mut self) {
        if self.state != EncoderState::Released {
            self.state = EncoderState::Failed;
        }
    }

    /// Free codec resources. Legal after stopped or failed; idempotent.
    pub fn release(&mut self) -> Result<(), EncoderError> {
        match self.state {
            EncoderState::Released => Ok(()),
            EncoderState::Stopped | EncoderState::Failed | EncoderState::Configured => {
                self.codec.release();
                self.state = EncoderState::Released;
                Ok(())
            }
            EncoderState::Running | EncoderState::Draining => Err(EncoderError::InvalidState {
                operation: "release",
                state: self.state.name(),
            }),
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    pub fn format(&self) -> &EncoderFormat {
        &self.format
    }

    /// Negotiated output format, once announced.
    pub fn track(&self) -> Option<&TrackDescriptor> {
        self.track.as_ref()
    }

    pub fn held_output_buffers(&self) -> usize {
        self.held_slots.iter().filter(|held| **held).count()
    }

    fn free_slot(&self) -> Option<usize> {
        self.held_slots.iter().position(|held| !held)
    }

    fn fail(&mut self, error: EncoderError) -> EncoderEvent {
        log::error!("encoder failed in state {}: {}", self.state.name(), error);
        self.state = EncoderState::Failed;
        EncoderEvent::Error(error)
    }

    fn require(&self, expected: EncoderState, operation: &'static str) -> Result<(), EncoderError> {
        if self.state != expected {
            return Err(EncoderError::InvalidState {
                operation,
                state: self.state.name(),
            });
        }
        Ok(())
    }
}
