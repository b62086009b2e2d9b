use crate::models::audio_models::{EncoderFormat, TrackDescriptor};
use crate::models::error::EncoderError;
use crate::models::sample::EncodedSample;

/// Something a codec hands back from its output side.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecOutput {
    /// The negotiated output format. Emitted once, before any sample.
    FormatChanged(TrackDescriptor),
    Sample(EncodedSample),
}

/// A hardware or software audio codec in encode mode.
///
/// The `Encoder` driver turns this pull interface into the input-ready /
/// output-ready / format-ready / error event stream.
///
/// After `queue_end_of_stream`, `dequeue_output` must return every remaining
/// output followed by a sample flagged `END_OF_STREAM`. Returning `None`
/// while draining is treated as drain completion. Codecs backed by
/// asynchronous hardware block inside `dequeue_output` until output exists.
pub trait AudioCodec: Send {
    /// Capacity in bytes of the next free input slot.
    fn input_capacity(&self) -> usize;

    /// Submit PCM bytes tagged with their presentation time.
    fn queue_input(&mut self, pcm: &[u8], presentation_time_us: u64) -> Result<(), EncoderError>;

    /// No further input follows; flush everything buffered.
    fn queue_end_of_stream(&mut self) -> Result<(), EncoderError>;

    /// Next available output, if any.
    fn dequeue_output(&mut self) -> Result<Option<CodecOutput>, EncoderError>;

    /// Free codec resources. Called once by the driver.
    fn release(&mut self);
}

/// Creates codecs for a requested output format.
pub trait CodecBackend: Send + Sync {
    type Codec: AudioCodec + 'static;

    fn create(&self, format: &EncoderFormat) -> Result<Self::Codec, EncoderError>;
}
