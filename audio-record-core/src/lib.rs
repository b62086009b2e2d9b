//! # audio-record-core
//!
//! Platform-agnostic capture → encode → mux pipeline.
//!
//! Pulls 16-bit PCM from a `FrameSource`, encodes it to AAC-LC through an
//! `Encoder` driving an `AudioCodec`, and writes a single-track MPEG-4 file
//! with `Mp4Muxer`. Platform backends (Windows WASAPI loopback) implement
//! `CaptureBackend` and plug into the generic `Pipeline`.
//!
//! ## Architecture
//!
//! ```text
//! audio-record-core (this crate)
//! ├── traits/       ← CaptureHandle, CaptureBackend, FrameSource, AudioCodec, PipelineDelegate
//! ├── models/       ← PipelineState, PipelineError, PcmFormat, TrackDescriptor, EncodedSample, etc.
//! ├── processing/   ← PresentationClock, PcmRingBuffer, BufferedFrameSource, PCM conversion
//! ├── encoder/      ← Encoder driver and event model, fdk-aac codec (feature `fdk-aac`)
//! ├── storage/      ← Mp4Muxer (over muxide), ADTS framing, checksum, metadata sidecar
//! └── session/      ← Pipeline (controller and encode worker)
//! ```

pub mod encoder;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use encoder::{Encoder, EncoderEvent, EncoderState, OutputBuffer};
pub use models::audio_models::{
    AudioCodecKind, ContainerKind, EncoderFormat, PcmFormat, PipelineDiagnostics, TrackDescriptor,
};
pub use models::config::PipelineConfiguration;
pub use models::error::{CaptureError, ContractViolation, EncoderError, MuxError, PipelineError};
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::sample::{EncodedSample, SampleFlags};
pub use models::state::PipelineState;
pub use processing::buffered_source::{pcm_channel, BufferedFrameSource, PcmSink};
pub use processing::pcm::PcmConverter;
pub use processing::presentation_clock::PresentationClock;
pub use session::pipeline::Pipeline;
pub use storage::mp4_muxer::{Mp4Muxer, MuxSummary, TrackId};
pub use traits::capture_handle::CaptureHandle;
pub use traits::codec::{AudioCodec, CodecBackend, CodecOutput};
pub use traits::frame_source::{CaptureBackend, FrameSource};
pub use traits::pipeline_delegate::PipelineDelegate;
pub use traits::recording_session::RecordingSession;

#[cfg(feature = "fdk-aac")]
pub use encoder::fdk::{FdkAacBackend, FdkAacCodec};
