use thiserror::Error;

/// Errors raised by a capture source.
///
/// All variants are fatal to the pipeline. A live capture session cannot be
/// resumed after a gap, so nothing here is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture permission denied")]
    PermissionDenied,

    #[error("capture source unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported capture format: {0}")]
    UnsupportedFormat(String),

    #[error("capture read failed: {0}")]
    ReadFailed(String),
}

/// Errors raised by the encoder driver or the codec behind it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncoderError {
    #[error("encoder configuration rejected: {0}")]
    ConfigurationRejected(String),

    #[error("encoder operation `{operation}` is illegal in state {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("codec fault: {0}")]
    CodecFault(String),

    #[error("codec announced its output format more than once")]
    FormatChangedTwice,

    #[error("all encoder output buffers are held and were never released")]
    OutputBuffersExhausted,
}

/// Errors raised by the container writer.
///
/// Ordering variants are contract violations by the caller. They are
/// reported instead of being silently absorbed so the file is never corrupted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MuxError {
    #[error("add_track called after the muxer was started")]
    TrackAfterStart,

    #[error("muxer accepts a single audio track")]
    TrackLimitExceeded,

    #[error("muxer cannot start without a track")]
    NoTrack,

    #[error("write_sample called before the muxer was started")]
    NotStarted,

    #[error("unknown track id {0}")]
    UnknownTrack(u32),

    #[error("muxer is not writable (state: {0})")]
    NotWritable(&'static str),

    #[error("sample timestamp {current_us}us precedes previous {previous_us}us")]
    TimestampRegression { previous_us: u64, current_us: u64 },

    #[error("container I/O failed: {0}")]
    Io(String),

    #[error("mp4 writer rejected the stream: {0}")]
    Container(String),

    #[error("encoded frame of {0} bytes does not fit an ADTS header")]
    FrameTooLarge(usize),
}

/// An internal ordering invariant was broken. Indicates a programming defect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("contract violation: {context}")]
pub struct ContractViolation {
    pub context: String,
}

impl ContractViolation {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }
}

/// Terminal failure reason surfaced by the pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error(transparent)]
    Mux(#[from] MuxError),

    #[error(transparent)]
    Contract(#[from] ContractViolation),

    #[error("capture ended before any audio was recorded")]
    EmptyStream,

    #[error("invalid pipeline state: {0}")]
    InvalidState(String),

    #[error("configuration failed: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(String),
}
