use std::sync::Arc;

use crate::models::audio_models::PcmFormat;
use crate::models::error::CaptureError;
use crate::traits::capture_handle::CaptureHandle;

/// A live audio capture stream delivering 16-bit signed little-endian PCM.
///
/// Read on the encoder's worker thread, never on a thread that must stay
/// responsive.
pub trait FrameSource: Send {
    /// Fill `buffer` with PCM bytes.
    ///
    /// Blocks until data is available or the source is closed. Returns the
    /// number of bytes written, or 0 on graceful end of stream.
    fn read_into(&mut self, buffer: &mut [u8]) -> Result<usize, CaptureError>;

    /// Stop capturing and release the capture handle. Idempotent.
    fn close(&mut self) -> Result<(), CaptureError>;
}

/// Interface for platform-specific capture backends.
///
/// Implemented by:
/// - `WasapiLoopbackBackend` (Windows)
/// - synthetic backends in tests
pub trait CaptureBackend: Send + Sync {
    type Source: FrameSource + 'static;

    /// Open a frame source for `format` using the borrowed `handle`.
    fn open(&self, handle: Arc<dyn CaptureHandle>, format: &PcmFormat) -> Result<Self::Source, CaptureError>;
}
