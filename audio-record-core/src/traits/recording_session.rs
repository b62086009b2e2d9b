use std::sync::Arc;

use crate::models::error::PipelineError;
use crate::models::state::PipelineState;
use crate::traits::capture_handle::CaptureHandle;

/// Control surface consumed by the host process.
pub trait RecordingSession: Send {
    /// Current session state.
    fn state(&self) -> PipelineState;

    /// Open the source, configure and start the encoder.
    /// Transitions: uninitialized → configured → running.
    fn start(&mut self, handle: Arc<dyn CaptureHandle>) -> Result<(), PipelineError>;

    /// Drain, finalize and release everything.
    /// Transitions: running → draining → stopped → finalized/failed.
    /// A no-op on a settled session.
    fn stop(&mut self) -> PipelineState;
}
