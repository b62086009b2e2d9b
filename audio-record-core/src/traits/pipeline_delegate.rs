use crate::models::error::PipelineError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::PipelineState;

/// Status surface for the host process.
///
/// Methods are called from whichever thread drives the transition: the
/// caller of `start`/`stop` or the encode worker. Implementations marshal to
/// their own context if needed.
pub trait PipelineDelegate: Send + Sync {
    /// Called on every state transition.
    fn on_state_changed(&self, state: &PipelineState);

    /// Called when the pipeline fails, with the reason.
    fn on_error(&self, error: &PipelineError);

    /// Called once the container file is finalized.
    fn on_recording_finished(&self, result: &RecordingResult);
}
