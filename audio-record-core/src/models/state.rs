use super::error::PipelineError;
use super::recording_result::RecordingResult;

/// Recording pipeline state machine.
///
/// State transitions:
/// ```text
/// uninitialized → configured → running → draining → stopped → finalized
///        ↓             ↓          ↓          ↓          ↓
///        └─────────────┴──────────┴──────────┴──────────┴──→ failed
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Uninitialized,
    Configured,
    Running,
    Draining,
    Stopped,
    Finalized(Box<RecordingResult>),
    Failed(PipelineError),
}

impl PipelineState {
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, Self::Uninitialized)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Stopped, finalized or failed: no further work happens.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Stopped | Self::Finalized(_) | Self::Failed(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized(_) | Self::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
            Self::Finalized(_) => "finalized",
            Self::Failed(_) => "failed",
        }
    }

    pub fn result(&self) -> Option<&RecordingResult> {
        match self {
            Self::Finalized(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}
