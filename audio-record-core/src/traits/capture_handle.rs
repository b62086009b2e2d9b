/// Opaque token authorizing access to a platform audio source.
///
/// Produced by an external consent flow (screen/audio capture permission).
/// Frame sources borrow it for the lifetime of a session and never own the
/// authorization itself.
pub trait CaptureHandle: Send + Sync {
    /// Whether capture is still authorized. Revocation mid-session surfaces
    /// from the frame source as `CaptureError::Unavailable`.
    fn is_authorized(&self) -> bool;

    /// Human-readable description for logs.
    fn description(&self) -> String;
}
