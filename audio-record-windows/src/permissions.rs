//! Authorization for Windows system audio capture.
//!
//! WASAPI loopback needs no consent dialog for desktop apps. The handle
//! only records that a render endpoint was reachable when it was issued,
//! and lets the host revoke capture mid-session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use audio_record_core::models::error::CaptureError;
use audio_record_core::traits::capture_handle::CaptureHandle;

/// Capture handle for loopback on the default render device.
pub struct LoopbackCaptureHandle {
    authorized: AtomicBool,
}

impl LoopbackCaptureHandle {
    /// Issue a handle if system audio can be captured.
    pub fn acquire() -> Result<Arc<Self>, CaptureError> {
        if !check_system_audio_permission()? {
            return Err(CaptureError::PermissionDenied);
        }
        Ok(Arc::new(Self {
            authorized: AtomicBool::new(true),
        }))
    }

    /// Withdraw authorization. The active frame source fails on its next read.
    pub fn revoke(&self) {
        self.authorized.store(false, Ordering::SeqCst);
    }
}

impl CaptureHandle for LoopbackCaptureHandle {
    fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }

    fn description(&self) -> String {
        "System Audio (Loopback)".into()
    }
}

/// Check whether the default render endpoint can be opened for loopback.
///
/// Returns `Ok(false)` when there is no render device or activation is
/// denied.
pub fn check_system_audio_permission() -> Result<bool, CaptureError> {
    unsafe {
        CoInitializeEx(None, COINIT_MULTITHREADED)
            .ok()
            .map_err(|e| CaptureError::Unavailable(format!("CoInitializeEx failed: {}", e)))?;

        let result = check_render_access_inner();

        CoUninitialize();
        result
    }
}

unsafe fn check_render_access_inner() -> Result<bool, CaptureError> {
    let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
        .map_err(|e| CaptureError::Unavailable(format!("failed to create enumerator: {}", e)))?;

    let device = match enumerator.GetDefaultAudioEndpoint(eRender, eConsole) {
        Ok(d) => d,
        Err(_) => return Ok(false), // No render device
    };

    let result: windows::core::Result<IAudioClient> = device.Activate(CLSCTX_ALL, None);

    match result {
        Ok(_) => Ok(true),
        Err(e) => {
            let code = e.code();
            // E_ACCESSDENIED or AUDCLNT_E_DEVICE_IN_USE
            if code.0 == -2147024891i32 || code.0 == -2004287478i32 {
                Ok(false)
            } else {
                log::warn!("unexpected error checking loopback access: {}", e);
                Ok(true)
            }
        }
    }
}
