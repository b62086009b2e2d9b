//! # audio-record-windows
//!
//! Windows WASAPI backend for audio-record-kit.
//!
//! Provides:
//! - `WasapiLoopbackBackend` — `CaptureBackend` capturing system audio via
//!   WASAPI loopback on the default render endpoint
//! - `LoopbackCaptureHandle` — `CaptureHandle` for loopback capture
//!
//! ## Platform Requirements
//! - Windows 10 1703+ (build 15063) for loopback on shared-mode endpoints
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use audio_record_core::{FdkAacBackend, Pipeline, PipelineConfiguration};
//! use audio_record_windows::{LoopbackCaptureHandle, WasapiLoopbackBackend};
//!
//! let handle = LoopbackCaptureHandle::acquire()?;
//! let mut pipeline = Pipeline::new(WasapiLoopbackBackend::new(), FdkAacBackend, PipelineConfiguration::default());
//! pipeline.start(handle)?;
//! // ...
//! let state = pipeline.stop();
//! ```

#[cfg(target_os = "windows")]
pub mod permissions;
#[cfg(target_os = "windows")]
pub mod wasapi_loopback;

#[cfg(target_os = "windows")]
pub use permissions::LoopbackCaptureHandle;
#[cfg(target_os = "windows")]
pub use wasapi_loopback::WasapiLoopbackBackend;
