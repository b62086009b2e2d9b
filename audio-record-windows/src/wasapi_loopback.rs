//! WASAPI loopback frame source for system audio.
//!
//! Captures the audio mix going to the default render endpoint using
//! `AUDCLNT_STREAMFLAGS_LOOPBACK`, converts it to 16-bit mono at the
//! requested rate and pushes it into a `PcmSink`. The encode worker pulls
//! from the paired `BufferedFrameSource`.
//!
//! - DRM-protected audio is silenced in loopback
//! - Loopback delivers no packets while nothing plays; the gap is filled
//!   with silence so the stream keeps advancing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use windows::core::PCWSTR;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use audio_record_core::models::audio_models::PcmFormat;
use audio_record_core::models::error::CaptureError;
use audio_record_core::processing::buffered_source::{pcm_channel, BufferedFrameSource, PcmSink};
use audio_record_core::processing::pcm::PcmConverter;
use audio_record_core::traits::capture_handle::CaptureHandle;
use audio_record_core::traits::frame_source::CaptureBackend;

/// Seconds of converted PCM buffered between the capture and encode threads.
const BUFFER_SECS: u32 = 5;

/// Silence is inserted once no packet arrived for this long.
const SILENCE_FILL_AFTER: Duration = Duration::from_millis(50);

/// Opens loopback capture on the default render device.
#[derive(Debug, Default, Clone, Copy)]
pub struct WasapiLoopbackBackend;

impl WasapiLoopbackBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for WasapiLoopbackBackend {
    type Source = BufferedFrameSource;

    fn open(&self, handle: Arc<dyn CaptureHandle>, format: &PcmFormat) -> Result<BufferedFrameSource, CaptureError> {
        if *format != PcmFormat::default() {
            return Err(CaptureError::UnsupportedFormat(format!(
                "loopback delivers 44100 Hz mono, requested {} Hz x {}",
                format.sample_rate, format.channels
            )));
        }
        if !handle.is_authorized() {
            return Err(CaptureError::PermissionDenied);
        }

        let capacity = (format.sample_rate * format.bytes_per_frame() * BUFFER_SECS) as usize;
        let (sink, source) = pcm_channel(capacity, Arc::clone(&handle));
        let converter = PcmConverter::new(format.sample_rate as f64, format.channels);
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread_running = Arc::clone(&running);
        let capture_thread = thread::Builder::new()
            .name("wasapi-loopback-capture".into())
            .spawn(move || {
                let result = loopback_capture_loop(&thread_running, &sink, &converter, ready_tx);
                match result {
                    Ok(()) => sink.finish(),
                    Err(e) => {
                        log::error!("loopback capture error: {}", e);
                        sink.fail(e);
                    }
                }
                thread_running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| CaptureError::Unavailable(format!("failed to spawn loopback thread: {}", e)))?;

        let startup = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::Unavailable("loopback thread exited during startup".into())));
        if let Err(e) = startup {
            running.store(false, Ordering::SeqCst);
            let _ = capture_thread.join();
            return Err(e);
        }

        log::info!("loopback capture started: {}", handle.description());
        Ok(source.with_close_hook(move || {
            running.store(false, Ordering::SeqCst);
            if capture_thread.join().is_err() {
                log::error!("loopback capture thread panicked");
            }
        }))
    }
}

/// Main loopback capture loop running on a dedicated thread.
///
/// Sequence:
/// 1. CoInitializeEx (MTA)
/// 2. Get default render endpoint
/// 3. Activate IAudioClient
/// 4. Initialize with LOOPBACK flag in shared mode
/// 5. Get IAudioCaptureClient
/// 6. Register with MMCSS
/// 7. Start, report readiness, poll for buffers
fn loopback_capture_loop(
    running: &AtomicBool,
    sink: &PcmSink,
    converter: &PcmConverter,
    ready: mpsc::Sender<Result<(), CaptureError>>,
) -> Result<(), CaptureError> {
    unsafe {
        let startup = start_loopback_client();
        let (audio_client, capture_client, mix_format_ptr, com_guard) = match startup {
            Ok(parts) => {
                let _ = ready.send(Ok(()));
                parts
            }
            Err(e) => {
                let _ = ready.send(Err(e.clone()));
                return Err(e);
            }
        };

        let mix_format = &*mix_format_ptr;
        let sample_rate = mix_format.nSamplesPerSec as f64;
        let channels = mix_format.nChannels;
        let silence_frame_bytes = converter.target_channels as usize * 2;

        let outcome = (|| -> Result<(), CaptureError> {
            let mut last_delivery = Instant::now();

            // poll every 10ms
            while running.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(10));

                let mut delivered = false;
                let mut packet_length = capture_client.GetNextPacketSize().map_err(read_failed("GetNextPacketSize"))?;

                while packet_length > 0 {
                    let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                    let mut num_frames: u32 = 0;
                    let mut flags: u32 = 0;

                    capture_client
                        .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                        .map_err(read_failed("GetBuffer"))?;

                    if num_frames > 0 && !buffer_ptr.is_null() {
                        let total_samples = num_frames as usize * channels as usize;
                        let pcm = if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                            converter.process(&vec![0.0f32; total_samples], sample_rate, channels)
                        } else {
                            let samples = std::slice::from_raw_parts(buffer_ptr as *const f32, total_samples);
                            converter.process(samples, sample_rate, channels)
                        };
                        if !sink.push(&pcm) {
                            let _ = capture_client.ReleaseBuffer(num_frames);
                            return Ok(());
                        }
                        delivered = true;
                    }

                    capture_client
                        .ReleaseBuffer(num_frames)
                        .map_err(read_failed("ReleaseBuffer"))?;

                    packet_length = capture_client.GetNextPacketSize().map_err(read_failed("GetNextPacketSize"))?;
                }

                if delivered {
                    last_delivery = Instant::now();
                } else if last_delivery.elapsed() >= SILENCE_FILL_AFTER {
                    let frames = (last_delivery.elapsed().as_secs_f64() * converter.target_sample_rate) as usize;
                    if !sink.push(&vec![0u8; frames * silence_frame_bytes]) {
                        return Ok(());
                    }
                    last_delivery = Instant::now();
                }
            }
            Ok(())
        })();

        let _ = audio_client.Stop();
        CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
        // COM interfaces must be released before CoUninitialize
        drop(capture_client);
        drop(audio_client);
        drop(com_guard);
        outcome
    }
}

/// Steps 1–6 of the loopback sequence, up to a started client.
unsafe fn start_loopback_client(
) -> Result<(IAudioClient, IAudioCaptureClient, *mut WAVEFORMATEX, CoUninitializeGuard), CaptureError> {
    CoInitializeEx(None, COINIT_MULTITHREADED)
        .ok()
        .map_err(|e| CaptureError::Unavailable(format!("CoInitializeEx failed: {}", e)))?;
    let com_guard = CoUninitializeGuard;

    let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
        .map_err(|e| CaptureError::Unavailable(format!("device enumerator unavailable: {}", e)))?;

    // Default RENDER endpoint: loopback reads what is being played
    let device = enumerator
        .GetDefaultAudioEndpoint(eRender, eConsole)
        .map_err(|e| CaptureError::Unavailable(format!("no default render endpoint: {}", e)))?;

    let audio_client: IAudioClient = device
        .Activate(CLSCTX_ALL, None)
        .map_err(|e| CaptureError::Unavailable(format!("Activate failed: {}", e)))?;

    let mix_format_ptr = audio_client
        .GetMixFormat()
        .map_err(|e| CaptureError::Unavailable(format!("GetMixFormat failed: {}", e)))?;

    if (*mix_format_ptr).wBitsPerSample != 32 {
        let bits = (*mix_format_ptr).wBitsPerSample;
        CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
        return Err(CaptureError::UnsupportedFormat(format!(
            "mix format is {}-bit, expected 32-bit float",
            bits
        )));
    }

    let buffer_duration = 1_000_000; // 100ms in 100ns units
    let started = (|| -> Result<IAudioCaptureClient, CaptureError> {
        audio_client
            .Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_LOOPBACK | AUDCLNT_STREAMFLAGS_NOPERSIST,
                buffer_duration,
                0,
                mix_format_ptr,
                None,
            )
            .map_err(|e| CaptureError::Unavailable(format!("IAudioClient::Initialize (loopback) failed: {}", e)))?;

        let capture_client: IAudioCaptureClient = audio_client
            .GetService()
            .map_err(|e| CaptureError::Unavailable(format!("GetService failed: {}", e)))?;

        // MMCSS registration for real-time priority
        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        let _mmcss_handle = AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index);

        audio_client
            .Start()
            .map_err(|e| CaptureError::Unavailable(format!("IAudioClient::Start failed: {}", e)))?;
        Ok(capture_client)
    })();

    match started {
        Ok(capture_client) => Ok((audio_client, capture_client, mix_format_ptr, com_guard)),
        Err(e) => {
            CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
            Err(e)
        }
    }
}

fn read_failed(call: &'static str) -> impl Fn(windows::core::Error) -> CaptureError {
    move |e| CaptureError::Unavailable(format!("{} failed: {}", call, e))
}

struct CoUninitializeGuard;

impl Drop for CoUninitializeGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
