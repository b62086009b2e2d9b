use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::encoder::{Encoder, EncoderEvent, OutputBuffer};
use crate::models::audio_models::{ContainerKind, PipelineDiagnostics, TrackDescriptor};
use crate::models::config::PipelineConfiguration;
use crate::models::error::{ContractViolation, PipelineError};
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::models::sample::SampleFlags;
use crate::models::state::PipelineState;
use crate::processing::presentation_clock::PresentationClock;
use crate::storage::checksum::sha256_file;
use crate::storage::metadata::{metadata_path, write_metadata};
use crate::storage::mp4_muxer::{Mp4Muxer, TrackId};
use crate::traits::capture_handle::CaptureHandle;
use crate::traits::codec::{AudioCodec, CodecBackend};
use crate::traits::frame_source::{CaptureBackend, FrameSource};
use crate::traits::pipeline_delegate::PipelineDelegate;
use crate::traits::recording_session::RecordingSession;

/// Read size used when a codec reports no input capacity.
const FALLBACK_READ_BYTES: usize = 2048;

/// State visible to both the controller and the encode worker.
struct SharedState {
    state: PipelineState,
    diagnostics: PipelineDiagnostics,
}

/// Publishes transitions into the shared cell and to the delegate.
#[derive(Clone)]
struct StatusCell {
    shared: Arc<Mutex<SharedState>>,
    delegate: Option<Arc<dyn PipelineDelegate>>,
}

impl StatusCell {
    fn set_state(&self, state: PipelineState) {
        let previous = {
            let mut s = self.shared.lock();
            std::mem::replace(&mut s.state, state.clone())
        };
        log::info!("pipeline {} -> {}", previous.name(), state.name());
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&state);
        }
    }

    fn fail(&self, error: PipelineError) {
        log::error!("pipeline failed: {}", error);
        self.set_state(PipelineState::Failed(error.clone()));
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(&error);
        }
    }

    fn finish(&self, result: RecordingResult) {
        self.set_state(PipelineState::Finalized(Box::new(result.clone())));
        if let Some(ref delegate) = self.delegate {
            delegate.on_recording_finished(&result);
        }
    }

    fn record(&self, update: impl FnOnce(&mut PipelineDiagnostics)) {
        update(&mut self.shared.lock().diagnostics);
    }

    fn state(&self) -> PipelineState {
        self.shared.lock().state.clone()
    }
}

/// Capture → encode → mux controller.
///
/// Data flow:
/// ```text
/// [FrameSource] → read_into → [Encoder] → OutputReady → [Mp4Muxer] → .m4a
///                      ↑                      │
///               PresentationClock       FormatReady → add_track + start
/// ```
///
/// `start` acquires every resource and hands them to a single encode
/// worker thread. The worker owns the session until it finalizes or fails;
/// the controller only observes the shared state and requests a drain.
pub struct Pipeline<B: CaptureBackend, K: CodecBackend> {
    capture_backend: B,
    codec_backend: K,
    config: PipelineConfiguration,
    shared: Arc<Mutex<SharedState>>,
    delegate: Option<Arc<dyn PipelineDelegate>>,
    drain_requested: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
    output_path: Option<PathBuf>,
}

impl<B: CaptureBackend, K: CodecBackend> Pipeline<B, K> {
    pub fn new(capture_backend: B, codec_backend: K, config: PipelineConfiguration) -> Self {
        Self {
            capture_backend,
            codec_backend,
            config,
            shared: Arc::new(Mutex::new(SharedState {
                state: PipelineState::Uninitialized,
                diagnostics: PipelineDiagnostics::default(),
            })),
            delegate: None,
            drain_requested: Arc::new(AtomicBool::new(false)),
            worker: None,
            output_path: None,
        }
    }

    /// Must be set before `start` to observe the session.
    pub fn set_delegate(&mut self, delegate: Arc<dyn PipelineDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> PipelineState {
        self.shared.lock().state.clone()
    }

    pub fn diagnostics(&self) -> PipelineDiagnostics {
        self.shared.lock().diagnostics.clone()
    }

    pub fn config(&self) -> &PipelineConfiguration {
        &self.config
    }

    /// Path of this session's container file.
    ///
    /// `None` until `start` opens the file, and again if `start` fails. A
    /// session that fails after starting keeps the path but deletes the
    /// file, so the file exists only after a `Finalized` outcome.
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Open the source, configure and start the encoder, spawn the worker.
    /// Transitions: uninitialized → configured → running.
    ///
    /// Returns once the worker is running. On failure everything acquired so
    /// far is released and the pipeline is failed.
    pub fn start(&mut self, handle: Arc<dyn CaptureHandle>) -> Result<(), PipelineError> {
        {
            let s = self.shared.lock();
            if !s.state.is_uninitialized() {
                return Err(PipelineError::InvalidState(format!(
                    "start requires an uninitialized pipeline, state is {}",
                    s.state.name()
                )));
            }
        }

        let status = self.status();
        if let Err(e) = self.launch(handle, &status) {
            self.output_path = None;
            status.fail(e.clone());
            return Err(e);
        }
        Ok(())
    }

    /// Request a drain and wait for the worker to finalize.
    /// Transitions: running → draining → stopped → finalized/failed.
    ///
    /// When this returns no sample write is in flight and every resource is
    /// released. A no-op returning the current state if nothing is running.
    pub fn stop(&mut self) -> PipelineState {
        if self.worker.is_none() {
            let state = self.state();
            log::debug!("stop on {} pipeline is a no-op", state.name());
            return state;
        }
        log::info!("stop requested");
        self.drain_requested.store(true, Ordering::SeqCst);
        self.join_worker();
        self.state()
    }

    /// Wait for the worker to finish on its own (the source reached end of
    /// stream or failed) without requesting a drain.
    pub fn wait_for_completion(&mut self) -> PipelineState {
        self.join_worker();
        self.state()
    }

    fn launch(&mut self, handle: Arc<dyn CaptureHandle>, status: &StatusCell) -> Result<(), PipelineError> {
        self.config.validate().map_err(PipelineError::Configuration)?;
        let config = self.config.clone();

        let mut source = self.capture_backend.open(Arc::clone(&handle), &config.pcm)?;
        log::debug!("frame source opened: {}", handle.description());

        let container = ContainerKind::Mpeg4;
        let path = config.output_directory.join(format!(
            "recording_{}.{}",
            uuid::Uuid::new_v4(),
            container.file_extension()
        ));
        let mut muxer = match Mp4Muxer::open(&path, container) {
            Ok(muxer) => muxer,
            Err(e) => {
                close_source(&mut source);
                return Err(e.into());
            }
        };
        self.output_path = Some(path);

        let format = config.encoder_format();
        let configured = self
            .codec_backend
            .create(&format)
            .and_then(|codec| Encoder::configure(codec, format));
        let mut encoder = match configured {
            Ok(encoder) => encoder,
            Err(e) => {
                discard_file(&mut muxer);
                close_source(&mut source);
                return Err(e.into());
            }
        };
        status.set_state(PipelineState::Configured);

        if let Err(e) = encoder.start() {
            discard_file(&mut muxer);
            close_source(&mut source);
            let _ = encoder.release();
            return Err(e.into());
        }

        let context = SessionContext {
            clock: PresentationClock::new(config.pcm),
            source,
            encoder,
            muxer,
            track_id: None,
            track: None,
            input: Vec::new(),
            config,
            settled: false,
        };

        status.set_state(PipelineState::Running);
        let worker_status = status.clone();
        let drain = Arc::clone(&self.drain_requested);
        // On spawn failure the closure is dropped and the context aborts itself.
        let worker = thread::Builder::new()
            .name("audio-encode".into())
            .spawn(move || context.run(&worker_status, &drain))
            .map_err(|e| PipelineError::InvalidState(format!("failed to spawn encode worker: {}", e)))?;

        self.worker = Some(worker);
        Ok(())
    }

    fn join_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if worker.join().is_err() {
            let status = self.status();
            if !status.state().is_terminal() {
                status.fail(PipelineError::InvalidState("encode worker panicked".into()));
            }
        }
    }

    fn status(&self) -> StatusCell {
        StatusCell {
            shared: Arc::clone(&self.shared),
            delegate: self.delegate.clone(),
        }
    }
}

impl<B: CaptureBackend, K: CodecBackend> RecordingSession for Pipeline<B, K> {
    fn state(&self) -> PipelineState {
        Pipeline::state(self)
    }

    fn start(&mut self, handle: Arc<dyn CaptureHandle>) -> Result<(), PipelineError> {
        Pipeline::start(self, handle)
    }

    fn stop(&mut self) -> PipelineState {
        Pipeline::stop(self)
    }
}

impl<B: CaptureBackend, K: CodecBackend> Drop for Pipeline<B, K> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

/// Everything one recording session holds, owned by the encode worker.
struct SessionContext<S: FrameSource, C: AudioCodec> {
    source: S,
    encoder: Encoder<C>,
    muxer: Mp4Muxer,
    clock: PresentationClock,
    track_id: Option<TrackId>,
    track: Option<TrackDescriptor>,
    input: Vec<u8>,
    config: PipelineConfiguration,
    settled: bool,
}

impl<S: FrameSource, C: AudioCodec> SessionContext<S, C> {
    fn run(mut self, status: &StatusCell, drain_requested: &AtomicBool) {
        let outcome = self.encode_loop(status, drain_requested).and_then(|()| {
            status.set_state(PipelineState::Stopped);
            self.finalize()
        });
        match outcome {
            Ok(result) => {
                self.settled = true;
                status.finish(result);
            }
            Err(e) => {
                self.abort();
                status.fail(e);
            }
        }
    }

    /// Handle encoder events until the drain completes.
    fn encode_loop(&mut self, status: &StatusCell, drain_requested: &AtomicBool) -> Result<(), PipelineError> {
        while let Some(event) = self.encoder.next_event() {
            match event {
                EncoderEvent::InputReady { capacity } => self.on_input_ready(capacity, status, drain_requested)?,
                EncoderEvent::FormatReady(track) => self.on_format_ready(track)?,
                EncoderEvent::OutputReady(buffer) => self.on_output_ready(buffer, status)?,
                EncoderEvent::Error(e) => return Err(e.into()),
            }
        }
        log::debug!("encoder drained after {} PCM bytes", self.clock.total_bytes());
        Ok(())
    }

    fn on_input_ready(
        &mut self,
        capacity: usize,
        status: &StatusCell,
        drain_requested: &AtomicBool,
    ) -> Result<(), PipelineError> {
        if drain_requested.load(Ordering::SeqCst) {
            return self.begin_drain(status);
        }

        let capacity = if capacity == 0 { FALLBACK_READ_BYTES } else { capacity };
        self.input.resize(capacity, 0);
        let bytes_read = self.source.read_into(&mut self.input[..capacity])?;
        if bytes_read == 0 {
            log::debug!("frame source reached end of stream");
            return self.begin_drain(status);
        }

        let presentation_time_us = self.clock.current_us();
        self.encoder
            .submit_input(&self.input[..bytes_read], presentation_time_us)?;
        self.clock.advance(bytes_read);
        status.record(|d| {
            d.input_buffers += 1;
            d.bytes_read += bytes_read as u64;
        });
        Ok(())
    }

    /// Stop feeding the encoder. Transitions: running → draining.
    fn begin_drain(&mut self, status: &StatusCell) -> Result<(), PipelineError> {
        if self.clock.total_bytes() == 0 {
            return Err(PipelineError::EmptyStream);
        }
        self.encoder.stop()?;
        status.set_state(PipelineState::Draining);
        Ok(())
    }

    fn on_format_ready(&mut self, track: TrackDescriptor) -> Result<(), PipelineError> {
        if self.track_id.is_some() {
            return Err(ContractViolation::new("output format announced after the track was added").into());
        }
        let track_id = self.muxer.add_track(&track)?;
        self.muxer.start()?;
        log::debug!(
            "muxer started: {} Hz, {} ch, {} bps",
            track.sample_rate,
            track.channels,
            track.bit_rate
        );
        self.track_id = Some(track_id);
        self.track = Some(track);
        Ok(())
    }

    fn on_output_ready(&mut self, buffer: OutputBuffer, status: &StatusCell) -> Result<(), PipelineError> {
        let outcome = self.write_output(&buffer);
        self.encoder.release_output(buffer);
        let written = outcome?;
        status.record(|d| {
            d.output_buffers += 1;
            if written > 0 {
                d.samples_muxed += 1;
                d.bytes_muxed += written as u64;
            }
        });
        Ok(())
    }

    /// Forward one sample to the muxer. Returns the payload bytes written.
    fn write_output(&mut self, buffer: &OutputBuffer) -> Result<usize, PipelineError> {
        let sample = buffer.sample();
        let Some(track_id) = self.track_id else {
            let violation = ContractViolation::new(format!(
                "encoded sample at {}us ({} bytes, {:?}) arrived before the output format",
                sample.presentation_time_us,
                sample.data.len(),
                sample.flags
            ));
            log::error!("{}", violation);
            return Err(violation.into());
        };
        if sample.flags.contains(SampleFlags::CODEC_CONFIG) {
            // carried by the track's esds
            return Ok(0);
        }
        if sample.is_empty() {
            return Ok(0);
        }
        self.muxer.write_sample(track_id, sample)?;
        Ok(sample.data.len())
    }

    /// Close the container and release everything.
    /// Order: muxer, frame source, encoder.
    fn finalize(&mut self) -> Result<RecordingResult, PipelineError> {
        let summary = self.muxer.stop()?;
        self.muxer.release();
        self.source.close()?;
        self.encoder.release()?;

        let file_path = self.muxer.file_path().to_path_buf();
        let checksum = sha256_file(&file_path)
            .map_err(|e| PipelineError::Storage(format!("failed to checksum {}: {}", file_path.display(), e)))?;
        let track = self
            .track
            .as_ref()
            .ok_or_else(|| ContractViolation::new("container finalized without a track"))?;

        let metadata = RecordingMetadata::new(
            track,
            summary.duration_secs,
            &file_path.to_string_lossy(),
            &checksum,
            self.clock.total_bytes(),
            summary.sample_count,
        );
        if self.config.write_metadata {
            write_metadata(&metadata, &file_path)?;
        }

        log::info!(
            "recording finalized: {} ({:.3}s, {} samples)",
            file_path.display(),
            summary.duration_secs,
            summary.sample_count
        );
        Ok(RecordingResult {
            file_path,
            duration_secs: summary.duration_secs,
            metadata,
            checksum,
        })
    }

    /// Release everything without finalizing and delete the partial file.
    fn abort(&mut self) {
        self.settled = true;
        discard_file(&mut self.muxer);
        remove_if_present(&metadata_path(self.muxer.file_path()));
        close_source(&mut self.source);
        self.encoder.abort();
        if let Err(e) = self.encoder.release() {
            log::warn!("encoder release during abort failed: {}", e);
        }
    }
}

impl<S: FrameSource, C: AudioCodec> Drop for SessionContext<S, C> {
    fn drop(&mut self) {
        if !self.settled {
            self.abort();
        }
    }
}

fn close_source<S: FrameSource>(source: &mut S) {
    if let Err(e) = source.close() {
        log::warn!("frame source close failed: {}", e);
    }
}

fn discard_file(muxer: &mut Mp4Muxer) {
    muxer.release();
    remove_if_present(muxer.file_path());
}

fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::warn!("discarded {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("failed to delete {}: {}", path.display(), e),
    }
}
