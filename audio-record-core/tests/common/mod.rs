#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use audio_record_core::{
    AudioCodec, CaptureBackend, CaptureError, CaptureHandle, CodecBackend, CodecOutput, EncodedSample, EncoderError,
    EncoderFormat, FrameSource, PcmFormat, PipelineDelegate, PipelineError, PipelineState, RecordingResult,
    SampleFlags, TrackDescriptor,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// --- Capture side ---

pub struct TestHandle {
    authorized: AtomicBool,
}

impl TestHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            authorized: AtomicBool::new(true),
        })
    }

    pub fn revoke(&self) {
        self.authorized.store(false, Ordering::SeqCst);
    }
}

impl CaptureHandle for TestHandle {
    fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }

    fn description(&self) -> String {
        "synthetic capture".into()
    }
}

/// One scripted step of a synthetic capture stream.
#[derive(Debug, Clone)]
pub enum Step {
    Data(Vec<u8>),
    Fail(CaptureError),
}

#[derive(Debug, Default)]
pub struct SourceCounters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
}

impl SourceCounters {
    pub fn open_handles(&self) -> usize {
        self.opens.load(Ordering::SeqCst) - self.closes.load(Ordering::SeqCst)
    }
}

/// Replays a script, then ends or keeps producing silence.
pub struct SyntheticBackend {
    script: Vec<Step>,
    endless_silence: bool,
    reject_open: Option<CaptureError>,
    pub counters: Arc<SourceCounters>,
}

impl SyntheticBackend {
    pub fn scripted(script: Vec<Step>) -> Self {
        Self {
            script,
            endless_silence: false,
            reject_open: None,
            counters: Arc::new(SourceCounters::default()),
        }
    }

    /// Silence forever, paced roughly like a live device.
    pub fn endless() -> Self {
        Self {
            endless_silence: true,
            ..Self::scripted(Vec::new())
        }
    }

    pub fn rejecting(error: CaptureError) -> Self {
        Self {
            reject_open: Some(error),
            ..Self::scripted(Vec::new())
        }
    }
}

impl CaptureBackend for SyntheticBackend {
    type Source = SyntheticSource;

    fn open(&self, handle: Arc<dyn CaptureHandle>, format: &PcmFormat) -> Result<SyntheticSource, CaptureError> {
        if let Some(ref error) = self.reject_open {
            return Err(error.clone());
        }
        if !handle.is_authorized() {
            return Err(CaptureError::PermissionDenied);
        }
        if *format != PcmFormat::default() {
            return Err(CaptureError::UnsupportedFormat(format!("{:?}", format)));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(SyntheticSource {
            steps: self.script.iter().cloned().collect(),
            endless_silence: self.endless_silence,
            counters: Arc::clone(&self.counters),
            handle: Some(handle),
        })
    }
}

pub struct SyntheticSource {
    steps: VecDeque<Step>,
    endless_silence: bool,
    counters: Arc<SourceCounters>,
    handle: Option<Arc<dyn CaptureHandle>>,
}

impl FrameSource for SyntheticSource {
    fn read_into(&mut self, buffer: &mut [u8]) -> Result<usize, CaptureError> {
        let Some(ref handle) = self.handle else {
            return Ok(0);
        };
        if !handle.is_authorized() {
            return Err(CaptureError::Unavailable("authorization revoked".into()));
        }

        match self.steps.pop_front() {
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Data(mut data)) => {
                let n = data.len().min(buffer.len());
                buffer[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.steps.push_front(Step::Data(data.split_off(n)));
                }
                Ok(n)
            }
            None if self.endless_silence => {
                thread::sleep(Duration::from_millis(2));
                buffer.fill(0);
                Ok(buffer.len())
            }
            None => Ok(0),
        }
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        if self.handle.take().is_some() {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Split `total` bytes of silence into reads of the given sizes, cycling.
pub fn silence_in_chunks(total: usize, sizes: &[usize]) -> Vec<Step> {
    let mut steps = Vec::new();
    let mut remaining = total;
    for &size in sizes.iter().cycle() {
        if remaining == 0 {
            break;
        }
        let n = size.min(remaining);
        steps.push(Step::Data(vec![0; n]));
        remaining -= n;
    }
    steps
}

// --- Codec side ---

pub const FRAME_SAMPLES: usize = 1024;
const FRAME_PAYLOAD: usize = 8;

#[derive(Debug, Default)]
pub struct CodecCounters {
    pub created: AtomicUsize,
    pub released: AtomicUsize,
    /// `(presentation_time_us, bytes)` per submitted input buffer.
    pub submissions: Mutex<Vec<(u64, usize)>>,
}

/// Deterministic stand-in for AAC-LC: one fixed-size access unit per 1024
/// mono samples, final partial frame zero-padded.
pub struct FramingCodecBackend {
    pub counters: Arc<CodecCounters>,
    announce_format: bool,
    reject: bool,
    fail_after_inputs: Option<usize>,
    rewind_at_frame: Option<u64>,
}

impl FramingCodecBackend {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(CodecCounters::default()),
            announce_format: true,
            reject: false,
            fail_after_inputs: None,
            rewind_at_frame: None,
        }
    }

    /// A broken codec that emits samples without ever announcing its format.
    pub fn without_format() -> Self {
        Self {
            announce_format: false,
            ..Self::new()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::new()
        }
    }

    /// `queue_input` fails with a codec fault once `inputs` buffers were accepted.
    pub fn faulting_after(inputs: usize) -> Self {
        Self {
            fail_after_inputs: Some(inputs),
            ..Self::new()
        }
    }

    /// Frame `frame` is stamped at 0us, behind every earlier frame.
    pub fn rewinding_at(frame: u64) -> Self {
        Self {
            rewind_at_frame: Some(frame),
            ..Self::new()
        }
    }
}

impl CodecBackend for FramingCodecBackend {
    type Codec = FramingCodec;

    fn create(&self, format: &EncoderFormat) -> Result<FramingCodec, EncoderError> {
        if self.reject {
            return Err(EncoderError::ConfigurationRejected("no codec for format".into()));
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(FramingCodec {
            track: TrackDescriptor::from_format(format),
            announce_format: self.announce_format,
            fail_after_inputs: self.fail_after_inputs,
            rewind_at_frame: self.rewind_at_frame,
            inputs: 0,
            announced: false,
            pending_samples: 0,
            first_pts: None,
            frames: 0,
            outputs: VecDeque::new(),
            counters: Arc::clone(&self.counters),
        })
    }
}

pub struct FramingCodec {
    track: TrackDescriptor,
    announce_format: bool,
    fail_after_inputs: Option<usize>,
    rewind_at_frame: Option<u64>,
    inputs: usize,
    announced: bool,
    pending_samples: usize,
    first_pts: Option<u64>,
    frames: u64,
    outputs: VecDeque<CodecOutput>,
    counters: Arc<CodecCounters>,
}

impl FramingCodec {
    fn emit_frame(&mut self) {
        if self.announce_format && !self.announced {
            self.outputs.push_back(CodecOutput::FormatChanged(self.track.clone()));
            self.announced = true;
        }
        let pts = if self.rewind_at_frame == Some(self.frames) {
            0
        } else {
            self.frame_pts(self.frames)
        };
        self.frames += 1;
        self.outputs.push_back(CodecOutput::Sample(EncodedSample::new(
            vec![0x21; FRAME_PAYLOAD],
            pts,
            SampleFlags::KEY_FRAME,
        )));
    }

    fn frame_pts(&self, index: u64) -> u64 {
        self.first_pts.unwrap_or(0) + index * FRAME_SAMPLES as u64 * 1_000_000 / self.track.sample_rate as u64
    }
}

impl AudioCodec for FramingCodec {
    fn input_capacity(&self) -> usize {
        FRAME_SAMPLES * 2
    }

    fn queue_input(&mut self, pcm: &[u8], presentation_time_us: u64) -> Result<(), EncoderError> {
        if self.fail_after_inputs.is_some_and(|limit| self.inputs >= limit) {
            return Err(EncoderError::CodecFault("DSP stalled".into()));
        }
        self.inputs += 1;
        self.counters.submissions.lock().push((presentation_time_us, pcm.len()));
        self.first_pts.get_or_insert(presentation_time_us);
        self.pending_samples += pcm.len() / 2;
        while self.pending_samples >= FRAME_SAMPLES {
            self.pending_samples -= FRAME_SAMPLES;
            self.emit_frame();
        }
        Ok(())
    }

    fn queue_end_of_stream(&mut self) -> Result<(), EncoderError> {
        if self.pending_samples > 0 {
            self.pending_samples = 0;
            self.emit_frame();
        }
        let end = self.frame_pts(self.frames);
        self.outputs
            .push_back(CodecOutput::Sample(EncodedSample::end_of_stream(end)));
        Ok(())
    }

    fn dequeue_output(&mut self) -> Result<Option<CodecOutput>, EncoderError> {
        Ok(self.outputs.pop_front())
    }

    fn release(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

// --- Delegate ---

#[derive(Default)]
pub struct RecordingDelegate {
    pub states: Mutex<Vec<&'static str>>,
    pub errors: Mutex<Vec<PipelineError>>,
    pub finished: Mutex<Vec<RecordingResult>>,
}

impl PipelineDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: &PipelineState) {
        self.states.lock().push(state.name());
    }

    fn on_error(&self, error: &PipelineError) {
        self.errors.lock().push(error.clone());
    }

    fn on_recording_finished(&self, result: &RecordingResult) {
        self.finished.lock().push(result.clone());
    }
}

// --- Container inspection ---

/// Walk sibling boxes in `data`, returning `(type, body)` pairs.
fn boxes(data: &[u8]) -> Vec<([u8; 4], &[u8])> {
    let mut found = Vec::new();
    let mut pos = 0;
    while pos + 8 <= data.len() {
        let size32 = u32::from_be_bytes(data[pos..pos + 4].try_into().unwrap()) as usize;
        let kind: [u8; 4] = data[pos + 4..pos + 8].try_into().unwrap();
        let (header, size) = if size32 == 1 {
            let large = u64::from_be_bytes(data[pos + 8..pos + 16].try_into().unwrap()) as usize;
            (16, large)
        } else {
            (8, size32)
        };
        if size < header || pos + size > data.len() {
            break;
        }
        found.push((kind, &data[pos + header..pos + size]));
        pos += size;
    }
    found
}

fn child<'a>(data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
    boxes(data).into_iter().find(|(k, _)| k == kind).map(|(_, body)| body)
}

/// Top-level box types in file order.
pub fn top_level_boxes(path: &Path) -> Vec<String> {
    let data = std::fs::read(path).unwrap();
    boxes(&data)
        .into_iter()
        .map(|(kind, _)| String::from_utf8_lossy(&kind).into_owned())
        .collect()
}

/// `(timescale, duration, sample_count)` of the single audio track.
pub fn track_timing(path: &Path) -> (u32, u64, u32) {
    let data = std::fs::read(path).unwrap();
    let moov = child(&data, b"moov").expect("moov");
    let trak = child(moov, b"trak").expect("trak");
    let mdia = child(trak, b"mdia").expect("mdia");
    let mdhd = child(mdia, b"mdhd").expect("mdhd");
    // version/flags, creation, modification, timescale, duration
    let (timescale, duration) = if mdhd[0] == 1 {
        (
            u32::from_be_bytes(mdhd[20..24].try_into().unwrap()),
            u64::from_be_bytes(mdhd[24..32].try_into().unwrap()),
        )
    } else {
        (
            u32::from_be_bytes(mdhd[12..16].try_into().unwrap()),
            u32::from_be_bytes(mdhd[16..20].try_into().unwrap()) as u64,
        )
    };

    let stbl = child(child(mdia, b"minf").expect("minf"), b"stbl").expect("stbl");
    let stsz = child(stbl, b"stsz").expect("stsz");
    let sample_count = u32::from_be_bytes(stsz[8..12].try_into().unwrap());
    (timescale, duration, sample_count)
}

/// Poll until `predicate` holds or give up after about two seconds.
pub fn wait_until(mut predicate: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

pub fn recordings_in(dir: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect()
}
