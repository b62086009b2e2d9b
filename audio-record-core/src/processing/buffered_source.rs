//! Bridge from push-style platform capture callbacks to the pull-style
//! `FrameSource` contract.
//!
//! The platform's capture thread pushes PCM through a `PcmSink`; the encode
//! worker blocks in `BufferedFrameSource::read_into` until bytes arrive, the
//! producer finishes, or the source is closed.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::models::error::CaptureError;
use crate::processing::ring_buffer::PcmRingBuffer;
use crate::traits::capture_handle::CaptureHandle;
use crate::traits::frame_source::FrameSource;

#[derive(Debug, Clone, PartialEq, Eq)]
enum StreamStatus {
    Open,
    Finished,
    Failed(CaptureError),
    Closed,
}

struct Inner {
    ring: PcmRingBuffer,
    status: StreamStatus,
}

struct Shared {
    inner: Mutex<Inner>,
    data_ready: Condvar,
}

/// Create a connected producer/consumer pair holding up to `capacity` bytes.
pub fn pcm_channel(capacity: usize, handle: Arc<dyn CaptureHandle>) -> (PcmSink, BufferedFrameSource) {
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            ring: PcmRingBuffer::new(capacity),
            status: StreamStatus::Open,
        }),
        data_ready: Condvar::new(),
    });

    let sink = PcmSink {
        shared: Arc::clone(&shared),
    };
    let source = BufferedFrameSource {
        shared,
        handle: Some(handle),
        on_close: None,
    };
    (sink, source)
}

/// Producer half, owned by the platform capture thread.
#[derive(Clone)]
pub struct PcmSink {
    shared: Arc<Shared>,
}

impl PcmSink {
    /// Append captured PCM. Returns `false` once the consumer is gone.
    pub fn push(&self, pcm: &[u8]) -> bool {
        let mut inner = self.shared.inner.lock();
        if inner.status != StreamStatus::Open {
            return false;
        }
        inner.ring.write(pcm);
        drop(inner);
        self.shared.data_ready.notify_all();
        true
    }

    /// Graceful end: buffered bytes are still delivered, then reads return 0.
    pub fn finish(&self) {
        self.set_status(StreamStatus::Finished);
    }

    /// The platform revoked or lost the capture stream.
    pub fn fail(&self, error: CaptureError) {
        self.set_status(StreamStatus::Failed(error));
    }

    pub fn is_closed(&self) -> bool {
        self.shared.inner.lock().status == StreamStatus::Closed
    }

    /// Total bytes discarded because the consumer fell behind.
    pub fn dropped_bytes(&self) -> u64 {
        self.shared.inner.lock().ring.dropped_bytes()
    }

    fn set_status(&self, status: StreamStatus) {
        let mut inner = self.shared.inner.lock();
        if inner.status == StreamStatus::Open {
            inner.status = status;
        }
        drop(inner);
        self.shared.data_ready.notify_all();
    }
}

/// Consumer half implementing `FrameSource`.
pub struct BufferedFrameSource {
    shared: Arc<Shared>,
    handle: Option<Arc<dyn CaptureHandle>>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl BufferedFrameSource {
    /// Run `hook` once when the source is closed (e.g. stop a capture thread).
    pub fn with_close_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }
}

impl FrameSource for BufferedFrameSource {
    fn read_into(&mut self, buffer: &mut [u8]) -> Result<usize, CaptureError> {
        let Some(handle) = self.handle.as_ref() else {
            return Ok(0);
        };
        if !handle.is_authorized() {
            return Err(CaptureError::Unavailable(format!(
                "capture authorization revoked: {}",
                handle.description()
            )));
        }
        if buffer.is_empty() {
            return Ok(0);
        }

        let mut inner = self.shared.inner.lock();
        loop {
            if let StreamStatus::Failed(error) = &inner.status {
                return Err(error.clone());
            }
            if !inner.ring.is_empty() {
                return Ok(inner.ring.read_into(buffer));
            }
            if inner.status != StreamStatus::Open {
                return Ok(0);
            }
            self.shared.data_ready.wait(&mut inner);
        }
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        {
            let mut inner = self.shared.inner.lock();
            inner.status = StreamStatus::Closed;
            inner.ring.reset();
        }
        self.shared.data_ready.notify_all();

        if let Some(hook) = self.on_close.take() {
            hook();
        }
        log::debug!("frame source closed: {}", handle.description());
        Ok(())
    }
}

impl Drop for BufferedFrameSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
