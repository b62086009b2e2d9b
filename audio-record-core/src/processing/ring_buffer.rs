/// Circular byte buffer for captured PCM.
///
/// Not synchronized. Wrap in `parking_lot::Mutex` for cross-thread access,
/// as `BufferedFrameSource` does.
///
/// Overflow behavior: drops the oldest bytes, rounded up to whole samples so
/// the stream stays sample-aligned.
#[derive(Debug)]
pub struct PcmRingBuffer {
    buffer: Vec<u8>,
    write_index: usize,
    read_index: usize,
    available: usize,
    capacity: usize,
    dropped: u64,
}

/// Alignment unit for overflow drops (one 16-bit sample).
const SAMPLE_ALIGN: usize = 2;

impl PcmRingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(SAMPLE_ALIGN);
        Self {
            buffer: vec![0; capacity],
            write_index: 0,
            read_index: 0,
            available: 0,
            capacity,
            dropped: 0,
        }
    }

    /// Append bytes, dropping the oldest ones on overflow.
    pub fn write(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        let data = if data.len() > self.capacity {
            let skip = data.len() - self.capacity;
            self.dropped += skip as u64;
            &data[skip..]
        } else {
            data
        };

        let overflow = (self.available + data.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            let aligned = overflow.div_ceil(SAMPLE_ALIGN) * SAMPLE_ALIGN;
            let drop = aligned.min(self.available);
            self.read_index = (self.read_index + drop) % self.capacity;
            self.available -= drop;
            self.dropped += drop as u64;
        }

        for &byte in data {
            self.buffer[self.write_index] = byte;
            self.write_index = (self.write_index + 1) % self.capacity;
        }
        self.available = (self.available + data.len()).min(self.capacity);
    }

    /// Move up to `out.len()` bytes into `out`. Returns the count copied.
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let to_read = out.len().min(self.available);
        for (i, slot) in out.iter_mut().take(to_read).enumerate() {
            *slot = self.buffer[(self.read_index + i) % self.capacity];
        }
        self.read_index = (self.read_index + to_read) % self.capacity;
        self.available -= to_read;
        to_read
    }

    /// Bytes currently available for reading.
    pub fn len(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// Bytes discarded by overflow since creation.
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped
    }

    pub fn reset(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
