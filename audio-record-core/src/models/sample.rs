use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Per-sample flags attached to encoded output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SampleFlags(u32);

impl SampleFlags {
    pub const NONE: Self = Self(0);
    pub const KEY_FRAME: Self = Self(1);
    pub const CODEC_CONFIG: Self = Self(1 << 1);
    pub const END_OF_STREAM: Self = Self(1 << 2);

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl BitOr for SampleFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SampleFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for SampleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::KEY_FRAME) {
            names.push("KEY_FRAME");
        }
        if self.contains(Self::CODEC_CONFIG) {
            names.push("CODEC_CONFIG");
        }
        if self.contains(Self::END_OF_STREAM) {
            names.push("END_OF_STREAM");
        }
        if names.is_empty() {
            write!(f, "SampleFlags(NONE)")
        } else {
            write!(f, "SampleFlags({})", names.join(" | "))
        }
    }
}

/// One encoded access unit produced by the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSample {
    pub data: Vec<u8>,
    /// Presentation time relative to stream start, in microseconds.
    pub presentation_time_us: u64,
    pub flags: SampleFlags,
}

impl EncodedSample {
    pub fn new(data: Vec<u8>, presentation_time_us: u64, flags: SampleFlags) -> Self {
        Self {
            data,
            presentation_time_us,
            flags,
        }
    }

    /// Empty marker closing the output stream.
    pub fn end_of_stream(presentation_time_us: u64) -> Self {
        Self::new(Vec::new(), presentation_time_us, SampleFlags::END_OF_STREAM)
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.flags.contains(SampleFlags::END_OF_STREAM)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine() {
        let flags = SampleFlags::KEY_FRAME | SampleFlags::END_OF_STREAM;
        assert!(flags.contains(SampleFlags::KEY_FRAME));
        assert!(flags.contains(SampleFlags::END_OF_STREAM));
        assert!(!flags.contains(SampleFlags::CODEC_CONFIG));
        assert_eq!(format!("{:?}", flags), "SampleFlags(KEY_FRAME | END_OF_STREAM)");
    }

    #[test]
    fn end_of_stream_marker_is_empty() {
        let marker = EncodedSample::end_of_stream(1_000);
        assert!(marker.is_end_of_stream());
        assert!(marker.is_empty());
        assert_eq!(marker.presentation_time_us, 1_000);
    }
}
