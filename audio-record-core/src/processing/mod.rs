pub mod buffered_source;
pub mod pcm;
pub mod presentation_clock;
pub mod ring_buffer;
