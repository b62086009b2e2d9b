//! Encoder driver and codec backends.

pub mod driver;
#[cfg(feature = "fdk-aac")]
pub mod fdk;

pub use driver::{Encoder, EncoderEvent, EncoderState, OutputBuffer, OUTPUT_SLOTS};
