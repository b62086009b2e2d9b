pub mod capture_handle;
pub mod codec;
pub mod frame_source;
pub mod pipeline_delegate;
pub mod recording_session;
