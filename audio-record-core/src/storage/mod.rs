pub mod adts;
pub mod checksum;
pub mod metadata;
pub mod mp4_muxer;
