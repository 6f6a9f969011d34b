pub mod audio_format;
pub mod error;
pub mod extraction;
pub mod merger;
pub mod segments;
pub mod staging;
pub mod storage;
pub mod transcoder;
