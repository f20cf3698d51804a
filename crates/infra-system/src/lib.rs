// Mediapress Infrastructure - System Adapters
// Implements: FileStore, Compressor, Thumbnailer

pub mod capabilities;
pub mod ffmpeg;
pub mod ffmpeg_compressor;
pub mod local_file_store;
pub mod presets;
pub mod still;
pub mod thumbnailer;

pub use ffmpeg::FfmpegRunner;
pub use ffmpeg_compressor::FfmpegCompressor;
pub use local_file_store::LocalFileStore;
pub use thumbnailer::MediaThumbnailer;
