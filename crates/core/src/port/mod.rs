// Port Layer - Interfaces for external dependencies

pub mod capabilities;
pub mod compressor;
pub mod file_store;
pub mod id_provider; // For deterministic testing
pub mod thumbnailer;
pub mod time_provider;

// Re-exports
pub use capabilities::MediaCapabilities;
pub use compressor::{CompressionError, CompressionRequest, Compressor};
pub use file_store::{remove_best_effort, FileReader, FileStore};
pub use id_provider::IdProvider;
pub use thumbnailer::{Thumbnailer, THUMBNAIL_MAX_EDGE};
pub use time_provider::TimeProvider;
