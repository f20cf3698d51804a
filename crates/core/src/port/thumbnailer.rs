// Thumbnail Port

use super::compressor::CompressionError;
use async_trait::async_trait;
use std::path::Path;

/// Longest edge of a rendered thumbnail, in pixels
pub const THUMBNAIL_MAX_EDGE: u32 = 200;

/// Renders small JPEG previews of uploaded sources
#[async_trait]
pub trait Thumbnailer: Send + Sync {
    /// JPEG bytes bounded by `THUMBNAIL_MAX_EDGE`.
    /// `CompressionError::UnsupportedMedia` for sources that cannot be previewed.
    async fn thumbnail(&self, source: &Path) -> Result<Vec<u8>, CompressionError>;
}
