// Thumbnail adapter: native decode for stills, one ffmpeg frame for videos and HEIF
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::ffmpeg::FfmpegRunner;
use crate::presets::video_frame_args;
use crate::still::jpeg_thumbnail;
use mediapress_core::domain::{dotted_extension, is_heif, MediaKind};
use mediapress_core::port::{CompressionError, Thumbnailer, THUMBNAIL_MAX_EDGE};

/// JPEG quality of previews
const THUMBNAIL_QUALITY: u8 = 70;

pub struct MediaThumbnailer {
    runner: FfmpegRunner,
}

impl MediaThumbnailer {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    /// Grab a single frame through ffmpeg into a scratch file and read it back
    async fn frame_grab(&self, source: &Path) -> Result<Vec<u8>, CompressionError> {
        let scratch = tempfile::Builder::new()
            .prefix("mediapress-thumb-")
            .suffix(".jpg")
            .tempfile()?;
        let target = scratch.path().to_path_buf();

        self.runner
            .run(video_frame_args(source, &target, THUMBNAIL_MAX_EDGE))
            .await?;

        let bytes = tokio::fs::read(&target).await?;
        if bytes.is_empty() {
            return Err(CompressionError::Failed(
                "Failed to generate video thumbnail".to_string(),
            ));
        }
        Ok(bytes)
    }
}

#[async_trait]
impl Thumbnailer for MediaThumbnailer {
    async fn thumbnail(&self, source: &Path) -> Result<Vec<u8>, CompressionError> {
        let kind = MediaKind::from_path(source)
            .ok_or_else(|| CompressionError::UnsupportedMedia(dotted_extension(source)))?;
        debug!(source = %source.display(), kind = ?kind, "Rendering thumbnail");

        match kind {
            MediaKind::Video => self.frame_grab(source).await,
            MediaKind::Image if is_heif(source) => self.frame_grab(source).await,
            MediaKind::Image | MediaKind::AnimatedGif => {
                let input = source.to_path_buf();
                tokio::task::spawn_blocking(move || {
                    jpeg_thumbnail(&input, THUMBNAIL_MAX_EDGE, THUMBNAIL_QUALITY)
                })
                .await
                .map_err(|e| CompressionError::Failed(format!("Thumbnail task failed: {e}")))?
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[tokio::test]
    async fn test_image_thumbnail_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("wide.jpg");
        RgbImage::from_pixel(800, 400, Rgb([10, 200, 10]))
            .save(&source)
            .unwrap();

        let thumb = MediaThumbnailer::new(FfmpegRunner::new("ffmpeg"))
            .thumbnail(&source)
            .await
            .unwrap();

        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 100));
    }

    #[tokio::test]
    async fn test_unknown_type_is_unsupported() {
        let err = MediaThumbnailer::new(FfmpegRunner::new("ffmpeg"))
            .thumbnail(Path::new("/tmp/readme.md"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompressionError::UnsupportedMedia(_)));
    }

    #[tokio::test]
    async fn test_video_thumbnail_without_encoder_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clip.mp4");
        std::fs::write(&source, b"xx").unwrap();

        let err = MediaThumbnailer::new(FfmpegRunner::new("/nonexistent/ffmpeg"))
            .thumbnail(&source)
            .await
            .unwrap_err();
        assert!(matches!(err, CompressionError::SpawnFailed(_)));
    }
}
