// Compression backend: ffmpeg for video, GIF and HEIF, native codecs for other stills
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::ffmpeg::FfmpegRunner;
use crate::presets::{gif_args, heif_args, image_profile, video_args};
use crate::still::compress_still;
use mediapress_core::domain::{dotted_extension, is_heif, MediaKind};
use mediapress_core::port::{CompressionError, CompressionRequest, Compressor};

/// Extension of every transcoded video
const VIDEO_OUTPUT_EXTENSION: &str = "mp4";
const GIF_OUTPUT_EXTENSION: &str = "gif";

pub struct FfmpegCompressor {
    runner: FfmpegRunner,
    output_dir: PathBuf,
}

impl FfmpegCompressor {
    /// # Arguments
    /// * `runner` - ffmpeg binary and optional per-encode deadline
    /// * `output_dir` - where `compressed_<stem>.<ext>` files are written
    pub fn new(runner: FfmpegRunner, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            output_dir: output_dir.into(),
        }
    }

    fn output_path(&self, source: &Path, extension: &str) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        self.output_dir
            .join(format!("compressed_{stem}.{extension}"))
    }
}

#[async_trait]
impl Compressor for FfmpegCompressor {
    async fn compress(
        &self,
        request: &CompressionRequest,
    ) -> Result<Option<PathBuf>, CompressionError> {
        let source = &request.source_path;
        let kind = MediaKind::from_path(source)
            .ok_or_else(|| CompressionError::UnsupportedMedia(dotted_extension(source)))?;

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let output = match kind {
            MediaKind::Video => {
                let output = self.output_path(source, VIDEO_OUTPUT_EXTENSION);
                info!(source = %source.display(), preset = %request.preset, "Compressing video");
                self.runner
                    .run(video_args(source, &output, request.preset))
                    .await?;
                output
            }
            MediaKind::AnimatedGif => {
                let output = self.output_path(source, GIF_OUTPUT_EXTENSION);
                info!(source = %source.display(), "Compressing GIF");
                self.runner.run(gif_args(source, &output)).await?;
                output
            }
            MediaKind::Image if is_heif(source) => {
                let output = self.output_path(source, request.image_format.extension());
                info!(source = %source.display(), format = %request.image_format, "Converting HEIF still");
                self.runner
                    .run(heif_args(
                        source,
                        &output,
                        request.preset,
                        request.image_format,
                    ))
                    .await?;
                output
            }
            MediaKind::Image => {
                let output = self.output_path(source, request.image_format.extension());
                let profile = image_profile(request.preset);
                info!(
                    source = %source.display(),
                    format = %request.image_format,
                    quality = profile.quality,
                    max_dimension = ?profile.max_dimension,
                    "Compressing image"
                );

                let (input, target, format) =
                    (source.clone(), output.clone(), request.image_format);
                tokio::task::spawn_blocking(move || {
                    compress_still(&input, &target, format, profile.quality, profile.max_dimension)
                })
                .await
                .map_err(|e| CompressionError::Failed(format!("Image encoder task failed: {e}")))??;
                output
            }
        };

        info!(output = %output.display(), "Compression finished");
        Ok(Some(output))
    }
}
