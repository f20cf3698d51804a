//! Still Image Pipeline Tests
//!
//! Real compressor adapter driven through the orchestrator. Stills are encoded natively,
//! so these run without ffmpeg; routes that need ffmpeg point at a missing binary.

use image::{GenericImageView, Rgba, RgbaImage};
use mediapress_core::application::{JobOrchestrator, JobRegistry};
use mediapress_core::domain::{ImageFormat, JobState, Preset, SessionId};
use mediapress_core::port::id_provider::UuidProvider;
use mediapress_core::port::time_provider::SystemTimeProvider;
use mediapress_core::port::Thumbnailer;
use mediapress_infra_system::{FfmpegCompressor, FfmpegRunner, LocalFileStore, MediaThumbnailer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const MISSING_FFMPEG: &str = "/nonexistent/bin/ffmpeg";

struct Pipeline {
    dir: TempDir,
    registry: Arc<JobRegistry>,
    orchestrator: Arc<JobOrchestrator>,
}

fn pipeline() -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let files = Arc::new(LocalFileStore::new());
    let registry = Arc::new(JobRegistry::new(
        files.clone(),
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    ));
    let compressor = Arc::new(FfmpegCompressor::new(
        FfmpegRunner::new(MISSING_FFMPEG),
        dir.path().join("downloads"),
    ));
    let orchestrator = Arc::new(JobOrchestrator::new(registry.clone(), compressor, files));
    Pipeline {
        dir,
        registry,
        orchestrator,
    }
}

fn session() -> SessionId {
    SessionId::parse(&"p".repeat(32)).unwrap()
}

/// Half-transparent gradient, large enough to be downscaled by every resizing preset
fn write_png(path: &Path, width: u32, height: u32) {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, if x < width / 2 { 255 } else { 0 }])
    })
    .save(path)
    .unwrap();
}

async fn run_job(p: &Pipeline, source: PathBuf, preset: Preset, format: ImageFormat) -> String {
    let name = source.file_name().unwrap().to_string_lossy().into_owned();
    let job = p
        .registry
        .create(session(), name, source, preset, format)
        .await
        .unwrap();
    p.orchestrator.dispatch(job.id.clone()).await.unwrap();
    job.id
}

#[tokio::test]
async fn test_png_to_jpg_is_downscaled_and_flattened() {
    let p = pipeline();
    let source = p.dir.path().join("f1_poster.png");
    write_png(&source, 3000, 1500);

    let id = run_job(&p, source, Preset::Facebook, ImageFormat::Jpg).await;
    let job = p.registry.get(&id, None).unwrap();

    assert_eq!(job.state, JobState::Completed, "{:?}", job.error_message);
    assert_eq!(job.output_filename().as_deref(), Some("compressed_f1_poster.jpg"));
    let output = job.output_path.clone().unwrap();
    assert_eq!(job.output_size, Some(std::fs::metadata(&output).unwrap().len()));

    let decoded = image::open(&output).unwrap();
    assert_eq!(decoded.dimensions(), (2048, 1024));
    // Transparent half lands on white
    let px = decoded.to_rgb8().get_pixel(2000, 500).0;
    assert!(px.iter().all(|&c| c > 230), "{px:?}");
}

#[tokio::test]
async fn test_high_quality_keeps_dimensions() {
    let p = pipeline();
    let source = p.dir.path().join("f2_scan.png");
    write_png(&source, 2600, 300);

    let id = run_job(&p, source, Preset::HighQuality, ImageFormat::Png).await;
    let job = p.registry.get(&id, None).unwrap();

    assert_eq!(job.state, JobState::Completed, "{:?}", job.error_message);
    let decoded = image::open(job.output_path.unwrap()).unwrap();
    assert_eq!(decoded.dimensions(), (2600, 300));
}

#[tokio::test]
async fn test_corrupt_still_fails_the_job() {
    let p = pipeline();
    let source = p.dir.path().join("f3_broken.jpg");
    std::fs::write(&source, b"definitely not a jpeg").unwrap();

    let id = run_job(&p, source, Preset::Balanced, ImageFormat::Webp).await;
    let job = p.registry.get(&id, None).unwrap();

    assert_eq!(job.state, JobState::Failed);
    assert!(job.error_message.is_some());
    assert!(!job.is_download_ready());
}

#[tokio::test]
async fn test_missing_encoder_fails_video_and_gif_jobs() {
    let p = pipeline();
    for name in ["f4_clip.mp4", "f5_loop.gif"] {
        let source = p.dir.path().join(name);
        std::fs::write(&source, b"payload").unwrap();

        let id = run_job(&p, source, Preset::Balanced, ImageFormat::Jpg).await;
        let job = p.registry.get(&id, None).unwrap();

        assert_eq!(job.state, JobState::Failed, "{name}");
        let message = job.error_message.unwrap();
        assert!(message.starts_with("Failed to start encoder"), "{message}");
    }
}

#[tokio::test]
async fn test_thumbnail_of_uploaded_still() {
    let p = pipeline();
    let source = p.dir.path().join("f6_wide.png");
    write_png(&source, 1000, 250);

    let thumbnailer = MediaThumbnailer::new(FfmpegRunner::new(MISSING_FFMPEG));
    let bytes = thumbnailer.thumbnail(&source).await.unwrap();

    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!(decoded.dimensions(), (200, 50));
}
