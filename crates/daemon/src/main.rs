//! Mediapress - Main Entry Point
//! HTTP surface + background compression jobs + retention sweeper

mod logging;
mod settings;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

// Import workspace crates
use mediapress_api_http::{ApiState, HttpServer};
use mediapress_core::application::{
    shutdown_channel, IntakeService, JobOrchestrator, JobRegistry, RetentionSweeper,
};
use mediapress_core::port::id_provider::UuidProvider;
use mediapress_core::port::time_provider::SystemTimeProvider;
use mediapress_infra_system::{
    capabilities, FfmpegCompressor, FfmpegRunner, LocalFileStore, MediaThumbnailer,
};
use settings::Settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let settings = Settings::load()?;

    // 2. Initialize logging
    let _log_guard = logging::init(settings.log_format()?, settings.log_dir.as_deref())?;

    info!("Mediapress v{} starting...", VERSION);

    for dir in [&settings.upload_dir, &settings.download_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    info!(
        upload_dir = %settings.upload_dir.display(),
        download_dir = %settings.download_dir.display(),
        max_file_size_mb = settings.max_file_size_mb,
        "Storage ready"
    );

    // 3. Probe media tooling once; /health reports it
    let caps = capabilities::probe(Path::new(&settings.ffmpeg_path)).await;
    if !caps.ffmpeg_available {
        warn!(ffmpeg = %settings.ffmpeg_path, "ffmpeg not found, video, GIF and HEIC jobs will fail");
    }
    info!(
        ffmpeg_available = caps.ffmpeg_available,
        heic_support = caps.heic_support,
        "Media capabilities probed"
    );

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let file_store = Arc::new(LocalFileStore::new());

    let registry = Arc::new(JobRegistry::new(
        file_store.clone(),
        id_provider.clone(),
        time_provider,
    ));

    let runner =
        FfmpegRunner::new(&settings.ffmpeg_path).with_deadline(settings.encode_deadline());
    let compressor = Arc::new(FfmpegCompressor::new(
        runner.clone(),
        settings.download_dir.clone(),
    ));
    let orchestrator = Arc::new(
        JobOrchestrator::new(registry.clone(), compressor, file_store.clone())
            .with_concurrency_limit(settings.max_concurrent_jobs),
    );
    let intake = Arc::new(IntakeService::new(
        registry.clone(),
        orchestrator,
        file_store.clone(),
        id_provider.clone(),
        settings.intake_policy(),
    ));

    let state = ApiState {
        registry: registry.clone(),
        intake,
        file_store,
        thumbnailer: Arc::new(MediaThumbnailer::new(runner)),
        id_provider,
        capabilities: caps,
    };

    // 5. Start Retention Sweeper
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let sweeper = RetentionSweeper::new(registry, settings.retention());
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_rx));

    // 6. Start HTTP server
    let server = HttpServer::new(settings.server_config(), state)
        .bind()
        .await
        .with_context(|| format!("Failed to bind {}:{}", settings.host, settings.port))?;
    let mut server_shutdown = shutdown_tx.token();
    let server_handle = tokio::spawn(server.serve(async move { server_shutdown.wait().await }));

    info!("System ready. Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown
    shutdown_tx.shutdown();
    match tokio::time::timeout(SHUTDOWN_GRACE, server_handle).await {
        Ok(Ok(Err(e))) => warn!(error = %e, "HTTP server stopped with error"),
        Ok(Err(e)) => warn!(error = %e, "HTTP server task failed"),
        Err(_) => warn!("HTTP server did not drain in time"),
        Ok(Ok(Ok(()))) => {}
    }
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, sweeper_handle).await;

    info!("Shutdown complete.");

    Ok(())
}
