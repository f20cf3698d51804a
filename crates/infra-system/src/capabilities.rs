// Host capability probe
use mediapress_core::port::MediaCapabilities;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Decoder that HEIC/HEIF stills need (their tiles are HEVC)
const HEVC_DECODER: &str = "hevc";

/// Ask the ffmpeg binary what it can do. A missing binary reports nothing available.
pub async fn probe(ffmpeg: &Path) -> MediaCapabilities {
    let ffmpeg_available = matches!(
        Command::new(ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await,
        Ok(status) if status.success()
    );
    if !ffmpeg_available {
        debug!(program = %ffmpeg.display(), "ffmpeg not available");
        return MediaCapabilities::default();
    }

    let heic_support = match Command::new(ffmpeg)
        .args(["-hide_banner", "-decoders"])
        .stderr(Stdio::null())
        .output()
        .await
    {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .lines()
            .any(|line| line.split_whitespace().nth(1) == Some(HEVC_DECODER)),
        _ => false,
    };

    MediaCapabilities {
        ffmpeg_available,
        heic_support,
    }
}
