// Encoder parameters per preset and ffmpeg argument builders
//
// The core only knows preset names; the concrete codec settings live here.

use mediapress_core::domain::{ImageFormat, Preset};
use std::ffi::OsString;
use std::path::Path;

/// Audio settings shared by every video preset
const AUDIO_CODEC: &str = "aac";
const AUDIO_BITRATE: &str = "128k";

/// Animated GIF pipeline: 15 fps, at most 480px wide, 128-colour palette, bayer dithering
const GIF_FILTER: &str = "fps=15,scale='min(480,iw)':-1:flags=lanczos,split[s0][s1];[s0]palettegen=max_colors=128[p];[s1][p]paletteuse=dither=bayer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoProfile {
    pub codec: &'static str,
    pub crf: u8,
    pub speed: &'static str,
    /// (maxrate, bufsize) for rate-capped H.264 presets
    pub rate_cap: Option<(&'static str, &'static str)>,
    /// H.265 output is tagged hvc1 so Apple players accept it
    pub hvc1_tag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProfile {
    /// 1-100, as understood by the JPEG encoder
    pub quality: u8,
    /// Longest edge after downscaling; `None` keeps the original size
    pub max_dimension: Option<u32>,
}

pub fn video_profile(preset: Preset) -> VideoProfile {
    match preset {
        Preset::Facebook => VideoProfile {
            codec: "libx264",
            crf: 23,
            speed: "medium",
            rate_cap: Some(("1638k", "3276k")),
            hvc1_tag: false,
        },
        Preset::Instagram => VideoProfile {
            codec: "libx264",
            crf: 23,
            speed: "medium",
            rate_cap: Some(("3500k", "7000k")),
            hvc1_tag: false,
        },
        Preset::HighQuality => VideoProfile {
            codec: "libx265",
            crf: 22,
            speed: "slow",
            rate_cap: None,
            hvc1_tag: true,
        },
        Preset::Balanced => VideoProfile {
            codec: "libx265",
            crf: 26,
            speed: "medium",
            rate_cap: None,
            hvc1_tag: true,
        },
        Preset::Aggressive => VideoProfile {
            codec: "libx265",
            crf: 30,
            speed: "fast",
            rate_cap: None,
            hvc1_tag: true,
        },
    }
}

pub fn image_profile(preset: Preset) -> ImageProfile {
    match preset {
        Preset::Facebook => ImageProfile {
            quality: 80,
            max_dimension: Some(2048),
        },
        Preset::Instagram => ImageProfile {
            quality: 80,
            max_dimension: Some(1440),
        },
        Preset::HighQuality => ImageProfile {
            quality: 88,
            max_dimension: None,
        },
        Preset::Balanced => ImageProfile {
            quality: 75,
            max_dimension: Some(2400),
        },
        Preset::Aggressive => ImageProfile {
            quality: 65,
            max_dimension: Some(1920),
        },
    }
}

fn base_args(input: &Path) -> Vec<OsString> {
    vec!["-y".into(), "-i".into(), input.as_os_str().to_owned()]
}

/// Transcode any video to MP4
pub fn video_args(input: &Path, output: &Path, preset: Preset) -> Vec<OsString> {
    let profile = video_profile(preset);
    let mut args = base_args(input);
    args.extend([
        "-c:v".into(),
        profile.codec.into(),
        "-crf".into(),
        profile.crf.to_string().into(),
        "-preset".into(),
        profile.speed.into(),
        "-c:a".into(),
        AUDIO_CODEC.into(),
        "-b:a".into(),
        AUDIO_BITRATE.into(),
    ]);
    if let Some((maxrate, bufsize)) = profile.rate_cap {
        args.extend([
            "-maxrate".into(),
            maxrate.into(),
            "-bufsize".into(),
            bufsize.into(),
        ]);
    }
    if profile.hvc1_tag {
        args.extend(["-tag:v".into(), "hvc1".into()]);
    }
    args.extend(["-movflags".into(), "+faststart".into()]);
    args.push(output.as_os_str().to_owned());
    args
}

pub fn gif_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args = base_args(input);
    args.extend(["-vf".into(), GIF_FILTER.into()]);
    args.push(output.as_os_str().to_owned());
    args
}

/// HEIC/HEIF still conversion, downscaled with the same rule as native stills
pub fn heif_args(input: &Path, output: &Path, preset: Preset, format: ImageFormat) -> Vec<OsString> {
    let profile = image_profile(preset);
    let mut args = base_args(input);
    if let Some(max) = profile.max_dimension {
        args.extend([
            "-vf".into(),
            format!(
                "scale='min({max},iw)':'min({max},ih)':force_original_aspect_ratio=decrease"
            )
            .into(),
        ]);
    }
    args.extend(["-frames:v".into(), "1".into()]);
    match format {
        ImageFormat::Jpg => {
            args.extend(["-q:v".into(), jpeg_qscale(profile.quality).to_string().into()])
        }
        ImageFormat::Webp => args.extend(["-lossless".into(), "1".into()]),
        ImageFormat::Png => args.extend(["-compression_level".into(), "9".into()]),
    }
    args.push(output.as_os_str().to_owned());
    args
}

/// Arguments for a single 200px-wide frame grab at one second in
pub fn video_frame_args(input: &Path, output: &Path, width: u32) -> Vec<OsString> {
    let mut args = base_args(input);
    args.extend([
        "-ss".into(),
        "00:00:01".into(),
        "-vframes".into(),
        "1".into(),
        "-vf".into(),
        format!("scale={width}:-1").into(),
    ]);
    args.push(output.as_os_str().to_owned());
    args
}

/// Map a 1-100 quality onto ffmpeg's MJPEG qscale (2 best .. 31 worst)
fn jpeg_qscale(quality: u8) -> u8 {
    let quality = quality.clamp(1, 100) as u32;
    (2 + (100 - quality) * 29 / 99) as u8
}
