// Media classification, presets and output encodings

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Still images decoded natively
pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".webp", ".bmp", ".tiff", ".heic", ".heif",
];

/// Animated GIFs go through the encoder's palette pipeline
pub const GIF_EXTENSIONS: &[&str] = &[".gif"];

pub const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".mov", ".avi", ".mkv", ".webm", ".m4v", ".wmv", ".flv", ".mts", ".m2ts",
];

/// What kind of media a file is, judged by extension only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    AnimatedGif,
    Video,
}

impl MediaKind {
    /// Classify a lowercase, dot-prefixed extension (".jpg").
    pub fn from_extension(ext: &str) -> Option<Self> {
        if IMAGE_EXTENSIONS.contains(&ext) {
            Some(Self::Image)
        } else if GIF_EXTENSIONS.contains(&ext) {
            Some(Self::AnimatedGif)
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            Some(Self::Video)
        } else {
            None
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        Self::from_extension(&dotted_extension(path))
    }
}

/// Lowercase extension with a leading dot, or "" when the path has none.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// HEIC/HEIF stills cannot be decoded natively and are handed to the encoder binary.
pub fn is_heif(path: &Path) -> bool {
    matches!(dotted_extension(path).as_str(), ".heic" | ".heif")
}

/// Named bundle of encoder quality parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    #[default]
    Facebook,
    Instagram,
    HighQuality,
    Balanced,
    Aggressive,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Facebook,
        Preset::Instagram,
        Preset::HighQuality,
        Preset::Balanced,
        Preset::Aggressive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Facebook => "facebook",
            Preset::Instagram => "instagram",
            Preset::HighQuality => "high_quality",
            Preset::Balanced => "balanced",
            Preset::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DomainError::UnknownPreset(s.to_string()))
    }
}

/// Requested output encoding for still images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpg,
    Png,
    Webp,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(ImageFormat::Jpg),
            "png" => Ok(ImageFormat::Png),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(DomainError::UnknownImageFormat(other.to_string())),
        }
    }
}
