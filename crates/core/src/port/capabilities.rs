// Media capabilities of the host, probed once at startup

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCapabilities {
    /// The encoder binary runs
    pub ffmpeg_available: bool,
    /// HEIC/HEIF sources can be decoded
    pub heic_support: bool,
}
