//! Audio quality classification from already-extracted technical fields.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::metadata::{AudioProfile, BitrateMode};

/// Container-independent audio format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Aac,
    Flac,
    Alac,
    Opus,
    Vorbis,
    Pcm,
    Other,
}

impl AudioFormat {
    /// Classify an ffprobe / lofty codec name
    pub fn from_codec(codec: &str) -> Self {
        let codec = codec.trim().to_ascii_lowercase();
        match codec.as_str() {
            "mp3" | "mp3float" | "mpeg" | "mp2" => AudioFormat::Mp3,
            "aac" | "aac_latm" | "he-aac" | "mp4a" => AudioFormat::Aac,
            "flac" => AudioFormat::Flac,
            "alac" => AudioFormat::Alac,
            "opus" => AudioFormat::Opus,
            "vorbis" => AudioFormat::Vorbis,
            c if c.starts_with("pcm") || c == "wav" => AudioFormat::Pcm,
            _ => AudioFormat::Other,
        }
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, AudioFormat::Flac | AudioFormat::Alac | AudioFormat::Pcm)
    }

    pub fn label(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "MP3",
            AudioFormat::Aac => "AAC",
            AudioFormat::Flac => "FLAC",
            AudioFormat::Alac => "ALAC",
            AudioFormat::Opus => "Opus",
            AudioFormat::Vorbis => "Vorbis",
            AudioFormat::Pcm => "PCM",
            AudioFormat::Other => "Other",
        }
    }
}

/// Encoding tier within a format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Encoding {
    Lossless,
    /// LAME -V0
    V0,
    V1,
    V2,
    Vbr { kbps: u32 },
    Cbr { kbps: u32 },
    Unknown,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Lossless => write!(f, "Lossless"),
            Encoding::V0 => write!(f, "V0 (VBR)"),
            Encoding::V1 => write!(f, "V1 (VBR)"),
            Encoding::V2 => write!(f, "V2 (VBR)"),
            Encoding::Vbr { kbps } => write!(f, "{} (VBR)", kbps),
            Encoding::Cbr { kbps } => write!(f, "{}", kbps),
            Encoding::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Detected format, encoding tier, and a 0.0-1.0 quality score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityInfo {
    pub format: AudioFormat,
    pub encoding: Encoding,
    pub score: f64,
}

/// Minimum average bitrates for the LAME VBR presets
const V0_MIN_KBPS: u32 = 220;
const V1_MIN_KBPS: u32 = 190;
const V2_MIN_KBPS: u32 = 170;

/// Classify the audio profile. `None` when neither codec nor bitrate is known.
pub fn detect(audio: &AudioProfile) -> Option<QualityInfo> {
    if audio.codec.is_none() && audio.bitrate_kbps.is_none() {
        return None;
    }

    let format = audio
        .codec
        .as_deref()
        .map(AudioFormat::from_codec)
        .unwrap_or(AudioFormat::Other);
    let lossless = audio.lossless.unwrap_or(false) || format.is_lossless();

    if lossless {
        return Some(QualityInfo {
            format,
            encoding: Encoding::Lossless,
            score: 1.0,
        });
    }

    let encoding = match (audio.bitrate_kbps, audio.bitrate_mode) {
        (None, _) => Encoding::Unknown,
        (Some(kbps), Some(BitrateMode::Vbr)) if format == AudioFormat::Mp3 => vbr_tier(kbps),
        (Some(kbps), Some(BitrateMode::Vbr)) => Encoding::Vbr { kbps },
        (Some(kbps), _) => Encoding::Cbr { kbps },
    };

    Some(QualityInfo {
        format,
        encoding,
        score: lossy_score(audio.bitrate_kbps),
    })
}

fn vbr_tier(kbps: u32) -> Encoding {
    if kbps >= V0_MIN_KBPS {
        Encoding::V0
    } else if kbps >= V1_MIN_KBPS {
        Encoding::V1
    } else if kbps >= V2_MIN_KBPS {
        Encoding::V2
    } else {
        Encoding::Vbr { kbps }
    }
}

fn lossy_score(kbps: Option<u32>) -> f64 {
    match kbps {
        None | Some(0) => 0.0,
        Some(k) if k >= 320 => 0.9,
        Some(k) if k >= 256 => 0.8,
        Some(k) if k >= 192 => 0.7,
        Some(k) if k >= 128 => 0.6,
        Some(k) if k >= 96 => 0.5,
        Some(k) if k >= 64 => 0.4,
        Some(_) => 0.2,
    }
}
