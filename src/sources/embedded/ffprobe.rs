//! ffprobe backend: JSON description of format, streams, and chapters.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{FileProbe, ProbeChapter};
use crate::error::{Error, Result};
use crate::metadata::SourceKind;

pub const BACKEND: &str = "ffprobe";

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<Stream>,
    format: Option<Format>,
    #[serde(default)]
    chapters: Vec<Chapter>,
}

#[derive(Debug, Deserialize)]
struct Stream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    bit_rate: Option<String>,
    bits_per_raw_sample: Option<String>,
    #[serde(default)]
    bits_per_sample: u32,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    disposition: HashMap<String, i64>,
}

#[derive(Debug, Deserialize)]
struct Format {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Chapter {
    start_time: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Run ffprobe on one file, killing it if it outlives `timeout`
pub async fn probe(program: &Path, path: &Path, timeout: Duration) -> Result<FileProbe> {
    let mut command = Command::new(program);
    command
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-show_chapters",
        ])
        .arg(path)
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Err(_) => {
            return Err(Error::unavailable(
                SourceKind::Embedded,
                format!("ffprobe timed out after {}s", timeout.as_secs()),
                true,
            ))
        }
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::unavailable(
                SourceKind::Embedded,
                format!("{} not found", program.display()),
                false,
            ))
        }
        Ok(Err(e)) => {
            return Err(Error::unavailable(
                SourceKind::Embedded,
                format!("failed to run ffprobe: {}", e),
                false,
            ))
        }
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        return Err(Error::extraction(
            SourceKind::Embedded,
            format!("ffprobe exited with {} for {}", output.status, path.display()),
        ));
    }

    debug!(path = %path.display(), backend = BACKEND, "probed file");
    parse_output(path, &output.stdout)
}

/// Turn ffprobe's JSON into a probe result
pub fn parse_output(path: &Path, stdout: &[u8]) -> Result<FileProbe> {
    let raw: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| Error::extraction(SourceKind::Embedded, format!("invalid ffprobe JSON: {}", e)))?;
    let parsed: ProbeOutput = serde_json::from_value(raw.clone())
        .map_err(|e| Error::extraction(SourceKind::Embedded, format!("unexpected ffprobe JSON: {}", e)))?;

    let audio = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| {
            Error::extraction(
                SourceKind::Embedded,
                format!("no audio stream in {}", path.display()),
            )
        })?;

    // Cover art shows up as a video stream flagged attached_pic
    let cover = parsed
        .streams
        .iter()
        .find(|s| s.disposition.get("attached_pic").copied().unwrap_or(0) == 1);

    let format = parsed.format.as_ref();

    let chapters = parsed
        .chapters
        .iter()
        .enumerate()
        .map(|(i, c)| ProbeChapter {
            title: c
                .tags
                .get("title")
                .cloned()
                .unwrap_or_else(|| format!("Chapter {}", i + 1)),
            start_ms: c.start_time.as_deref().and_then(seconds_to_ms).unwrap_or(0),
        })
        .collect();

    let bit_depth = audio
        .bits_per_raw_sample
        .as_deref()
        .and_then(|b| b.parse::<u8>().ok())
        .or_else(|| u8::try_from(audio.bits_per_sample).ok())
        .filter(|b| *b > 0);

    Ok(FileProbe {
        path: path.to_path_buf(),
        backend: BACKEND,
        codec: audio.codec_name.clone(),
        duration_ms: format
            .and_then(|f| f.duration.as_deref())
            .and_then(seconds_to_ms),
        stream_bitrate_bps: audio.bit_rate.as_deref().and_then(|b| b.parse().ok()),
        container_bitrate_bps: format
            .and_then(|f| f.bit_rate.as_deref())
            .and_then(|b| b.parse().ok()),
        sample_rate: audio.sample_rate.as_deref().and_then(|s| s.parse().ok()),
        channels: audio.channels.and_then(|c| u8::try_from(c).ok()),
        bit_depth,
        size_bytes: format.and_then(|f| f.size.as_deref()).and_then(|s| s.parse().ok()),
        chapters,
        has_cover: cover.is_some(),
        cover_width: cover.and_then(|c| c.width),
        cover_height: cover.and_then(|c| c.height),
        asin: format.and_then(|f| tag_value(&f.tags, "asin")),
        raw,
    })
}

fn seconds_to_ms(s: &str) -> Option<u64> {
    let secs: f64 = s.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| (secs * 1000.0).round() as u64)
}

/// Tag keys vary in case between muxers
fn tag_value(tags: &HashMap<String, String>, key: &str) -> Option<String> {
    tags.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
