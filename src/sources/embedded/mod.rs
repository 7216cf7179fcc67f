//! Technical properties measured from the audio files themselves.
//!
//! Each file goes through a fallback chain: ffprobe, then an in-process tag
//! reader (mp4ameta or lofty), then a bare filesystem stat. A release
//! directory is probed file by file and aggregated into one record.

pub mod ffprobe;
pub mod tags;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::{MetadataSource, SourceInput, SourceOutcome};
use crate::config::EmbeddedSettings;
use crate::error::{Error, Result};
use crate::metadata::{fields, BitrateMode, PartialRecord, SourceKind};
use crate::scanner::{self, is_mp4_family};

pub const FS_BACKEND: &str = "fs";

/// Bitrates closer than this (percent of the reported rate) count as CBR
pub const CBR_VARIANCE_THRESHOLD: f64 = 5.0;

/// Typical audiobook chapter length used to guess a chapter count
const TYPICAL_CHAPTER_SECS: u64 = 30 * 60;

/// What one backend learned about one file
#[derive(Debug, Clone, PartialEq)]
pub struct FileProbe {
    pub path: PathBuf,
    pub backend: &'static str,
    pub codec: Option<String>,
    pub duration_ms: Option<u64>,
    /// Bitrate the audio stream declares
    pub stream_bitrate_bps: Option<u64>,
    /// Bitrate the container declares, used when the stream has none
    pub container_bitrate_bps: Option<u64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub bit_depth: Option<u8>,
    pub size_bytes: Option<u64>,
    pub chapters: Vec<ProbeChapter>,
    pub has_cover: bool,
    pub cover_width: Option<u32>,
    pub cover_height: Option<u32>,
    pub asin: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeChapter {
    pub title: String,
    pub start_ms: u64,
}

impl FileProbe {
    /// Size only, for when no backend can read the file
    fn stat(path: &Path) -> Option<Self> {
        let size = std::fs::metadata(path).ok()?.len();
        Some(Self {
            path: path.to_path_buf(),
            backend: FS_BACKEND,
            codec: None,
            duration_ms: None,
            stream_bitrate_bps: None,
            container_bitrate_bps: None,
            sample_rate: None,
            channels: None,
            bit_depth: None,
            size_bytes: Some(size),
            chapters: Vec::new(),
            has_cover: false,
            cover_width: None,
            cover_height: None,
            asin: None,
            raw: json!({ "size_bytes": size }),
        })
    }

    fn reported_bitrate_bps(&self) -> Option<u64> {
        self.stream_bitrate_bps
            .or(self.container_bitrate_bps)
            .filter(|b| *b > 0)
    }
}

/// Classify CBR vs VBR from the bitrate implied by size and duration
/// against the bitrate the file reports.
///
/// `variance = |calculated - reported| / reported * 100`; under 5.0 is CBR.
pub fn classify_bitrate_mode(calculated_kbps: f64, reported_kbps: f64) -> Option<BitrateMode> {
    if reported_kbps.is_nan() || reported_kbps <= 0.0 || !calculated_kbps.is_finite() {
        return None;
    }
    let variance = (calculated_kbps - reported_kbps).abs() * 100.0 / reported_kbps;
    if variance < CBR_VARIANCE_THRESHOLD {
        Some(BitrateMode::Cbr)
    } else {
        Some(BitrateMode::Vbr)
    }
}

/// Guess a chapter count from runtime when the file has no markers
pub fn estimate_chapters(duration_sec: u64) -> Option<u64> {
    if duration_sec == 0 {
        return None;
    }
    Some(((duration_sec + TYPICAL_CHAPTER_SECS / 2) / TYPICAL_CHAPTER_SECS).max(1))
}

fn is_lossless_codec(codec: &str) -> bool {
    let codec = codec.to_ascii_lowercase();
    matches!(codec.as_str(), "flac" | "alac" | "wav") || codec.starts_with("pcm_")
}

/// Aggregate per-file probes into one embedded record
pub fn aggregate(probes: &[FileProbe]) -> PartialRecord {
    let mut backends: Vec<&str> = Vec::new();
    for probe in probes {
        if !backends.contains(&probe.backend) {
            backends.push(probe.backend);
        }
    }
    let mut record = PartialRecord::new(SourceKind::Embedded)
        .with_backend(&backends.join(","))
        .with_raw(Value::Array(probes.iter().map(|p| p.raw.clone()).collect()));

    let Some(first) = probes.first() else {
        return record;
    };

    let total_size: u64 = probes.iter().filter_map(|p| p.size_bytes).sum();
    let total_ms: u64 = probes.iter().filter_map(|p| p.duration_ms).sum();
    let duration_sec = (total_ms + 500) / 1000;

    // Duration-weighted average of what each file reports
    let weighted: Vec<(u64, u64)> = probes
        .iter()
        .filter_map(|p| Some((p.reported_bitrate_bps()?, p.duration_ms?)))
        .collect();
    let weight: u64 = weighted.iter().map(|(_, ms)| ms).sum();
    let reported_kbps = if weight > 0 {
        let bits: f64 = weighted
            .iter()
            .map(|(bps, ms)| *bps as f64 * *ms as f64)
            .sum();
        Some(bits / weight as f64 / 1000.0)
    } else {
        probes
            .iter()
            .find_map(|p| p.reported_bitrate_bps())
            .map(|bps| bps as f64 / 1000.0)
    };
    // Only files with both a size and a duration say anything about the
    // real bitrate; stat-only probes would inflate it
    let (measured_size, measured_ms) = probes
        .iter()
        .filter_map(|p| Some((p.size_bytes?, p.duration_ms?)))
        .filter(|(_, ms)| *ms > 0)
        .fold((0u64, 0u64), |(size, ms), (s, d)| (size + s, ms + d));
    let calculated_kbps = (measured_ms > 0 && measured_size > 0)
        .then(|| measured_size as f64 * 8.0 / measured_ms as f64);

    // Stream properties come from the first file a real backend read
    let stream = probes.iter().find(|p| p.codec.is_some()).unwrap_or(first);
    record.set_opt(fields::CODEC, stream.codec.clone());
    record.set_opt(fields::SAMPLE_RATE, stream.sample_rate);
    record.set_opt(fields::CHANNELS, stream.channels);
    record.set_opt(fields::BIT_DEPTH, stream.bit_depth);
    if let Some(codec) = &stream.codec {
        record.set(fields::LOSSLESS, is_lossless_codec(codec));
    }
    if total_size > 0 {
        record.set(fields::FILE_SIZE, total_size);
    }
    if total_ms > 0 {
        record.set(fields::DURATION_SEC, duration_sec);
    }
    if let Some(kbps) = reported_kbps.or(calculated_kbps) {
        record.set(fields::BITRATE_KBPS, kbps.round() as u64);
    }
    if let (Some(calculated), Some(reported)) = (calculated_kbps, reported_kbps) {
        if let Some(mode) = classify_bitrate_mode(calculated, reported) {
            record.set(fields::BITRATE_MODE, mode.as_str());
        }
    }

    let chapters = timeline(probes);
    if chapters.is_empty() {
        record.set_opt(fields::CHAPTER_ESTIMATE, estimate_chapters(duration_sec));
    } else {
        record.set(fields::CHAPTER_COUNT, chapters.len());
        record.set(fields::CHAPTERS, Value::Array(chapters));
    }

    record.set(
        fields::FILES,
        probes
            .iter()
            .map(|p| json!({ "path": p.path.display().to_string(), "size_bytes": p.size_bytes.unwrap_or(0) }))
            .collect::<Vec<_>>(),
    );

    if let Some(cover) = probes.iter().find(|p| p.has_cover) {
        record.set(fields::HAS_COVER, true);
        record.set_opt(fields::COVER_WIDTH, cover.cover_width);
        record.set_opt(fields::COVER_HEIGHT, cover.cover_height);
    }
    record.set_opt(fields::ASIN, probes.iter().find_map(|p| p.asin.clone()));

    record
}

/// One chapter list for the whole release. Per-file markers are offset by
/// the running duration; a multi-file release without markers gets one
/// chapter per file.
fn timeline(probes: &[FileProbe]) -> Vec<Value> {
    let has_markers = probes.iter().any(|p| !p.chapters.is_empty());
    if !has_markers && probes.len() < 2 {
        return Vec::new();
    }

    let mut chapters = Vec::new();
    let mut offset_ms = 0u64;
    for probe in probes {
        if has_markers {
            for chapter in &probe.chapters {
                chapters.push((chapter.title.clone(), offset_ms + chapter.start_ms));
            }
        } else {
            let title = probe
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            chapters.push((title, offset_ms));
        }
        offset_ms += probe.duration_ms.unwrap_or(0);
    }

    chapters
        .into_iter()
        .enumerate()
        .map(|(i, (title, start_ms))| json!({ "index": i + 1, "title": title, "start_ms": start_ms }))
        .collect()
}

/// Reads technical facts from the media files
#[derive(Debug)]
pub struct EmbeddedSource {
    settings: EmbeddedSettings,
    ffprobe_missing: AtomicBool,
}

impl EmbeddedSource {
    pub fn new(settings: EmbeddedSettings) -> Self {
        Self {
            settings,
            ffprobe_missing: AtomicBool::new(false),
        }
    }

    /// Probe one file, walking down the backend chain
    pub async fn probe_file(&self, path: &Path) -> Result<FileProbe> {
        if self.settings.use_ffprobe && !self.ffprobe_missing.load(Ordering::Relaxed) {
            let timeout = Duration::from_secs(self.settings.timeout_secs);
            match ffprobe::probe(&self.settings.ffprobe_path, path, timeout).await {
                Ok(probe) => return Ok(probe),
                Err(e) => {
                    if matches!(e, Error::SourceUnavailable { temporary: false, .. }) {
                        self.ffprobe_missing.store(true, Ordering::Relaxed);
                    }
                    debug!(path = %path.display(), error = %e, "ffprobe failed, falling back");
                }
            }
        }

        let owned = path.to_path_buf();
        let in_process = tokio::task::spawn_blocking(move || {
            if is_mp4_family(&owned) {
                tags::read_mp4(&owned).or_else(|_| tags::read_generic(&owned))
            } else {
                tags::read_generic(&owned)
            }
        })
        .await
        .map_err(|e| Error::extraction(SourceKind::Embedded, format!("tag reader panicked: {}", e)))
        .and_then(|r| r);

        match in_process {
            Ok(probe) => Ok(probe),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "tag readers failed, using file size only");
                FileProbe::stat(path).ok_or_else(|| {
                    Error::unavailable(
                        SourceKind::Embedded,
                        format!("cannot read {}", path.display()),
                        false,
                    )
                })
            }
        }
    }
}

impl Default for EmbeddedSource {
    fn default() -> Self {
        Self::new(EmbeddedSettings::default())
    }
}

#[async_trait]
impl MetadataSource for EmbeddedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Embedded
    }

    async fn extract(&self, input: &SourceInput) -> SourceOutcome {
        let files = match scanner::audio_files(&input.path) {
            Ok(files) => files,
            Err(e) => return SourceOutcome::Failed(e),
        };
        if files.is_empty() {
            return SourceOutcome::Failed(Error::extraction(
                SourceKind::Embedded,
                format!("no audio files under {}", input.path.display()),
            ));
        }

        let mut probes = Vec::with_capacity(files.len());
        let mut unreadable = Vec::new();
        for file in &files {
            match self.probe_file(file).await {
                Ok(probe) => {
                    if probe.backend == FS_BACKEND {
                        unreadable.push(file.display().to_string());
                    }
                    probes.push(probe);
                }
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "skipping unreadable file");
                    unreadable.push(file.display().to_string());
                }
            }
        }

        if probes.is_empty() {
            return SourceOutcome::Failed(Error::unavailable(
                SourceKind::Embedded,
                "no file could be read",
                false,
            ));
        }

        let record = aggregate(&probes);
        debug!(
            files = probes.len(),
            backend = record.backend().unwrap_or_default(),
            "embedded extraction finished"
        );

        if unreadable.is_empty() {
            SourceOutcome::Complete(record)
        } else {
            SourceOutcome::Partial {
                record,
                reason: format!("no audio backend could read: {}", unreadable.join(", ")),
            }
        }
    }
}
