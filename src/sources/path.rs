//! Release-name parsing.
//!
//! Canonical tracker naming looks like
//! `Title - vol_NN (YYYY) (Author) {ASIN.B0XXXXXXXX} [Uploader]`, with every
//! segment after the title optional. Loosely named Audible rips carry the
//! ASIN in other spots instead (`B08G9PRS1K_Title`, `[B08G9PRS1K] Title`,
//! `Title-B08G9PRS1K`); those are recognized too.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::LazyLock;

use super::{MetadataSource, SourceInput, SourceOutcome};
use crate::metadata::{fields, PartialRecord, SourceKind};
use crate::scanner::is_audio_file;

static RELEASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<head>.+?)(?:\s+-\s+vol_(?P<volume>\d+(?:\.\d+)?))?(?:\s+\((?P<year>\d{4})\))?(?:\s+\((?P<author>[^()]+)\))?(?:\s+\{ASIN\.(?P<asin>[^{}]+)\})?(?:\s+\[(?P<uploader>[^\[\]]+)\])?\s*$",
    )
    .unwrap()
});

static ASIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^B[0-9A-Z]{9}$").unwrap());

static ASIN_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(B[0-9A-Z]{9})[_\s-]+(.+)$").unwrap());

static ASIN_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(B[0-9A-Z]{9})\]\s*(.+)$").unwrap());

static ASIN_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)[_\s-]+(B[0-9A-Z]{9})$").unwrap());

/// Whether a string is a well-formed audiobook ASIN
pub fn is_valid_asin(s: &str) -> bool {
    ASIN.is_match(s)
}

/// Fields recovered from a release name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathInfo {
    pub title: Option<String>,
    pub series: Option<String>,
    pub volume: Option<String>,
    pub year: Option<i32>,
    pub authors: Vec<String>,
    pub asin: Option<String>,
    pub uploader: Option<String>,
}

/// Parse a release name. Never fails; unmatched segments stay empty.
pub fn parse(name: &str) -> PathInfo {
    let name = name.trim();
    let mut info = PathInfo::default();

    let Some(caps) = RELEASE.captures(name) else {
        return info;
    };

    let mut head = caps
        .name("head")
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    info.asin = caps
        .name("asin")
        .map(|m| m.as_str().trim().to_ascii_uppercase())
        .filter(|a| is_valid_asin(a));

    if info.asin.is_none() {
        if let Some((asin, rest)) = loose_asin(&head) {
            info.asin = Some(asin);
            head = rest;
        }
    }

    info.volume = caps.name("volume").map(|m| m.as_str().to_string());
    info.year = caps.name("year").and_then(|m| m.as_str().parse().ok());
    info.authors = caps
        .name("author")
        .map(|m| split_authors(m.as_str()))
        .unwrap_or_default();
    info.uploader = caps.name("uploader").map(|m| m.as_str().trim().to_string());

    // "Series - Title - vol_NN" names the series explicitly; a bare
    // "Title - vol_NN" uses the title as the series name.
    match head.split_once(" - ") {
        Some((series, title)) if info.volume.is_some() => {
            info.series = Some(series.trim().to_string());
            info.title = Some(title.trim().to_string());
        }
        _ => {
            if info.volume.is_some() {
                info.series = Some(head.clone());
            }
            info.title = Some(head);
        }
    }
    info.title = info.title.filter(|t| !t.is_empty());
    info.series = info.series.filter(|s| !s.is_empty());

    info
}

fn loose_asin(head: &str) -> Option<(String, String)> {
    if let Some(caps) = ASIN_BRACKETS.captures(head).or_else(|| ASIN_PREFIX.captures(head)) {
        return Some((caps[1].to_string(), tidy(&caps[2])));
    }
    ASIN_SUFFIX
        .captures(head)
        .map(|caps| (caps[2].to_string(), tidy(&caps[1])))
}

/// Underscore-separated rips read better with spaces
fn tidy(s: &str) -> String {
    s.replace('_', " ").trim().to_string()
}

fn split_authors(s: &str) -> Vec<String> {
    s.split([',', '&'])
        .flat_map(|part| part.split(" and "))
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

/// The name that carries the naming convention: the file stem for audio
/// files, the final component for release directories.
pub fn release_name(path: &Path) -> Option<String> {
    let name = if is_audio_file(path) {
        path.file_stem()?
    } else {
        path.file_name()?
    };
    Some(name.to_string_lossy().to_string())
}

impl PathInfo {
    pub fn into_record(self, raw: &str) -> PartialRecord {
        let mut record = PartialRecord::new(SourceKind::Path).with_raw(Value::from(raw));
        record.set_opt(fields::TITLE, self.title);
        record.set_opt(fields::SERIES, self.series);
        record.set_opt(fields::VOLUME, self.volume);
        record.set_opt(fields::YEAR, self.year);
        if !self.authors.is_empty() {
            record.set(fields::AUTHORS, self.authors);
        }
        record.set_opt(fields::ASIN, self.asin);
        record
    }
}

/// Pure source over the release name; performs no I/O
#[derive(Debug, Clone, Copy, Default)]
pub struct PathInfoSource;

impl PathInfoSource {
    pub fn parse(&self, path: &Path) -> PartialRecord {
        let name = release_name(path).unwrap_or_default();
        parse(&name).into_record(&name)
    }
}

#[async_trait]
impl MetadataSource for PathInfoSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Path
    }

    async fn extract(&self, input: &SourceInput) -> SourceOutcome {
        let record = self.parse(&input.path);
        if record.is_empty() {
            SourceOutcome::Partial {
                record,
                reason: "release name did not match the naming convention".to_string(),
            }
        } else {
            SourceOutcome::Complete(record)
        }
    }
}
