use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::fields;
use super::partial::{is_meaningful, SourceKind};
use crate::normalize::format::QualityInfo;

/// Canonical, reconciled metadata for one audiobook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudiobookRecord {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    /// Display title; defaults to `title`
    pub album: Option<String>,
    /// "Title - Author" style label
    pub display_name: Option<String>,
    #[serde(default)]
    pub authors: Vec<Contributor>,
    #[serde(default)]
    pub narrators: Vec<Contributor>,
    pub series: Option<String>,
    /// Position in series, zero-padded when integral ("01", "1.5")
    pub volume: Option<String>,
    pub year: Option<i32>,
    pub release_date: Option<NaiveDate>,
    pub asin: Option<String>,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    /// ISO-639-1 code when known
    pub language: Option<String>,
    pub region: Option<String>,
    pub literature_type: Option<String>,
    pub is_adult: Option<bool>,
    pub rating: Option<f64>,
    pub description: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    pub chapter_count: Option<u32>,
    #[serde(default)]
    pub files: Vec<FileRef>,
    #[serde(default)]
    pub audio: AudioProfile,
    pub cover: Option<CoverImage>,
    /// Winning source per populated field
    #[serde(default)]
    pub field_sources: BTreeMap<String, SourceKind>,
    #[serde(default)]
    pub provenance: Vec<Provenance>,
    /// Non-fatal coercion and range problems found while building the record
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// An author or narrator, with the store's contributor ID when known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asin: Option<String>,
}

impl Contributor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asin: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub index: u32,
    pub title: String,
    pub start_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BitrateMode {
    Cbr,
    Vbr,
}

impl BitrateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BitrateMode::Cbr => "CBR",
            BitrateMode::Vbr => "VBR",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CBR" => Some(BitrateMode::Cbr),
            "VBR" => Some(BitrateMode::Vbr),
            _ => None,
        }
    }
}

/// Technical audio properties, measured from the files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioProfile {
    pub codec: Option<String>,
    pub bitrate_kbps: Option<u32>,
    pub bitrate_mode: Option<BitrateMode>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub bit_depth: Option<u8>,
    pub duration_sec: Option<u64>,
    pub size_bytes: Option<u64>,
    pub lossless: Option<bool>,
    /// Filled by the format detector after the merge
    pub quality: Option<QualityInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverImage {
    pub url: Option<String>,
    pub embedded: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Raw payload one source contributed, kept verbatim for debugging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    pub payload: Value,
}

impl AudiobookRecord {
    /// Build a record from a merged field map, coercing types.
    ///
    /// Unparsable values and integers too large for their field are dropped
    /// with a line in `warnings`. Range checks on kept values belong to the
    /// validator. `sources` names the winner per field;
    /// values derived from another field are credited to that field's source.
    pub fn from_fields(
        values: &Map<String, Value>,
        sources: BTreeMap<String, SourceKind>,
    ) -> Self {
        let mut warnings = Vec::new();
        let mut c = Coercer {
            values,
            warnings: &mut warnings,
        };

        let mut record = AudiobookRecord {
            title: c.string(fields::TITLE),
            subtitle: c.string(fields::SUBTITLE),
            album: c.string(fields::ALBUM),
            display_name: None,
            authors: c.contributors(fields::AUTHORS),
            narrators: c.contributors(fields::NARRATORS),
            series: c.string(fields::SERIES),
            volume: c.string(fields::VOLUME),
            year: c.integer_as(fields::YEAR),
            release_date: c.date(fields::RELEASE_DATE),
            asin: c.string(fields::ASIN).map(|a| a.to_ascii_uppercase()),
            isbn: c.string(fields::ISBN),
            publisher: c.string(fields::PUBLISHER),
            language: c.string(fields::LANGUAGE),
            region: c.string(fields::REGION),
            literature_type: c.string(fields::LITERATURE_TYPE),
            is_adult: c.boolean(fields::IS_ADULT),
            rating: c.float(fields::RATING),
            description: c.string(fields::DESCRIPTION),
            genres: c.strings(fields::GENRES),
            tags: c.strings(fields::TAGS),
            chapters: c.chapters(fields::CHAPTERS),
            chapter_count: c.integer_as(fields::CHAPTER_COUNT),
            files: c.files(fields::FILES),
            audio: AudioProfile {
                codec: c.string(fields::CODEC),
                bitrate_kbps: c.integer_as(fields::BITRATE_KBPS),
                bitrate_mode: c
                    .string(fields::BITRATE_MODE)
                    .and_then(|m| BitrateMode::parse(&m)),
                sample_rate: c.integer_as(fields::SAMPLE_RATE),
                channels: c.integer_as(fields::CHANNELS),
                bit_depth: c.integer_as(fields::BIT_DEPTH),
                duration_sec: c.integer(fields::DURATION_SEC),
                size_bytes: c.integer(fields::FILE_SIZE),
                lossless: c.boolean(fields::LOSSLESS),
                quality: None,
            },
            cover: None,
            field_sources: sources,
            provenance: Vec::new(),
            warnings: Vec::new(),
        };

        let cover_url = c.string(fields::COVER_URL);
        let has_cover = c.boolean(fields::HAS_COVER).unwrap_or(false);
        if cover_url.is_some() || has_cover {
            record.cover = Some(CoverImage {
                url: cover_url,
                embedded: has_cover,
                width: c.integer_as(fields::COVER_WIDTH),
                height: c.integer_as(fields::COVER_HEIGHT),
            });
        }

        // Chapter lists win over bare counts, counts over estimates
        if !record.chapters.is_empty() {
            record.chapter_count = u32::try_from(record.chapters.len()).ok();
            record.derive_source(fields::CHAPTER_COUNT, fields::CHAPTERS);
        } else if record.chapter_count.is_none() {
            record.chapter_count = c.integer_as(fields::CHAPTER_ESTIMATE);
            record.derive_source(fields::CHAPTER_COUNT, fields::CHAPTER_ESTIMATE);
        }

        if record.year.is_none() {
            if let Some(date) = record.release_date {
                record.year = Some(date.year());
                record.derive_source(fields::YEAR, fields::RELEASE_DATE);
            }
        }

        // Values dropped during coercion have no source
        let sources = std::mem::take(&mut record.field_sources);
        record.field_sources = sources
            .into_iter()
            .filter(|(field, _)| record.is_present(field) != Some(false))
            .collect();

        for warning in &warnings {
            tracing::warn!("{}", warning);
        }
        record.warnings = warnings;
        record
    }

    /// Credit `field` to whichever source supplied `origin`
    pub fn derive_source(&mut self, field: &str, origin: &str) {
        match self.field_sources.get(origin).copied() {
            Some(kind) => {
                self.field_sources.insert(field.to_string(), kind);
            }
            None => {
                self.field_sources.remove(field);
            }
        }
    }

    /// Author names joined for display
    pub fn author_names(&self) -> Option<String> {
        join_names(&self.authors)
    }

    pub fn narrator_names(&self) -> Option<String> {
        join_names(&self.narrators)
    }

    /// Whether a named field carries a value. `None` for unknown names.
    pub fn is_present(&self, field: &str) -> Option<bool> {
        let present = match field {
            fields::TITLE => self.title.is_some(),
            fields::SUBTITLE => self.subtitle.is_some(),
            fields::ALBUM => self.album.is_some(),
            fields::AUTHORS => !self.authors.is_empty(),
            fields::NARRATORS => !self.narrators.is_empty(),
            fields::SERIES => self.series.is_some(),
            fields::VOLUME => self.volume.is_some(),
            fields::YEAR => self.year.is_some(),
            fields::RELEASE_DATE => self.release_date.is_some(),
            fields::ASIN => self.asin.is_some(),
            fields::ISBN => self.isbn.is_some(),
            fields::PUBLISHER => self.publisher.is_some(),
            fields::LANGUAGE => self.language.is_some(),
            fields::REGION => self.region.is_some(),
            fields::LITERATURE_TYPE => self.literature_type.is_some(),
            fields::IS_ADULT => self.is_adult.is_some(),
            fields::RATING => self.rating.is_some(),
            fields::DESCRIPTION => self.description.is_some(),
            fields::GENRES => !self.genres.is_empty(),
            fields::TAGS => !self.tags.is_empty(),
            fields::CHAPTERS => !self.chapters.is_empty(),
            fields::CHAPTER_COUNT | fields::CHAPTER_ESTIMATE => self.chapter_count.is_some(),
            fields::FILES => !self.files.is_empty(),
            fields::CODEC => self.audio.codec.is_some(),
            fields::BITRATE_KBPS => self.audio.bitrate_kbps.is_some(),
            fields::BITRATE_MODE => self.audio.bitrate_mode.is_some(),
            fields::SAMPLE_RATE => self.audio.sample_rate.is_some(),
            fields::CHANNELS => self.audio.channels.is_some(),
            fields::BIT_DEPTH => self.audio.bit_depth.is_some(),
            fields::DURATION_SEC => self.audio.duration_sec.is_some(),
            fields::FILE_SIZE => self.audio.size_bytes.is_some(),
            fields::LOSSLESS => self.audio.lossless.is_some(),
            fields::COVER_URL => self.cover.as_ref().is_some_and(|c| c.url.is_some()),
            fields::HAS_COVER => self.cover.as_ref().is_some_and(|c| c.embedded),
            fields::COVER_WIDTH => self.cover.as_ref().is_some_and(|c| c.width.is_some()),
            fields::COVER_HEIGHT => self.cover.as_ref().is_some_and(|c| c.height.is_some()),
            _ => return None,
        };
        Some(present)
    }
}

fn join_names(people: &[Contributor]) -> Option<String> {
    if people.is_empty() {
        None
    } else {
        Some(
            people
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// Typed reads from the merged map, collecting warnings on the way
struct Coercer<'a> {
    values: &'a Map<String, Value>,
    warnings: &'a mut Vec<String>,
}

impl Coercer<'_> {
    fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field).filter(|v| is_meaningful(v))
    }

    fn invalid(&mut self, field: &str, value: &Value) {
        self.warnings
            .push(format!("{}: invalid-type ({})", field, value));
    }

    fn string(&mut self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => {
                let other = other.clone();
                self.invalid(field, &other);
                None
            }
        }
    }

    fn integer(&mut self, field: &str) -> Option<u64> {
        let value = self.get(field)?.clone();
        let parsed = match &value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<u64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            }
            _ => None,
        };
        if parsed.is_none() {
            self.invalid(field, &value);
        }
        parsed
    }

    /// An integer that must fit `T`; oversized values are dropped with a
    /// range warning instead of being truncated
    fn integer_as<T: TryFrom<u64>>(&mut self, field: &str) -> Option<T> {
        let n = self.integer(field)?;
        match T::try_from(n) {
            Ok(v) => Some(v),
            Err(_) => {
                self.warnings
                    .push(format!("{}: invalid-range ({})", field, n));
                None
            }
        }
    }

    fn float(&mut self, field: &str) -> Option<f64> {
        let value = self.get(field)?.clone();
        let parsed = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        if parsed.is_none() {
            self.invalid(field, &value);
        }
        parsed
    }

    fn boolean(&mut self, field: &str) -> Option<bool> {
        let value = self.get(field)?.clone();
        let parsed = match &value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_u64().map(|n| n != 0),
            _ => None,
        };
        if parsed.is_none() {
            self.invalid(field, &value);
        }
        parsed
    }

    fn date(&mut self, field: &str) -> Option<NaiveDate> {
        let value = self.get(field)?.clone();
        let parsed = value.as_str().and_then(parse_date);
        if parsed.is_none() {
            self.invalid(field, &value);
        }
        parsed
    }

    fn strings(&mut self, field: &str) -> Vec<String> {
        match self.get(field) {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            Some(other) => {
                let other = other.clone();
                self.invalid(field, &other);
                Vec::new()
            }
        }
    }

    fn contributors(&mut self, field: &str) -> Vec<Contributor> {
        match self.get(field) {
            None => Vec::new(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(Contributor::new)
                .collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(name) if !name.trim().is_empty() => {
                        Some(Contributor::new(name.trim()))
                    }
                    Value::Object(_) => serde_json::from_value::<Contributor>(item.clone())
                        .ok()
                        .filter(|c| !c.name.trim().is_empty()),
                    _ => None,
                })
                .collect(),
            Some(other) => {
                let other = other.clone();
                self.invalid(field, &other);
                Vec::new()
            }
        }
    }

    fn chapters(&mut self, field: &str) -> Vec<Chapter> {
        let Some(value) = self.get(field).cloned() else {
            return Vec::new();
        };
        match serde_json::from_value::<Vec<Chapter>>(value.clone()) {
            Ok(chapters) => chapters,
            Err(_) => {
                self.invalid(field, &value);
                Vec::new()
            }
        }
    }

    fn files(&mut self, field: &str) -> Vec<FileRef> {
        let Some(value) = self.get(field).cloned() else {
            return Vec::new();
        };
        match serde_json::from_value::<Vec<FileRef>>(value.clone()) {
            Ok(files) => files,
            Err(_) => {
                self.invalid(field, &value);
                Vec::new()
            }
        }
    }
}

/// Parse `YYYY-MM-DD`, an RFC 3339 timestamp, or a bare leading year
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Some(prefix) = s.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    let year: i32 = s.get(..4)?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, 1, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn from_json(value: Value) -> AudiobookRecord {
        AudiobookRecord::from_fields(&map(value), BTreeMap::new())
    }

    #[test]
    fn test_string_numbers_are_coerced() {
        let record = from_json(json!({
            "title": "Dune",
            "year": "1965",
            "duration_sec": 3600.4,
            "rating": "4.5",
        }));
        assert_eq!(record.year, Some(1965));
        assert_eq!(record.audio.duration_sec, Some(3600));
        assert_eq!(record.rating, Some(4.5));
        assert!(record.warnings.is_empty());
    }

    #[test]
    fn test_out_of_range_values_stay() {
        let record = from_json(json!({
            "year": 1200,
            "rating": 7.0,
        }));
        assert_eq!(record.year, Some(1200));
        assert_eq!(record.rating, Some(7.0));
        assert!(record.warnings.is_empty());
    }

    #[test]
    fn test_oversized_integers_are_dropped_not_truncated() {
        let record = from_json(json!({
            "channels": 300,
            "bit_depth": 24,
            "sample_rate": 5_000_000_000u64,
            "year": 3_000_000_000u64,
        }));
        assert_eq!(record.audio.channels, None);
        assert_eq!(record.audio.bit_depth, Some(24));
        assert_eq!(record.audio.sample_rate, None);
        assert_eq!(record.year, None);
        assert!(record.warnings.contains(&"channels: invalid-range (300)".to_string()));
        assert!(record
            .warnings
            .iter()
            .any(|w| w.starts_with("sample_rate: invalid-range")));
        assert!(record.warnings.iter().any(|w| w.starts_with("year: invalid-range")));
    }

    #[test]
    fn test_unparsable_values_are_dropped() {
        let record = from_json(json!({"year": "soon"}));
        assert_eq!(record.year, None);
        assert!(record.warnings.iter().any(|w| w.starts_with("year: invalid-type")));
    }

    #[test]
    fn test_contributors_accept_strings_and_objects() {
        let record = from_json(json!({
            "authors": [{"name": "Frank Herbert", "asin": "B000APZOQA"}, "Brian Herbert"],
            "narrators": "Scott Brick, Orlagh Cassidy",
        }));
        assert_eq!(record.authors.len(), 2);
        assert_eq!(record.authors[0].asin.as_deref(), Some("B000APZOQA"));
        assert_eq!(record.author_names().as_deref(), Some("Frank Herbert, Brian Herbert"));
        assert_eq!(
            record.narrator_names().as_deref(),
            Some("Scott Brick, Orlagh Cassidy")
        );
    }

    #[test]
    fn test_year_falls_back_to_release_date() {
        let record = from_json(json!({"release_date": "2006-08-01"}));
        assert_eq!(record.release_date, NaiveDate::from_ymd_opt(2006, 8, 1));
        assert_eq!(record.year, Some(2006));
    }

    #[test]
    fn test_chapter_list_overrides_count_and_estimate() {
        let record = from_json(json!({
            "chapters": [
                {"index": 0, "title": "Opening", "start_ms": 0},
                {"index": 1, "title": "Two", "start_ms": 60000},
            ],
            "chapter_count": 9,
            "chapter_estimate": 30,
        }));
        assert_eq!(record.chapter_count, Some(2));

        let estimated = from_json(json!({"chapter_estimate": 30}));
        assert_eq!(estimated.chapter_count, Some(30));
    }

    #[test]
    fn test_derived_values_take_their_origin_source() {
        let sources = BTreeMap::from([
            ("chapters".to_string(), SourceKind::Api),
            ("chapter_count".to_string(), SourceKind::Embedded),
            ("release_date".to_string(), SourceKind::Api),
        ]);
        let record = AudiobookRecord::from_fields(
            &map(json!({
                "chapters": [{"index": 0, "title": "Opening", "start_ms": 0}],
                "chapter_count": 5,
                "release_date": "2006-08-01",
            })),
            sources,
        );
        assert_eq!(record.chapter_count, Some(1));
        assert_eq!(record.field_sources.get("chapter_count"), Some(&SourceKind::Api));
        assert_eq!(record.year, Some(2006));
        assert_eq!(record.field_sources.get("year"), Some(&SourceKind::Api));
    }

    #[test]
    fn test_dropped_values_lose_their_source() {
        let sources = BTreeMap::from([
            ("year".to_string(), SourceKind::Path),
            ("chapter_estimate".to_string(), SourceKind::Embedded),
        ]);
        let record = AudiobookRecord::from_fields(
            &map(json!({"year": "soon", "chapter_estimate": 12})),
            sources,
        );
        assert_eq!(record.year, None);
        assert!(!record.field_sources.contains_key("year"));
        assert_eq!(
            record.field_sources.get("chapter_count"),
            Some(&SourceKind::Embedded)
        );
    }

    #[test]
    fn test_cover_from_url_or_embedded_flag() {
        let record = from_json(json!({
            "has_cover": true,
            "cover_width": 500,
            "cover_height": 500,
        }));
        let cover = record.cover.unwrap();
        assert!(cover.embedded);
        assert_eq!(cover.width, Some(500));
        assert_eq!(cover.url, None);
    }

    #[test]
    fn test_is_present_unknown_field() {
        let record = AudiobookRecord::default();
        assert_eq!(record.is_present("title"), Some(false));
        assert_eq!(record.is_present("mood"), None);
    }

    #[test]
    fn test_parse_date_variants() {
        assert_eq!(parse_date("2020-03-04"), NaiveDate::from_ymd_opt(2020, 3, 4));
        assert_eq!(
            parse_date("2020-03-04T00:00:00.000Z"),
            NaiveDate::from_ymd_opt(2020, 3, 4)
        );
        assert_eq!(parse_date("1965"), NaiveDate::from_ymd_opt(1965, 1, 1));
        assert_eq!(parse_date("unknown"), None);
    }
}
