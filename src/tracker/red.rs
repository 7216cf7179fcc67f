use std::collections::HashSet;

use super::{format_runtime, TrackerMapper, UploadFields};
use crate::error::{Error, Result};
use crate::metadata::{fields, AudiobookRecord};

/// RED's category ID for audiobooks
const AUDIOBOOK_TYPE: &str = "3";

#[derive(Debug, Clone, Copy, Default)]
pub struct RedMapper;

impl TrackerMapper for RedMapper {
    fn name(&self) -> &'static str {
        "red"
    }

    fn map(&self, record: &AudiobookRecord) -> Result<UploadFields> {
        let title = record.title.as_deref().ok_or_else(|| Error::InvalidRecord {
            field: fields::TITLE.to_string(),
        })?;
        let authors = record.author_names().ok_or_else(|| Error::InvalidRecord {
            field: fields::AUTHORS.to_string(),
        })?;

        let mut out = UploadFields::new();
        out.insert("type".to_string(), AUDIOBOOK_TYPE.to_string());
        out.insert("title".to_string(), format!("{} - {}", authors, title));

        if let Some(year) = record.year {
            out.insert("year".to_string(), year.to_string());
        }

        if let Some(quality) = record.audio.quality {
            out.insert("format".to_string(), quality.format.label().to_string());
            out.insert("bitrate".to_string(), quality.encoding.to_string());
        } else if let Some(codec) = &record.audio.codec {
            out.insert("format".to_string(), codec.to_ascii_uppercase());
        }

        let tags = tag_list(record);
        if !tags.is_empty() {
            out.insert("tags".to_string(), tags.join(","));
        }

        if let Some(url) = record.cover.as_ref().and_then(|c| c.url.clone()) {
            out.insert("image".to_string(), url);
        }

        out.insert("album_desc".to_string(), album_description(record, title, &authors));
        out.insert("release_desc".to_string(), release_description(record));

        Ok(out)
    }
}

/// Genres then tags as RED tags: lowercase words joined by dots
fn tag_list(record: &AudiobookRecord) -> Vec<String> {
    let mut seen = HashSet::new();
    record
        .genres
        .iter()
        .chain(&record.tags)
        .map(|t| red_tag(t))
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

/// `Sci-Fi & Fantasy` -> `sci.fi.fantasy`
fn red_tag(tag: &str) -> String {
    tag.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

fn album_description(record: &AudiobookRecord, title: &str, authors: &str) -> String {
    let mut lines = vec![format!("[size=4][b]{}[/b][/size]", title)];
    if let Some(subtitle) = &record.subtitle {
        lines.push(format!("[i]{}[/i]", subtitle));
    }
    lines.push(String::new());

    let series = record.series.as_ref().map(|series| match &record.volume {
        Some(volume) => format!("{} #{}", series, volume),
        None => series.clone(),
    });
    let facts = [
        ("Author", Some(authors.to_string())),
        ("Narrator", record.narrator_names()),
        ("Series", series),
        ("Publisher", record.publisher.clone()),
        ("Year", record.year.map(|y| y.to_string())),
        ("Runtime", record.audio.duration_sec.map(format_runtime)),
        ("Chapters", record.chapter_count.map(|n| n.to_string())),
    ];
    for (label, value) in facts {
        if let Some(value) = value {
            lines.push(format!("[b]{}:[/b] {}", label, value));
        }
    }

    if let Some(description) = &record.description {
        lines.push(String::new());
        lines.push(description.clone());
    }

    if !record.chapters.is_empty() {
        lines.push(String::new());
        lines.push("[spoiler=Chapters]".to_string());
        lines.extend(record.chapters.iter().map(|chapter| {
            format!("{} - {}", timestamp(chapter.start_ms / 1000), chapter.title)
        }));
        lines.push("[/spoiler]".to_string());
    }

    lines.join("\n").trim_end().to_string()
}

/// One line of technical facts, e.g. `MP3 / V0 (VBR) / 44.1 kHz / 2 ch / 21h 3m`
fn release_description(record: &AudiobookRecord) -> String {
    let audio = &record.audio;
    let mut parts = Vec::new();

    match (&audio.quality, &audio.codec) {
        (Some(q), _) => {
            parts.push(q.format.label().to_string());
            parts.push(q.encoding.to_string());
        }
        (None, Some(codec)) => parts.push(codec.to_ascii_uppercase()),
        (None, None) => {}
    }
    if let Some(rate) = audio.sample_rate {
        parts.push(format!("{} kHz", rate as f64 / 1000.0));
    }
    if let Some(depth) = audio.bit_depth {
        parts.push(format!("{}-bit", depth));
    }
    if let Some(channels) = audio.channels {
        parts.push(format!("{} ch", channels));
    }
    if let Some(duration) = audio.duration_sec {
        parts.push(format_runtime(duration));
    }
    match record.files.len() {
        0 => {}
        1 => parts.push("1 file".to_string()),
        n => parts.push(format!("{} files", n)),
    }

    parts.join(" / ")
}

fn timestamp(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AudioProfile, BitrateMode, Chapter, Contributor, CoverImage};
    use crate::normalize::format;

    fn record() -> AudiobookRecord {
        let mut audio = AudioProfile {
            codec: Some("mp3".to_string()),
            bitrate_kbps: Some(245),
            bitrate_mode: Some(BitrateMode::Vbr),
            sample_rate: Some(44_100),
            channels: Some(2),
            duration_sec: Some(75_780),
            ..AudioProfile::default()
        };
        audio.quality = format::detect(&audio);
        AudiobookRecord {
            title: Some("Dune".to_string()),
            authors: vec![Contributor::new("Frank Herbert")],
            narrators: vec![Contributor::new("Scott Brick")],
            series: Some("Dune".to_string()),
            volume: Some("01".to_string()),
            year: Some(1965),
            description: Some("Set on the desert planet Arrakis.".to_string()),
            genres: vec!["Science Fiction".to_string(), "Sci-Fi & Fantasy".to_string()],
            tags: vec!["science fiction".to_string(), "Classics".to_string()],
            chapters: vec![
                Chapter {
                    index: 1,
                    title: "Book One".to_string(),
                    start_ms: 0,
                },
                Chapter {
                    index: 2,
                    title: "Book Two".to_string(),
                    start_ms: 3_725_000,
                },
            ],
            chapter_count: Some(2),
            cover: Some(CoverImage {
                url: Some("https://example.com/dune.jpg".to_string()),
                ..CoverImage::default()
            }),
            audio,
            ..AudiobookRecord::default()
        }
    }

    #[test]
    fn test_core_fields() {
        let out = RedMapper.map(&record()).unwrap();
        assert_eq!(out["type"], "3");
        assert_eq!(out["title"], "Frank Herbert - Dune");
        assert_eq!(out["year"], "1965");
        assert_eq!(out["format"], "MP3");
        assert_eq!(out["bitrate"], "V0 (VBR)");
        assert_eq!(out["image"], "https://example.com/dune.jpg");
    }

    #[test]
    fn test_tags_are_dotted_and_deduped() {
        let out = RedMapper.map(&record()).unwrap();
        assert_eq!(out["tags"], "science.fiction,sci.fi.fantasy,classics");
    }

    #[test]
    fn test_album_description_is_bbcode() {
        let out = RedMapper.map(&record()).unwrap();
        let desc = &out["album_desc"];
        assert!(desc.starts_with("[size=4][b]Dune[/b][/size]"));
        assert!(desc.contains("[b]Narrator:[/b] Scott Brick"));
        assert!(desc.contains("[b]Series:[/b] Dune #01"));
        assert!(desc.contains("[b]Runtime:[/b] 21h 3m"));
        assert!(desc.contains("[b]Chapters:[/b] 2"));
        assert!(desc.contains("01:02:05 - Book Two"));
        assert!(desc.contains("Set on the desert planet Arrakis."));
    }

    #[test]
    fn test_album_description_layout() {
        let mut book = record();
        book.subtitle = Some("Deluxe Edition".to_string());
        book.volume = None;
        book.chapters.clear();
        let desc = RedMapper.map(&book).unwrap()["album_desc"].clone();
        let lines: Vec<&str> = desc.lines().collect();
        assert_eq!(lines[0], "[size=4][b]Dune[/b][/size]");
        assert_eq!(lines[1], "[i]Deluxe Edition[/i]");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "[b]Author:[/b] Frank Herbert");
        assert!(lines.contains(&"[b]Series:[/b] Dune"));
        assert_eq!(lines.last(), Some(&"Set on the desert planet Arrakis."));
        assert!(!desc.contains("[spoiler"));
    }

    #[test]
    fn test_release_description() {
        let out = RedMapper.map(&record()).unwrap();
        assert_eq!(out["release_desc"], "MP3 / V0 (VBR) / 44.1 kHz / 2 ch / 21h 3m");
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let minimal = AudiobookRecord {
            title: Some("Dune".to_string()),
            authors: vec![Contributor::new("Frank Herbert")],
            ..AudiobookRecord::default()
        };
        let out = RedMapper.map(&minimal).unwrap();
        for key in ["year", "format", "bitrate", "tags", "image"] {
            assert!(!out.contains_key(key), "unexpected {}", key);
        }
        assert_eq!(out["release_desc"], "");
    }

    #[test]
    fn test_missing_required_fields_fail_fast() {
        let mut no_title = record();
        no_title.title = None;
        assert!(matches!(
            RedMapper.map(&no_title),
            Err(Error::InvalidRecord { field }) if field == "title"
        ));

        let mut no_author = record();
        no_author.authors.clear();
        assert!(matches!(
            RedMapper.map(&no_author),
            Err(Error::InvalidRecord { field }) if field == "authors"
        ));
    }

    #[test]
    fn test_red_tag() {
        assert_eq!(red_tag("Science Fiction"), "science.fiction");
        assert_eq!(red_tag("  LitRPG "), "litrpg");
        assert_eq!(red_tag("&"), "");
    }
}
