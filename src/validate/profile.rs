//! Per-tracker hints layered on top of the core rules.

use super::FieldIssue;
use crate::metadata::{fields, AudiobookRecord};
use crate::normalize::Encoding;

/// Issues a tracker adds beyond the core rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hints {
    pub errors: Vec<FieldIssue>,
    pub warnings: Vec<FieldIssue>,
}

pub trait TrackerProfile: Send + Sync {
    fn name(&self) -> &'static str;

    fn hints(&self, record: &AudiobookRecord) -> Hints;
}

/// Look up a profile by its command-line name
pub fn profile_for(name: &str) -> Option<Box<dyn TrackerProfile>> {
    match name.to_ascii_lowercase().as_str() {
        "red" => Some(Box::new(RedProfile)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RedProfile;

impl TrackerProfile for RedProfile {
    fn name(&self) -> &'static str {
        "red"
    }

    fn hints(&self, record: &AudiobookRecord) -> Hints {
        let mut hints = Hints::default();

        if record.album.is_none() {
            hints.warnings.push(FieldIssue::new(
                fields::ALBUM,
                "missing",
                "RED wants an album; the title will be used",
            ));
        }

        if record.tags.is_empty() && record.genres.is_empty() {
            hints.errors.push(FieldIssue::new(
                fields::TAGS,
                "missing",
                "RED requires at least one tag",
            ));
        }

        if !record.cover.as_ref().is_some_and(|c| c.url.is_some()) {
            hints.warnings.push(FieldIssue::new(
                fields::COVER_URL,
                "missing",
                "RED uploads need a cover image URL",
            ));
        }

        let encoding = record.audio.quality.map(|q| q.encoding);
        if matches!(encoding, None | Some(Encoding::Unknown)) {
            hints.warnings.push(FieldIssue::new(
                "encoding",
                "undetectable",
                "bitrate and codec are needed to pick an encoding",
            ));
        }

        hints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AudioProfile, Contributor, CoverImage};
    use crate::normalize::format;
    use crate::validate::Validator;

    fn uploadable() -> AudiobookRecord {
        let mut audio = AudioProfile {
            codec: Some("mp3".to_string()),
            bitrate_kbps: Some(64),
            ..AudioProfile::default()
        };
        audio.quality = format::detect(&audio);
        AudiobookRecord {
            title: Some("Dune".to_string()),
            album: Some("Dune".to_string()),
            authors: vec![Contributor::new("Frank Herbert")],
            genres: vec!["Science Fiction".to_string()],
            cover: Some(CoverImage {
                url: Some("https://example.com/dune.jpg".to_string()),
                ..CoverImage::default()
            }),
            audio,
            ..AudiobookRecord::default()
        }
    }

    #[test]
    fn test_clean_record_has_no_hints() {
        assert_eq!(RedProfile.hints(&uploadable()), Hints::default());
    }

    #[test]
    fn test_missing_tags_is_an_error() {
        let mut record = uploadable();
        record.genres.clear();
        let hints = RedProfile.hints(&record);
        assert_eq!(hints.errors.len(), 1);
        assert_eq!(hints.errors[0].to_string(), "tags: missing");
    }

    #[test]
    fn test_soft_hints_are_warnings() {
        let mut record = uploadable();
        record.album = None;
        record.cover = None;
        record.audio = AudioProfile::default();
        let hints = RedProfile.hints(&record);
        assert!(hints.errors.is_empty());
        let fields: Vec<&str> = hints.warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(fields, vec!["album", "cover_url", "encoding"]);
    }

    #[test]
    fn test_profile_errors_fail_validation() {
        let mut record = uploadable();
        record.genres.clear();
        let validator = Validator::default();
        assert!(validator.validate(&record).valid);
        assert!(!validator.validate_for(&record, &RedProfile).valid);
    }

    #[test]
    fn test_profile_lookup() {
        assert_eq!(profile_for("RED").map(|p| p.name()), Some("red"));
        assert!(profile_for("ptp").is_none());
    }
}
