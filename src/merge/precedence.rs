use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::metadata::{fields, SourceKind};

use SourceKind::{Api, Embedded, Path};

/// Measured properties: the file itself is the authority
const TECHNICAL: &[(&str, &[SourceKind])] = &[
    (fields::DURATION_SEC, &[Embedded, Api]),
    (fields::BITRATE_KBPS, &[Embedded]),
    (fields::BITRATE_MODE, &[Embedded]),
    (fields::CODEC, &[Embedded]),
    (fields::SAMPLE_RATE, &[Embedded]),
    (fields::CHANNELS, &[Embedded]),
    (fields::BIT_DEPTH, &[Embedded]),
    (fields::FILE_SIZE, &[Embedded]),
    (fields::FILES, &[Embedded]),
    (fields::LOSSLESS, &[Embedded]),
    (fields::HAS_COVER, &[Embedded]),
    (fields::COVER_WIDTH, &[Embedded]),
    (fields::COVER_HEIGHT, &[Embedded]),
    (fields::CHAPTER_COUNT, &[Embedded, Api]),
    (fields::CHAPTERS, &[Embedded, Api]),
    (fields::CHAPTER_ESTIMATE, &[Embedded]),
];

/// Descriptive fields: the store is authoritative, the release name is the
/// fallback. Embedded tags are left out on purpose; encoders fill them
/// inconsistently.
const DESCRIPTIVE: &[(&str, &[SourceKind])] = &[
    (fields::TITLE, &[Api, Path]),
    (fields::SUBTITLE, &[Api, Path]),
    (fields::ALBUM, &[Api, Path]),
    (fields::AUTHORS, &[Api, Path]),
    (fields::NARRATORS, &[Api, Path]),
    (fields::DESCRIPTION, &[Api, Path]),
    (fields::GENRES, &[Api, Path]),
    (fields::TAGS, &[Api, Path]),
    (fields::PUBLISHER, &[Api, Path]),
    (fields::YEAR, &[Api, Path]),
    (fields::RELEASE_DATE, &[Api]),
    (fields::LANGUAGE, &[Api]),
    (fields::REGION, &[Api]),
    (fields::LITERATURE_TYPE, &[Api]),
    (fields::IS_ADULT, &[Api]),
    (fields::RATING, &[Api]),
    (fields::ISBN, &[Api, Path]),
    (fields::COVER_URL, &[Api]),
];

/// Tracker-compliance fields: the canonical release name wins
const COMPLIANCE: &[(&str, &[SourceKind])] = &[
    (fields::SERIES, &[Path, Api]),
    (fields::VOLUME, &[Path, Api]),
    (fields::ASIN, &[Path, Api, Embedded]),
];

/// Fields merged as a case-insensitive union instead of first-match
const UNION_FIELDS: &[&str] = &[fields::GENRES, fields::TAGS];

/// Per-field ordered source lists, built once and shared by reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecedenceRules {
    order: BTreeMap<String, Vec<SourceKind>>,
    union_fields: BTreeSet<String>,
}

impl Default for PrecedenceRules {
    fn default() -> Self {
        let order = TECHNICAL
            .iter()
            .chain(DESCRIPTIVE)
            .chain(COMPLIANCE)
            .map(|(field, sources)| (field.to_string(), sources.to_vec()))
            .collect();
        let union_fields = UNION_FIELDS.iter().map(|f| f.to_string()).collect();
        Self {
            order,
            union_fields,
        }
    }
}

impl PrecedenceRules {
    /// No rules at all; every field shared by two sources is a conflict
    pub fn empty() -> Self {
        Self {
            order: BTreeMap::new(),
            union_fields: BTreeSet::new(),
        }
    }

    /// Defaults overridden by configured source names per field
    pub fn from_overrides(
        overrides: &BTreeMap<String, Vec<String>>,
        union_fields: Option<&[String]>,
    ) -> Result<Self> {
        let mut rules = Self::default();
        for (field, names) in overrides {
            if !fields::is_known(field) {
                return Err(Error::Config(format!(
                    "precedence given for unknown field '{}'",
                    field
                )));
            }
            let sources = names
                .iter()
                .map(|n| n.parse::<SourceKind>())
                .collect::<Result<Vec<_>>>()?;
            rules.set(field, sources);
        }
        if let Some(union_fields) = union_fields {
            rules.union_fields = union_fields.iter().cloned().collect();
        }
        Ok(rules)
    }

    /// Replace a field's order. Repeated sources keep their first position.
    pub fn set(&mut self, field: &str, sources: Vec<SourceKind>) {
        let mut deduped = Vec::with_capacity(sources.len());
        for source in sources {
            if !deduped.contains(&source) {
                deduped.push(source);
            }
        }
        self.order.insert(field.to_string(), deduped);
    }

    pub fn order(&self, field: &str) -> Option<&[SourceKind]> {
        self.order.get(field).map(Vec::as_slice)
    }

    pub fn is_union(&self, field: &str) -> bool {
        self.union_fields.contains(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SourceKind])> {
        self.order.iter().map(|(f, s)| (f.as_str(), s.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rationale() {
        let rules = PrecedenceRules::default();
        assert_eq!(rules.order("duration_sec"), Some(&[Embedded, Api][..]));
        assert_eq!(rules.order("title"), Some(&[Api, Path][..]));
        assert_eq!(rules.order("series"), Some(&[Path, Api][..]));
        assert_eq!(rules.order("asin").map(|s| s[0]), Some(Path));
        assert!(rules.is_union("genres"));
        assert!(!rules.is_union("title"));
    }

    #[test]
    fn test_embedded_never_ranks_descriptive_fields() {
        let rules = PrecedenceRules::default();
        for (field, _) in DESCRIPTIVE {
            let order = rules.order(field).unwrap();
            assert!(!order.contains(&Embedded), "{} consults embedded", field);
        }
    }

    #[test]
    fn test_overrides_replace_single_fields() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "chapters".to_string(),
            vec!["api".to_string(), "embedded".to_string()],
        );
        let rules = PrecedenceRules::from_overrides(&overrides, None).unwrap();
        assert_eq!(rules.order("chapters"), Some(&[Api, Embedded][..]));
        assert_eq!(rules.order("title"), Some(&[Api, Path][..]));
    }

    #[test]
    fn test_overrides_reject_unknown_names() {
        let mut overrides = BTreeMap::new();
        overrides.insert("title".to_string(), vec!["goodreads".to_string()]);
        assert!(matches!(
            PrecedenceRules::from_overrides(&overrides, None),
            Err(Error::UnknownSource(_))
        ));

        let mut overrides = BTreeMap::new();
        overrides.insert("mood".to_string(), vec!["api".to_string()]);
        assert!(matches!(
            PrecedenceRules::from_overrides(&overrides, None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_set_dedupes_sources() {
        let mut rules = PrecedenceRules::empty();
        rules.set("title", vec![Api, Path, Api]);
        assert_eq!(rules.order("title"), Some(&[Api, Path][..]));
    }
}
