//! Scoring and gating canonical records.
//!
//! Core rules are tracker-agnostic: required fields (errors), recommended
//! fields (warnings), range checks, and a completeness score. Tracker
//! profiles add their own hints on top without changing the core rules.

mod profile;

pub use profile::{profile_for, RedProfile, TrackerProfile};

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::metadata::{fields, AudiobookRecord};
use crate::sources::path::is_valid_asin;

const DEFAULT_REQUIRED: &[&str] = &[fields::TITLE, fields::AUTHORS];

const DEFAULT_RECOMMENDED: &[&str] = &[
    fields::YEAR,
    fields::NARRATORS,
    fields::ASIN,
    fields::PUBLISHER,
    fields::LANGUAGE,
    fields::DESCRIPTION,
    fields::GENRES,
    fields::DURATION_SEC,
];

const DEFAULT_CHECKLIST: &[&str] = &[
    fields::TITLE,
    fields::SUBTITLE,
    fields::AUTHORS,
    fields::NARRATORS,
    fields::SERIES,
    fields::VOLUME,
    fields::YEAR,
    fields::ASIN,
    fields::PUBLISHER,
    fields::LANGUAGE,
    fields::DESCRIPTION,
    fields::GENRES,
    fields::TAGS,
    fields::CHAPTERS,
    fields::DURATION_SEC,
    fields::BITRATE_KBPS,
    fields::CODEC,
    fields::COVER_URL,
];

/// Field lists the validator checks against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
    pub required: Vec<String>,
    pub recommended: Vec<String>,
    /// Fields counted for the completeness score
    pub checklist: Vec<String>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|f| f.to_string()).collect();
        Self {
            required: owned(DEFAULT_REQUIRED),
            recommended: owned(DEFAULT_RECOMMENDED),
            checklist: owned(DEFAULT_CHECKLIST),
        }
    }
}

impl ValidationRules {
    /// Defaults with any given list replaced. Unknown field names are a
    /// configuration error.
    pub fn from_lists(
        required: Option<&[String]>,
        recommended: Option<&[String]>,
        checklist: Option<&[String]>,
    ) -> Result<Self> {
        let mut rules = Self::default();
        for (list, target) in [
            (required, &mut rules.required),
            (recommended, &mut rules.recommended),
            (checklist, &mut rules.checklist),
        ] {
            if let Some(list) = list {
                if let Some(unknown) = list.iter().find(|f| !fields::is_known(f)) {
                    return Err(Error::Config(format!(
                        "unknown field '{}' in validation rules",
                        unknown
                    )));
                }
                *target = list.to_vec();
            }
        }
        Ok(rules)
    }
}

/// One problem with one field, e.g. `asin: missing`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    /// Short machine-readable code: missing, invalid-range, invalid-format, ...
    pub code: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            code: code.to_string(),
            message: message.into(),
        }
    }

    fn missing(field: &str) -> Self {
        Self::new(field, "missing", format!("{} is not set", field))
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<FieldIssue>,
    pub warnings: Vec<FieldIssue>,
    /// Share of checklist fields that carry a value, 0.0 to 1.0
    pub completeness: f64,
}

impl ValidationResult {
    /// Error codes grouped by field
    pub fn errors_by_field(&self) -> BTreeMap<String, Vec<String>> {
        group(&self.errors)
    }

    pub fn warnings_by_field(&self) -> BTreeMap<String, Vec<String>> {
        group(&self.warnings)
    }

    /// `Ok` when valid, otherwise the issues as an error
    pub fn into_result(self) -> std::result::Result<Self, ValidationError> {
        if self.valid {
            Ok(self)
        } else {
            Err(ValidationError {
                errors: self.errors,
                warnings: self.warnings,
            })
        }
    }
}

fn group(issues: &[FieldIssue]) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for issue in issues {
        map.entry(issue.field.clone())
            .or_default()
            .push(issue.code.clone());
    }
    map
}

/// A record that failed its required-field checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed: {}", join_issues(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldIssue>,
    pub warnings: Vec<FieldIssue>,
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: ValidationRules,
}

impl Validator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Tracker-agnostic validation. Data problems never raise.
    pub fn validate(&self, record: &AudiobookRecord) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for field in &self.rules.required {
            if record.is_present(field) != Some(true) {
                errors.push(FieldIssue::missing(field));
            }
        }
        for field in &self.rules.recommended {
            if record.is_present(field) != Some(true) {
                warnings.push(FieldIssue::missing(field));
            }
        }

        check_values(record, &mut warnings);

        // Coercion problems recorded while building the record
        for line in &record.warnings {
            if let Some(issue) = parse_warning(line) {
                if !errors.iter().any(|e| e.field == issue.field) {
                    push_unique(&mut warnings, issue);
                }
            }
        }

        ValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
            completeness: self.completeness(record),
        }
    }

    /// Core validation plus a tracker's hints
    pub fn validate_for(
        &self,
        record: &AudiobookRecord,
        profile: &dyn TrackerProfile,
    ) -> ValidationResult {
        let mut result = self.validate(record);
        let hints = profile.hints(record);
        for issue in hints.errors {
            push_unique(&mut result.errors, issue);
        }
        for issue in hints.warnings {
            push_unique(&mut result.warnings, issue);
        }
        result.valid = result.errors.is_empty();
        result
    }

    pub fn completeness(&self, record: &AudiobookRecord) -> f64 {
        if self.rules.checklist.is_empty() {
            return 1.0;
        }
        let present = self
            .rules
            .checklist
            .iter()
            .filter(|f| record.is_present(f) == Some(true))
            .count();
        present as f64 / self.rules.checklist.len() as f64
    }
}

/// One issue per field and code
fn push_unique(issues: &mut Vec<FieldIssue>, issue: FieldIssue) {
    if !issues
        .iter()
        .any(|i| i.field == issue.field && i.code == issue.code)
    {
        issues.push(issue);
    }
}

/// Valid year range: 1800 through next year
fn year_in_range(year: i32) -> bool {
    let next_year = chrono::Local::now().year() + 1;
    (1800..=next_year).contains(&year)
}

fn check_values(record: &AudiobookRecord, warnings: &mut Vec<FieldIssue>) {
    let mut push = |issue: FieldIssue| push_unique(warnings, issue);
    if let Some(year) = record.year {
        if !year_in_range(year) {
            push(FieldIssue::new(
                fields::YEAR,
                "invalid-range",
                format!("{} is outside 1800 through next year", year),
            ));
        }
    }
    if let Some(rating) = record.rating {
        if !(0.0..=5.0).contains(&rating) {
            push(FieldIssue::new(
                fields::RATING,
                "invalid-range",
                format!("{} is outside 0-5", rating),
            ));
        }
    }
    if record.audio.duration_sec == Some(0) {
        push(FieldIssue::new(
            fields::DURATION_SEC,
            "invalid-range",
            "duration is zero",
        ));
    }
    if let Some(asin) = &record.asin {
        if !is_valid_asin(asin) {
            push(FieldIssue::new(
                fields::ASIN,
                "invalid-format",
                format!("'{}' does not look like an ASIN", asin),
            ));
        }
    }
    if let Some(language) = &record.language {
        if language.len() != 2 || !language.chars().all(|c| c.is_ascii_lowercase()) {
            push(FieldIssue::new(
                fields::LANGUAGE,
                "unknown-language",
                format!("'{}' has no ISO-639-1 code", language),
            ));
        }
    }
}

/// Turn a record warning like `year: invalid-type (abc)` back into an issue
fn parse_warning(line: &str) -> Option<FieldIssue> {
    let (field, rest) = line.split_once(": ")?;
    let code = rest.split(" (").next()?.trim();
    if code.is_empty() {
        return None;
    }
    Some(FieldIssue::new(field, code, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Contributor;

    fn complete_record() -> AudiobookRecord {
        AudiobookRecord {
            title: Some("Dune".to_string()),
            authors: vec![Contributor::new("Frank Herbert")],
            narrators: vec![Contributor::new("Scott Brick")],
            year: Some(1965),
            asin: Some("B000FC1ZCS".to_string()),
            publisher: Some("Macmillan Audio".to_string()),
            language: Some("en".to_string()),
            description: Some("Arrakis.".to_string()),
            genres: vec!["Science Fiction".to_string()],
            ..AudiobookRecord::default()
        }
    }

    #[test]
    fn test_missing_required_fields_are_errors() {
        let record = AudiobookRecord {
            year: Some(1965),
            ..AudiobookRecord::default()
        };
        let result = Validator::default().validate(&record);
        assert!(!result.valid);
        let errors = result.errors_by_field();
        assert_eq!(errors.get("title"), Some(&vec!["missing".to_string()]));
        assert_eq!(errors.get("authors"), Some(&vec!["missing".to_string()]));
    }

    #[test]
    fn test_missing_recommended_fields_are_warnings() {
        let mut record = complete_record();
        record.asin = None;
        let result = Validator::default().validate(&record);
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.to_string() == "asin: missing"));
    }

    #[test]
    fn test_out_of_range_year_warns() {
        let mut record = complete_record();
        record.year = Some(1492);
        let result = Validator::default().validate(&record);
        assert!(result.valid);
        assert_eq!(
            result.warnings_by_field().get("year"),
            Some(&vec!["invalid-range".to_string()])
        );
    }

    #[test]
    fn test_record_warnings_surface() {
        let mut record = complete_record();
        record.warnings.push("rating: invalid-type (\"great\")".to_string());
        let result = Validator::default().validate(&record);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field == "rating" && w.code == "invalid-type"));
    }

    #[test]
    fn test_unknown_language_warns() {
        let mut record = complete_record();
        record.language = Some("klingon".to_string());
        let result = Validator::default().validate(&record);
        assert!(result.warnings.iter().any(|w| w.code == "unknown-language"));
    }

    #[test]
    fn test_completeness_is_monotonic() {
        let validator = Validator::default();
        let mut record = AudiobookRecord::default();
        let mut last = validator.completeness(&record);
        assert_eq!(last, 0.0);

        let steps: [fn(&mut AudiobookRecord); 10] = [
            |r| r.year = Some(1965),
            |r| r.narrators = vec![Contributor::new("Scott Brick")],
            |r| r.asin = Some("B000FC1ZCS".to_string()),
            |r| r.publisher = Some("Macmillan Audio".to_string()),
            |r| r.language = Some("en".to_string()),
            |r| r.description = Some("Arrakis.".to_string()),
            |r| r.genres = vec!["Science Fiction".to_string()],
            |r| r.audio.duration_sec = Some(75_780),
            |r| r.title = Some("Dune".to_string()),
            |r| r.rating = Some(4.5),
        ];
        for step in steps {
            step(&mut record);
            let next = validator.completeness(&record);
            assert!(next >= last, "completeness dropped from {} to {}", last, next);
            last = next;
        }
        assert!(last > 0.0 && last <= 1.0);
    }

    #[test]
    fn test_result_shape_serializes() {
        let result = Validator::default().validate(&AudiobookRecord::default());
        let json = serde_json::to_value(&result).unwrap();
        for key in ["valid", "errors", "warnings", "completeness"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_into_result() {
        let invalid = Validator::default().validate(&AudiobookRecord::default());
        let err = invalid.into_result().unwrap_err();
        assert!(err.to_string().contains("title: missing"));

        let valid = Validator::default().validate(&complete_record());
        assert!(valid.into_result().is_ok());
    }

    #[test]
    fn test_rules_reject_unknown_fields() {
        let required = vec!["title".to_string(), "mood".to_string()];
        assert!(matches!(
            ValidationRules::from_lists(Some(&required), None, None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_empty_checklist_is_complete() {
        let rules = ValidationRules::from_lists(None, None, Some(&[])).unwrap();
        assert_eq!(Validator::new(rules).completeness(&AudiobookRecord::default()), 1.0);
    }
}
