//! Error types for the extraction pipeline.
//!
//! Library modules return [`Error`]; the binary wraps it in `anyhow` for
//! context-rich reporting.

use crate::metadata::SourceKind;

/// Pipeline result type.
pub type Result<T> = std::result::Result<T, Error>;

/// A source that failed during one extraction, kept for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub source: SourceKind,
    pub reason: String,
}

impl std::fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.source, self.reason)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source could not be reached or lacks a runtime dependency.
    /// `temporary` separates retry-worthy conditions (rate limits, 5xx,
    /// timeouts) from terminal ones (404, bad credentials, missing binary).
    #[error("{origin} source unavailable ({}): {reason}", permanence(.temporary))]
    SourceUnavailable {
        origin: SourceKind,
        reason: String,
        temporary: bool,
    },

    /// The source answered, but with unparsable or corrupt data.
    #[error("{origin} source returned unusable data: {reason}")]
    Extraction { origin: SourceKind, reason: String },

    /// Two sources populate a field that has no precedence rule.
    #[error("conflicting values for '{field}' from [{}] and no precedence rule", join_sources(.sources))]
    MetadataConflict {
        field: String,
        sources: Vec<SourceKind>,
    },

    /// A partial record reached the merger without a `_src` tag.
    #[error("partial record #{index} has no '_src' tag")]
    MissingSourceTag { index: usize },

    #[error("unknown source name '{0}' (expected path, embedded, or api)")]
    UnknownSource(String),

    #[error("every metadata source failed: {}", join_failures(.failures))]
    AllSourcesFailed { failures: Vec<SourceFailure> },

    /// A record handed to a tracker mapper lacks a field validation guarantees.
    #[error("record is missing required field '{field}'")]
    InvalidRecord { field: String },

    #[error("extraction cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn unavailable(origin: SourceKind, reason: impl Into<String>, temporary: bool) -> Self {
        Self::SourceUnavailable {
            origin,
            reason: reason.into(),
            temporary,
        }
    }

    pub fn extraction(origin: SourceKind, reason: impl Into<String>) -> Self {
        Self::Extraction {
            origin,
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable {
                temporary: true,
                ..
            }
        )
    }
}

fn permanence(temporary: &bool) -> &'static str {
    if *temporary {
        "temporary"
    } else {
        "permanent"
    }
}

fn join_sources(sources: &[SourceKind]) -> String {
    sources
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_failures(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_flag() {
        assert!(Error::unavailable(SourceKind::Api, "HTTP 503", true).is_temporary());
        assert!(!Error::unavailable(SourceKind::Api, "HTTP 404", false).is_temporary());
        assert!(!Error::extraction(SourceKind::Api, "bad json").is_temporary());
    }

    #[test]
    fn test_display_includes_source_and_reason() {
        let err = Error::unavailable(SourceKind::Embedded, "ffprobe not found", false);
        let msg = err.to_string();
        assert!(msg.contains("embedded"));
        assert!(msg.contains("permanent"));
        assert!(msg.contains("ffprobe not found"));
    }

    #[test]
    fn test_conflict_lists_sources() {
        let err = Error::MetadataConflict {
            field: "mood".to_string(),
            sources: vec![SourceKind::Path, SourceKind::Api],
        };
        assert_eq!(
            err.to_string(),
            "conflicting values for 'mood' from [path, api] and no precedence rule"
        );
    }

    #[test]
    fn test_all_sources_failed_joins_reasons() {
        let err = Error::AllSourcesFailed {
            failures: vec![
                SourceFailure {
                    source: SourceKind::Embedded,
                    reason: "no backend".to_string(),
                },
                SourceFailure {
                    source: SourceKind::Api,
                    reason: "HTTP 404".to_string(),
                },
            ],
        };
        assert!(err.to_string().contains("embedded: no backend; api: HTTP 404"));
    }
}
