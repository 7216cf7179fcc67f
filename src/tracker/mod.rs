//! Canonical record to tracker upload fields.
//!
//! Mappers are pure: they take an already-validated record and return the
//! flat field map an uploader submits. Missing required fields mean the
//! caller skipped validation, so mappers fail fast with
//! [`Error::InvalidRecord`](crate::error::Error::InvalidRecord).

mod red;

pub use red::RedMapper;

use std::collections::BTreeMap;

use crate::error::Result;
use crate::metadata::AudiobookRecord;

/// Upload form field name to value
pub type UploadFields = BTreeMap<String, String>;

pub trait TrackerMapper: Send + Sync {
    fn name(&self) -> &'static str;

    fn map(&self, record: &AudiobookRecord) -> Result<UploadFields>;
}

/// Look up a mapper by its command-line name
pub fn mapper_for(name: &str) -> Option<Box<dyn TrackerMapper>> {
    match name.to_ascii_lowercase().as_str() {
        "red" => Some(Box::new(RedMapper)),
        _ => None,
    }
}

/// Trackers with both a mapper and a validation profile
pub const TRACKERS: &[&str] = &["red"];

/// `75780` -> `21h 3m`
pub fn format_runtime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_runtime() {
        assert_eq!(format_runtime(75_780), "21h 3m");
        assert_eq!(format_runtime(3600), "1h 0m");
        assert_eq!(format_runtime(59), "0m");
        assert_eq!(format_runtime(1500), "25m");
    }

    #[test]
    fn test_mapper_lookup() {
        assert_eq!(mapper_for("red").map(|m| m.name()), Some("red"));
        assert!(mapper_for("unknown").is_none());
        for name in TRACKERS {
            assert!(mapper_for(name).is_some());
            assert!(crate::validate::profile_for(name).is_some());
        }
    }
}
