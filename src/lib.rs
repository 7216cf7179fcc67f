//! Audiobook metadata extraction, reconciliation, and validation.
//!
//! Three sources feed one pipeline: the release name ([`sources::path`]),
//! the media files themselves ([`sources::embedded`]), and the Audnexus
//! API ([`sources::api`]). [`processor::AudiobookProcessor`] runs them,
//! [`merge::FieldMerger`] reconciles their output by per-field precedence,
//! [`validate::Validator`] scores the result, and [`tracker`] mappers turn
//! it into upload form fields.

pub mod config;
pub mod error;
pub mod merge;
pub mod metadata;
pub mod normalize;
pub mod processor;
pub mod scanner;
pub mod sources;
pub mod tracker;
pub mod validate;

pub use error::{Error, Result};
pub use metadata::AudiobookRecord;
pub use processor::AudiobookProcessor;
