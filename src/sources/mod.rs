//! The three metadata producers behind one trait.

pub mod api;
pub mod embedded;
pub mod path;

use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::metadata::{PartialRecord, SourceKind};

pub use api::ApiSource;
pub use embedded::EmbeddedSource;
pub use path::PathInfoSource;

/// What a source is asked to look at
#[derive(Debug, Clone, Default)]
pub struct SourceInput {
    /// The audiobook file or release directory
    pub path: PathBuf,
    /// ASIN discovered by earlier sources, if any
    pub asin: Option<String>,
    /// Checked by sources with long waits (API backoff)
    pub cancel: CancellationToken,
}

impl SourceInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            asin: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_asin(mut self, asin: Option<String>) -> Self {
        self.asin = asin;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Result of one source call
#[derive(Debug)]
pub enum SourceOutcome {
    Complete(PartialRecord),
    /// Usable data, but something was left out (e.g. chapters unavailable)
    Partial {
        record: PartialRecord,
        reason: String,
    },
    Failed(Error),
}

impl SourceOutcome {
    /// The record, if the source produced one
    pub fn record(&self) -> Option<&PartialRecord> {
        match self {
            SourceOutcome::Complete(record) | SourceOutcome::Partial { record, .. } => Some(record),
            SourceOutcome::Failed(_) => None,
        }
    }
}

/// A metadata producer. Implementations never panic on bad input; they
/// report failure through [`SourceOutcome::Failed`].
#[async_trait]
pub trait MetadataSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn extract(&self, input: &SourceInput) -> SourceOutcome;
}
