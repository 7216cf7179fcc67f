pub mod extract;
pub mod map;
pub mod precedence;
pub mod validate;

use anyhow::{bail, Context, Result};
use std::path::Path;

use audiobook_meta::config::Config;
use audiobook_meta::{AudiobookProcessor, AudiobookRecord};

/// Run the extraction pipeline for one release on a fresh runtime
pub fn extract_record(config: &Config, path: &Path, offline: bool) -> Result<AudiobookRecord> {
    if !path.exists() {
        bail!("Path not found: {}", path.display());
    }

    let processor = AudiobookProcessor::from_config(config, offline)?;
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let record = rt
        .block_on(processor.extract(path))
        .with_context(|| format!("Failed to extract metadata from {}", path.display()))?;
    Ok(record)
}
