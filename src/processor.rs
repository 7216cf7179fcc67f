//! The extraction pipeline: sources, merge, cleanup.
//!
//! Sources run one after another for a single book. The path and embedded
//! sources go first because either may discover the ASIN the API lookup
//! needs. Batches parallelize across books; API calls still funnel through
//! the one rate limiter the API source owns.

use anyhow::Context;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result, SourceFailure};
use crate::merge::{FieldMerger, PrecedenceRules};
use crate::metadata::{fields, AudiobookRecord, PartialRecord, Provenance, SourceKind};
use crate::normalize::{format, html, language, pad_volume, tags};
use crate::sources::path::is_valid_asin;
use crate::sources::{
    ApiSource, EmbeddedSource, MetadataSource, PathInfoSource, SourceInput, SourceOutcome,
};

pub struct AudiobookProcessor {
    path: Arc<dyn MetadataSource>,
    embedded: Arc<dyn MetadataSource>,
    /// `None` when running offline
    api: Option<Arc<dyn MetadataSource>>,
    merger: FieldMerger,
}

impl AudiobookProcessor {
    /// Build the real sources from configuration
    pub fn from_config(config: &Config, offline: bool) -> anyhow::Result<Self> {
        let api: Option<Arc<dyn MetadataSource>> = if offline {
            None
        } else {
            let source = ApiSource::from_settings(&config.api)
                .context("Failed to set up the metadata API client")?;
            Some(Arc::new(source))
        };
        Ok(Self::with_sources(
            Arc::new(PathInfoSource),
            Arc::new(EmbeddedSource::new(config.embedded.clone())),
            api,
            config.precedence()?,
        ))
    }

    pub fn with_sources(
        path: Arc<dyn MetadataSource>,
        embedded: Arc<dyn MetadataSource>,
        api: Option<Arc<dyn MetadataSource>>,
        rules: PrecedenceRules,
    ) -> Self {
        Self {
            path,
            embedded,
            api,
            merger: FieldMerger::new(rules),
        }
    }

    pub fn rules(&self) -> &PrecedenceRules {
        self.merger.rules()
    }

    /// Extract one audiobook (a file or a release directory)
    pub async fn extract(&self, path: &Path) -> Result<AudiobookRecord> {
        self.extract_with_cancel(path, &CancellationToken::new())
            .await
    }

    pub async fn extract_with_cancel(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<AudiobookRecord> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut input = SourceInput::new(path).with_cancel(cancel.clone());
        let mut outcomes = Vec::with_capacity(3);

        outcomes.push((self.path.kind(), self.path.extract(&input).await));
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        outcomes.push((self.embedded.kind(), self.embedded.extract(&input).await));

        match (&self.api, discover_asin(&outcomes)) {
            (Some(api), Some(asin)) => {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                debug!(asin = %asin, "looking up ASIN");
                input.asin = Some(asin);
                let outcome = api.extract(&input).await;
                if matches!(outcome, SourceOutcome::Failed(Error::Cancelled)) {
                    return Err(Error::Cancelled);
                }
                outcomes.push((api.kind(), outcome));
            }
            (Some(_), None) => debug!(path = %path.display(), "no ASIN found, skipping API lookup"),
            (None, _) => debug!("offline, skipping API lookup"),
        }

        self.assemble(outcomes)
    }

    /// Extract many audiobooks with bounded concurrency. Results keep the
    /// input order; books not started before cancellation report
    /// [`Error::Cancelled`].
    pub async fn extract_batch(
        &self,
        paths: Vec<PathBuf>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Vec<(PathBuf, Result<AudiobookRecord>)> {
        stream::iter(paths)
            .map(|path| {
                let cancel = cancel.clone();
                async move {
                    let result = self.extract_with_cancel(&path, &cancel).await;
                    (path, result)
                }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    /// Merge what the sources produced and clean it up
    fn assemble(&self, outcomes: Vec<(SourceKind, SourceOutcome)>) -> Result<AudiobookRecord> {
        let mut records: Vec<PartialRecord> = Vec::new();
        let mut failures = Vec::new();

        for (kind, outcome) in outcomes {
            match outcome {
                SourceOutcome::Complete(record) => records.push(record),
                SourceOutcome::Partial { record, reason } => {
                    warn!(source = %kind, reason = %reason, "source returned partial data");
                    if record.is_empty() {
                        failures.push(SourceFailure { source: kind, reason });
                    } else {
                        records.push(record);
                    }
                }
                SourceOutcome::Failed(e) => {
                    warn!(source = %kind, error = %e, "source failed");
                    failures.push(SourceFailure {
                        source: kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        records.retain(|r| !r.is_empty());
        if records.is_empty() {
            return Err(Error::AllSourcesFailed { failures });
        }

        let merged = self.merger.merge(&records)?;
        let mut record = AudiobookRecord::from_fields(&merged.values, merged.sources);
        record.provenance = records
            .iter()
            .filter_map(|r| {
                Some(Provenance {
                    source: r.source()?,
                    backend: r.backend().map(String::from),
                    payload: r.raw().clone(),
                })
            })
            .collect();

        enhance(&mut record);

        info!(
            title = record.title.as_deref().unwrap_or("?"),
            sources = records.len(),
            failed = failures.len(),
            "extraction finished"
        );
        Ok(record)
    }
}

/// First valid ASIN in source order (path, then embedded tags)
fn discover_asin(outcomes: &[(SourceKind, SourceOutcome)]) -> Option<String> {
    outcomes
        .iter()
        .filter_map(|(_, outcome)| outcome.record())
        .filter_map(|r| r.get_str(fields::ASIN))
        .map(|a| a.trim().to_ascii_uppercase())
        .find(|a| is_valid_asin(a))
}

/// Post-merge cleanup and derived fields
fn enhance(record: &mut AudiobookRecord) {
    record.description = record
        .description
        .take()
        .map(|d| html::clean(&d))
        .filter(|d| !d.is_empty());

    record.genres = tags::normalize(&record.genres);
    record.tags = tags::normalize(&record.tags);

    record.language = record
        .language
        .take()
        .map(|l| language::to_iso639_1(&l).unwrap_or_else(|| l.trim().to_lowercase()));

    record.volume = record.volume.take().map(|v| pad_volume(&v));

    if record.album.is_none() && record.title.is_some() {
        record.album = record.title.clone();
        record.derive_source(fields::ALBUM, fields::TITLE);
    }

    record.display_name = match (&record.title, record.author_names()) {
        (Some(title), Some(authors)) => Some(format!("{} - {}", title, authors)),
        (Some(title), None) => Some(title.clone()),
        _ => None,
    };

    record.audio.quality = format::detect(&record.audio);
    if record.audio.lossless.is_none() {
        if let Some(quality) = record.audio.quality {
            record.audio.lossless = Some(quality.format.is_lossless());
            let origin = match record.audio.codec {
                Some(_) => fields::CODEC,
                None => fields::BITRATE_KBPS,
            };
            record.derive_source(fields::LOSSLESS, origin);
        }
    }
}
