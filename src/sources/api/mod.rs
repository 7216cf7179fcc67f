//! Audnexus lookup by ASIN.
//!
//! The book lookup is authoritative for descriptive fields. The chapter
//! lookup is best-effort: its failure downgrades the outcome to partial but
//! never loses the book data.

pub mod cache;
pub mod client;
pub mod dto;
pub mod rate_limit;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::path::is_valid_asin;
use super::{MetadataSource, SourceInput, SourceOutcome};
use crate::config::ApiSettings;
use crate::error::{Error, Result};
use crate::metadata::{fields, parse_date, PartialRecord, SourceKind};
use crate::normalize::language;

pub use cache::{CachedLookup, ResponseCache};
pub use client::{ApiClient, HttpResponse, HttpTransport, ReqwestTransport, RetryPolicy, TransportError};
pub use rate_limit::RateLimiter;

pub struct ApiSource {
    client: ApiClient,
    base_url: String,
    region: String,
    cache: Option<Arc<ResponseCache>>,
}

impl ApiSource {
    pub fn new(client: ApiClient, settings: &ApiSettings) -> Self {
        let cache = (settings.cache_ttl_secs > 0)
            .then(|| Arc::new(ResponseCache::new(Duration::from_secs(settings.cache_ttl_secs))));
        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            region: settings.region.to_ascii_lowercase(),
            cache,
        }
    }

    /// Real HTTP. Every lookup through this source, including all of a
    /// batch, queues on the one limiter created here.
    pub fn from_settings(settings: &ApiSettings) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::from_millis(settings.min_interval_ms));
        let transport = ReqwestTransport::new(Duration::from_secs(settings.timeout_secs))?;
        let client = ApiClient::new(Arc::new(transport), limiter, RetryPolicy::from(settings))
            .with_api_key(settings.api_key());
        Ok(Self::new(client, settings))
    }

    fn book_url(&self, asin: &str) -> String {
        format!(
            "{}/books/{}?region={}",
            self.base_url,
            urlencoding::encode(asin),
            urlencoding::encode(&self.region)
        )
    }

    fn chapters_url(&self, asin: &str) -> String {
        format!(
            "{}/books/{}/chapters?region={}",
            self.base_url,
            urlencoding::encode(asin),
            urlencoding::encode(&self.region)
        )
    }

    /// Fetch both payloads, consulting the cache first.
    /// Returns the chapter failure reason alongside the data.
    async fn fetch(
        &self,
        asin: &str,
        cancel: &CancellationToken,
    ) -> Result<(CachedLookup, Option<String>)> {
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(&self.region, asin)) {
            debug!(asin, "cache hit");
            return Ok((hit, None));
        }

        let book = self.client.get_json(&self.book_url(asin), cancel).await?;

        let (chapters, chapter_failure) =
            match self.client.get_json(&self.chapters_url(asin), cancel).await {
                Ok(chapters) => (Some(chapters), None),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(asin, error = %e, "chapter lookup failed, continuing without chapters");
                    (None, Some(e.to_string()))
                }
            };

        let lookup = CachedLookup { book, chapters };
        if let Some(cache) = &self.cache {
            if chapter_failure.is_none() {
                cache.insert(&self.region, asin, lookup.clone());
                debug!(asin, entries = cache.len(), "cached lookup");
            }
        }
        Ok((lookup, chapter_failure))
    }

    async fn lookup(&self, input: &SourceInput) -> SourceOutcome {
        let Some(asin) = input.asin.as_deref().map(|a| a.trim().to_ascii_uppercase()) else {
            return SourceOutcome::Failed(Error::unavailable(
                SourceKind::Api,
                "no ASIN to look up",
                false,
            ));
        };
        if !is_valid_asin(&asin) {
            return SourceOutcome::Failed(Error::unavailable(
                SourceKind::Api,
                format!("'{}' is not a valid ASIN", asin),
                false,
            ));
        }

        let (lookup, chapter_failure) = match self.fetch(&asin, &input.cancel).await {
            Ok(fetched) => fetched,
            Err(e) => return SourceOutcome::Failed(e),
        };

        let mut record = match normalize_book(&lookup.book) {
            Ok(record) => record,
            Err(e) => return SourceOutcome::Failed(e),
        };

        let mut chapter_failure = chapter_failure;
        if let Some(chapters) = &lookup.chapters {
            if let Err(e) = apply_chapters(&mut record, chapters) {
                warn!(asin = %asin, error = %e, "ignoring unreadable chapter list");
                chapter_failure = Some(e.to_string());
            }
        }

        let record = record.with_raw(json!({
            "book": lookup.book,
            "chapters": lookup.chapters,
        }));

        info!(asin = %asin, title = record.get_str(fields::TITLE).unwrap_or("?"), "API lookup succeeded");

        match chapter_failure {
            None => SourceOutcome::Complete(record),
            Some(reason) => SourceOutcome::Partial {
                record,
                reason: format!("chapters unavailable: {}", reason),
            },
        }
    }
}

#[async_trait]
impl MetadataSource for ApiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    async fn extract(&self, input: &SourceInput) -> SourceOutcome {
        self.lookup(input).await
    }
}

/// Map the book payload onto canonical field names.
///
/// The description is left as HTML; the processor cleans it after the merge
/// so the raw text survives in provenance.
pub fn normalize_book(raw: &Value) -> Result<PartialRecord> {
    let book: dto::Book = serde_json::from_value(raw.clone())
        .map_err(|e| Error::extraction(SourceKind::Api, format!("unexpected book payload: {}", e)))?;

    let mut record = PartialRecord::new(SourceKind::Api);

    record.set_opt(fields::ASIN, book.asin);
    record.set_opt(fields::TITLE, book.title);
    record.set_opt(fields::SUBTITLE, book.subtitle);
    record.set(fields::AUTHORS, people(&book.authors));
    record.set(fields::NARRATORS, people(&book.narrators));
    record.set_opt(fields::PUBLISHER, book.publisher_name);
    record.set_opt(fields::ISBN, book.isbn);
    record.set_opt(fields::REGION, book.region);
    record.set_opt(fields::LITERATURE_TYPE, book.literature_type);
    record.set_opt(fields::IS_ADULT, book.is_adult);
    record.set_opt(fields::COVER_URL, book.image);
    record.set_opt(fields::DESCRIPTION, book.summary.or(book.description));

    if let Some(lang) = book.language.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        let code = language::to_iso639_1(lang).unwrap_or_else(|| lang.to_lowercase());
        record.set(fields::LANGUAGE, code);
    }

    if let Some(date) = book.release_date.as_deref().and_then(parse_date) {
        record.set(fields::RELEASE_DATE, date.format("%Y-%m-%d").to_string());
        record.set(fields::YEAR, chrono::Datelike::year(&date));
    }

    if let Some(minutes) = book.runtime_length_min.filter(|m| *m > 0.0) {
        record.set(fields::DURATION_SEC, (minutes * 60.0).round() as u64);
    }

    if let Some(rating) = book.rating.as_ref().and_then(rating_value) {
        record.set(fields::RATING, rating);
    }

    let (genres, tags): (Vec<&dto::Genre>, Vec<&dto::Genre>) = book
        .genres
        .iter()
        .partition(|g| !g.kind.as_deref().is_some_and(|k| k.eq_ignore_ascii_case("tag")));
    record.set(fields::GENRES, names(&genres));
    record.set(fields::TAGS, names(&tags));

    if let Some(series) = &book.series_primary {
        record.set_opt(fields::SERIES, series.name.clone());
        record.set_opt(
            fields::VOLUME,
            series.position.as_deref().and_then(series_position),
        );
    }

    Ok(record)
}

fn apply_chapters(record: &mut PartialRecord, raw: &Value) -> Result<()> {
    let list: dto::ChapterList = serde_json::from_value(raw.clone()).map_err(|e| {
        Error::extraction(SourceKind::Api, format!("unexpected chapter payload: {}", e))
    })?;

    let chapters: Vec<Value> = list
        .chapters
        .iter()
        .enumerate()
        .map(|(i, c)| {
            json!({
                "index": i + 1,
                "title": c.title.clone().unwrap_or_else(|| format!("Chapter {}", i + 1)),
                "start_ms": c.start_offset_ms.unwrap_or(0),
            })
        })
        .collect();

    if !chapters.is_empty() {
        record.set(fields::CHAPTER_COUNT, chapters.len());
        record.set(fields::CHAPTERS, chapters);
    }
    Ok(())
}

fn people(list: &[dto::Person]) -> Vec<Value> {
    list.iter()
        .filter_map(|p| {
            let name = p.name.as_deref()?.trim();
            if name.is_empty() {
                return None;
            }
            Some(match &p.asin {
                Some(asin) => json!({ "name": name, "asin": asin }),
                None => json!({ "name": name }),
            })
        })
        .collect()
}

fn names(genres: &[&dto::Genre]) -> Vec<String> {
    genres
        .iter()
        .filter_map(|g| g.name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect()
}

fn rating_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// "1", "1.5", "Book 3" -> the numeric part
fn series_position(position: &str) -> Option<String> {
    let start = position.find(|c: char| c.is_ascii_digit())?;
    let number: String = position[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let number = number.trim_end_matches('.');
    (!number.is_empty()).then(|| number.to_string())
}

#[cfg(test)]
mod tests {
    use super::client::testing::ScriptedTransport;
    use super::*;

    const BOOK: &str = r#"{
        "asin": "B000FC1ZCS",
        "title": "Dune",
        "subtitle": "Dune Chronicles, Book 1",
        "authors": [{"asin": "B000AP9A6K", "name": "Frank Herbert"}],
        "narrators": [{"name": "Scott Brick"}, {"name": "Orlagh Cassidy"}],
        "seriesPrimary": {"asin": "B000000001", "name": "Dune", "position": "1"},
        "publisherName": "Macmillan Audio",
        "releaseDate": "2007-01-01T00:00:00.000Z",
        "runtimeLengthMin": 1263,
        "genres": [
            {"asin": "1", "name": "Science Fiction & Fantasy", "type": "genre"},
            {"asin": "2", "name": "Space Opera", "type": "tag"}
        ],
        "summary": "<p>Set on the desert planet <b>Arrakis</b>&hellip;</p>",
        "language": "english",
        "region": "us",
        "formatType": "unabridged",
        "literatureType": "fiction",
        "isAdult": false,
        "rating": "4.6",
        "image": "https://m.media-amazon.com/images/I/dune.jpg"
    }"#;

    const CHAPTERS: &str = r#"{
        "asin": "B000FC1ZCS",
        "chapters": [
            {"lengthMs": 60000, "startOffsetMs": 0, "startOffsetSec": 0, "title": "Opening Credits"},
            {"lengthMs": 900000, "startOffsetMs": 60000, "startOffsetSec": 60, "title": "Book One"}
        ],
        "isAccurate": true
    }"#;

    fn source(transport: Arc<ScriptedTransport>, settings: &ApiSettings) -> ApiSource {
        let client = ApiClient::new(
            transport,
            Arc::new(RateLimiter::from_millis(0)),
            RetryPolicy::from(settings),
        );
        ApiSource::new(client, settings)
    }

    fn input(asin: &str) -> SourceInput {
        SourceInput::new("/books/Dune").with_asin(Some(asin.to_string()))
    }

    #[test]
    fn test_normalize_book() {
        let raw: Value = serde_json::from_str(BOOK).unwrap();
        let record = normalize_book(&raw).unwrap();

        assert_eq!(record.source(), Some(SourceKind::Api));
        assert_eq!(record.get_str("title"), Some("Dune"));
        assert_eq!(
            record.get("authors"),
            Some(&json!([{"name": "Frank Herbert", "asin": "B000AP9A6K"}]))
        );
        assert_eq!(record.get("narrators").unwrap().as_array().unwrap().len(), 2);
        assert_eq!(record.get_str("language"), Some("en"));
        assert_eq!(record.get_str("release_date"), Some("2007-01-01"));
        assert_eq!(record.get("year"), Some(&json!(2007)));
        assert_eq!(record.get("duration_sec"), Some(&json!(75780)));
        assert_eq!(record.get("genres"), Some(&json!(["Science Fiction & Fantasy"])));
        assert_eq!(record.get("tags"), Some(&json!(["Space Opera"])));
        assert_eq!(record.get("rating"), Some(&json!(4.6)));
        assert_eq!(record.get_str("series"), Some("Dune"));
        assert_eq!(record.get_str("volume"), Some("1"));
        assert!(record.get_str("description").unwrap().contains("<b>Arrakis</b>"));
    }

    #[test]
    fn test_unknown_language_is_kept() {
        let record = normalize_book(&json!({"title": "X", "language": "Klingon"})).unwrap();
        assert_eq!(record.get_str("language"), Some("klingon"));
    }

    #[test]
    fn test_malformed_book_is_extraction_error() {
        let err = normalize_book(&json!({"title": ["not", "a", "string"]})).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[test]
    fn test_series_position() {
        assert_eq!(series_position("1").as_deref(), Some("1"));
        assert_eq!(series_position("1.5").as_deref(), Some("1.5"));
        assert_eq!(series_position("Book 3").as_deref(), Some("3"));
        assert_eq!(series_position("3."), Some("3".to_string()));
        assert_eq!(series_position("n/a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_with_chapters() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTransport::status(200, BOOK),
            ScriptedTransport::status(200, CHAPTERS),
        ]);
        let api = source(transport.clone(), &ApiSettings::default());

        let outcome = api.extract(&input("b000fc1zcs")).await;
        let record = match outcome {
            SourceOutcome::Complete(record) => record,
            other => panic!("expected complete outcome, got {:?}", other),
        };
        assert_eq!(record.get("chapter_count"), Some(&json!(2)));
        assert_eq!(record.raw()["book"]["title"], "Dune");
        assert_eq!(record.raw()["chapters"]["isAccurate"], true);

        let calls = transport.calls.lock().clone();
        assert_eq!(
            calls,
            vec![
                "https://api.audnex.us/books/B000FC1ZCS?region=us",
                "https://api.audnex.us/books/B000FC1ZCS/chapters?region=us",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_chapter_failure_keeps_book() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTransport::status(200, BOOK),
            ScriptedTransport::status(404, ""),
        ]);
        let api = source(transport, &ApiSettings::default());

        let outcome = api.extract(&input("B000FC1ZCS")).await;
        match outcome {
            SourceOutcome::Partial { record, reason } => {
                assert_eq!(record.get_str("title"), Some("Dune"));
                assert!(record.get("chapters").is_none());
                assert!(reason.contains("chapters unavailable"));
            }
            other => panic!("expected partial outcome, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_then_success() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTransport::status(503, ""),
            ScriptedTransport::status(503, ""),
            ScriptedTransport::status(200, BOOK),
            ScriptedTransport::status(200, CHAPTERS),
        ]);
        let api = source(transport.clone(), &ApiSettings::default());
        let start = tokio::time::Instant::now();

        let outcome = api.extract(&input("B000FC1ZCS")).await;
        let record = outcome.record().unwrap();
        assert_eq!(record.get_str("title"), Some("Dune"));
        assert_eq!(transport.call_count(), 4);
        // 1s + 2s of backoff with the default schedule
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_fails_immediately() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::status(404, "")]);
        let api = source(transport.clone(), &ApiSettings::default());

        let outcome = api.extract(&input("B000FC1ZCS")).await;
        assert!(matches!(
            outcome,
            SourceOutcome::Failed(Error::SourceUnavailable { temporary: false, .. })
        ));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_asin_makes_no_request() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::status(200, BOOK)]);
        let api = source(transport.clone(), &ApiSettings::default());

        assert!(matches!(
            api.extract(&input("12345")).await,
            SourceOutcome::Failed(_)
        ));
        assert!(matches!(
            api.extract(&SourceInput::new("/books/Dune")).await,
            SourceOutcome::Failed(_)
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_avoids_second_request() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTransport::status(200, BOOK),
            ScriptedTransport::status(200, CHAPTERS),
        ]);
        let settings = ApiSettings {
            cache_ttl_secs: 3600,
            ..ApiSettings::default()
        };
        let api = source(transport.clone(), &settings);

        api.extract(&input("B000FC1ZCS")).await;
        api.extract(&input("B000FC1ZCS")).await;
        assert_eq!(transport.call_count(), 2);
    }
}
