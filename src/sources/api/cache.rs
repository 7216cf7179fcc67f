use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Raw lookup payloads for one book
#[derive(Debug, Clone, PartialEq)]
pub struct CachedLookup {
    pub book: Value,
    pub chapters: Option<Value>,
}

/// Read-mostly response cache keyed by (region, ASIN) with TTL expiry
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), (Instant, CachedLookup)>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn key(region: &str, asin: &str) -> (String, String) {
        (region.to_ascii_lowercase(), asin.to_ascii_uppercase())
    }

    pub fn get(&self, region: &str, asin: &str) -> Option<CachedLookup> {
        let entries = self.entries.read();
        let (stored, lookup) = entries.get(&Self::key(region, asin))?;
        (stored.elapsed() < self.ttl).then(|| lookup.clone())
    }

    pub fn insert(&self, region: &str, asin: &str, lookup: CachedLookup) {
        let mut entries = self.entries.write();
        entries.retain(|_, (stored, _)| stored.elapsed() < self.ttl);
        entries.insert(Self::key(region, asin), (Instant::now(), lookup));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}
