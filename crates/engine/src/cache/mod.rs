// Last-known term list with a freshness stamp.
//
// A single record lives under `CACHE_KEY` and is always overwritten whole.

pub mod store;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use termlight_common::types::Term;
use thiserror::Error;

use store::{KvStore, StoreError};

pub const CACHE_KEY: &str = "termlight_terms_cache";

/// Freshness window used when a caller wants only recent data.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub data: Vec<Term>,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age at `now`; an entry stamped in the future counts as brand new.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_fresh_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age_at(now) < ttl
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store: {0}")]
    Store(#[from] StoreError),

    #[error("cache record is not valid: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct TermDataCache<K> {
    store: K,
}

impl<K: KvStore> TermDataCache<K> {
    pub fn new(store: K) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    /// The stored record regardless of age.
    pub fn entry(&self) -> Result<Option<CacheEntry>, CacheError> {
        match self.store.get(CACHE_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Cached terms if younger than `ttl`.
    pub fn read(&self, ttl: Duration) -> Result<Option<Vec<Term>>, CacheError> {
        self.read_at(ttl, Utc::now())
    }

    pub fn read_at(&self, ttl: Duration, now: DateTime<Utc>) -> Result<Option<Vec<Term>>, CacheError> {
        Ok(self.entry()?.filter(|entry| entry.is_fresh_at(ttl, now)).map(|entry| entry.data))
    }

    /// Cached terms of any age.
    pub fn read_stale(&self) -> Result<Option<Vec<Term>>, CacheError> {
        self.read(Duration::MAX)
    }

    /// Overwrite the record, stamped now.
    pub fn write(&self, data: &[Term]) -> Result<CacheEntry, CacheError> {
        self.write_at(data, Utc::now())
    }

    pub fn write_at(&self, data: &[Term], fetched_at: DateTime<Utc>) -> Result<CacheEntry, CacheError> {
        let entry = CacheEntry { data: data.to_vec(), fetched_at };
        let raw = serde_json::to_string(&entry)?;
        self.store.set(CACHE_KEY, &raw)?;
        Ok(entry)
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.store.remove(CACHE_KEY)?;
        Ok(())
    }
}
