//! Last-known-good account records, replayed when the upstream can't be used.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::credentials::PublicId;
use crate::record::AccountRecord;

/// Cache slot: one account and one upstream path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    public_id: PublicId,
    path: String,
}

impl CacheKey {
    pub fn new(public_id: PublicId, path: impl Into<String>) -> Self {
        Self {
            public_id,
            path: path.into(),
        }
    }

    pub fn public_id(&self) -> &PublicId {
        &self.public_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Unbounded, non-expiring map of the latest usable record per key.
///
/// One mutex serializes every read and write; it is only held for the map
/// operation itself.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<CacheKey, AccountRecord>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<AccountRecord> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Store `record` under `key`. Unusable records are refused so they can
    /// never replace a good entry; returns whether the record was stored.
    pub fn put(&self, key: CacheKey, record: AccountRecord) -> bool {
        if !record.is_usable() {
            tracing::debug!(public_id = %key.public_id, path = %key.path, "Refusing to cache unusable record");
            return false;
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, record);
        true
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
