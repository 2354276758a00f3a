//! Revocation answers remembered between registry lookups.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One registry answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationCacheEntry {
    pub delegation_id: String,
    pub revoked: bool,
    pub checked_at: DateTime<Utc>,
}

/// Per-delegation revocation answers with a freshness window.
///
/// "Not revoked" answers expire after the TTL. "Revoked" answers never do
/// and are never replaced by "not revoked", because revocation cannot be
/// undone.
#[derive(Debug, Clone)]
pub struct RevocationCache {
    ttl: chrono::Duration,
    entries: BTreeMap<String, RevocationCacheEntry>,
}

impl RevocationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            entries: BTreeMap::new(),
        }
    }

    /// Rebuild from persisted entries.
    pub fn with_entries(ttl: Duration, entries: Vec<RevocationCacheEntry>) -> Self {
        let mut cache = Self::new(ttl);
        for entry in entries {
            cache.record(entry);
        }
        cache
    }

    /// Store an answer. Returns whether the cache changed.
    ///
    /// Last write wins by `checked_at`, except that a revoked entry stays.
    pub fn record(&mut self, entry: RevocationCacheEntry) -> bool {
        match self.entries.get(&entry.delegation_id) {
            Some(existing) if existing.revoked && !entry.revoked => false,
            Some(existing)
                if existing.revoked == entry.revoked && existing.checked_at >= entry.checked_at =>
            {
                false
            }
            _ => {
                self.entries.insert(entry.delegation_id.clone(), entry);
                true
            }
        }
    }

    /// The answer for `delegation_id` if it may still be relied on at `now`.
    pub fn lookup_at(&self, delegation_id: &str, now: DateTime<Utc>) -> Option<&RevocationCacheEntry> {
        self.entries
            .get(delegation_id)
            .filter(|entry| entry.revoked || self.is_fresh(entry, now))
    }

    /// Any stored answer, fresh or not.
    pub fn get(&self, delegation_id: &str) -> Option<&RevocationCacheEntry> {
        self.entries.get(delegation_id)
    }

    /// Drop stale "not revoked" answers. Returns how many were dropped.
    pub fn prune_at(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| entry.revoked || now.signed_duration_since(entry.checked_at) < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &RevocationCacheEntry> {
        self.entries.values()
    }

    fn is_fresh(&self, entry: &RevocationCacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.checked_at) < self.ttl
    }
}
