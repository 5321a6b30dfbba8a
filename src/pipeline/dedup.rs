//! Time-windowed suppression of repeated notifications.
//!
//! A fingerprint is accepted once per TTL window. Entries expire lazily:
//! an expired entry is simply overwritten on the next check, and
//! `purge_expired` drops whatever is left behind.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Concurrent set of recently emitted fingerprints with expiry times.
#[derive(Debug)]
pub struct DedupCache {
    entries: DashMap<String, DateTime<Utc>>,
    ttl: chrono::Duration,
}

impl DedupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Returns true and records `fingerprint` unless it was recorded within the TTL.
    pub fn should_notify(&self, fingerprint: &str) -> bool {
        self.should_notify_at(fingerprint, Utc::now())
    }

    /// Same as `should_notify` with an explicit clock.
    pub fn should_notify_at(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

        match self.entries.entry(fingerprint.to_string()) {
            Entry::Occupied(entry) if *entry.get() > now => false,
            Entry::Occupied(mut entry) => {
                entry.insert(expires_at);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                true
            }
        }
    }

    /// Release a fingerprint whose notification could not be delivered.
    pub fn forget(&self, fingerprint: &str) {
        self.entries.remove(fingerprint);
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
