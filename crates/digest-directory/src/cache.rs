//! TTL cache for directory records.
//!
//! Each entry is an immutable `Arc<CachedUser>`; repopulating a key swaps
//! the whole entry and a full sync swaps the whole map, so readers never see
//! a partially written record.
//!
//! Every full sync bumps a generation counter. A single-user fetch records
//! the generation before asking the directory and only writes back if no
//! sync landed in between, so a slow lookup cannot overwrite newer data.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use digest_models::{normalize_username, UserRecord};
use tokio::sync::RwLock;
use tokio::time::Instant;

/// A cached directory record and when it was fetched.
#[derive(Debug, Clone)]
pub struct CachedUser {
    pub record: UserRecord,
    pub fetched_at: Instant,
}

impl CachedUser {
    /// Age of the entry.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Younger than the TTL; serve without asking the directory.
    Fresh(UserRecord),
    /// Past the TTL but within the grace window; serve only if the directory
    /// cannot be reached.
    Stale(UserRecord),
    /// No usable entry.
    Miss,
}

/// Username-keyed cache with TTL and stale grace.
pub struct DirectoryCache {
    entries: RwLock<HashMap<String, Arc<CachedUser>>>,
    /// Bumped by every `replace_all`, under the write lock.
    generation: AtomicU64,
    ttl: Duration,
    stale_grace: Duration,
}

impl DirectoryCache {
    /// Creates an empty cache.
    pub fn new(ttl: Duration, stale_grace: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            ttl,
            stale_grace,
        }
    }

    /// Reads an entry and classifies it by age.
    pub async fn lookup(&self, username: &str) -> CacheLookup {
        let entry = self.entries.read().await.get(username).cloned();
        let Some(entry) = entry else {
            return CacheLookup::Miss;
        };

        let age = entry.age();
        if age < self.ttl {
            CacheLookup::Fresh(entry.record.clone())
        } else if age < self.ttl + self.stale_grace {
            CacheLookup::Stale(entry.record.clone())
        } else {
            CacheLookup::Miss
        }
    }

    /// Stores a freshly fetched record.
    pub async fn insert(&self, record: UserRecord) {
        self.insert_at(record, Instant::now()).await;
    }

    /// Stores a record with an explicit fetch time.
    pub async fn insert_at(&self, record: UserRecord, fetched_at: Instant) {
        let key = normalize_username(&record.username);
        let entry = Arc::new(CachedUser { record, fetched_at });
        self.entries.write().await.insert(key, entry);
    }

    /// Current sync generation; pass it to the `*_if_current` writes.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Stores a record fetched while `generation` was current.
    ///
    /// # Returns
    /// `false` (and nothing is written) if a full sync replaced the cache
    /// since then.
    pub async fn insert_if_current(&self, record: UserRecord, generation: u64) -> bool {
        let key = normalize_username(&record.username);
        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        let entry = Arc::new(CachedUser {
            record,
            fetched_at: Instant::now(),
        });
        entries.insert(key, entry);
        true
    }

    /// Removes an entry the directory reported missing while `generation`
    /// was current.
    pub async fn remove_if_current(&self, username: &str, generation: u64) -> bool {
        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        entries.remove(username).is_some()
    }

    /// Removes an entry.
    pub async fn remove(&self, username: &str) -> bool {
        self.entries.write().await.remove(username).is_some()
    }

    /// Replaces the whole cache with a freshly synced roster.
    pub async fn replace_all(&self, records: Vec<UserRecord>) {
        let fetched_at = Instant::now();
        let map: HashMap<String, Arc<CachedUser>> = records
            .into_iter()
            .map(|record| {
                (
                    normalize_username(&record.username),
                    Arc::new(CachedUser { record, fetched_at }),
                )
            })
            .collect();
        let mut entries = self.entries.write().await;
        *entries = map;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns all entries still within TTL plus grace.
    pub async fn snapshot(&self) -> Vec<CachedUser> {
        let limit = self.ttl + self.stale_grace;
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.age() < limit)
            .map(|e| CachedUser::clone(e))
            .collect()
    }

    /// Number of entries, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
