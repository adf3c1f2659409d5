//! Directory service: cached lookups plus sync lifecycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use digest_models::normalize_username;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{CacheLookup, DirectoryCache};
use crate::config::DirectoryConfig;
use crate::error::Result;
use crate::mirror::{load_mirror, save_mirror, MirrorSnapshot};
use crate::provider::{DirectoryLookup, DirectorySource, UserDirectoryProvider};
use crate::sync::SyncWorker;

/// Shortest sync period accepted.
const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// A running sync task.
struct SyncTask {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Cached directory in front of a [`DirectorySource`].
///
/// Lifecycle: [`init`](Self::init), [`start_periodic_sync`](Self::start_periodic_sync),
/// [`stop_periodic_sync`](Self::stop_periodic_sync), [`shutdown`](Self::shutdown).
/// Lookups work in any state; without a running sync they simply rely on
/// the TTL cache.
pub struct DirectoryService {
    source: Arc<dyn DirectorySource>,
    cache: Arc<DirectoryCache>,
    config: DirectoryConfig,
    sync: Mutex<Option<SyncTask>>,
}

impl DirectoryService {
    /// Creates a service over the given source.
    pub fn new(source: Arc<dyn DirectorySource>, config: DirectoryConfig) -> Self {
        let cache = Arc::new(DirectoryCache::new(config.ttl, config.stale_grace));
        Self {
            source,
            cache,
            config,
            sync: Mutex::new(None),
        }
    }

    /// The service configuration.
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Loads the saved mirror (if configured) and runs one full sync.
    ///
    /// A failed sync is logged and tolerated; lookups will fall back to the
    /// loaded mirror until the directory is reachable again.
    ///
    /// # Errors
    /// Returns an error only if a saved mirror exists but cannot be read.
    pub async fn init(&self) -> Result<()> {
        self.restore_mirror().await?;

        if let Err(e) = self.sync_now().await {
            warn!(source = self.source.name(), error = %e, "Initial directory sync failed");
        }
        Ok(())
    }

    /// Seeds the cache from the saved mirror, keeping each entry's age.
    ///
    /// # Returns
    /// The number of users restored.
    pub async fn restore_mirror(&self) -> Result<usize> {
        let Some(path) = &self.config.mirror_path else {
            return Ok(0);
        };
        let Some(snapshot) = load_mirror(path)? else {
            return Ok(0);
        };

        let age = snapshot.age();
        let Some(fetched_at) = Instant::now().checked_sub(age) else {
            debug!(age_secs = age.as_secs(), "Directory mirror too old, ignoring");
            return Ok(0);
        };

        let count = snapshot.users.len();
        for user in snapshot.users {
            self.cache.insert_at(user, fetched_at).await;
        }
        info!(count, age_secs = age.as_secs(), "Loaded directory mirror");
        Ok(count)
    }

    /// Refreshes the whole cache from the source.
    ///
    /// # Returns
    /// The number of users synced.
    pub async fn sync_now(&self) -> Result<usize> {
        let users = self.source.fetch_all().await?;
        let count = users.len();
        self.cache.replace_all(users).await;
        info!(source = self.source.name(), count, "Directory synced");
        Ok(count)
    }

    /// Starts the background sync.
    ///
    /// # Returns
    /// `true` if a task was spawned, `false` if one is already running.
    pub async fn start_periodic_sync(&self) -> bool {
        let mut sync = self.sync.lock().await;
        if let Some(task) = sync.as_ref() {
            if !task.handle.is_finished() {
                debug!("directory sync already running");
                return false;
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut worker = SyncWorker::new(
            Arc::clone(&self.source),
            Arc::clone(&self.cache),
            self.config.sync_interval.max(MIN_SYNC_INTERVAL),
            shutdown_rx,
        );
        let handle = tokio::spawn(async move {
            worker.run().await;
        });

        *sync = Some(SyncTask {
            shutdown_tx,
            handle,
        });
        info!(
            interval_secs = self.config.sync_interval.as_secs(),
            "Directory sync started"
        );
        true
    }

    /// Stops the background sync and waits for it to exit.
    ///
    /// No cache write from the sync task happens after this returns.
    ///
    /// # Returns
    /// `true` if a running task was stopped, `false` if none was running.
    pub async fn stop_periodic_sync(&self) -> bool {
        let Some(task) = self.sync.lock().await.take() else {
            return false;
        };

        // The receiver may already be gone if the task ended on its own
        let _ = task.shutdown_tx.send(true);
        if let Err(e) = task.handle.await {
            warn!(error = %e, "Directory sync task panicked");
        }
        info!("Directory sync stopped");
        true
    }

    /// Returns true while the background sync is running.
    pub async fn is_syncing(&self) -> bool {
        self.sync
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Stops the sync and saves the mirror (if configured).
    pub async fn shutdown(&self) -> Result<()> {
        self.stop_periodic_sync().await;

        if let Some(path) = &self.config.mirror_path {
            let entries = self.cache.snapshot().await;
            let oldest = entries.iter().map(|e| e.age()).max().unwrap_or_default();
            let users = entries.into_iter().map(|e| e.record).collect::<Vec<_>>();
            let count = users.len();
            save_mirror(path, &MirrorSnapshot::new(users, oldest))?;
            info!(count, path = %path.display(), "Saved directory mirror");
        }
        Ok(())
    }

    /// Drops a cached user so the next lookup asks the directory.
    pub async fn invalidate(&self, username: &str) -> bool {
        self.cache.remove(&normalize_username(username)).await
    }

    /// Number of cached users.
    pub async fn cached_users(&self) -> usize {
        self.cache.len().await
    }
}

#[async_trait]
impl UserDirectoryProvider for DirectoryService {
    async fn get_user_by_username(&self, username: &str) -> DirectoryLookup {
        let key = normalize_username(username);
        if key.is_empty() {
            return DirectoryLookup::NotFound;
        }

        let cached = match self.cache.lookup(&key).await {
            CacheLookup::Fresh(record) => {
                return DirectoryLookup::Found {
                    record,
                    stale: false,
                }
            }
            CacheLookup::Stale(record) => Some(record),
            CacheLookup::Miss => None,
        };

        let generation = self.cache.generation();
        match self.source.fetch_user(&key).await {
            Ok(Some(record)) => {
                if !self.cache.insert_if_current(record.clone(), generation).await {
                    debug!(username = %key, "Directory synced during lookup, keeping synced record");
                    if let CacheLookup::Fresh(synced) = self.cache.lookup(&key).await {
                        return DirectoryLookup::Found {
                            record: synced,
                            stale: false,
                        };
                    }
                }
                DirectoryLookup::Found {
                    record,
                    stale: false,
                }
            }
            Ok(None) => {
                if !self.cache.remove_if_current(&key, generation).await {
                    if let CacheLookup::Fresh(synced) = self.cache.lookup(&key).await {
                        return DirectoryLookup::Found {
                            record: synced,
                            stale: false,
                        };
                    }
                }
                DirectoryLookup::NotFound
            }
            Err(e) => match cached {
                Some(record) => {
                    warn!(
                        username = %key,
                        source = self.source.name(),
                        error = %e,
                        "Directory unreachable, serving stale record"
                    );
                    DirectoryLookup::Found {
                        record,
                        stale: true,
                    }
                }
                None => {
                    warn!(
                        username = %key,
                        source = self.source.name(),
                        error = %e,
                        "Directory unreachable and no cached record"
                    );
                    DirectoryLookup::Unavailable
                }
            },
        }
    }
}

impl Drop for DirectoryService {
    fn drop(&mut self) {
        // Signal the sync task if it is still running
        if let Some(task) = self.sync.get_mut().take() {
            let _ = task.shutdown_tx.send(true);
        }
    }
}
