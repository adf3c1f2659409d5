//! Background directory sync.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::DirectoryCache;
use crate::provider::DirectorySource;

/// Periodically refreshes the whole directory cache from its source.
pub struct SyncWorker {
    source: Arc<dyn DirectorySource>,
    cache: Arc<DirectoryCache>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl SyncWorker {
    /// Creates a new sync worker.
    pub fn new(
        source: Arc<dyn DirectorySource>,
        cache: Arc<DirectoryCache>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            cache,
            interval,
            shutdown,
        }
    }

    /// Run the sync loop until the shutdown signal.
    ///
    /// The first refresh happens one interval after start. A fetch still in
    /// flight when shutdown arrives is dropped without touching the cache.
    pub async fn run(&mut self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            source = self.source.name(),
            interval_secs = self.interval.as_secs(),
            "starting directory sync"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.changed() => break,
            }

            tokio::select! {
                result = self.source.fetch_all() => match result {
                    Ok(users) => {
                        let count = users.len();
                        self.cache.replace_all(users).await;
                        info!(source = self.source.name(), count, "Directory synced");
                    }
                    Err(e) => {
                        warn!(source = self.source.name(), error = %e, "Directory sync failed, retrying next tick");
                    }
                },
                _ = self.shutdown.changed() => break,
            }
        }

        debug!("directory sync stopped");
    }
}
