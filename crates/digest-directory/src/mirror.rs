//! Directory mirror snapshots.
//!
//! The cache is saved on shutdown and loaded on start so a restart while the
//! HR directory is down can still serve recently known users (as stale).

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use digest_models::UserRecord;
use digest_persistence::atomic::{read_json_optional, write_json_atomic};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A persisted copy of the directory cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorSnapshot {
    /// Wall-clock time of the oldest entry in the snapshot.
    pub synced_at: DateTime<Utc>,
    /// Cached users.
    pub users: Vec<UserRecord>,
}

impl MirrorSnapshot {
    /// Builds a snapshot whose oldest entry is `oldest_age` old.
    pub fn new(users: Vec<UserRecord>, oldest_age: Duration) -> Self {
        let age = chrono::Duration::from_std(oldest_age).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            synced_at: Utc::now() - age,
            users,
        }
    }

    /// Time elapsed since `synced_at`; zero if the clock went backwards.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.synced_at).to_std().unwrap_or_default()
    }
}

/// Writes the snapshot atomically.
pub fn save_mirror(path: &Path, snapshot: &MirrorSnapshot) -> Result<()> {
    write_json_atomic(path, snapshot)?;
    Ok(())
}

/// Loads a snapshot, returning `None` if none was saved yet.
pub fn load_mirror(path: &Path) -> Result<Option<MirrorSnapshot>> {
    Ok(read_json_optional(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("directory.json");

        let snapshot = MirrorSnapshot::new(
            vec![UserRecord::active("alice", "Alice", "tester")],
            Duration::from_secs(120),
        );
        save_mirror(&path, &snapshot).unwrap();

        let loaded = load_mirror(&path).unwrap().unwrap();
        assert_eq!(loaded.users, snapshot.users);
        assert!(loaded.age() >= Duration::from_secs(120));
        assert!(loaded.age() < Duration::from_secs(180));
    }

    #[test]
    fn test_load_missing() {
        let dir = tempdir().unwrap();
        assert!(load_mirror(&dir.path().join("none.json")).unwrap().is_none());
    }
}
