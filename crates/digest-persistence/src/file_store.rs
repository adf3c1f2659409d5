//! File-backed role store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use digest_models::RoleDefinition;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::atomic::{read_json_optional, write_json_atomic};
use crate::error::{PersistenceError, Result};
use crate::role_store::{RoleStore, RoleTable};

/// Role store persisted as a single JSON document.
///
/// ```text
/// state/
/// └── roles.json    # [ { "role_name": "admin", "permissions": [...] }, ... ]
/// ```
///
/// Mutations are serialized. Each one builds a new table, writes it to disk
/// atomically and only then publishes it to readers, so a failed write
/// leaves both the file and the in-memory view on the previous version.
pub struct FileRoleStore {
    path: PathBuf,
    roles: RwLock<Arc<RoleTable>>,
    write_lock: Mutex<()>,
}

impl FileRoleStore {
    /// Opens the store, loading existing roles from `path` if present.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let roles: Vec<RoleDefinition> = read_json_optional(&path)?.unwrap_or_default();
        let table: RoleTable = roles
            .into_iter()
            .map(|r| (r.role_name.clone(), r))
            .collect();

        info!(count = table.len(), path = %path.display(), "Loaded roles");

        Ok(Self {
            path,
            roles: RwLock::new(Arc::new(table)),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn snapshot(&self) -> Arc<RoleTable> {
        Arc::clone(&*self.roles.read().await)
    }

    /// Persists `table` and publishes it to readers.
    ///
    /// The write and fsync run on the blocking pool.
    async fn commit(&self, table: RoleTable) -> Result<()> {
        let document: Vec<RoleDefinition> = table.values().cloned().collect();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_json_atomic(&path, &document))
            .await
            .map_err(|e| PersistenceError::Unavailable(format!("role write task failed: {}", e)))??;

        *self.roles.write().await = Arc::new(table);
        Ok(())
    }
}

#[async_trait]
impl RoleStore for FileRoleStore {
    async fn get_role(&self, name: &str) -> Result<Option<RoleDefinition>> {
        Ok(self.snapshot().await.get(name.trim()).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<RoleDefinition>> {
        Ok(self.snapshot().await.values().cloned().collect())
    }

    async fn upsert_role(&self, role: RoleDefinition) -> Result<()> {
        let _writer = self.write_lock.lock().await;
        let mut table = RoleTable::clone(&*self.snapshot().await);
        debug!(role = %role.role_name, permissions = role.permissions.len(), "Saving role");
        table.insert(role.role_name.clone(), role);
        self.commit(table).await
    }

    async fn delete_role(&self, name: &str) -> Result<bool> {
        let _writer = self.write_lock.lock().await;
        let mut table = RoleTable::clone(&*self.snapshot().await);
        if table.remove(name.trim()).is_none() {
            return Ok(false);
        }
        self.commit(table).await?;
        debug!(role = %name, "Deleted role");
        Ok(true)
    }
}
