//! RoleStore trait and in-memory implementation.
//!
//! All stores hand out snapshots: a reader clones an `Arc` to the current
//! role table, and writers swap in a complete new table. A reader therefore
//! never observes a half-written permission set.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use digest_models::RoleDefinition;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;

/// Role table keyed by role name. `BTreeMap` keeps listing order stable.
pub(crate) type RoleTable = BTreeMap<String, RoleDefinition>;

/// Trait for role definition storage backends.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Returns true if a role with this name exists.
    async fn role_exists(&self, name: &str) -> Result<bool> {
        Ok(self.get_role(name).await?.is_some())
    }

    /// Get a role by name.
    ///
    /// # Returns
    /// The role if found, `None` otherwise.
    async fn get_role(&self, name: &str) -> Result<Option<RoleDefinition>>;

    /// List all roles ordered by name.
    async fn list_roles(&self) -> Result<Vec<RoleDefinition>>;

    /// Create or replace a role.
    async fn upsert_role(&self, role: RoleDefinition) -> Result<()>;

    /// Delete a role by name.
    ///
    /// # Returns
    /// `true` if a role was removed, `false` if it did not exist.
    async fn delete_role(&self, name: &str) -> Result<bool>;
}

/// In-memory role store for development and tests.
#[derive(Default)]
pub struct MemoryRoleStore {
    roles: RwLock<Arc<RoleTable>>,
}

impl MemoryRoleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with roles.
    pub fn with_roles(roles: impl IntoIterator<Item = RoleDefinition>) -> Self {
        let table: RoleTable = roles
            .into_iter()
            .map(|r| (r.role_name.clone(), r))
            .collect();
        Self {
            roles: RwLock::new(Arc::new(table)),
        }
    }

    async fn snapshot(&self) -> Arc<RoleTable> {
        Arc::clone(&*self.roles.read().await)
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn get_role(&self, name: &str) -> Result<Option<RoleDefinition>> {
        Ok(self.snapshot().await.get(name.trim()).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<RoleDefinition>> {
        Ok(self.snapshot().await.values().cloned().collect())
    }

    async fn upsert_role(&self, role: RoleDefinition) -> Result<()> {
        let mut guard = self.roles.write().await;
        let mut table = RoleTable::clone(&guard);
        debug!(role = %role.role_name, permissions = role.permissions.len(), "Upserting role");
        table.insert(role.role_name.clone(), role);
        *guard = Arc::new(table);
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> Result<bool> {
        let mut guard = self.roles.write().await;
        if !guard.contains_key(name.trim()) {
            return Ok(false);
        }
        let mut table = RoleTable::clone(&guard);
        table.remove(name.trim());
        *guard = Arc::new(table);
        debug!(role = %name, "Deleted role");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digest_models::Permission;

    fn tester() -> RoleDefinition {
        RoleDefinition::with_permissions(
            "tester",
            "QA",
            [Permission::CanAccessSources, Permission::CanAccessAnalysis],
        )
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = MemoryRoleStore::new();
        store.upsert_role(tester()).await.unwrap();

        let role = store.get_role("tester").await.unwrap().unwrap();
        assert_eq!(role.permissions.len(), 2);
        assert!(store.role_exists("tester").await.unwrap());
        assert!(!store.role_exists("admin").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let store = MemoryRoleStore::with_roles([tester()]);
        store
            .upsert_role(RoleDefinition::new("tester", "no permissions"))
            .await
            .unwrap();

        let role = store.get_role("tester").await.unwrap().unwrap();
        assert!(role.permissions.is_empty());
        assert_eq!(role.description, "no permissions");
    }

    #[tokio::test]
    async fn test_list_sorted_by_name() {
        let store = MemoryRoleStore::with_roles([
            RoleDefinition::new("viewer", ""),
            RoleDefinition::new("admin", ""),
            RoleDefinition::new("editor", ""),
        ]);

        let names: Vec<String> = store
            .list_roles()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.role_name)
            .collect();
        assert_eq!(names, vec!["admin", "editor", "viewer"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryRoleStore::with_roles([tester()]);

        assert!(store.delete_role("tester").await.unwrap());
        assert!(!store.delete_role("tester").await.unwrap());
        assert!(store.get_role("tester").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_survives_concurrent_write() {
        let store = MemoryRoleStore::with_roles([tester()]);

        let before = store.snapshot().await;
        store.delete_role("tester").await.unwrap();

        // The old snapshot is unchanged by the delete
        assert!(before.contains_key("tester"));
        assert!(store.snapshot().await.is_empty());
    }
}
