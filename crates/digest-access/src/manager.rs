//! Role manager.
//!
//! Combines the HR directory lookup with the role store into a single
//! access decision. Every resolution failure denies access.

use std::collections::BTreeSet;
use std::sync::Arc;

use digest_directory::{DirectoryLookup, UserDirectoryProvider};
use digest_models::{
    normalize_username, DenialReason, Permission, PermissionCheckResult, RoleDefinition,
};
use digest_persistence::RoleStore;
use tracing::{debug, info, warn};

use crate::error::{AccessError, Result};

/// Name of the role created by [`RoleManager::ensure_default_roles`].
pub const DEFAULT_ADMIN_ROLE: &str = "admin";

/// Resolves users to roles and answers permission questions.
///
/// Bot handlers and admin panels go through this type only; they never
/// query the directory or the role store directly.
pub struct RoleManager {
    directory: Arc<dyn UserDirectoryProvider>,
    roles: Arc<dyn RoleStore>,
}

impl RoleManager {
    /// Creates a manager over a directory and a role store.
    pub fn new(directory: Arc<dyn UserDirectoryProvider>, roles: Arc<dyn RoleStore>) -> Self {
        Self { directory, roles }
    }

    /// Resolves a username to its role definition.
    ///
    /// Order: directory lookup, employment status, role lookup. An inactive
    /// user is denied before the role store is consulted.
    async fn resolve(&self, username: &str) -> std::result::Result<RoleDefinition, PermissionCheckResult> {
        let key = normalize_username(username);

        let record = match self.directory.get_user_by_username(&key).await {
            DirectoryLookup::Found { record, stale } => {
                if stale {
                    warn!(username = %key, "Deciding access from stale directory record");
                }
                record
            }
            DirectoryLookup::NotFound => {
                debug!(username = %key, "User not in directory");
                return Err(PermissionCheckResult::denied(DenialReason::UserNotRecognized, None));
            }
            DirectoryLookup::Unavailable => {
                return Err(PermissionCheckResult::denied(DenialReason::DirectoryUnavailable, None));
            }
        };

        if !record.employment_status.is_active() {
            debug!(username = %key, status = %record.employment_status, "User not active");
            return Err(PermissionCheckResult::denied(
                DenialReason::UserNotActive,
                record.assigned_role,
            ));
        }

        let Some(role_name) = record
            .assigned_role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
        else {
            return Err(PermissionCheckResult::denied(DenialReason::RoleUndefined, None));
        };

        match self.roles.get_role(role_name).await {
            Ok(Some(role)) => Ok(role),
            Ok(None) => {
                debug!(username = %key, role = role_name, "Assigned role does not exist");
                Err(PermissionCheckResult::denied(
                    DenialReason::RoleUndefined,
                    Some(role_name.to_string()),
                ))
            }
            Err(e) => {
                warn!(username = %key, role = role_name, error = %e, "Role store read failed");
                Err(PermissionCheckResult::denied(
                    DenialReason::RoleStoreUnavailable,
                    Some(role_name.to_string()),
                ))
            }
        }
    }

    // =========================================================================
    // Access checks
    // =========================================================================

    /// Decides whether the user may use the bot at all.
    ///
    /// Use [`PermissionCheckResult::as_tuple`] for the `(granted, reason)` form.
    pub async fn check_user_access(&self, username: &str) -> PermissionCheckResult {
        match self.resolve(username).await {
            Ok(role) => PermissionCheckResult::granted(role.role_name),
            Err(denied) => denied,
        }
    }

    /// Full permission decision, including the resolved role and reason.
    pub async fn check_permission_result(
        &self,
        username: &str,
        permission: Permission,
    ) -> PermissionCheckResult {
        match self.resolve(username).await {
            Ok(role) if role.grants(permission) => PermissionCheckResult::granted(role.role_name),
            Ok(role) => {
                PermissionCheckResult::denied(DenialReason::PermissionNotGranted, Some(role.role_name))
            }
            Err(denied) => denied,
        }
    }

    /// Returns true only if the user resolves and the role grants `permission`.
    pub async fn check_permission(&self, username: &str, permission: Permission) -> bool {
        self.check_permission_result(username, permission).await.granted
    }

    /// Like [`check_permission`](Self::check_permission) with a permission
    /// name; unknown names are denied.
    pub async fn check_permission_named(&self, username: &str, permission: &str) -> bool {
        match permission.parse::<Permission>() {
            Ok(permission) => self.check_permission(username, permission).await,
            Err(e) => {
                debug!(username, error = %e, "Permission check for unknown name");
                false
            }
        }
    }

    /// Permissions of the user's role; empty if resolution fails.
    pub async fn get_user_permissions_by_username(&self, username: &str) -> BTreeSet<Permission> {
        self.resolve(username)
            .await
            .map(|role| role.permissions)
            .unwrap_or_default()
    }

    /// Every known permission name, in display order.
    pub fn get_available_permissions(&self) -> Vec<&'static str> {
        Permission::ALL.iter().map(|p| p.as_str()).collect()
    }

    /// Human-readable description of a permission name.
    pub fn get_permission_description(&self, permission: &str) -> &'static str {
        Permission::describe(permission)
    }

    // =========================================================================
    // Role administration
    // =========================================================================

    /// Returns true if the role exists.
    pub async fn role_exists(&self, name: &str) -> Result<bool> {
        Ok(self.roles.role_exists(name.trim()).await?)
    }

    /// Returns a role definition by name.
    pub async fn get_role_permissions(&self, name: &str) -> Result<Option<RoleDefinition>> {
        Ok(self.roles.get_role(name.trim()).await?)
    }

    /// Returns every role ordered by name.
    pub async fn get_all_roles(&self) -> Result<Vec<RoleDefinition>> {
        Ok(self.roles.list_roles().await?)
    }

    /// Creates or replaces a role.
    ///
    /// # Errors
    /// `InvalidRoleName` if the name is blank.
    pub async fn upsert_role(&self, mut role: RoleDefinition) -> Result<()> {
        let name = role.role_name.trim().to_string();
        if name.is_empty() {
            return Err(AccessError::InvalidRoleName(role.role_name));
        }
        role.role_name = name.clone();

        let permissions = role.permissions.len();
        self.roles.upsert_role(role).await?;
        info!(role = %name, permissions, "Role saved");
        Ok(())
    }

    /// Deletes a role. Users still assigned to it are denied with
    /// "role undefined".
    pub async fn delete_role(&self, name: &str) -> Result<bool> {
        let name = name.trim();
        let removed = self.roles.delete_role(name).await?;
        if removed {
            info!(role = name, "Role deleted");
        }
        Ok(removed)
    }

    /// Creates the `admin` role with every permission if it is missing.
    ///
    /// # Returns
    /// `true` if the role was created.
    pub async fn ensure_default_roles(&self) -> Result<bool> {
        if self.roles.role_exists(DEFAULT_ADMIN_ROLE).await? {
            return Ok(false);
        }

        let admin = RoleDefinition::with_permissions(
            DEFAULT_ADMIN_ROLE,
            "Full access",
            Permission::ALL,
        );
        self.roles.upsert_role(admin).await?;
        info!(role = DEFAULT_ADMIN_ROLE, "Created default role");
        Ok(true)
    }
}
