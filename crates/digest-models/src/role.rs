//! Role definitions.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::permission::Permission;

/// A named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Unique role name.
    pub role_name: String,

    /// Free-form description shown to administrators.
    #[serde(default)]
    pub description: String,

    /// Granted permissions.
    ///
    /// Stored documents may contain names that are no longer registered;
    /// those are dropped when the role is read.
    #[serde(default, deserialize_with = "deserialize_permissions")]
    pub permissions: BTreeSet<Permission>,

    /// When the role was last written.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl RoleDefinition {
    /// Creates a role with no permissions.
    pub fn new(role_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            role_name: role_name.into(),
            description: description.into(),
            permissions: BTreeSet::new(),
            updated_at: Utc::now(),
        }
    }

    /// Creates a role with the given permissions.
    pub fn with_permissions(
        role_name: impl Into<String>,
        description: impl Into<String>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        let mut role = Self::new(role_name, description);
        role.permissions = permissions.into_iter().collect();
        role
    }

    /// Returns true if the role grants the permission.
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Returns the permission names in display order.
    pub fn permission_names(&self) -> Vec<&'static str> {
        self.permissions.iter().map(|p| p.as_str()).collect()
    }
}

fn deserialize_permissions<'de, D>(deserializer: D) -> Result<BTreeSet<Permission>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    Ok(names.iter().filter_map(|n| n.parse().ok()).collect())
}
