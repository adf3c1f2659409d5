//! Permission registry.
//!
//! Permissions are a closed set of named capabilities. They are stored and
//! displayed by their snake_case wire names (e.g. `can_access_sources`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Description returned for permission names that are not in the registry.
pub const UNKNOWN_PERMISSION_DESCRIPTION: &str = "Unknown permission";

/// A named capability that can be granted through a role.
///
/// Variants are declared in alphabetical order of their wire names, so the
/// derived `Ord` gives a deterministic display order for permission sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// View analysis results built from collected content.
    CanAccessAnalysis,
    /// Read generated digests.
    CanAccessDigests,
    /// Browse the list of parsed sources.
    CanAccessSources,
    /// Manage Telegram user accounts and their sessions.
    CanManageAccounts,
    /// Create, edit and delete roles.
    CanManageRoles,
    /// Add and remove parsed sources.
    CanManageSources,
}

impl Permission {
    /// Every known permission, in display order.
    pub const ALL: [Permission; 6] = [
        Permission::CanAccessAnalysis,
        Permission::CanAccessDigests,
        Permission::CanAccessSources,
        Permission::CanManageAccounts,
        Permission::CanManageRoles,
        Permission::CanManageSources,
    ];

    /// Returns the wire name of the permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CanAccessAnalysis => "can_access_analysis",
            Permission::CanAccessDigests => "can_access_digests",
            Permission::CanAccessSources => "can_access_sources",
            Permission::CanManageAccounts => "can_manage_accounts",
            Permission::CanManageRoles => "can_manage_roles",
            Permission::CanManageSources => "can_manage_sources",
        }
    }

    /// Returns a human-readable description for admin screens.
    pub fn description(&self) -> &'static str {
        match self {
            Permission::CanAccessAnalysis => "View analysis of collected content",
            Permission::CanAccessDigests => "Read generated digests",
            Permission::CanAccessSources => "Browse parsed sources",
            Permission::CanManageAccounts => "Manage Telegram accounts and sessions",
            Permission::CanManageRoles => "Create, edit and delete roles",
            Permission::CanManageSources => "Add and remove parsed sources",
        }
    }

    /// Looks up the description for a permission name.
    ///
    /// Unknown names yield [`UNKNOWN_PERMISSION_DESCRIPTION`].
    pub fn describe(name: &str) -> &'static str {
        name.parse::<Permission>()
            .map(|p| p.description())
            .unwrap_or(UNKNOWN_PERMISSION_DESCRIPTION)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a permission name that is not registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPermission(pub String);

impl fmt::Display for UnknownPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown permission: {}", self.0)
    }
}

impl std::error::Error for UnknownPermission {}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == name)
            .ok_or_else(|| UnknownPermission(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_sorted() {
        let mut sorted = Permission::ALL;
        sorted.sort();
        assert_eq!(sorted, Permission::ALL);

        let names: Vec<&str> = Permission::ALL.iter().map(|p| p.as_str()).collect();
        let mut sorted_names = names.clone();
        sorted_names.sort();
        assert_eq!(names, sorted_names);
    }

    #[test]
    fn test_parse_known() {
        assert_eq!(
            "can_access_sources".parse::<Permission>().unwrap(),
            Permission::CanAccessSources
        );
        assert_eq!(
            " can_manage_roles ".parse::<Permission>().unwrap(),
            Permission::CanManageRoles
        );
    }

    #[test]
    fn test_parse_unknown() {
        let err = "can_fly".parse::<Permission>().unwrap_err();
        assert_eq!(err, UnknownPermission("can_fly".to_string()));
        assert_eq!(err.to_string(), "unknown permission: can_fly");
    }

    #[test]
    fn test_serde_uses_wire_names() {
        for permission in Permission::ALL {
            let json = serde_json::to_string(&permission).unwrap();
            assert_eq!(json, format!("\"{}\"", permission.as_str()));
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(Permission::describe("can_access_digests"), "Read generated digests");
        assert_eq!(Permission::describe("nope"), UNKNOWN_PERMISSION_DESCRIPTION);
    }
}
