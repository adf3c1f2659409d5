//! Access decision types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why an access check was denied.
///
/// The display strings are shown to administrators verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The directory could not be asked and nothing usable was cached.
    DirectoryUnavailable,
    /// The directory has no such user.
    UserNotRecognized,
    /// The user's employment status is not active.
    UserNotActive,
    /// The assigned role does not exist (or no role is assigned).
    RoleUndefined,
    /// The role store could not be read.
    RoleStoreUnavailable,
    /// The role exists but does not grant the requested permission.
    PermissionNotGranted,
}

impl DenialReason {
    /// Returns the verbatim reason string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::DirectoryUnavailable => "directory unavailable",
            DenialReason::UserNotRecognized => "user not recognized",
            DenialReason::UserNotActive => "user not active",
            DenialReason::RoleUndefined => "role undefined",
            DenialReason::RoleStoreUnavailable => "role store unavailable",
            DenialReason::PermissionNotGranted => "permission not granted",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single access or permission check. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCheckResult {
    /// Whether access is granted.
    pub granted: bool,
    /// Denial reason, `None` when granted.
    pub denial: Option<DenialReason>,
    /// Role the user resolved to, when resolution got that far.
    pub resolved_role: Option<String>,
}

impl PermissionCheckResult {
    /// A granted result.
    pub fn granted(role: impl Into<String>) -> Self {
        Self {
            granted: true,
            denial: None,
            resolved_role: Some(role.into()),
        }
    }

    /// A denied result.
    pub fn denied(reason: DenialReason, resolved_role: Option<String>) -> Self {
        Self {
            granted: false,
            denial: Some(reason),
            resolved_role,
        }
    }

    /// Reason string; empty when granted.
    pub fn reason(&self) -> &'static str {
        self.denial.map(|d| d.as_str()).unwrap_or("")
    }

    /// Returns `(granted, reason)`.
    pub fn as_tuple(&self) -> (bool, &'static str) {
        (self.granted, self.reason())
    }
}
