//! Directory user records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Employment status reported by the HR directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    /// Currently employed.
    Active,
    /// No longer employed.
    Terminated,
    /// Status missing or not understood.
    #[default]
    Unknown,
}

impl EmploymentStatus {
    /// Parses a status string as it appears in the HR table.
    ///
    /// Matching is case-insensitive; anything unrecognized maps to `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "active" | "employed" | "working" => EmploymentStatus::Active,
            "terminated" | "dismissed" | "fired" | "inactive" => EmploymentStatus::Terminated,
            _ => EmploymentStatus::Unknown,
        }
    }

    /// Returns true for `Active`.
    pub fn is_active(&self) -> bool {
        matches!(self, EmploymentStatus::Active)
    }
}

impl fmt::Display for EmploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EmploymentStatus::Active => "active",
            EmploymentStatus::Terminated => "terminated",
            EmploymentStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Normalizes a Telegram username into the directory key.
///
/// Trims whitespace, strips a leading `@` and lowercases.
pub fn normalize_username(username: &str) -> String {
    username.trim().trim_start_matches('@').to_lowercase()
}

/// A user as known to the HR directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Directory key (normalized Telegram username).
    pub username: String,

    /// Employee display name.
    #[serde(default)]
    pub employee_name: String,

    /// Employment status.
    #[serde(default)]
    pub employment_status: EmploymentStatus,

    /// Name of the assigned role, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_role: Option<String>,
}

impl UserRecord {
    /// Creates a record; the username is normalized.
    pub fn new(
        username: &str,
        employee_name: impl Into<String>,
        employment_status: EmploymentStatus,
        assigned_role: Option<String>,
    ) -> Self {
        Self {
            username: normalize_username(username),
            employee_name: employee_name.into(),
            employment_status,
            assigned_role: assigned_role.filter(|r| !r.trim().is_empty()),
        }
    }

    /// Creates an active record with the given role.
    pub fn active(username: &str, employee_name: impl Into<String>, role: impl Into<String>) -> Self {
        Self::new(
            username,
            employee_name,
            EmploymentStatus::Active,
            Some(role.into()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("  @Alice "), "alice");
        assert_eq!(normalize_username("bob"), "bob");
        assert_eq!(normalize_username(""), "");
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(EmploymentStatus::parse_lenient("Active"), EmploymentStatus::Active);
        assert_eq!(EmploymentStatus::parse_lenient(" EMPLOYED "), EmploymentStatus::Active);
        assert_eq!(EmploymentStatus::parse_lenient("fired"), EmploymentStatus::Terminated);
        assert_eq!(EmploymentStatus::parse_lenient("on leave"), EmploymentStatus::Unknown);
        assert_eq!(EmploymentStatus::parse_lenient(""), EmploymentStatus::Unknown);
    }

    #[test]
    fn test_new_normalizes_and_drops_blank_role() {
        let record = UserRecord::new("@Carol", "Carol", EmploymentStatus::Active, Some("  ".into()));
        assert_eq!(record.username, "carol");
        assert!(record.assigned_role.is_none());
    }

    #[test]
    fn test_record_json_defaults() {
        let record: UserRecord = serde_json::from_str(r#"{"username": "dave"}"#).unwrap();
        assert_eq!(record.employment_status, EmploymentStatus::Unknown);
        assert!(record.assigned_role.is_none());
    }
}
