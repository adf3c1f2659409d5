//! Local roster document source.
//!
//! Reads the directory from a JSON document on disk, for deployments that
//! keep the employee roster in the bot's own store instead of the HR table.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use digest_models::{normalize_username, EmploymentStatus, UserRecord};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{DirectoryError, Result};
use crate::provider::DirectorySource;

/// Directory source backed by a JSON roster file.
///
/// ```text
/// [
///   { "username": "alice", "employee_name": "Alice", "employment_status": "active", "assigned_role": "tester" }
/// ]
/// ```
pub struct RosterFileSource {
    path: PathBuf,
}

impl RosterFileSource {
    /// Creates a source reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the roster document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<UserRecord>> {
        let data = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DirectoryError::Unavailable(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        let rows: Vec<Value> = serde_json::from_str(&data)
            .map_err(|e| DirectoryError::Malformed(format!("{}: {}", self.path.display(), e)))?;

        let mut users = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            let row: RosterRow = match serde_json::from_value(row) {
                Ok(row) => row,
                Err(e) => {
                    warn!(path = %self.path.display(), index, error = %e, "Skipping unreadable roster entry");
                    continue;
                }
            };
            let record = row.into_record();
            if record.username.is_empty() {
                warn!(path = %self.path.display(), index, "Skipping roster entry without username");
                continue;
            }
            users.push(record);
        }

        debug!(count = users.len(), path = %self.path.display(), "Loaded roster");
        Ok(users)
    }
}

/// One roster entry as written by hand or exported from HR.
#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(default)]
    username: String,
    #[serde(default)]
    employee_name: String,
    /// Free text, e.g. "active", "Active" or "employed".
    #[serde(default, alias = "status")]
    employment_status: Option<String>,
    #[serde(default, alias = "role")]
    assigned_role: Option<String>,
}

impl RosterRow {
    fn into_record(self) -> UserRecord {
        let status = self
            .employment_status
            .as_deref()
            .map(EmploymentStatus::parse_lenient)
            .unwrap_or_default();
        UserRecord::new(&self.username, self.employee_name, status, self.assigned_role)
    }
}

#[async_trait]
impl DirectorySource for RosterFileSource {
    fn name(&self) -> &str {
        "roster"
    }

    async fn fetch_user(&self, username: &str) -> Result<Option<UserRecord>> {
        let key = normalize_username(username);
        Ok(self.load().await?.into_iter().find(|r| r.username == key))
    }

    async fn fetch_all(&self) -> Result<Vec<UserRecord>> {
        self.load().await
    }
}
