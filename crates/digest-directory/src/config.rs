//! Directory configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DirectoryError, Result};

/// Default lifetime of a cached directory entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default window past the TTL in which a cached entry may still be served
/// while the directory is unreachable.
pub const DEFAULT_STALE_GRACE: Duration = Duration::from_secs(900);

/// Default period of the background sync.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(600);

/// Default upper bound on tenant token reuse.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Configuration for the directory service.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// How long a cached entry is served without asking the directory.
    pub ttl: Duration,
    /// Extra time an expired entry may be served when the directory is down.
    pub stale_grace: Duration,
    /// How often the background sync refreshes the whole mirror.
    pub sync_interval: Duration,
    /// Where the mirror snapshot is kept between runs.
    pub mirror_path: Option<PathBuf>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            stale_grace: DEFAULT_STALE_GRACE,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            mirror_path: None,
        }
    }
}

impl DirectoryConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from the environment.
    ///
    /// - `DIRECTORY_CACHE_TTL_SECS`
    /// - `DIRECTORY_STALE_GRACE_SECS`
    /// - `DIRECTORY_SYNC_INTERVAL_SECS`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ttl) = env_secs("DIRECTORY_CACHE_TTL_SECS") {
            config.ttl = ttl;
        }
        if let Some(grace) = env_secs("DIRECTORY_STALE_GRACE_SECS") {
            config.stale_grace = grace;
        }
        if let Some(interval) = env_secs("DIRECTORY_SYNC_INTERVAL_SECS") {
            config.sync_interval = interval;
        }
        config
    }

    /// Sets the cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the stale grace window.
    pub fn with_stale_grace(mut self, grace: Duration) -> Self {
        self.stale_grace = grace;
        self
    }

    /// Sets the background sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the mirror snapshot path.
    pub fn with_mirror_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mirror_path = Some(path.into());
        self
    }
}

/// Names of the HR table columns the directory reads.
#[derive(Debug, Clone)]
pub struct HrFieldNames {
    pub username: String,
    pub employee_name: String,
    pub status: String,
    pub role: String,
}

impl Default for HrFieldNames {
    fn default() -> Self {
        Self {
            username: "telegram".to_string(),
            employee_name: "name".to_string(),
            status: "status".to_string(),
            role: "role".to_string(),
        }
    }
}

/// Connection settings for the HR table API.
#[derive(Debug, Clone)]
pub struct HrTableConfig {
    /// API base URL.
    pub base_url: String,
    /// Application credentials used to obtain a tenant token.
    pub app_id: String,
    pub app_secret: String,
    /// Spreadsheet app holding the roster table.
    pub app_token: String,
    /// Roster table within the app.
    pub table_id: String,
    /// Column names.
    pub fields: HrFieldNames,
    /// Upper bound on how long a tenant token is reused.
    pub token_ttl: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Records requested per page.
    pub page_size: u32,
}

/// Default HR table API endpoint.
pub const DEFAULT_HR_BASE_URL: &str = "https://open.larksuite.com";

impl HrTableConfig {
    /// Creates a config with the required identifiers and default tuning.
    pub fn new(
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        app_token: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: DEFAULT_HR_BASE_URL.to_string(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            app_token: app_token.into(),
            table_id: table_id.into(),
            fields: HrFieldNames::default(),
            token_ttl: DEFAULT_TOKEN_TTL,
            request_timeout: Duration::from_secs(10),
            page_size: 500,
        }
    }

    /// Reads the config from the environment.
    ///
    /// Required: `HR_TABLE_APP_ID`, `HR_TABLE_APP_SECRET`, `HR_TABLE_APP_TOKEN`,
    /// `HR_TABLE_ID`. Optional: `HR_TABLE_BASE_URL`, `HR_FIELD_USERNAME`,
    /// `HR_FIELD_NAME`, `HR_FIELD_STATUS`, `HR_FIELD_ROLE`.
    ///
    /// # Errors
    /// Returns `DirectoryError::Config` naming the first missing variable.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(
            required_env("HR_TABLE_APP_ID")?,
            required_env("HR_TABLE_APP_SECRET")?,
            required_env("HR_TABLE_APP_TOKEN")?,
            required_env("HR_TABLE_ID")?,
        );

        if let Ok(url) = std::env::var("HR_TABLE_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(name) = std::env::var("HR_FIELD_USERNAME") {
            config.fields.username = name;
        }
        if let Ok(name) = std::env::var("HR_FIELD_NAME") {
            config.fields.employee_name = name;
        }
        if let Ok(name) = std::env::var("HR_FIELD_STATUS") {
            config.fields.status = name;
        }
        if let Ok(name) = std::env::var("HR_FIELD_ROLE") {
            config.fields.role = name;
        }

        Ok(config)
    }

    /// Sets the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the token TTL cap.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DirectoryError::Config(format!("{} not set", name)))
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DirectoryConfig::default();

        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.stale_grace, Duration::from_secs(900));
        assert_eq!(config.sync_interval, Duration::from_secs(600));
        assert!(config.mirror_path.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = DirectoryConfig::new()
            .with_ttl(Duration::from_secs(10))
            .with_stale_grace(Duration::from_secs(20))
            .with_sync_interval(Duration::from_secs(30))
            .with_mirror_path("/tmp/directory.json");

        assert_eq!(config.ttl, Duration::from_secs(10));
        assert_eq!(config.stale_grace, Duration::from_secs(20));
        assert_eq!(config.sync_interval, Duration::from_secs(30));
        assert_eq!(config.mirror_path, Some(PathBuf::from("/tmp/directory.json")));
    }

    #[test]
    fn test_hr_table_defaults() {
        let config = HrTableConfig::new("id", "secret", "app", "tbl");

        assert_eq!(config.base_url, DEFAULT_HR_BASE_URL);
        assert_eq!(config.token_ttl, Duration::from_secs(3600));
        assert_eq!(config.fields.username, "telegram");
        assert_eq!(config.page_size, 500);
    }

    #[test]
    fn test_required_env_missing() {
        let err = required_env("DIGEST_TEST_SURELY_UNSET_VARIABLE").unwrap_err();
        assert!(err.to_string().contains("DIGEST_TEST_SURELY_UNSET_VARIABLE not set"));
    }
}
