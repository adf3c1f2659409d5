//! Shared configuration for the digest bot.
//!
//! Provides functions to locate the bot's state directory and the files the
//! role system keeps there.
//!
//! # Storage Structure
//!
//! ```text
//! ~/.digest-bot/
//! ├── config/       # .env.local with API credentials
//! └── state/
//!     ├── roles.json        # Role definitions
//!     ├── roster.json       # Local roster (roster directory source)
//!     └── directory.json    # Last synced directory mirror
//! ```
//!
//! # Environment Variables
//!
//! - `DIGEST_STATE_DIR`: Override the base state directory
//! - `DIGEST_CONFIG_DIR`: Override the config directory
//! - `DIGEST_ROSTER_FILE`: Override the roster file path

use std::path::PathBuf;
use std::sync::OnceLock;

/// Environment variable for custom state directory.
pub const STATE_DIR_ENV: &str = "DIGEST_STATE_DIR";

/// Environment variable for custom config directory.
pub const CONFIG_DIR_ENV: &str = "DIGEST_CONFIG_DIR";

/// Environment variable for a custom roster file.
pub const ROSTER_FILE_ENV: &str = "DIGEST_ROSTER_FILE";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".digest-bot";

const CONFIG_SUBDIR: &str = "config";
const STATE_SUBDIR: &str = "state";

static STATE_DIR_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Get the base state directory.
///
/// The state directory is determined by:
/// 1. `DIGEST_STATE_DIR` environment variable if set
/// 2. `~/.digest-bot` if home directory is available
/// 3. `.digest-bot` in current directory as fallback
pub fn state_dir() -> PathBuf {
    STATE_DIR_CACHE
        .get_or_init(|| {
            std::env::var(STATE_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    dirs::home_dir()
                        .map(|h| h.join(DEFAULT_STATE_DIR))
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
                })
        })
        .clone()
}

/// Get the config directory.
///
/// Defaults to `~/.digest-bot/config/` or `DIGEST_CONFIG_DIR` env var.
pub fn config_dir() -> PathBuf {
    std::env::var(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(CONFIG_SUBDIR))
}

/// Get the runtime state directory.
pub fn runtime_state_dir() -> PathBuf {
    state_dir().join(STATE_SUBDIR)
}

/// Get the .env.local file path (secrets: HR table credentials).
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Get the role definitions file path.
pub fn roles_file() -> PathBuf {
    runtime_state_dir().join("roles.json")
}

/// Get the local roster file path.
///
/// Defaults to `state/roster.json` or `DIGEST_ROSTER_FILE` env var.
pub fn roster_file() -> PathBuf {
    std::env::var(ROSTER_FILE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| runtime_state_dir().join("roster.json"))
}

/// Get the directory mirror snapshot path.
pub fn directory_mirror_file() -> PathBuf {
    runtime_state_dir().join("directory.json")
}

/// Ensure the config and runtime state directories exist.
///
/// # Errors
/// Returns an error if any directory cannot be created.
pub fn ensure_all_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(config_dir())?;
    std::fs::create_dir_all(runtime_state_dir())?;
    Ok(())
}
