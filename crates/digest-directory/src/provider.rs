//! Directory traits.
//!
//! - [`UserDirectoryProvider`] is what the access layer consumes: a lookup
//!   that never fails, only reports found / not found / unavailable.
//! - [`DirectorySource`] is the backend seam: the HR table API or a local
//!   roster document. Sources return errors; the service turns them into
//!   lookup outcomes.

use async_trait::async_trait;
use digest_models::UserRecord;

use crate::error::Result;

/// Outcome of a directory lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryLookup {
    /// The user exists. `stale` is set when the record came from the cache
    /// because the directory could not be reached.
    Found { record: UserRecord, stale: bool },
    /// The directory answered and has no such user.
    NotFound,
    /// The directory could not be asked and nothing usable was cached.
    Unavailable,
}

impl DirectoryLookup {
    /// Returns the record if found.
    pub fn record(&self) -> Option<&UserRecord> {
        match self {
            DirectoryLookup::Found { record, .. } => Some(record),
            _ => None,
        }
    }
}

/// Resolves usernames to directory records.
#[async_trait]
pub trait UserDirectoryProvider: Send + Sync {
    /// Looks up a user by username.
    ///
    /// The username is normalized (trimmed, `@` stripped, lowercased) before
    /// the lookup.
    async fn get_user_by_username(&self, username: &str) -> DirectoryLookup;
}

/// Backend that can answer directory queries.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fetches a single user by normalized username.
    ///
    /// # Returns
    /// `Ok(None)` if the directory has no such user.
    async fn fetch_user(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Fetches the whole roster.
    async fn fetch_all(&self) -> Result<Vec<UserRecord>>;
}
