//! Persistence layer for the digest bot role system.
//!
//! Role definitions live in a single JSON document that is rewritten
//! atomically (write to temp file, then rename) on every change. Readers
//! always see a complete snapshot of the role table.
//!
//! # Example
//!
//! ```no_run
//! use digest_models::{Permission, RoleDefinition};
//! use digest_persistence::{FileRoleStore, RoleStore};
//!
//! # async fn example() -> digest_persistence::Result<()> {
//! let store = FileRoleStore::open("/home/user/.digest-bot/state/roles.json")?;
//!
//! let role = RoleDefinition::with_permissions(
//!     "tester",
//!     "QA team",
//!     [Permission::CanAccessSources, Permission::CanAccessAnalysis],
//! );
//! store.upsert_role(role).await?;
//!
//! assert!(store.role_exists("tester").await?);
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod error;
pub mod file_store;
pub mod role_store;

pub use error::{PersistenceError, Result};
pub use file_store::FileRoleStore;
pub use role_store::{MemoryRoleStore, RoleStore};
