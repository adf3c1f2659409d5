//! HR directory access for the digest bot.
//!
//! Users are looked up by Telegram username in an external HR table (or a
//! local roster document). Lookups go through a TTL cache; when the
//! directory cannot be reached, recently cached records are served as
//! stale for a grace window, after which lookups report the directory as
//! unavailable. A background task refreshes the whole roster periodically.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use digest_directory::{
//!     DirectoryConfig, DirectoryService, HrTableConfig, HrTableSource, UserDirectoryProvider,
//! };
//!
//! # async fn example() -> digest_directory::Result<()> {
//! let source = HrTableSource::new(HrTableConfig::from_env()?)?;
//! let service = DirectoryService::new(Arc::new(source), DirectoryConfig::from_env());
//!
//! service.init().await?;
//! service.start_periodic_sync().await;
//!
//! let lookup = service.get_user_by_username("@alice").await;
//! println!("{:?}", lookup.record());
//!
//! service.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod hr_table;
pub mod mirror;
pub mod provider;
pub mod roster;
pub mod service;
pub mod sync;

pub use cache::{CacheLookup, CachedUser, DirectoryCache};
pub use config::{DirectoryConfig, HrFieldNames, HrTableConfig};
pub use error::{DirectoryError, Result};
pub use hr_table::HrTableSource;
pub use mirror::MirrorSnapshot;
pub use provider::{DirectoryLookup, DirectorySource, UserDirectoryProvider};
pub use roster::RosterFileSource;
pub use service::DirectoryService;
pub use sync::SyncWorker;
