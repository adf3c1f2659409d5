//! Access decisions for the digest bot.
//!
//! [`RoleManager`] resolves a Telegram username through the HR directory
//! to an assigned role, then through the role store to a permission set.
//! Any failure along the way denies access with a fixed reason string:
//!
//! | Stage | Reason |
//! |-------|--------|
//! | directory cannot be asked | `directory unavailable` |
//! | no such user | `user not recognized` |
//! | employment status not active | `user not active` |
//! | role missing or not assigned | `role undefined` |
//! | role store read failed | `role store unavailable` |
//! | role lacks the permission | `permission not granted` |

pub mod error;
pub mod manager;

pub use error::{AccessError, Result};
pub use manager::{RoleManager, DEFAULT_ADMIN_ROLE};
