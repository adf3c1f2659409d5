//! Core data models for the digest bot role system.
//!
//! This crate contains the shared types used by the directory, role store
//! and access layers:
//!
//! - [`UserRecord`] and [`EmploymentStatus`] mirror the external HR directory
//! - [`RoleDefinition`] is a named bundle of [`Permission`]s
//! - [`PermissionCheckResult`] and [`DenialReason`] describe an access decision

pub mod access;
pub mod permission;
pub mod role;
pub mod user;

pub use access::{DenialReason, PermissionCheckResult};
pub use permission::{Permission, UnknownPermission, UNKNOWN_PERMISSION_DESCRIPTION};
pub use role::RoleDefinition;
pub use user::{normalize_username, EmploymentStatus, UserRecord};
