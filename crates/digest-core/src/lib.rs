//! Digest Core - shared configuration for all digest bot services.
//!
//! - **config**: state directory layout, env file location and path overrides

pub mod config;

pub use config::{
    config_dir, directory_mirror_file, ensure_all_dirs, env_file, roles_file,
    roster_file, runtime_state_dir, state_dir,
};
