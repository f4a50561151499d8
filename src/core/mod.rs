// src/core/mod.rs
//! Shared building blocks: configuration and file system helpers

pub mod config_manager;
pub mod fs_ops;

pub use config_manager::{CliOverrides, ConfigManager};
pub use fs_ops::FsOps;
