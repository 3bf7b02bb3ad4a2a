//! objfs Common - Shared types and utilities
//!
//! This crate provides the error type and the configuration layer shared by
//! the object-backed file metadata crates.

pub mod config;
pub mod error;

pub use config::{ConfigProvider, FileConfig, MapConfig, ObjectStorageConfig};
pub use error::{Error, Result};
