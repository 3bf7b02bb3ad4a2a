//! Configuration for objfs
//!
//! Settings are read through the [`ConfigProvider`] trait so the metadata
//! layer never touches process-wide state. Two providers ship here:
//! [`MapConfig`] (in-memory) and [`FileConfig`] (TOML file plus environment
//! overrides, backed by the `config` crate).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error};

/// Section holding object-store settings
pub const OBJECT_STORAGE_SECTION: &str = "ObjectStorage";

/// Key of the per-object capacity inside [`OBJECT_STORAGE_SECTION`]
pub const OBJECT_SIZE_KEY: &str = "object_size";

/// Capacity used when `object_size` is not configured (5 MiB)
pub const DEFAULT_OBJECT_SIZE: u64 = 5 * 1024 * 1024;

/// Environment prefix for [`FileConfig`] overrides
pub const ENV_PREFIX: &str = "OBJFS";

/// Source of raw configuration values, addressed by section and key
pub trait ConfigProvider {
    /// Look up a raw value. `None` means the value is not set.
    fn get_value(&self, section: &str, key: &str) -> Option<String>;
}

/// In-memory configuration provider
#[derive(Clone, Debug, Default)]
pub struct MapConfig {
    values: HashMap<(String, String), String>,
}

impl MapConfig {
    /// Create an empty provider
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    #[must_use]
    pub fn with(mut self, section: &str, key: &str, value: impl Into<String>) -> Self {
        self.set(section, key, value);
        self
    }

    /// Set a value, replacing any previous one
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.values
            .insert((section.to_string(), key.to_string()), value.into());
    }
}

impl ConfigProvider for MapConfig {
    fn get_value(&self, section: &str, key: &str) -> Option<String> {
        self.values
            .get(&(section.to_string(), key.to_string()))
            .cloned()
    }
}

/// Configuration provider backed by a TOML file and `OBJFS_*` environment
/// variables.
///
/// Environment variables use `__` between section and key, e.g.
/// `OBJFS_OBJECTSTORAGE__OBJECT_SIZE=1048576`. Lookups are case-insensitive.
pub struct FileConfig {
    settings: config::Config,
}

impl FileConfig {
    /// Load settings from an optional TOML file, then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, environment: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!("Loading configuration from {:?}", path);
            builder = builder.add_source(
                config::File::new(&path.to_string_lossy(), config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(environment);

        let settings = builder
            .build()
            .map_err(|e| Error::configuration(format!("failed to load configuration: {e}")))?;
        Ok(Self { settings })
    }

    fn lookup(&self, path: &str) -> Option<String> {
        let value = self.settings.get::<config::Value>(path).ok()?;
        Some(value.clone().into_string().unwrap_or_else(|_| value.to_string()))
    }
}

impl ConfigProvider for FileConfig {
    fn get_value(&self, section: &str, key: &str) -> Option<String> {
        let path = format!("{section}.{key}");
        self.lookup(&path)
            .or_else(|| self.lookup(&path.to_lowercase()))
    }
}

/// `OBJFS_<SECTION>__<KEY>` environment source
fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

/// Object-store settings consumed by the metadata layer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// Upper bound, in bytes, of logical data held by one backing object
    pub object_size: u64,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            object_size: DEFAULT_OBJECT_SIZE,
        }
    }
}

impl ObjectStorageConfig {
    /// Create settings with an explicit capacity
    pub fn with_object_size(object_size: u64) -> Result<Self> {
        if object_size == 0 {
            return Err(Error::configuration(format!(
                "{OBJECT_STORAGE_SECTION}/{OBJECT_SIZE_KEY} must be greater than zero"
            )));
        }
        Ok(Self { object_size })
    }

    /// Read settings from a provider.
    ///
    /// An unset `object_size` falls back to [`DEFAULT_OBJECT_SIZE`]. A value
    /// that is set but not a positive integer is a fatal misconfiguration.
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self> {
        let Some(raw) = provider.get_value(OBJECT_STORAGE_SECTION, OBJECT_SIZE_KEY) else {
            debug!(
                "{}/{} not set, using default {}",
                OBJECT_STORAGE_SECTION, OBJECT_SIZE_KEY, DEFAULT_OBJECT_SIZE
            );
            return Ok(Self::default());
        };

        let object_size = raw.trim().parse::<u64>().map_err(|e| {
            error!(
                "{}/{} must be set to a numeric value, got {:?}",
                OBJECT_STORAGE_SECTION, OBJECT_SIZE_KEY, raw
            );
            Error::configuration(format!(
                "{OBJECT_STORAGE_SECTION}/{OBJECT_SIZE_KEY} must be set to a numeric value, got {raw:?}: {e}"
            ))
        })?;
        Self::with_object_size(object_size)
    }
}
