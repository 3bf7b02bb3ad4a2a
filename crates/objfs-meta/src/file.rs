//! Lock-wrapped metadata handle for one logical file
//!
//! Readers share the index; mutations and saves take it exclusively. This
//! only coordinates threads of one process. Single-writer discipline across
//! processes is the caller's job.

use crate::document::{self, MetadataDocument, sidecar_path};
use crate::index::ObjectIndex;
use crate::key::ObjectKey;
use crate::types::ObjectDescriptor;
use objfs_common::{ConfigProvider, ObjectStorageConfig, Result};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::path::{Path, PathBuf};

/// Metadata of one logical file together with its sidecar location
pub struct MetadataFile {
    logical_path: PathBuf,
    sidecar_path: PathBuf,
    index: RwLock<ObjectIndex>,
}

impl MetadataFile {
    /// Open the metadata for `logical`, creating `<logical>.meta` if missing
    pub fn open(logical: impl AsRef<Path>, config: ObjectStorageConfig) -> Result<Self> {
        let logical_path = logical.as_ref().to_path_buf();
        let sidecar_path = sidecar_path(&logical_path);
        let index = document::load(&sidecar_path, config)?;
        Ok(Self {
            logical_path,
            sidecar_path,
            index: RwLock::new(index),
        })
    }

    /// Open the metadata for `logical` only if its sidecar already exists.
    ///
    /// Returns `None` when there is no sidecar. Nothing is written.
    pub fn open_existing(
        logical: impl AsRef<Path>,
        config: ObjectStorageConfig,
    ) -> Result<Option<Self>> {
        let logical_path = logical.as_ref().to_path_buf();
        let sidecar_path = sidecar_path(&logical_path);
        let Some(document) = MetadataDocument::read(&sidecar_path)? else {
            return Ok(None);
        };
        let index = document.into_index(config)?;
        Ok(Some(Self {
            logical_path,
            sidecar_path,
            index: RwLock::new(index),
        }))
    }

    /// Open with the object capacity read from a configuration provider
    pub fn open_with_provider(
        logical: impl AsRef<Path>,
        provider: &dyn ConfigProvider,
    ) -> Result<Self> {
        Self::open(logical, ObjectStorageConfig::from_provider(provider)?)
    }

    /// Path of the logical file
    pub fn logical_path(&self) -> &Path {
        &self.logical_path
    }

    /// Path of the sidecar document
    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar_path
    }

    /// Shared access to the index
    pub fn read(&self) -> RwLockReadGuard<'_, ObjectIndex> {
        self.index.read()
    }

    /// Exclusive access to the index, for batching several mutations
    pub fn write(&self) -> RwLockWriteGuard<'_, ObjectIndex> {
        self.index.write()
    }

    /// See [`ObjectIndex::range_query`]
    pub fn range_query(&self, offset: u64, length: u64) -> Vec<ObjectDescriptor> {
        self.index.read().range_query(offset, length)
    }

    /// See [`ObjectIndex::append`]
    pub fn append(&self, source_name: &str, length: u64) -> Result<ObjectDescriptor> {
        self.index.write().append(source_name, length)
    }

    /// See [`ObjectIndex::update_entry`]
    pub fn update_entry(&self, offset: u64, key: ObjectKey, length: u64) -> Result<()> {
        self.index.write().update_entry(offset, key, length)
    }

    /// See [`ObjectIndex::update_entry_length`]
    pub fn update_entry_length(&self, offset: u64, length: u64) -> Result<()> {
        self.index.write().update_entry_length(offset, length)
    }

    /// Save the current index to the sidecar
    pub fn persist(&self) -> Result<()> {
        let index = self.index.write();
        document::save(&index, &self.sidecar_path)
    }

    /// Bump the revision and save, returning the new revision
    pub fn commit(&self) -> Result<u32> {
        let mut index = self.index.write();
        let mut snapshot = MetadataDocument::from_index(&index);
        snapshot.revision = snapshot.revision.saturating_add(1);
        // The in-memory revision only moves once the sidecar holds it.
        snapshot.write(&self.sidecar_path)?;
        Ok(index.bump_revision())
    }
}
