//! Ordered object index for one logical file
//!
//! Descriptors live in a `BTreeMap` keyed by offset. Updates only touch the
//! length and key of an existing entry, never its offset, so an entry keeps
//! its position for its whole life. New offsets enter the index only through
//! [`ObjectIndex::append`], which places every object right after the last one.
//!
//! The index is not internally synchronized. Callers serialize mutations per
//! logical file; see [`crate::MetadataFile`] for a lock-wrapped handle.

use crate::key::ObjectKey;
use crate::resolver;
use crate::types::ObjectDescriptor;
use objfs_common::{ConfigProvider, Error, ObjectStorageConfig, Result};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use tracing::{debug, warn};

/// Format version written by this implementation
pub const CURRENT_VERSION: u32 = 1;

/// Revision of a freshly created index
pub const INITIAL_REVISION: u32 = 1;

/// Ordered set of object descriptors for one logical file
#[derive(Clone, Debug)]
pub struct ObjectIndex {
    /// Sidecar format version
    version: u32,
    /// Revision counter for optimistic-conflict detection by callers
    revision: u32,
    /// Capacity of every object in this index, fixed at construction
    object_size: u64,
    /// Descriptors keyed by offset
    objects: BTreeMap<u64, ObjectDescriptor>,
}

impl ObjectIndex {
    /// Create an empty index
    #[must_use]
    pub const fn new(config: ObjectStorageConfig) -> Self {
        Self {
            version: CURRENT_VERSION,
            revision: INITIAL_REVISION,
            object_size: config.object_size,
            objects: BTreeMap::new(),
        }
    }

    /// Create an empty index, reading the capacity from a provider.
    ///
    /// Fails with a configuration error if `object_size` is set but not a
    /// positive integer.
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self> {
        Ok(Self::new(ObjectStorageConfig::from_provider(provider)?))
    }

    /// Rebuild an index from descriptors in any order.
    ///
    /// Two descriptors with the same offset make the input malformed.
    pub fn from_descriptors(
        version: u32,
        revision: u32,
        config: ObjectStorageConfig,
        descriptors: impl IntoIterator<Item = ObjectDescriptor>,
    ) -> Result<Self> {
        let mut objects = BTreeMap::new();
        let mut previous: Option<u64> = None;
        let mut in_order = true;

        for descriptor in descriptors {
            let offset = descriptor.offset;
            if previous.is_some_and(|p| p > offset) {
                in_order = false;
            }
            previous = Some(offset);
            if objects.insert(offset, descriptor).is_some() {
                return Err(Error::serialization(format!(
                    "duplicate object at offset {offset}"
                )));
            }
        }

        if !in_order {
            warn!("Object list was not ordered by offset, re-sorted {} entries", objects.len());
        }

        Ok(Self {
            version,
            revision,
            object_size: config.object_size,
            objects,
        })
    }

    /// Sidecar format version
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Current revision
    #[must_use]
    pub const fn revision(&self) -> u32 {
        self.revision
    }

    /// Advance the revision, returning the new value
    pub const fn bump_revision(&mut self) -> u32 {
        self.revision = self.revision.saturating_add(1);
        self.revision
    }

    /// Capacity of each backing object
    #[must_use]
    pub const fn object_size(&self) -> u64 {
        self.object_size
    }

    /// Number of descriptors
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// End of the last object's materialized span, 0 when empty
    #[must_use]
    pub fn logical_size(&self) -> u64 {
        self.objects
            .last_key_value()
            .map_or(0, |(_, last)| last.end())
    }

    /// Descriptor starting exactly at `offset`
    #[must_use]
    pub fn get(&self, offset: u64) -> Option<&ObjectDescriptor> {
        self.objects.get(&offset)
    }

    /// Descriptors in ascending offset order
    pub fn iter(&self) -> impl Iterator<Item = &ObjectDescriptor> {
        self.objects.values()
    }

    /// Owned copy of all descriptors in ascending offset order
    #[must_use]
    pub fn descriptors(&self) -> Vec<ObjectDescriptor> {
        self.objects.values().cloned().collect()
    }

    /// Append a new object directly after the last one.
    ///
    /// The first object starts at offset 0. A key is generated for the new
    /// object from `source_name` and its placement.
    ///
    /// Zero-length objects are rejected. If the last object was shrunk to
    /// zero length its offset is still taken, and the append fails instead
    /// of replacing it.
    pub fn append(&mut self, source_name: &str, length: u64) -> Result<ObjectDescriptor> {
        if length == 0 {
            return Err(Error::invalid_argument("cannot append a zero-length object"));
        }
        let offset = self.next_offset()?;
        let Entry::Vacant(slot) = self.objects.entry(offset) else {
            return Err(Error::invalid_argument(format!(
                "offset {offset} is already taken by a zero-length object"
            )));
        };
        let descriptor = ObjectDescriptor::new(
            offset,
            length,
            ObjectKey::generate(source_name, offset, length),
        );
        debug!("append: offset={} length={} key={}", offset, length, descriptor.key);
        slot.insert(descriptor.clone());
        Ok(descriptor)
    }

    /// Replace the key and length of the object at `offset`
    pub fn update_entry(&mut self, offset: u64, key: ObjectKey, length: u64) -> Result<()> {
        let entry = self.entry_mut(offset)?;
        debug!(
            "update_entry: offset={} length={}->{} key={}->{}",
            offset, entry.length, length, entry.key, key
        );
        entry.key = key;
        entry.length = length;
        Ok(())
    }

    /// Replace only the length of the object at `offset`
    pub fn update_entry_length(&mut self, offset: u64, length: u64) -> Result<()> {
        let entry = self.entry_mut(offset)?;
        debug!("update_entry_length: offset={} length={}->{}", offset, entry.length, length);
        entry.length = length;
        Ok(())
    }

    /// Objects that may hold bytes of `[offset, offset + length)`, in
    /// ascending offset order
    #[must_use]
    pub fn range_query(&self, offset: u64, length: u64) -> Vec<ObjectDescriptor> {
        resolver::resolve(self.objects.values(), self.object_size, offset, length)
    }

    fn next_offset(&self) -> Result<u64> {
        match self.objects.last_key_value() {
            Some((_, last)) => last.offset.checked_add(last.length).ok_or_else(|| {
                Error::invalid_argument(format!(
                    "object at offset {} with length {} ends past u64::MAX",
                    last.offset, last.length
                ))
            }),
            None => Ok(0),
        }
    }

    fn entry_mut(&mut self, offset: u64) -> Result<&mut ObjectDescriptor> {
        self.objects
            .get_mut(&offset)
            .ok_or(Error::NotFound { offset })
    }
}

impl fmt::Display for ObjectIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Version: {} Revision: {}", self.version, self.revision)?;
        for object in self.objects.values() {
            writeln!(
                f,
                "Name: {} Length: {} Offset: {}",
                object.key, object.length, object.offset
            )?;
        }
        Ok(())
    }
}
