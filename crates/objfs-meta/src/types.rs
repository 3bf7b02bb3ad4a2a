//! Object descriptor types

use crate::key::ObjectKey;
use serde::{Deserialize, Serialize};

/// Placement of one backing object within a logical file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// Starting byte offset within the logical file (ordering key)
    #[serde(deserialize_with = "lenient::deserialize")]
    pub offset: u64,
    /// Bytes currently stored in the object
    #[serde(deserialize_with = "lenient::deserialize")]
    pub length: u64,
    /// Key addressing the object in the object store
    pub key: ObjectKey,
}

impl ObjectDescriptor {
    /// Create a new descriptor
    #[must_use]
    pub const fn new(offset: u64, length: u64, key: ObjectKey) -> Self {
        Self {
            offset,
            length,
            key,
        }
    }

    /// End of the materialized span `[offset, offset + length)`
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// End of the capacity span `[offset, offset + object_size)`
    #[must_use]
    pub const fn capacity_end(&self, object_size: u64) -> u64 {
        self.offset.saturating_add(object_size)
    }

    /// Whether `pos` lies in the materialized span or before `capacity_end`
    #[must_use]
    pub const fn may_contain(&self, pos: u64, capacity_end: u64) -> bool {
        pos >= self.offset && (pos < self.end() || pos < capacity_end)
    }
}

/// Integers that older sidecar writers stored as JSON strings
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use std::fmt::Display;
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString<T> {
        Number(T),
        String(String),
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + FromStr,
        T::Err: Display,
    {
        match NumberOrString::<T>::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}
