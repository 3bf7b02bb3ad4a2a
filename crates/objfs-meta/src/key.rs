//! Backing object keys
//!
//! A key is the only way to address a backing object in the object store.
//! It packs four fields into one flat string:
//!
//! ```text
//! <uuid>_<offset>_<length>_<source_name>
//! ```
//!
//! The `_` separator is reserved for these fields. Path separators and
//! underscores in the source name are replaced with `-` when a key is
//! generated, so generated keys always split into exactly four fields. Keys
//! written by older writers may still carry underscores in the source name;
//! those are read back intact because the source name is everything after
//! the third separator.

use derive_more::Display;
use objfs_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Separator between the structural fields of a key
pub const FIELD_SEPARATOR: char = '_';

/// Replacement for separator-like characters in source names
const SANITIZED_CHAR: char = '-';

/// Opaque key addressing one backing object
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct ObjectKey(String);

/// Borrowed view of the four key fields
struct KeyFields<'a> {
    unique_id: &'a str,
    offset: &'a str,
    length: &'a str,
    source_name: &'a str,
}

impl ObjectKey {
    /// Generate a key for a new backing object with a fresh unique id
    #[must_use]
    pub fn generate(source_name: &str, offset: u64, length: u64) -> Self {
        Self::assemble(
            &Uuid::new_v4().to_string(),
            offset,
            length,
            &sanitize_source_name(source_name),
        )
    }

    /// Parse and validate a key string
    pub fn parse(key: impl Into<String>) -> Result<Self> {
        let key = Self(key.into());
        key.offset()?;
        key.length()?;
        Ok(key)
    }

    /// Wrap a key string without validation.
    ///
    /// Keys loaded from a sidecar are opaque until a field is requested.
    #[must_use]
    pub fn new_unchecked(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The unique id field
    pub fn unique_id(&self) -> Result<&str> {
        Ok(self.fields()?.unique_id)
    }

    /// Logical offset recorded in the key
    pub fn offset(&self) -> Result<u64> {
        let fields = self.fields()?;
        self.parse_number("offset", fields.offset)
    }

    /// Length recorded in the key
    pub fn length(&self) -> Result<u64> {
        let fields = self.fields()?;
        self.parse_number("length", fields.length)
    }

    /// Source name recorded in the key (already sanitized)
    pub fn source_name(&self) -> Result<&str> {
        Ok(self.fields()?.source_name)
    }

    /// Copy of this key with only the offset field replaced
    pub fn with_offset(&self, offset: u64) -> Result<Self> {
        let fields = self.fields()?;
        Ok(Self(format!(
            "{id}{sep}{offset}{sep}{len}{sep}{src}",
            id = fields.unique_id,
            len = fields.length,
            src = fields.source_name,
            sep = FIELD_SEPARATOR,
        )))
    }

    /// Copy of this key with only the length field replaced
    pub fn with_length(&self, length: u64) -> Result<Self> {
        let fields = self.fields()?;
        Ok(Self(format!(
            "{id}{sep}{off}{sep}{length}{sep}{src}",
            id = fields.unique_id,
            off = fields.offset,
            src = fields.source_name,
            sep = FIELD_SEPARATOR,
        )))
    }

    /// Key for a rewritten copy of this object: fresh unique id, same
    /// offset and source name, new length.
    pub fn regenerate(&self, length: u64) -> Result<Self> {
        let fields = self.fields()?;
        let offset = self.parse_number("offset", fields.offset)?;
        Ok(Self::assemble(
            &Uuid::new_v4().to_string(),
            offset,
            length,
            fields.source_name,
        ))
    }

    fn assemble(unique_id: &str, offset: u64, length: u64, source_name: &str) -> Self {
        Self(format!(
            "{unique_id}{sep}{offset}{sep}{length}{sep}{source_name}",
            sep = FIELD_SEPARATOR
        ))
    }

    fn fields(&self) -> Result<KeyFields<'_>> {
        let mut parts = self.0.splitn(4, FIELD_SEPARATOR);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(unique_id), Some(offset), Some(length), Some(source_name))
                if !unique_id.is_empty() =>
            {
                Ok(KeyFields {
                    unique_id,
                    offset,
                    length,
                    source_name,
                })
            }
            _ => Err(Error::invalid_key(
                &self.0,
                "expected <uuid>_<offset>_<length>_<source>",
            )),
        }
    }

    fn parse_number(&self, field: &str, value: &str) -> Result<u64> {
        value
            .parse::<u64>()
            .map_err(|e| Error::invalid_key(&self.0, format!("bad {field} field {value:?}: {e}")))
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({:?})", self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

/// Flatten a source name so it fits the flat key namespace and never
/// contains the field separator.
#[must_use]
pub fn sanitize_source_name(source_name: &str) -> String {
    source_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | FIELD_SEPARATOR => SANITIZED_CHAR,
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_fields() {
        let key = ObjectKey::generate("data/db/file1", 4096, 1000);
        assert_eq!(key.offset().unwrap(), 4096);
        assert_eq!(key.length().unwrap(), 1000);
        assert_eq!(key.source_name().unwrap(), "data-db-file1");
        assert!(Uuid::parse_str(key.unique_id().unwrap()).is_ok());
    }

    #[test]
    fn test_generate_unique() {
        let a = ObjectKey::generate("f", 0, 10);
        let b = ObjectKey::generate("f", 0, 10);
        assert_ne!(a, b);
    }

    #[test]
    fn test_source_name_with_separator() {
        let key = ObjectKey::generate("/tmp/my_table_1.dat", 0, 5);
        assert_eq!(key.source_name().unwrap(), "-tmp-my-table-1.dat");
        assert_eq!(key.as_str().matches(FIELD_SEPARATOR).count(), 3);
        assert_eq!(key.length().unwrap(), 5);
    }

    #[test]
    fn test_legacy_key_keeps_source_tail() {
        let key = ObjectKey::parse("abc_10_20_my_file").unwrap();
        assert_eq!(key.offset().unwrap(), 10);
        assert_eq!(key.length().unwrap(), 20);
        assert_eq!(key.source_name().unwrap(), "my_file");
        assert_eq!(
            key.with_length(30).unwrap().as_str(),
            "abc_10_30_my_file"
        );
    }

    #[test]
    fn test_with_offset_and_length() {
        let key = ObjectKey::generate("src", 100, 200);
        let id = key.unique_id().unwrap().to_string();

        let moved = key.with_offset(300).unwrap();
        assert_eq!(moved.offset().unwrap(), 300);
        assert_eq!(moved.length().unwrap(), 200);
        assert_eq!(moved.source_name().unwrap(), "src");
        assert_eq!(moved.unique_id().unwrap(), id);

        let grown = key.with_length(250).unwrap();
        assert_eq!(grown.offset().unwrap(), 100);
        assert_eq!(grown.length().unwrap(), 250);
        assert_eq!(grown.unique_id().unwrap(), id);
    }

    #[test]
    fn test_regenerate() {
        let key = ObjectKey::generate("a/b", 5_000_000, 100);
        let fresh = key.regenerate(4_000).unwrap();
        assert_ne!(fresh.unique_id().unwrap(), key.unique_id().unwrap());
        assert_eq!(fresh.offset().unwrap(), 5_000_000);
        assert_eq!(fresh.length().unwrap(), 4_000);
        assert_eq!(fresh.source_name().unwrap(), "a-b");
    }

    #[test]
    fn test_malformed_keys() {
        assert!(ObjectKey::parse("no-separators").is_err());
        assert!(ObjectKey::parse("id_1_2").is_err());
        assert!(ObjectKey::parse("id_x_2_src").is_err());
        assert!(ObjectKey::parse("_1_2_src").is_err());

        let opaque = ObjectKey::new_unchecked("opaque");
        assert!(opaque.offset().is_err());
        assert!(opaque.with_length(1).is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let key = ObjectKey::new_unchecked("id_0_1_src");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"id_0_1_src\"");
        let back: ObjectKey = serde_json::from_str("\"id_0_1_src\"").unwrap();
        assert_eq!(back, key);
    }
}
