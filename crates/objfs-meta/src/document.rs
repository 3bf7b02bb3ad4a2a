//! Sidecar metadata document
//!
//! Each logical file `<name>` has a JSON sidecar `<name>.meta`:
//!
//! ```text
//! {
//!   "version": 1,
//!   "revision": 1,
//!   "objects": [
//!     { "offset": 0, "length": 5242880, "key": "<uuid>_0_5242880_<source>" }
//!   ]
//! }
//! ```
//!
//! # Crash Safety
//!
//! The sidecar is rewritten atomically: write to `<name>.meta.tmp`, fsync,
//! then rename over the existing sidecar. A crash mid-write leaves either the
//! old document or the new one, never a torn file.
//!
//! Older writers stored every scalar as a JSON string and an empty object
//! list as `""`; both forms are accepted on read. Writes always use numbers
//! and arrays.

use crate::index::ObjectIndex;
use crate::types::{ObjectDescriptor, lenient};
use objfs_common::{Error, ObjectStorageConfig, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extension appended to a logical file name to form its sidecar name
pub const SIDECAR_EXTENSION: &str = "meta";

/// Sidecar path for a logical file: `<logical>.meta`
#[must_use]
pub fn sidecar_path(logical: &Path) -> PathBuf {
    let mut name = logical.as_os_str().to_owned();
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    PathBuf::from(name)
}

/// Serializable snapshot of an [`ObjectIndex`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(deserialize_with = "lenient::deserialize")]
    pub version: u32,
    #[serde(deserialize_with = "lenient::deserialize")]
    pub revision: u32,
    /// Descriptors, in whatever order the writer stored them
    #[serde(deserialize_with = "deserialize_objects")]
    pub objects: Vec<ObjectDescriptor>,
}

impl MetadataDocument {
    /// Snapshot an index
    #[must_use]
    pub fn from_index(index: &ObjectIndex) -> Self {
        Self {
            version: index.version(),
            revision: index.revision(),
            objects: index.descriptors(),
        }
    }

    /// Rebuild an index, re-sorting descriptors by offset
    pub fn into_index(self, config: ObjectStorageConfig) -> Result<ObjectIndex> {
        ObjectIndex::from_descriptors(self.version, self.revision, config, self.objects)
    }

    /// Parse a JSON document
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| Error::serialization(format!("malformed metadata document: {e}")))
    }

    /// Encode as pretty-printed JSON
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| Error::serialization(format!("failed to encode metadata document: {e}")))
    }

    /// Read a sidecar. Returns `Ok(None)` if no sidecar exists at `path`.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::persistence(format!(
                    "failed to read sidecar {}: {e}",
                    path.display()
                )));
            }
        };
        serde_json::from_slice(&data).map(Some).map_err(|e| {
            Error::serialization(format!("malformed sidecar {}: {e}", path.display()))
        })
    }

    /// Atomically replace the sidecar at `path` with this document
    pub fn write(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        let temp_path = temp_path(path);

        if let Err(e) = write_synced(&temp_path, &data) {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::persistence(format!(
                "failed to write {}: {e}",
                temp_path.display()
            )));
        }

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::persistence(format!(
                "failed to rename {} to {}: {e}",
                temp_path.display(),
                path.display()
            )));
        }

        sync_parent_dir(path).map_err(|e| {
            Error::persistence(format!("failed to sync directory of {}: {e}", path.display()))
        })?;

        debug!(
            "Wrote sidecar {} (revision {}, {} objects)",
            path.display(),
            self.revision,
            self.objects.len()
        );
        Ok(())
    }
}

/// Load the index stored at `path`, or create, persist and return an empty
/// one if no sidecar exists.
///
/// An existing sidecar that cannot be parsed is an error; it is never
/// replaced by an empty index.
pub fn load(path: &Path, config: ObjectStorageConfig) -> Result<ObjectIndex> {
    if let Some(document) = MetadataDocument::read(path)? {
        let index = document.into_index(config)?;
        info!(
            "Loaded sidecar {} (version {}, revision {}, {} objects)",
            path.display(),
            index.version(),
            index.revision(),
            index.len()
        );
        return Ok(index);
    }

    let index = ObjectIndex::new(config);
    save(&index, path)?;
    info!("Created sidecar {}", path.display());
    Ok(index)
}

/// Persist `index` to the sidecar at `path`, replacing previous content
pub fn save(index: &ObjectIndex, path: &Path) -> Result<()> {
    MetadataDocument::from_index(index).write(path)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(data)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

fn deserialize_objects<'de, D>(deserializer: D) -> std::result::Result<Vec<ObjectDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ObjectList {
        List(Vec<ObjectDescriptor>),
        Legacy(String),
    }

    match ObjectList::deserialize(deserializer)? {
        ObjectList::List(objects) => Ok(objects),
        ObjectList::Legacy(s) if s.is_empty() => Ok(Vec::new()),
        ObjectList::Legacy(s) => Err(serde::de::Error::custom(format!(
            "expected an object list, got string {s:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ObjectKey;
    use tempfile::tempdir;

    fn config() -> ObjectStorageConfig {
        ObjectStorageConfig::with_object_size(5_000_000).unwrap()
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/data/db/table.dat")),
            PathBuf::from("/data/db/table.dat.meta")
        );
        assert_eq!(sidecar_path(Path::new("file")), PathBuf::from("file.meta"));
    }

    #[test]
    fn test_load_creates_sidecar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.meta");

        let index = load(&path, config()).unwrap();
        assert!(path.exists());
        assert_eq!(index.version(), 1);
        assert_eq!(index.revision(), 1);
        assert!(index.is_empty());

        let stored = MetadataDocument::read(&path).unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.revision, 1);
        assert!(stored.objects.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.meta");

        let mut index = load(&path, config()).unwrap();
        index.append("a/b", 5_000_000).unwrap();
        index.append("a/b", 1_234).unwrap();
        index.update_entry_length(5_000_000, 2_000).unwrap();
        index.bump_revision();
        save(&index, &path).unwrap();

        let loaded = load(&path, config()).unwrap();
        assert_eq!(loaded.version(), index.version());
        assert_eq!(loaded.revision(), 2);
        assert_eq!(loaded.descriptors(), index.descriptors());
        assert!(!dir.path().join("file.meta.tmp").exists());
    }

    #[test]
    fn test_load_unordered_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.meta");
        let json = r#"{
            "version": 1,
            "revision": 7,
            "objects": [
                {"offset": 100, "length": 50, "key": "b_100_50_f"},
                {"offset": 0, "length": 100, "key": "a_0_100_f"}
            ]
        }"#;
        fs::write(&path, json).unwrap();

        let index = load(&path, config()).unwrap();
        let offsets: Vec<u64> = index.iter().map(|d| d.offset).collect();
        assert_eq!(offsets, vec![0, 100]);
        assert_eq!(index.revision(), 7);
        assert_eq!(index.logical_size(), 150);
    }

    #[test]
    fn test_load_legacy_string_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.meta");
        let json = r#"{
            "version": "1",
            "revision": "2",
            "objects": [
                {"offset": "0", "length": "4096", "key": "a_0_4096_f"}
            ]
        }"#;
        fs::write(&path, json).unwrap();

        let index = load(&path, config()).unwrap();
        assert_eq!(index.revision(), 2);
        assert_eq!(index.get(0).unwrap().length, 4096);

        fs::write(&path, r#"{"version": "1", "revision": "1", "objects": ""}"#).unwrap();
        assert!(load(&path, config()).unwrap().is_empty());
    }

    #[test]
    fn test_load_malformed_is_surfaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.meta");

        fs::write(&path, b"{\"version\": 1, \"revis").unwrap();
        assert!(matches!(load(&path, config()), Err(Error::Serialization(_))));

        fs::write(&path, br#"{"version": 1, "revision": 1}"#).unwrap();
        assert!(matches!(load(&path, config()), Err(Error::Serialization(_))));

        // The broken sidecar is left in place for inspection.
        assert_eq!(fs::read(&path).unwrap(), br#"{"version": 1, "revision": 1}"#);
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.meta");

        let mut index = load(&path, config()).unwrap();
        for _ in 0..3 {
            index.append("f", 10).unwrap();
        }
        save(&index, &path).unwrap();

        let fresh = ObjectIndex::new(config());
        save(&fresh, &path).unwrap();
        assert!(load(&path, config()).unwrap().is_empty());
    }

    #[test]
    fn test_save_into_missing_dir_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("file.meta");
        let err = save(&ObjectIndex::new(config()), &path).unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[test]
    fn test_document_json_shape() {
        let descriptor = ObjectDescriptor::new(0, 3, ObjectKey::new_unchecked("id_0_3_f"));
        let index = ObjectIndex::from_descriptors(1, 1, config(), [descriptor]).unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&MetadataDocument::from_index(&index).to_json().unwrap())
                .unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "version": 1,
                "revision": 1,
                "objects": [{"offset": 0, "length": 3, "key": "id_0_3_f"}]
            })
        );
    }
}
