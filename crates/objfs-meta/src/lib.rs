//! Object-backed file metadata
//!
//! Maps the logical byte range of a file onto a sequence of immutable,
//! size-bounded backing objects and persists that mapping in a JSON sidecar
//! document next to the logical file.
//!
//! # Design
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │  MetadataFile  (RwLock, sidecar path)         │
//! │  ┌─────────────────────────────────────────┐  │
//! │  │  ObjectIndex  (BTreeMap offset → desc)  │  │
//! │  │   • append / update_entry*              │  │
//! │  │   • range_query  → resolver             │  │
//! │  └─────────────────────────────────────────┘  │
//! │            │                      │           │
//! │      ObjectKey codec       MetadataDocument   │
//! │  <uuid>_<off>_<len>_<src>  (write-tmp-rename) │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Objects are assumed logically contiguous: a new object always starts
//! where the last one ends. The most recent object may be shorter than the
//! configured capacity, and range resolution accounts for that slack.

pub mod document;
pub mod file;
pub mod index;
pub mod key;
pub mod resolver;
pub mod types;

pub use document::{MetadataDocument, sidecar_path};
pub use file::MetadataFile;
pub use index::ObjectIndex;
pub use key::ObjectKey;
pub use types::ObjectDescriptor;
