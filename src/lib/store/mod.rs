//! Object store abstraction.
//!
//! Source VCFs are read and summary objects written through the
//! [`ObjectStore`] trait, so the scanning and search pipelines run unchanged
//! against a directory ([`FsStore`]), a remote HTTP server ([`HttpStore`]),
//! or an in-memory map ([`MemoryStore`]). Stores are shared across worker
//! threads behind `Arc<dyn ObjectStore>`.

mod fs;
mod http;
mod memory;

pub use fs::FsStore;
pub use http::HttpStore;
pub use memory::MemoryStore;

use crate::errors::Result;

/// Metadata for one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object key (path-style, `/`-separated)
    pub key: String,
    /// Object size in bytes
    pub size: u64,
}

/// Byte-addressed blob storage.
///
/// Keys are path-style strings. Range reads are inclusive on both ends,
/// mirroring HTTP `Range` semantics.
pub trait ObjectStore: Send + Sync {
    /// Fetch a whole object.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Fetch the inclusive byte range `[start, end]`, clipped at the object
    /// end. A range starting at or past the object end is an error.
    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>>;

    /// Store an object, replacing any existing content.
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// List objects whose key starts with `prefix`, sorted by key.
    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Delete an object. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Size of an object in bytes.
    fn size(&self, key: &str) -> Result<u64>;
}
