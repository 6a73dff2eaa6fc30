//! Script cache and durable storage
//!
//! This module contains the deduplicating [`ScriptCacheStore`], the path-safe
//! name sanitizer, and the [`DurableStore`] abstraction the cache persists
//! through.

pub mod sanitize;
pub mod store;

pub use sanitize::sanitize_name;
pub use store::{CachedResource, CachedScript, ScriptCacheStore};

use std::fs;
use std::io;
use std::path::Path;

/// Durable byte storage used for cache writes and external payload reads
pub trait DurableStore: Send + Sync {
    /// Read a whole file
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create or truncate a file and write `bytes` to it
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Create a directory and all missing parents; succeeds if it already exists
    fn ensure_dir(&self, path: &Path) -> io::Result<()>;
}

/// [`DurableStore`] backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl DurableStore for FsStore {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        fs::write(path, bytes)
    }

    fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");

        FsStore.ensure_dir(&nested).unwrap();
        // Second call on an existing directory is fine
        FsStore.ensure_dir(&nested).unwrap();

        let file = nested.join("script_0.lua");
        FsStore.write(&file, b"print('hi')").unwrap();
        assert_eq!(FsStore.read(&file).unwrap(), b"print('hi')");
        assert!(FsStore.read(&nested.join("missing.lua")).is_err());
    }
}
