//! Deduplicating per-resource script cache
//!
//! Every script observed for a resource is stored once per sequence index under
//! `<root>/<resource>/script_<index>.<ext>`. Records are never removed or
//! rewritten once created.
//!
//! Records are keyed by the raw resource name. The directory is the sanitized
//! name; when two names sanitize alike, the later one gets a numeric suffix.

use super::sanitize::sanitize_name;
use super::DurableStore;
use crate::types::{CacheOutcome, Result, SpliceError};
use memchr::memmem;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A cached script payload at a given sequence index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedScript {
    pub index: i64,
    pub payload: Vec<u8>,
}

/// All cached scripts of one resource
#[derive(Debug, Clone)]
pub struct CachedResource {
    /// Resource name as reported by the host
    pub name: String,
    /// Directory the scripts are written to
    pub directory: PathBuf,
    scripts: BTreeMap<i64, CachedScript>,
}

impl CachedResource {
    fn new(name: String, directory: PathBuf) -> Self {
        Self {
            name,
            directory,
            scripts: BTreeMap::new(),
        }
    }

    /// Scripts ordered by index
    pub fn scripts(&self) -> impl Iterator<Item = &CachedScript> {
        self.scripts.values()
    }

    /// Number of cached scripts
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Decide whether a new script would be a duplicate
    fn check_duplicate(&self, index: i64, payload: &[u8]) -> Option<CacheOutcome> {
        if self.scripts.contains_key(&index) {
            return Some(CacheOutcome::DuplicateIndex);
        }
        // Near-duplicate suppression: an existing script already contains this payload
        let contained = self
            .scripts
            .values()
            .any(|script| memmem::find(&script.payload, payload).is_some());
        contained.then_some(CacheOutcome::DuplicatePayload)
    }
}

/// Records keyed by raw resource name, plus the directory each name owns
#[derive(Debug, Default)]
struct Registry {
    records: HashMap<String, CachedResource>,
    /// Directory name -> raw resource name that owns it
    owners: HashMap<String, String>,
}

impl Registry {
    /// Record for `name`, creating its directory on first use
    fn materialize(
        &mut self,
        name: &str,
        root: &Path,
        store: &dyn DurableStore,
    ) -> Result<&mut CachedResource> {
        let Registry { records, owners } = self;
        match records.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let directory = root.join(claim_directory(owners, name));
                if let Err(e) = store.ensure_dir(&directory) {
                    // Release the directory name so a retry can claim it again
                    owners.retain(|_, owner| owner != name);
                    return Err(SpliceError::storage(&directory, e));
                }
                log::debug!("Created cache directory {:?} for resource '{}'", directory, name);
                Ok(entry.insert(CachedResource::new(name.to_string(), directory)))
            }
        }
    }
}

/// Pick a directory name for `name` that no other resource owns
///
/// Names that sanitize to the same string get `_2`, `_3`, ... suffixes in
/// order of first appearance.
fn claim_directory(owners: &mut HashMap<String, String>, name: &str) -> String {
    let base = sanitize_name(name);
    let mut candidate = base.clone();
    let mut suffix = 2;
    while owners.contains_key(&candidate) {
        candidate = format!("{}_{}", base, suffix);
        suffix += 1;
    }
    owners.insert(candidate.clone(), name.to_string());
    candidate
}

/// Thread-safe script cache persisted through a [`DurableStore`]
pub struct ScriptCacheStore {
    root: PathBuf,
    extension: String,
    store: Arc<dyn DurableStore>,
    registry: RwLock<Registry>,
}

impl ScriptCacheStore {
    /// Create a cache rooted at `root`; nothing touches the disk until the first resource
    pub fn new(root: impl Into<PathBuf>, store: Arc<dyn DurableStore>) -> Self {
        Self {
            root: root.into(),
            extension: "lua".to_string(),
            store,
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Builder method: file extension used for cached scripts
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Make sure the directory and in-memory record for `name` exist
    ///
    /// Idempotent: a second call for the same name only checks the record.
    ///
    /// # Returns
    /// * `Result<PathBuf>` - Directory the resource's scripts are written to
    pub fn ensure_resource(&self, name: &str) -> Result<PathBuf> {
        if let Some(record) = self.registry.read().records.get(name) {
            return Ok(record.directory.clone());
        }

        let mut registry = self.registry.write();
        let record = registry.materialize(name, &self.root, self.store.as_ref())?;
        Ok(record.directory.clone())
    }

    /// Cache a script for `resource` at `index`
    ///
    /// # Returns
    /// * `Ok(Stored)` - Persisted and recorded
    /// * `Ok(DuplicateIndex | DuplicatePayload)` - Suppressed, nothing written
    /// * `Err(Storage)` - Directory or file write failed; nothing recorded
    pub fn add_script(&self, resource: &str, index: i64, payload: &[u8]) -> Result<CacheOutcome> {
        // Cheap rejection under the shared lock
        if let Some(outcome) = self
            .registry
            .read()
            .records
            .get(resource)
            .and_then(|cached| cached.check_duplicate(index, payload))
        {
            return Ok(outcome);
        }

        let mut registry = self.registry.write();
        let cached = registry.materialize(resource, &self.root, self.store.as_ref())?;

        // Re-check: another writer may have won between the two locks
        if let Some(outcome) = cached.check_duplicate(index, payload) {
            return Ok(outcome);
        }

        let path = cached
            .directory
            .join(format!("script_{}.{}", index, self.extension));
        self.store
            .write(&path, payload)
            .map_err(|e| SpliceError::storage(&path, e))?;

        cached.scripts.insert(
            index,
            CachedScript {
                index,
                payload: payload.to_vec(),
            },
        );
        log::debug!("Cached script {} of '{}' ({} bytes)", index, resource, payload.len());
        Ok(CacheOutcome::Stored)
    }

    /// Look up a cached script
    pub fn get(&self, resource: &str, index: i64) -> Option<CachedScript> {
        self.registry
            .read()
            .records
            .get(resource)
            .and_then(|cached| cached.scripts.get(&index).cloned())
    }

    /// Snapshot of all scripts cached for a resource, ordered by index
    pub fn scripts(&self, resource: &str) -> Vec<CachedScript> {
        self.registry
            .read()
            .records
            .get(resource)
            .map(|cached| cached.scripts().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of a whole cached resource
    pub fn resource(&self, resource: &str) -> Option<CachedResource> {
        self.registry.read().records.get(resource).cloned()
    }

    /// Names of every materialized resource, sorted
    pub fn resource_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().records.keys().cloned().collect();
        names.sort();
        names
    }

    /// Total number of cached scripts across all resources
    pub fn script_count(&self) -> usize {
        self.registry.read().records.values().map(CachedResource::len).sum()
    }
}

impl std::fmt::Debug for ScriptCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptCacheStore")
            .field("root", &self.root)
            .field("extension", &self.extension)
            .field("resources", &self.registry.read().records.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FsStore;
    use std::io;
    use tempfile::TempDir;

    /// Store that refuses every write
    struct ReadOnlyStore;

    impl DurableStore for ReadOnlyStore {
        fn read(&self, _path: &Path) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::NotFound, "nothing here"))
        }

        fn write(&self, _path: &Path, _bytes: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }

        fn ensure_dir(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }
    }

    fn fs_cache(dir: &TempDir) -> ScriptCacheStore {
        ScriptCacheStore::new(dir.path(), Arc::new(FsStore))
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let dir = TempDir::new().unwrap();
        let cache = fs_cache(&dir);

        let first = cache.add_script("r", 5, b"print(1)").unwrap();
        let second = cache.add_script("r", 5, b"print(2)").unwrap();
        assert_eq!(first, CacheOutcome::Stored);
        assert_eq!(second, CacheOutcome::DuplicateIndex);

        // The first payload is what stays on disk
        let on_disk = std::fs::read(dir.path().join("r").join("script_5.lua")).unwrap();
        assert_eq!(on_disk, b"print(1)");
        assert_eq!(cache.get("r", 5).unwrap().payload, b"print(1)");
    }

    #[test]
    fn test_contained_payload_suppressed() {
        let dir = TempDir::new().unwrap();
        let cache = fs_cache(&dir);

        assert!(cache.add_script("r", 0, b"local a = 1; local b = 2").unwrap().is_stored());
        assert_eq!(
            cache.add_script("r", 1, b"local b = 2").unwrap(),
            CacheOutcome::DuplicatePayload
        );
        assert!(!dir.path().join("r").join("script_1.lua").exists());

        // Same payload under another resource is independent
        assert!(cache.add_script("other", 1, b"local b = 2").unwrap().is_stored());
    }

    #[test]
    fn test_ensure_resource_idempotent() {
        let dir = TempDir::new().unwrap();
        let cache = fs_cache(&dir);

        let directory = cache.ensure_resource("http://srv/res").unwrap();
        assert_eq!(directory, dir.path().join("srvres"));
        assert_eq!(cache.ensure_resource("http://srv/res").unwrap(), directory);
        assert!(directory.is_dir());
        assert_eq!(cache.resource_names(), vec!["http://srv/res".to_string()]);
        let record = cache.resource("http://srv/res").unwrap();
        assert_eq!(record.directory, dir.path().join("srvres"));
        assert!(record.is_empty());
        assert_eq!(cache.script_count(), 0);
    }

    #[test]
    fn test_write_failure_records_nothing() {
        let cache = ScriptCacheStore::new("/cache", Arc::new(ReadOnlyStore));

        let result = cache.add_script("r", 0, b"x");
        assert!(matches!(result, Err(SpliceError::Storage { .. })));
        assert!(cache.get("r", 0).is_none());
        assert!(cache.scripts("r").is_empty());
    }

    #[test]
    fn test_custom_extension_and_ordering() {
        let dir = TempDir::new().unwrap();
        let cache = fs_cache(&dir).with_extension("txt");

        cache.add_script("r", 3, b"three").unwrap();
        cache.add_script("r", 1, b"one").unwrap();
        assert!(dir.path().join("r").join("script_3.txt").exists());

        let indices: Vec<i64> = cache.scripts("r").iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn test_concurrent_adds_store_once() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(fs_cache(&dir));

        let stored: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let cache = Arc::clone(&cache);
                    scope.spawn(move || {
                        let payload = format!("payload-{}", i);
                        cache.add_script("shared", 0, payload.as_bytes()).unwrap().is_stored() as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(stored, 1);
        assert_eq!(cache.scripts("shared").len(), 1);
    }

    #[test]
    fn test_colliding_names_keep_separate_records() {
        let dir = TempDir::new().unwrap();
        let cache = fs_cache(&dir);

        // Both names sanitize to "ab"
        assert_eq!(cache.add_script("a:b", 0, b"first()").unwrap(), CacheOutcome::Stored);
        assert_eq!(cache.add_script("ab", 0, b"second()").unwrap(), CacheOutcome::Stored);

        assert_eq!(cache.get("a:b", 0).unwrap().payload, b"first()");
        assert_eq!(cache.get("ab", 0).unwrap().payload, b"second()");
        assert_eq!(cache.resource("ab").unwrap().directory, dir.path().join("ab_2"));
        assert_eq!(std::fs::read(dir.path().join("ab").join("script_0.lua")).unwrap(), b"first()");
        assert_eq!(std::fs::read(dir.path().join("ab_2").join("script_0.lua")).unwrap(), b"second()");
        assert_eq!(cache.script_count(), 2);
    }
}
