//! Shared pipeline context
//!
//! Everything a before-load subscriber needs lives here: configuration, the
//! durable store, the lazily materialized cache, per-resource counters and the
//! single-shot injection flag. One context is one run; nothing is global.

use super::state::{effective_index, ResourceState, SpliceStats};
use crate::cache::{sanitize_name, DurableStore, ScriptCacheStore};
use crate::codec;
use crate::config::SpliceConfig;
use crate::types::{CacheOutcome, ResourcePhase};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// State shared by every subscription of one controller
pub struct SpliceContext {
    config: SpliceConfig,
    store: Arc<dyn DurableStore>,
    cache: OnceLock<ScriptCacheStore>,
    injected: AtomicBool,
    resources: RwLock<HashMap<String, Arc<ResourceState>>>,
    stats: SpliceStats,
}

impl SpliceContext {
    pub fn new(config: SpliceConfig, store: Arc<dyn DurableStore>) -> Self {
        Self {
            config,
            store,
            cache: OnceLock::new(),
            injected: AtomicBool::new(false),
            resources: RwLock::new(HashMap::new()),
            stats: SpliceStats::default(),
        }
    }

    pub fn config(&self) -> &SpliceConfig {
        &self.config
    }

    pub fn stats(&self) -> &SpliceStats {
        &self.stats
    }

    /// True once the external payload has been spliced in
    pub fn injected(&self) -> bool {
        self.injected.load(Ordering::Acquire)
    }

    /// Cache, if it has been materialized
    pub fn cache(&self) -> Option<&ScriptCacheStore> {
        self.cache.get()
    }

    /// Materialize the cache, namespaced by session when one is known
    ///
    /// The first call wins; later sessions reuse the existing cache.
    pub(crate) fn cache_for_session(&self, session: Option<&str>) -> &ScriptCacheStore {
        self.cache.get_or_init(|| {
            let root = match session {
                Some(session) => self.config.cache_path.join(sanitize_name(session)),
                None => self.config.cache_path.clone(),
            };
            log::debug!("Script cache rooted at {:?}", root);
            ScriptCacheStore::new(root, Arc::clone(&self.store))
                .with_extension(self.config.cache_extension.clone())
        })
    }

    /// Cache root the pipeline writes to (or will write to)
    pub fn cache_root(&self) -> PathBuf {
        self.cache()
            .map(|cache| cache.root().to_path_buf())
            .unwrap_or_else(|| self.config.cache_path.clone())
    }

    /// Get or create the sequence state of a resource
    pub fn resource_state(&self, name: &str) -> Arc<ResourceState> {
        if let Some(state) = self.resources.read().get(name) {
            return Arc::clone(state);
        }
        let mut resources = self.resources.write();
        Arc::clone(
            resources
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(ResourceState::new(name))),
        )
    }

    /// Existing state of a resource, without creating it
    pub fn find_state(&self, name: &str) -> Option<Arc<ResourceState>> {
        self.resources.read().get(name).cloned()
    }

    /// Names of every tracked resource, sorted
    pub fn resource_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Phase of a tracked resource
    pub fn phase(&self, name: &str) -> ResourcePhase {
        self.find_state(name)
            .map(|state| state.phase(self.config.skip_offset, self.injected()))
            .unwrap_or(ResourcePhase::Unseen)
    }

    /// Run the before-load pipeline for one event
    ///
    /// Steps: cache the script, clear blacklisted payloads, splice in the
    /// external payload once, count the event. The counter advances exactly
    /// once per call whatever the other steps do.
    pub fn on_before_load(&self, state: &ResourceState, payload: &mut Vec<u8>) {
        let position = state.advance();
        self.stats.event();

        let index = effective_index(position, self.config.skip_offset);
        log::trace!("before-load '{}' position {} effective index {}", state.name(), position, index);

        if index < 0 {
            self.stats.skipped();
            return;
        }

        if self.config.cache_enabled {
            self.cache_script(state.name(), index, payload);
        }

        if self.config.is_blacklisted(state.name()) {
            log::debug!("Clearing payload of blacklisted resource '{}'", state.name());
            payload.clear();
            self.stats.cleared();
        }

        if self.config.script_enabled
            && !self.injected()
            && self.config.is_target(state.name())
            && index == self.config.target_index
        {
            self.inject(state.name(), payload);
        }
    }

    /// Store the payload in the cache; failures only degrade caching
    fn cache_script(&self, name: &str, index: i64, payload: &[u8]) {
        let cache = self.cache_for_session(None);
        match cache.add_script(name, index, payload) {
            Ok(CacheOutcome::Stored) => self.stats.cached(),
            Ok(outcome) => {
                log::debug!("Script {} of '{}' not cached: {}", index, name, outcome);
                self.stats.duplicate();
            }
            Err(e) => {
                log::warn!("Failed to cache script {} of '{}': {}", index, name, e);
                self.stats.storage_failure();
            }
        }
    }

    /// Splice the external payload into `payload`
    ///
    /// # Returns
    /// * `bool` - true if this call performed the one injection of the run
    fn inject(&self, name: &str, payload: &mut Vec<u8>) -> bool {
        let mut external = match self.store.read(&self.config.script_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!(
                    "Cannot read external payload {:?}: {}; injection skipped",
                    self.config.script_path,
                    e
                );
                return false;
            }
        };

        if self.config.isolated {
            match codec::strip(&mut external, self.config.isolation_marker.as_bytes()) {
                Ok(count) => log::debug!("Stripped {} isolation marker(s)", count),
                Err(e) => log::warn!("Isolation marker not applied: {}", e),
            }
        }
        external.extend_from_slice(self.config.separator.as_bytes());

        // Claim the single shot; a concurrent loser leaves its payload alone
        if self
            .injected
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Injection into '{}' lost the race; already performed", name);
            return false;
        }

        // Replace mode drops the in-flight script, prepend mode keeps it after ours
        if !self.config.replace_target {
            external.extend_from_slice(payload);
        }
        *payload = external;
        self.stats.injection();

        log::info!("Spliced external payload into '{}' ({} bytes)", name, payload.len());
        true
    }
}

impl std::fmt::Debug for SpliceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpliceContext")
            .field("config", &self.config)
            .field("injected", &self.injected())
            .field("resources", &self.resources.read().len())
            .finish()
    }
}
