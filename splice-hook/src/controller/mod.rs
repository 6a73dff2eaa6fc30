//! Interception controller
//!
//! Binds one before-load subscription per host resource and routes every
//! firing through the shared [`SpliceContext`] pipeline:
//!
//! ```text
//! host fires before-load(resource, payload)
//!   └─► EventBus walks subscribers by order
//!         └─► controller subscriber
//!               ├─ position = counter++        (always, exactly once)
//!               ├─ index = position - offset   (index < 0 ─► done)
//!               ├─ cache script at index       (duplicates are no-ops)
//!               ├─ blacklisted? clear payload
//!               └─ target && index match && flag unset ─► splice external payload, set flag
//! ```

pub mod context;
pub mod state;

pub use context::SpliceContext;
pub use state::{effective_index, ResourceState, SpliceStats, SpliceStatsSnapshot};

use crate::cache::{DurableStore, FsStore, ScriptCacheStore};
use crate::config::SpliceConfig;
use crate::event::Cookie;
use crate::host::{HostResource, ResourceSource};
use crate::types::{ResourcePhase, Result, SpliceError};
use parking_lot::Mutex;
use std::sync::Arc;

/// A live before-load subscription
struct Subscription {
    resource: Arc<dyn HostResource>,
    cookie: Cookie,
}

/// Attaches the splice pipeline to host resources
pub struct InterceptionController {
    context: Arc<SpliceContext>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl InterceptionController {
    /// Create a controller persisting through `store`
    pub fn new(config: SpliceConfig, store: Arc<dyn DurableStore>) -> Self {
        Self {
            context: Arc::new(SpliceContext::new(config, store)),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Create a controller backed by the local filesystem
    pub fn with_fs(config: SpliceConfig) -> Self {
        Self::new(config, Arc::new(FsStore))
    }

    /// Subscribe to the before-load event of every resource in `source`
    ///
    /// Resources that are already attached are skipped, so calling this again
    /// after the host registered more resources only binds the new ones.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of newly bound resources
    /// * `Err(HostUnavailable)` - The source has no resources
    pub fn attach(&self, source: &dyn ResourceSource) -> Result<usize> {
        let resources = source.resources();
        if resources.is_empty() {
            return Err(SpliceError::HostUnavailable(
                "resource source is empty".to_string(),
            ));
        }

        let session = source.session();
        if self.context.config().cache_enabled {
            self.context.cache_for_session(session.as_deref());
        }

        let order = self.context.config().subscription_order;
        let mut subscriptions = self.subscriptions.lock();
        let mut bound = 0;

        for resource in resources {
            let name = resource.name().to_string();
            if subscriptions.iter().any(|s| s.resource.name() == name) {
                log::debug!("Resource '{}' already attached", name);
                continue;
            }

            let state = self.context.resource_state(&name);
            let context = Arc::clone(&self.context);
            let cookie = resource.before_load().connect(
                move |payload: &mut Vec<u8>| {
                    context.on_before_load(&state, payload);
                    true
                },
                order,
            );

            log::debug!("Attached to '{}' with cookie {}", name, cookie);
            subscriptions.push(Subscription { resource, cookie });
            bound += 1;
        }

        log::info!(
            "Attached to {} resource(s) (session: {})",
            bound,
            session.as_deref().unwrap_or("none")
        );
        Ok(bound)
    }

    /// Disconnect every subscription made by [`attach`](Self::attach)
    ///
    /// Counters and the injection flag survive; re-attaching continues the sequence.
    pub fn detach(&self) -> usize {
        let mut subscriptions = self.subscriptions.lock();
        let removed = subscriptions
            .drain(..)
            .filter(|s| s.resource.before_load().disconnect(s.cookie))
            .count();
        log::info!("Detached from {} resource(s)", removed);
        removed
    }

    /// Run the pipeline for a host that fires events without an [`EventBus`](crate::event::EventBus)
    pub fn handle_before_load(&self, name: &str, payload: &mut Vec<u8>) {
        let state = self.context.resource_state(name);
        self.context.on_before_load(&state, payload);
    }

    /// Number of attached resources
    pub fn attached(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Events observed so far for a resource
    pub fn counter(&self, name: &str) -> Option<u64> {
        self.context.find_state(name).map(|state| state.counter())
    }

    /// Lifecycle phase of a resource
    pub fn phase(&self, name: &str) -> ResourcePhase {
        self.context.phase(name)
    }

    /// True once the external payload has been spliced in
    pub fn injected(&self) -> bool {
        self.context.injected()
    }

    /// Names of every tracked resource, sorted
    pub fn resource_names(&self) -> Vec<String> {
        self.context.resource_names()
    }

    /// Script cache, if caching has started
    pub fn cache(&self) -> Option<&ScriptCacheStore> {
        self.context.cache()
    }

    pub fn stats(&self) -> SpliceStatsSnapshot {
        self.context.stats().snapshot()
    }

    pub fn config(&self) -> &SpliceConfig {
        self.context.config()
    }

    /// Shared pipeline context
    pub fn context(&self) -> &Arc<SpliceContext> {
        &self.context
    }
}

impl Drop for InterceptionController {
    fn drop(&mut self) {
        if !self.subscriptions.get_mut().is_empty() {
            self.detach();
        }
    }
}

impl std::fmt::Debug for InterceptionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionController")
            .field("context", &self.context)
            .field("attached", &self.attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LocalHost;
    use crate::types::CacheOutcome;
    use std::fs;
    use tempfile::TempDir;

    /// Config with caching under `dir`, payload file `dir/payload.lua`, no skip offset
    fn test_config(dir: &TempDir) -> SpliceConfig {
        SpliceConfig::new()
            .with_cache(true, dir.path().join("cache"))
            .with_script(true, dir.path().join("payload.lua"))
            .with_skip_offset(0)
    }

    fn write_payload(dir: &TempDir, content: &str) {
        fs::write(dir.path().join("payload.lua"), content).unwrap();
    }

    #[test]
    fn test_attach_empty_source_is_host_unavailable() {
        let dir = TempDir::new().unwrap();
        let controller = InterceptionController::with_fs(test_config(&dir));
        let host = LocalHost::new();

        assert!(matches!(
            controller.attach(&host),
            Err(SpliceError::HostUnavailable(_))
        ));
        assert_eq!(controller.attached(), 0);
    }

    #[test]
    fn test_prepend_injection_at_target_index() {
        let dir = TempDir::new().unwrap();
        write_payload(&dir, "inject()");
        let controller = InterceptionController::with_fs(test_config(&dir).with_target("manager", 1));

        let host = LocalHost::new();
        host.add_resource("spawn_manager");
        assert_eq!(controller.attach(&host).unwrap(), 1);

        assert_eq!(host.load("spawn_manager", "a()").unwrap(), b"a()");
        assert_eq!(host.load("spawn_manager", "b()").unwrap(), b"inject();b()");
        assert_eq!(host.load("spawn_manager", "c()").unwrap(), b"c()");

        assert!(controller.injected());
        assert_eq!(controller.stats().injections, 1);
        assert_eq!(controller.phase("spawn_manager"), ResourcePhase::Done);
    }

    #[test]
    fn test_replace_mode_and_isolation_marker() {
        let dir = TempDir::new().unwrap();
        write_payload(&dir, &format!("{}run()", crate::config::DEFAULT_ISOLATION_MARKER));
        let config = test_config(&dir)
            .with_target("", 0)
            .with_replace(true)
            .with_isolation(true);
        let controller = InterceptionController::with_fs(config);

        let host = LocalHost::new();
        host.add_resource("chat");
        controller.attach(&host).unwrap();

        assert_eq!(host.load("chat", "original()").unwrap(), b"run();");
    }

    #[test]
    fn test_skip_offset_delays_pipeline() {
        let dir = TempDir::new().unwrap();
        write_payload(&dir, "x");
        let controller = InterceptionController::with_fs(test_config(&dir).with_skip_offset(2));

        let host = LocalHost::new();
        host.add_resource("chat");
        controller.attach(&host).unwrap();

        assert_eq!(controller.phase("chat"), ResourcePhase::Unseen);
        assert_eq!(host.load("chat", "internal1").unwrap(), b"internal1");
        assert_eq!(controller.phase("chat"), ResourcePhase::BeforeOffset);
        assert_eq!(host.load("chat", "internal2").unwrap(), b"internal2");
        assert!(controller.cache().unwrap().scripts("chat").is_empty());

        assert_eq!(host.load("chat", "user").unwrap(), b"x;user");
        let cached = controller.cache().unwrap().get("chat", 0).unwrap();
        assert_eq!(cached.payload, b"user");
        assert_eq!(controller.stats().skipped, 2);
    }

    #[test]
    fn test_blacklist_clears_before_injection() {
        let dir = TempDir::new().unwrap();
        write_payload(&dir, "inject()");
        let config = test_config(&dir)
            .with_target("guard", 0)
            .add_blacklisted("guard");
        let controller = InterceptionController::with_fs(config);

        let host = LocalHost::new();
        host.add_resource("guard");
        controller.attach(&host).unwrap();

        // Cleared first, then the payload is spliced into the empty buffer
        assert_eq!(host.load("guard", "check()").unwrap(), b"inject();");
        // Later loads are only cleared
        assert_eq!(host.load("guard", "check()").unwrap(), b"");
        // The original script still reached the cache
        assert_eq!(controller.cache().unwrap().get("guard", 0).unwrap().payload, b"check()");
        assert_eq!(controller.stats().cleared, 2);
    }

    #[test]
    fn test_missing_payload_file_keeps_flag_unset() {
        let dir = TempDir::new().unwrap();
        let controller = InterceptionController::with_fs(test_config(&dir));

        let host = LocalHost::new();
        host.add_resource("chat");
        controller.attach(&host).unwrap();

        assert_eq!(host.load("chat", "a()").unwrap(), b"a()");
        assert!(!controller.injected());
        assert_eq!(controller.counter("chat"), Some(1));
    }

    #[test]
    fn test_session_namespaces_cache() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir).with_script(false, dir.path().join("unused"));
        let controller = InterceptionController::with_fs(config);

        let host = LocalHost::new().with_session("http://127.0.0.1:30120/");
        host.add_resource("chat");
        controller.attach(&host).unwrap();
        host.load("chat", "a()").unwrap();

        let expected = dir.path().join("cache").join("127.0.0.130120").join("chat").join("script_0.lua");
        assert_eq!(fs::read(expected).unwrap(), b"a()");
    }

    #[test]
    fn test_detach_stops_observation() {
        let dir = TempDir::new().unwrap();
        let controller = InterceptionController::with_fs(test_config(&dir).with_script(false, "none"));

        let host = LocalHost::new();
        host.add_resource("a");
        host.add_resource("b");
        assert_eq!(controller.attach(&host).unwrap(), 2);
        // Second attach binds nothing new
        assert_eq!(controller.attach(&host).unwrap(), 0);

        host.load("a", "1").unwrap();
        assert_eq!(controller.detach(), 2);
        host.load("a", "2").unwrap();

        assert_eq!(controller.counter("a"), Some(1));
        assert_eq!(controller.counter("b"), Some(0));
        assert!(host.resource("a").unwrap().before_load().is_empty());
    }

    #[test]
    fn test_direct_drive_without_bus() {
        let dir = TempDir::new().unwrap();
        write_payload(&dir, "p");
        let controller = InterceptionController::with_fs(test_config(&dir));

        let mut payload = b"body".to_vec();
        controller.handle_before_load("direct", &mut payload);
        assert_eq!(payload, b"p;body");
        assert_eq!(controller.counter("direct"), Some(1));
        assert_eq!(controller.resource_names(), vec!["direct".to_string()]);
    }

    #[test]
    fn test_repeated_payload_cached_once() {
        let dir = TempDir::new().unwrap();
        let controller = InterceptionController::with_fs(test_config(&dir).with_script(false, "none"));

        for _ in 0..3 {
            controller.handle_before_load("chat", &mut b"same()".to_vec());
        }

        let cache = controller.cache().unwrap();
        assert_eq!(cache.scripts("chat").len(), 1);
        assert_eq!(
            cache.add_script("chat", 0, b"other").unwrap(),
            CacheOutcome::DuplicateIndex
        );
        assert_eq!(controller.stats().duplicates, 2);
        assert_eq!(controller.counter("chat"), Some(3));
    }
}
