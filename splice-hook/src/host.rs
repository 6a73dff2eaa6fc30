//! Host collaborator interfaces
//!
//! The pipeline never reaches into the host directly. It sees an iterable
//! resource source whose resources each expose a name and a before-load event
//! carrying the in-flight payload. [`LocalHost`] is a plain in-process
//! implementation used by the CLI replayer and the tests.

use crate::event::EventBus;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// A named unit of script content the host loads sequentially
pub trait HostResource: Send + Sync {
    /// Resource name as reported by the host
    fn name(&self) -> &str;

    /// Event fired before each script of the resource is loaded
    fn before_load(&self) -> &EventBus<Vec<u8>>;
}

/// Source of the resources currently known to the host
pub trait ResourceSource {
    /// All resources; may be empty
    fn resources(&self) -> Vec<Arc<dyn HostResource>>;

    /// Label of the current session, used to namespace the cache
    fn session(&self) -> Option<String> {
        None
    }
}

/// In-process resource with its lifecycle events
#[derive(Debug)]
pub struct LocalResource {
    name: String,
    before_load: EventBus<Vec<u8>>,
    on_start: EventBus<()>,
    on_stop: EventBus<()>,
}

impl LocalResource {
    /// Create a resource with no subscribers
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before_load: EventBus::new(),
            on_start: EventBus::new(),
            on_stop: EventBus::new(),
        }
    }

    /// Fire before-load for one script
    ///
    /// # Returns
    /// * `Option<Vec<u8>>` - The payload after all subscribers ran, or None if one vetoed the load
    pub fn load(&self, payload: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        let mut payload = payload.into();
        if self.before_load.invoke(&mut payload) {
            Some(payload)
        } else {
            log::debug!("Load of '{}' vetoed by a subscriber", self.name);
            None
        }
    }

    /// Event fired when the resource starts
    pub fn on_start(&self) -> &EventBus<()> {
        &self.on_start
    }

    /// Event fired when the resource stops
    pub fn on_stop(&self) -> &EventBus<()> {
        &self.on_stop
    }

    /// Fire the start event
    pub fn start(&self) -> bool {
        self.on_start.invoke(&mut ())
    }

    /// Fire the stop event
    pub fn stop(&self) -> bool {
        self.on_stop.invoke(&mut ())
    }
}

impl HostResource for LocalResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn before_load(&self) -> &EventBus<Vec<u8>> {
        &self.before_load
    }
}

/// In-process resource source
#[derive(Default)]
pub struct LocalHost {
    session: Option<String>,
    resources: RwLock<Vec<Arc<LocalResource>>>,
}

impl LocalHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: session label reported to the pipeline
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Register a resource, or return the existing one with the same name
    pub fn add_resource(&self, name: &str) -> Arc<LocalResource> {
        let mut resources = self.resources.write();
        if let Some(existing) = resources.iter().find(|r| r.name == name) {
            return Arc::clone(existing);
        }
        let resource = Arc::new(LocalResource::new(name));
        resources.push(Arc::clone(&resource));
        resource
    }

    /// Find a resource by name
    pub fn resource(&self, name: &str) -> Option<Arc<LocalResource>> {
        self.resources.read().iter().find(|r| r.name == name).cloned()
    }

    /// Fire before-load on the named resource
    ///
    /// # Returns
    /// * `Option<Vec<u8>>` - None if the resource is unknown or a subscriber vetoed
    pub fn load(&self, name: &str, payload: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        match self.resource(name) {
            Some(resource) => resource.load(payload),
            None => {
                log::warn!("Load requested for unknown resource '{}'", name);
                None
            }
        }
    }

    /// Number of registered resources
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceSource for LocalHost {
    fn resources(&self) -> Vec<Arc<dyn HostResource>> {
        self.resources
            .read()
            .iter()
            .map(|r| Arc::clone(r) as Arc<dyn HostResource>)
            .collect()
    }

    fn session(&self) -> Option<String> {
        self.session.clone()
    }
}

impl fmt::Debug for LocalHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalHost")
            .field("session", &self.session)
            .field("resources", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_resource_deduplicates() {
        let host = LocalHost::new().with_session("local");
        let first = host.add_resource("chat");
        let second = host.add_resource("chat");
        host.add_resource("map");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(host.len(), 2);
        assert_eq!(host.session(), Some("local".to_string()));
        assert_eq!(ResourceSource::resources(&host).len(), 2);
    }

    #[test]
    fn test_load_runs_subscribers() {
        let host = LocalHost::new();
        let chat = host.add_resource("chat");
        chat.before_load()
            .connect_void(|payload: &mut Vec<u8>| payload.extend_from_slice(b"--tail"), 0);

        assert_eq!(host.load("chat", "x()").unwrap(), b"x()--tail");
        assert!(host.load("unknown", "x()").is_none());
    }

    #[test]
    fn test_veto_drops_load() {
        let resource = LocalResource::new("guarded");
        resource.before_load().connect(|_: &mut Vec<u8>| false, 0);
        assert!(resource.load("x()").is_none());
    }

    #[test]
    fn test_lifecycle_events() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let resource = LocalResource::new("chat");
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);
        resource.on_start().connect_void(move |_: &mut ()| {
            counter.fetch_add(1, Ordering::SeqCst);
        }, 0);

        assert!(resource.start());
        assert!(resource.stop());
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }
}
