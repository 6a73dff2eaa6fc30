//! Splice Hook Library
//!
//! An ordered, thread-safe event bus and the interception pipeline built on
//! top of it: a per-resource sequence tracker that caches every script a host
//! loads and splices one externally authored payload into the stream exactly
//! once per run.
//!
//! # Architecture
//!
//! - [`event::EventBus`] - priority-ordered callback chain with veto semantics
//! - [`cache::ScriptCacheStore`] - deduplicating per-resource script cache
//! - [`codec`] - binary-safe marker substitution
//! - [`InterceptionController`] - binds the pipeline to host resources
//! - [`SpliceConfig`] / [`ini::IniDocument`] - configuration loaded once at startup
//!
//! The library does NOT:
//! - Locate or attach to a host process
//! - Install a logger (it only emits through the `log` facade)
//! - Keep any global state; every run owns its own [`controller::SpliceContext`]
//!
//! # Example Usage
//!
//! ```no_run
//! use splice_hook::{InterceptionController, LocalHost, SpliceConfig};
//!
//! let config = SpliceConfig::new()
//!     .with_cache(true, "cache")
//!     .with_script(true, "payload.lua")
//!     .with_target("manager", 0);
//!
//! let host = LocalHost::new().with_session("local");
//! host.add_resource("spawn_manager");
//!
//! let controller = InterceptionController::with_fs(config);
//! controller.attach(&host).unwrap();
//!
//! for _ in 0..5 {
//!     let payload = host.load("spawn_manager", "print('loaded')");
//!     println!("{:?}", payload);
//! }
//! ```

// Public modules
pub mod cache;
pub mod codec;
pub mod config;
pub mod controller;
pub mod event;
pub mod host;
pub mod ini;
pub mod types;

// Re-export main types for convenience
pub use cache::{DurableStore, FsStore, ScriptCacheStore};
pub use config::SpliceConfig;
pub use controller::{InterceptionController, SpliceStatsSnapshot};
pub use event::{Cookie, EventBus};
pub use host::{HostResource, LocalHost, LocalResource, ResourceSource};
pub use ini::IniDocument;
pub use types::{CacheOutcome, ResourcePhase, Result, SpliceError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: a fresh controller tracks nothing
        let controller = InterceptionController::with_fs(SpliceConfig::new());
        assert!(!controller.injected());
        assert!(controller.resource_names().is_empty());
        assert_eq!(controller.stats(), SpliceStatsSnapshot::default());
    }
}
