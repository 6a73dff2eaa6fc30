//! Pipeline configuration types
//!
//! This module defines everything the interception controller needs to know:
//! where to cache, what to inject, and which resources to filter. It is loaded
//! once at startup from an INI document; missing or invalid keys fall back to
//! defaults.

use crate::ini::IniDocument;
use crate::types::{Result, SpliceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Marker removed from the external payload in isolated mode
pub const DEFAULT_ISOLATION_MARKER: &str = "local magic_code = [=====[fivem_latest_marker]=====]";

/// Configuration for the interception pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpliceConfig {
    /// Cache observed scripts to disk
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Root directory of the script cache
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// File extension for cached scripts
    #[serde(default = "default_extension")]
    pub cache_extension: String,

    /// Splice the external payload into the target resource
    #[serde(default = "default_true")]
    pub script_enabled: bool,

    /// File holding the external payload
    #[serde(default = "default_script_path")]
    pub script_path: PathBuf,

    /// Substring a resource name must contain to be targeted (empty matches all)
    #[serde(default)]
    pub target: String,

    /// Effective index at which the payload is spliced in
    #[serde(default)]
    pub target_index: i64,

    /// Replace the in-flight payload instead of prepending to it
    #[serde(default)]
    pub replace_target: bool,

    /// Strip the isolation marker from the external payload
    #[serde(default)]
    pub isolated: bool,

    /// Marker stripped in isolated mode
    #[serde(default = "default_marker")]
    pub isolation_marker: String,

    /// Appended to the external payload before splicing
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Number of framework-internal loads preceding user content
    #[serde(default = "default_offset")]
    pub skip_offset: i64,

    /// Priority of the controller's before-load subscription
    #[serde(default)]
    pub subscription_order: i32,

    /// Resources whose payloads are cleared
    #[serde(default)]
    pub blacklist: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("cache")
}

fn default_extension() -> String {
    "lua".to_string()
}

fn default_script_path() -> PathBuf {
    PathBuf::from("script.lua")
}

fn default_marker() -> String {
    DEFAULT_ISOLATION_MARKER.to_string()
}

fn default_separator() -> String {
    ";".to_string()
}

fn default_offset() -> i64 {
    4
}

impl Default for SpliceConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_path: default_cache_path(),
            cache_extension: default_extension(),
            script_enabled: true,
            script_path: default_script_path(),
            target: String::new(),
            target_index: 0,
            replace_target: false,
            isolated: false,
            isolation_marker: default_marker(),
            separator: default_separator(),
            skip_offset: default_offset(),
            subscription_order: 0,
            blacklist: Vec::new(),
        }
    }
}

impl SpliceConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an INI document; absent keys keep their defaults
    pub fn from_ini(doc: &IniDocument) -> Self {
        let defaults = Self::default();
        let order = doc.get_i64("pipeline", "order", defaults.subscription_order as i64);

        Self {
            cache_enabled: doc.get_bool("cache", "enabled", defaults.cache_enabled),
            cache_path: doc
                .value("cache", "path")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_path),
            cache_extension: doc.get("cache", "extension", &defaults.cache_extension),
            script_enabled: doc.get_bool("script", "enabled", defaults.script_enabled),
            script_path: doc
                .value("script", "path")
                .map(PathBuf::from)
                .unwrap_or(defaults.script_path),
            target: doc.get("script", "target", &defaults.target),
            target_index: doc.get_i64("script", "index", defaults.target_index),
            replace_target: doc.get_bool("script", "replace", defaults.replace_target),
            isolated: doc.get_bool("script", "isolated", defaults.isolated),
            isolation_marker: doc.get("script", "marker", &defaults.isolation_marker),
            separator: doc.get("script", "separator", &defaults.separator),
            skip_offset: doc.get_i64("pipeline", "offset", defaults.skip_offset),
            subscription_order: i32::try_from(order).unwrap_or_else(|_| {
                log::warn!("[pipeline] order {} out of range; using 0", order);
                0
            }),
            blacklist: doc.get_list("filter", "blacklist"),
        }
    }

    /// Load and parse an INI file, then validate it
    pub fn load(path: &Path) -> Result<Self> {
        log::info!("Loading configuration from {:?}", path);
        let config = Self::from_ini(&IniDocument::load(path)?);
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that contradict each other
    ///
    /// Individual malformed values already fell back to defaults; this only
    /// catches combinations the pipeline cannot act on.
    pub fn validate(&self) -> Result<()> {
        if self.isolated && self.isolation_marker.is_empty() {
            return Err(SpliceError::Configuration(
                "[script] marker must not be empty when isolated is set".to_string(),
            ));
        }
        if self.script_enabled && self.script_path.as_os_str().is_empty() {
            return Err(SpliceError::Configuration(
                "[script] path must be set when script execution is enabled".to_string(),
            ));
        }
        if self.cache_enabled && self.cache_extension.is_empty() {
            return Err(SpliceError::Configuration(
                "[cache] extension must not be empty when caching is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Render back into an INI document
    pub fn to_ini(&self) -> IniDocument {
        let mut doc = IniDocument::new();
        doc.set("cache", "enabled", &self.cache_enabled.to_string());
        doc.set("cache", "path", &self.cache_path.to_string_lossy());
        doc.set("cache", "extension", &self.cache_extension);
        doc.set("script", "enabled", &self.script_enabled.to_string());
        doc.set("script", "path", &self.script_path.to_string_lossy());
        doc.set("script", "target", &self.target);
        doc.set("script", "index", &self.target_index.to_string());
        doc.set("script", "replace", &self.replace_target.to_string());
        doc.set("script", "isolated", &self.isolated.to_string());
        doc.set("script", "marker", &self.isolation_marker);
        doc.set("script", "separator", &self.separator);
        doc.set("pipeline", "offset", &self.skip_offset.to_string());
        doc.set("pipeline", "order", &self.subscription_order.to_string());
        doc.set("filter", "blacklist", &self.blacklist.join(","));
        doc
    }

    /// Builder method: enable or disable caching
    pub fn with_cache(mut self, enabled: bool, path: impl Into<PathBuf>) -> Self {
        self.cache_enabled = enabled;
        self.cache_path = path.into();
        self
    }

    /// Builder method: configure the injection target
    pub fn with_target(mut self, target: impl Into<String>, index: i64) -> Self {
        self.target = target.into();
        self.target_index = index;
        self
    }

    /// Builder method: enable or disable script execution and set the payload file
    pub fn with_script(mut self, enabled: bool, path: impl Into<PathBuf>) -> Self {
        self.script_enabled = enabled;
        self.script_path = path.into();
        self
    }

    /// Builder method: replace instead of prepend
    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace_target = replace;
        self
    }

    /// Builder method: strip the isolation marker
    pub fn with_isolation(mut self, isolated: bool) -> Self {
        self.isolated = isolated;
        self
    }

    /// Builder method: number of internal loads to skip
    pub fn with_skip_offset(mut self, offset: i64) -> Self {
        self.skip_offset = offset;
        self
    }

    /// Builder method: add a blacklisted resource
    pub fn add_blacklisted(mut self, name: impl Into<String>) -> Self {
        self.blacklist.push(name.into());
        self
    }

    /// Check if a resource's payloads must be cleared
    pub fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist.iter().any(|entry| entry == name)
    }

    /// Check if a resource name matches the injection target
    pub fn is_target(&self, name: &str) -> bool {
        name.contains(self.target.as_str())
    }
}
