//! Configuration loading and load-trace parsing

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use splice_hook::{IniDocument, SpliceConfig};
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line overrides applied on top of the INI file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub no_cache: bool,
    pub no_script: bool,
    pub cache_path: Option<PathBuf>,
    pub target: Option<String>,
    pub target_index: Option<i64>,
    pub skip_offset: Option<i64>,
}

/// Load the pipeline configuration and apply overrides
///
/// `.toml` files are read with serde (absent keys take the same defaults as
/// INI); anything else is parsed as INI.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<SpliceConfig> {
    let mut config = match path {
        Some(path) if is_toml(path) => {
            log::info!("Loading TOML configuration from {:?}", path);
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        }
        Some(path) => {
            log::info!("Loading configuration from {:?}", path);
            let doc = IniDocument::load(path)
                .with_context(|| format!("Failed to load config file: {:?}", path))?;
            SpliceConfig::from_ini(&doc)
        }
        None => {
            log::info!("No config file given, using defaults");
            SpliceConfig::new()
        }
    };

    if overrides.no_cache {
        config.cache_enabled = false;
    }
    if overrides.no_script {
        config.script_enabled = false;
    }
    if let Some(cache_path) = &overrides.cache_path {
        config.cache_path = cache_path.clone();
    }
    if let Some(target) = &overrides.target {
        config.target = target.clone();
    }
    if let Some(index) = overrides.target_index {
        config.target_index = index;
    }
    if let Some(offset) = overrides.skip_offset {
        config.skip_offset = offset;
    }

    // Validate after overrides so a flag can settle a contradiction in the file
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false)
}

/// A recorded (or hand-written) sequence of script loads to replay
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadTrace {
    /// Session label used to namespace the cache
    pub session: Option<String>,
    #[serde(default)]
    pub resources: Vec<TraceResource>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TraceResource {
    pub name: String,
    #[serde(default)]
    pub scripts: Vec<ScriptSource>,
}

/// Script body given inline or as a file relative to the trace
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ScriptSource {
    Inline(String),
    File { file: PathBuf },
}

impl ScriptSource {
    /// Resolve to bytes; file paths are relative to `base`
    pub fn read(&self, base: &Path) -> Result<Vec<u8>> {
        match self {
            ScriptSource::Inline(body) => Ok(body.clone().into_bytes()),
            ScriptSource::File { file } => {
                let path = if file.is_absolute() {
                    file.clone()
                } else {
                    base.join(file)
                };
                fs::read(&path).with_context(|| format!("Failed to read script file: {:?}", path))
            }
        }
    }
}

impl LoadTrace {
    /// Total number of loads in the trace
    pub fn load_count(&self) -> usize {
        self.resources.iter().map(|r| r.scripts.len()).sum()
    }
}

/// Load a trace from a TOML file
pub fn load_trace(path: &Path) -> Result<LoadTrace> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace file: {:?}", path))?;

    let trace: LoadTrace = toml::from_str(&content)
        .with_context(|| format!("Failed to parse trace file: {:?}", path))?;

    if trace.resources.is_empty() {
        log::warn!("Trace {:?} lists no resources", path);
    }

    Ok(trace)
}
