//! Report generation
//!
//! Summarizes a replay as plain text or JSON, and optionally writes the final
//! payloads to disk.

use crate::replay::ResourceRun;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use splice_hook::cache::sanitize_name;
use splice_hook::{InterceptionController, ResourcePhase, SpliceConfig, SpliceStatsSnapshot};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Per-resource summary line
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    pub name: String,
    pub loads: usize,
    pub vetoed: usize,
    pub changed: usize,
    pub counter: u64,
    pub phase: ResourcePhase,
}

/// Full replay report
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: String,
    pub session: Option<String>,
    pub injected: bool,
    pub cache_root: Option<String>,
    /// Effective configuration after overrides
    pub config: SpliceConfig,
    pub stats: SpliceStatsSnapshot,
    pub resources: Vec<ResourceReport>,
}

impl Report {
    /// Collect the report from replay results and controller state
    pub fn build(session: Option<String>, runs: &[ResourceRun], controller: &InterceptionController) -> Self {
        let resources = runs
            .iter()
            .map(|run| ResourceReport {
                name: run.name.clone(),
                loads: run.loads.len(),
                vetoed: run.loads.iter().filter(|l| l.payload.is_none()).count(),
                changed: run.changed(),
                counter: controller.counter(&run.name).unwrap_or(0),
                phase: controller.phase(&run.name),
            })
            .collect();

        Self {
            generated_at: Utc::now().to_rfc3339(),
            session,
            injected: controller.injected(),
            cache_root: controller
                .cache()
                .map(|cache| cache.root().display().to_string()),
            config: controller.config().clone(),
            stats: controller.stats(),
            resources,
        }
    }

    /// Render as human-readable text
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "═══════════════════════════════════════════════");
        let _ = writeln!(out, "  Splice Hook - Replay Report");
        let _ = writeln!(out, "═══════════════════════════════════════════════");
        let _ = writeln!(out, "Generated: {}", self.generated_at);
        let _ = writeln!(out, "Session:   {}", self.session.as_deref().unwrap_or("-"));
        let _ = writeln!(out, "Cache:     {}", self.cache_root.as_deref().unwrap_or("disabled"));
        let _ = writeln!(
            out,
            "Target:    {:?} at index {} (offset {})",
            self.config.target, self.config.target_index, self.config.skip_offset
        );
        let _ = writeln!(out, "Injected:  {}", if self.injected { "yes" } else { "no" });
        let _ = writeln!(out, "───────────────────────────────────────────────");
        let _ = writeln!(
            out,
            "{:<24} {:>6} {:>8} {:>7} {:>7}  {}",
            "RESOURCE", "LOADS", "CHANGED", "VETOED", "COUNTER", "PHASE"
        );
        for resource in &self.resources {
            let _ = writeln!(
                out,
                "{:<24} {:>6} {:>8} {:>7} {:>7}  {}",
                resource.name,
                resource.loads,
                resource.changed,
                resource.vetoed,
                resource.counter,
                resource.phase
            );
        }
        let _ = writeln!(out, "───────────────────────────────────────────────");
        let stats = &self.stats;
        let _ = writeln!(out, "Events:           {}", stats.events);
        let _ = writeln!(out, "Skipped (offset): {}", stats.skipped);
        let _ = writeln!(out, "Cached:           {}", stats.cached);
        let _ = writeln!(out, "Duplicates:       {}", stats.duplicates);
        let _ = writeln!(out, "Storage failures: {}", stats.storage_failures);
        let _ = writeln!(out, "Cleared:          {}", stats.cleared);
        let _ = writeln!(out, "Injections:       {}", stats.injections);
        out
    }

    /// Render as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize report")
    }
}

/// Write every delivered payload as `<dir>/<resource>/load_<n>.<ext>`
///
/// # Returns
/// * `Result<usize>` - Number of files written
pub fn write_payloads(dir: &Path, runs: &[ResourceRun], extension: &str) -> Result<usize> {
    let mut written = 0;
    for run in runs {
        let resource_dir = dir.join(sanitize_name(&run.name));
        fs::create_dir_all(&resource_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", resource_dir))?;

        for load in &run.loads {
            let Some(payload) = &load.payload else {
                continue;
            };
            let path = resource_dir.join(format!("load_{}.{}", load.position, extension));
            fs::write(&path, payload).with_context(|| format!("Failed to write {:?}", path))?;
            written += 1;
        }
    }
    log::info!("Wrote {} payload(s) to {:?}", written, dir);
    Ok(written)
}
