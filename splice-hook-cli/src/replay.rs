//! Load-trace replay
//!
//! Builds an in-process host from a trace, attaches the interception
//! controller and fires every load through the resource's before-load event.
//! In parallel mode each resource replays on its own rayon worker; loads of a
//! single resource always stay in trace order.

use crate::config::LoadTrace;
use anyhow::{Context, Result};
use rayon::prelude::*;
use splice_hook::{InterceptionController, LocalHost};
use std::path::Path;

/// Outcome of one replayed load
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// Position in the resource's load sequence
    pub position: usize,
    /// Payload as the host would execute it; None if a subscriber vetoed
    pub payload: Option<Vec<u8>>,
    /// True if the payload differs from the input
    pub changed: bool,
}

/// Replay result for one resource
#[derive(Debug, Clone)]
pub struct ResourceRun {
    pub name: String,
    pub loads: Vec<LoadOutcome>,
}

impl ResourceRun {
    pub fn changed(&self) -> usize {
        self.loads.iter().filter(|l| l.changed).count()
    }
}

/// Build the host described by a trace
pub fn build_host(trace: &LoadTrace) -> LocalHost {
    let mut host = LocalHost::new();
    if let Some(session) = &trace.session {
        host = host.with_session(session.clone());
    }
    for resource in &trace.resources {
        host.add_resource(&resource.name);
    }
    host
}

/// Replay every load of the trace through `host`
///
/// `base` resolves script files given relative to the trace.
pub fn replay(
    trace: &LoadTrace,
    host: &LocalHost,
    controller: &InterceptionController,
    base: &Path,
    parallel: bool,
) -> Result<Vec<ResourceRun>> {
    let attached = controller
        .attach(host)
        .context("Failed to attach to the trace's resources")?;
    log::info!("Replaying {} load(s) across {} resource(s)", trace.load_count(), attached);

    let runs = if parallel {
        trace
            .resources
            .par_iter()
            .map(|resource| replay_resource(&resource.name, &resource.scripts, host, base))
            .collect::<Result<Vec<_>>>()?
    } else {
        trace
            .resources
            .iter()
            .map(|resource| replay_resource(&resource.name, &resource.scripts, host, base))
            .collect::<Result<Vec<_>>>()?
    };

    controller.detach();
    Ok(runs)
}

fn replay_resource(
    name: &str,
    scripts: &[crate::config::ScriptSource],
    host: &LocalHost,
    base: &Path,
) -> Result<ResourceRun> {
    let resource = host
        .resource(name)
        .with_context(|| format!("Resource '{}' is not registered", name))?;

    resource.start();
    let mut loads = Vec::with_capacity(scripts.len());
    for (position, script) in scripts.iter().enumerate() {
        let input = script.read(base)?;
        let payload = resource.load(input.clone());
        let changed = payload.as_deref() != Some(input.as_slice());
        log::debug!("{} #{}: {} bytes in, changed: {}", name, position, input.len(), changed);
        loads.push(LoadOutcome {
            position,
            payload,
            changed,
        });
    }
    resource.stop();

    Ok(ResourceRun {
        name: name.to_string(),
        loads,
    })
}
