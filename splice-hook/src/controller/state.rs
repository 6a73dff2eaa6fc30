//! Per-resource sequence state and run statistics

use crate::types::ResourcePhase;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Sequence tracker for one resource
#[derive(Debug)]
pub struct ResourceState {
    name: String,
    counter: AtomicU64,
}

impl ResourceState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Events observed so far
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Count one observed event
    ///
    /// # Returns
    /// * `u64` - Counter value before the increment, i.e. this event's sequence position
    pub(crate) fn advance(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::AcqRel)
    }

    /// Phase of the most recently observed event
    pub fn phase(&self, skip_offset: i64, injected: bool) -> ResourcePhase {
        let counter = self.counter();
        if counter == 0 {
            ResourcePhase::Unseen
        } else if injected {
            ResourcePhase::Done
        } else if effective_index(counter - 1, skip_offset) < 0 {
            ResourcePhase::BeforeOffset
        } else {
            ResourcePhase::Active
        }
    }
}

/// Sequence position adjusted by the number of framework-internal loads
pub fn effective_index(position: u64, skip_offset: i64) -> i64 {
    i64::try_from(position)
        .unwrap_or(i64::MAX)
        .saturating_sub(skip_offset)
}

/// Live counters for one pipeline run
#[derive(Debug, Default)]
pub struct SpliceStats {
    events: AtomicU64,
    skipped: AtomicU64,
    cached: AtomicU64,
    duplicates: AtomicU64,
    storage_failures: AtomicU64,
    cleared: AtomicU64,
    injections: AtomicU64,
}

/// Point-in-time copy of [`SpliceStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpliceStatsSnapshot {
    /// Before-load events observed
    pub events: u64,
    /// Events that fell before the skip offset
    pub skipped: u64,
    /// Scripts newly written to the cache
    pub cached: u64,
    /// Cache writes suppressed as duplicates
    pub duplicates: u64,
    /// Cache writes that failed
    pub storage_failures: u64,
    /// Payloads cleared by the blacklist
    pub cleared: u64,
    /// External payloads spliced in (0 or 1)
    pub injections: u64,
}

impl SpliceStats {
    pub(crate) fn event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cached(&self) {
        self.cached.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn storage_failure(&self) {
        self.storage_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cleared(&self) {
        self.cleared.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn injection(&self) {
        self.injections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SpliceStatsSnapshot {
        SpliceStatsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            cached: self.cached.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            cleared: self.cleared.load(Ordering::Relaxed),
            injections: self.injections.load(Ordering::Relaxed),
        }
    }
}
