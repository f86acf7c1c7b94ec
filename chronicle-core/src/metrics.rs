//! Runtime counters.
//!
//! Lock-free `AtomicU64` counters incremented on the hot path by
//! [`crate::engine::Chronicle`] and read on export. A [`CounterSnapshot`]
//! renders as Prometheus text.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters for engine events.
#[derive(Debug)]
pub struct ChronicleCounters {
    /// Saves written in the full tier.
    pub saves_full: AtomicU64,
    /// Saves written in the summarized tier.
    pub saves_summarized: AtomicU64,
    /// Saves whose payload was compressed.
    pub saves_compressed: AtomicU64,
    /// Saves that failed to persist.
    pub save_failures: AtomicU64,
    /// Saves removed by the per-player cap.
    pub saves_evicted: AtomicU64,
    /// Saves removed on request.
    pub saves_deleted: AtomicU64,
    /// Successful loads.
    pub loads: AtomicU64,
    /// Loads rejected as undecodable.
    pub load_failures: AtomicU64,
    /// Memories left out of summarized saves.
    pub memories_discarded: AtomicU64,
    /// Context windows built.
    pub context_builds: AtomicU64,
    /// Context windows whose floor exceeded the budget.
    pub context_over_budget: AtomicU64,
}

impl ChronicleCounters {
    /// Zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            saves_full: AtomicU64::new(0),
            saves_summarized: AtomicU64::new(0),
            saves_compressed: AtomicU64::new(0),
            save_failures: AtomicU64::new(0),
            saves_evicted: AtomicU64::new(0),
            saves_deleted: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            load_failures: AtomicU64::new(0),
            memories_discarded: AtomicU64::new(0),
            context_builds: AtomicU64::new(0),
            context_over_budget: AtomicU64::new(0),
        }
    }

    /// Add `n` to a counter.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Increment a counter by one.
    pub fn incr(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            saves_full: load(&self.saves_full),
            saves_summarized: load(&self.saves_summarized),
            saves_compressed: load(&self.saves_compressed),
            save_failures: load(&self.save_failures),
            saves_evicted: load(&self.saves_evicted),
            saves_deleted: load(&self.saves_deleted),
            loads: load(&self.loads),
            load_failures: load(&self.load_failures),
            memories_discarded: load(&self.memories_discarded),
            context_builds: load(&self.context_builds),
            context_over_budget: load(&self.context_over_budget),
        }
    }
}

impl Default for ChronicleCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Full-tier saves.
    pub saves_full: u64,
    /// Summarized-tier saves.
    pub saves_summarized: u64,
    /// Compressed saves.
    pub saves_compressed: u64,
    /// Failed saves.
    pub save_failures: u64,
    /// Evicted saves.
    pub saves_evicted: u64,
    /// Deleted saves.
    pub saves_deleted: u64,
    /// Successful loads.
    pub loads: u64,
    /// Failed loads.
    pub load_failures: u64,
    /// Memories discarded by retention in saves.
    pub memories_discarded: u64,
    /// Context builds.
    pub context_builds: u64,
    /// Over-budget context builds.
    pub context_over_budget: u64,
}

impl CounterSnapshot {
    /// Total saves written, any tier.
    #[must_use]
    pub fn saves_total(&self) -> u64 {
        self.saves_full + self.saves_summarized
    }

    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP chronicle_saves_total Saves written by tier\n\
             # TYPE chronicle_saves_total counter\n\
             chronicle_saves_total{{tier=\"full\"}} {}\n\
             chronicle_saves_total{{tier=\"summarized\"}} {}\n\
             # HELP chronicle_saves_compressed_total Saves with a compressed payload\n\
             # TYPE chronicle_saves_compressed_total counter\n\
             chronicle_saves_compressed_total {}\n\
             # HELP chronicle_save_failures_total Saves that failed to persist\n\
             # TYPE chronicle_save_failures_total counter\n\
             chronicle_save_failures_total {}\n\
             # HELP chronicle_saves_evicted_total Saves removed by the per-player cap\n\
             # TYPE chronicle_saves_evicted_total counter\n\
             chronicle_saves_evicted_total {}\n\
             # HELP chronicle_saves_deleted_total Saves deleted on request\n\
             # TYPE chronicle_saves_deleted_total counter\n\
             chronicle_saves_deleted_total {}\n\
             # HELP chronicle_loads_total Loads by outcome\n\
             # TYPE chronicle_loads_total counter\n\
             chronicle_loads_total{{outcome=\"ok\"}} {}\n\
             chronicle_loads_total{{outcome=\"error\"}} {}\n\
             # HELP chronicle_memories_discarded_total Memories left out of summarized saves\n\
             # TYPE chronicle_memories_discarded_total counter\n\
             chronicle_memories_discarded_total {}\n\
             # HELP chronicle_context_builds_total Context windows built\n\
             # TYPE chronicle_context_builds_total counter\n\
             chronicle_context_builds_total {}\n\
             # HELP chronicle_context_over_budget_total Context windows over budget\n\
             # TYPE chronicle_context_over_budget_total counter\n\
             chronicle_context_over_budget_total {}\n",
            self.saves_full,
            self.saves_summarized,
            self.saves_compressed,
            self.save_failures,
            self.saves_evicted,
            self.saves_deleted,
            self.loads,
            self.load_failures,
            self.memories_discarded,
            self.context_builds,
            self.context_over_budget,
        )
    }
}

// ---------------------------------------------------------------------------
// Tracing Span Names
// ---------------------------------------------------------------------------

/// Span names used with `tracing::info_span!`.
pub mod spans {
    /// Whole save operation.
    pub const SAVE: &str = "chronicle::save";
    /// Whole load operation.
    pub const LOAD: &str = "chronicle::load";
    /// Context assembly.
    pub const CONTEXT: &str = "chronicle::context";
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_default_zero() {
        let snap = ChronicleCounters::new().snapshot();
        assert_eq!(snap, CounterSnapshot::default());
        assert_eq!(snap.saves_total(), 0);
    }

    #[test]
    fn counters_increment_and_snapshot() {
        let c = ChronicleCounters::new();
        ChronicleCounters::incr(&c.saves_full);
        ChronicleCounters::incr(&c.saves_summarized);
        ChronicleCounters::add(&c.memories_discarded, 70);
        let snap = c.snapshot();
        assert_eq!(snap.saves_total(), 2);
        assert_eq!(snap.memories_discarded, 70);
    }

    #[test]
    fn prometheus_format() {
        let c = ChronicleCounters::new();
        ChronicleCounters::add(&c.saves_evicted, 3);
        let text = c.snapshot().to_prometheus();
        assert!(text.contains("chronicle_saves_evicted_total 3"));
        assert!(text.contains("chronicle_saves_total{tier=\"full\"} 0"));
        assert!(text.contains("# TYPE chronicle_loads_total counter"));
    }
}
