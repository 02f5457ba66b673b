//! Resolution pass metrics.
//!
//! Every pass records where its time went and how much matching work it did.
//! The CLI prints these under "Timing"; library callers can use them to spot
//! rule sets that defeat the npc pre-index (many global or open entries).

use serde::Serialize;
use std::time::Duration;

/// Timings and counters for one call to `resolve_with`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PassMetrics {
    /// Total elapsed time for the pass.
    pub total: Duration,
    /// Time spent flattening and indexing entries.
    pub compile: Duration,
    /// Time spent matching and ranking per actor.
    pub matching: Duration,
    /// Time spent building per-target statistics.
    pub aggregate: Duration,
    pub files: usize,
    /// Entries eligible for automatic matching.
    pub entries: usize,
    /// Entries held back because they carry raw filters.
    pub unresolved_entries: usize,
    pub npcs: usize,
    /// `(entry, actor)` pairs handed to the matcher after pre-indexing.
    pub pairs_evaluated: usize,
    /// Pairs that matched.
    pub matches: usize,
    /// Actor batches processed between cancellation checks.
    pub batches: usize,
}
