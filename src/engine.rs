//! Resolution engine.
//!
//! This module is the *internal entry point* for one resolution pass. Public
//! callers go through [`crate::resolve_with`]; the pieces here are split into
//! focused submodules under `src/engine/`.
//!
//! ## How the parts work together
//!
//! ```text
//! Vec<DistributionFile> (load order)
//!          │
//!          │  CompiledDistributions::new            (compiled.rs)
//!          │    - flatten in load order, EntryId = precedence
//!          │    - set aside unresolved entries
//!          │    - FilterMask + description per entry
//!          │    - per-category index (open / pinned by npc)
//!          v
//! snapshot actors ── batches ──▶ resolve_assignments (resolve.rs)
//!                    (cancel.rs)   - candidates from the index
//!                                  - matches() per pair    (matcher.rs)
//!                                  - last match wins, conflict flag
//!                                        │
//!                                        v
//!                              Vec<NpcOutfitAssignment>
//!                                        │
//!                                        │  aggregate        (aggregate.rs)
//!                                        v
//!                                 AssignmentStats
//! ```
//!
//! Nothing in a pass mutates its inputs, so the same files and snapshot always
//! produce the same table.
//!
//! ## Responsibilities by module
//!
//! - `compiled.rs`: flattening, [`FilterMask`], targeting descriptions and the
//!   candidate index.
//! - `matcher.rs`: the pure entry-vs-actor predicate.
//! - `resolve.rs`: per-actor ranking and winner selection.
//! - `aggregate.rs`: distinct-actor counts and unchanged-target detection.
//! - `cancel.rs`: the shared cancellation flag.
//! - `metrics.rs`: timings and counters for a pass.
//!
//! ## Debugging
//!
//! Run with `RUST_LOG=outfitter=debug` to trace per-file parsing and pass
//! progress.

#[path = "engine/aggregate.rs"]
mod aggregate;
#[path = "engine/cancel.rs"]
mod cancel;
#[path = "engine/compiled.rs"]
mod compiled;
#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/resolve.rs"]
mod resolve;

#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

pub use aggregate::aggregate;
pub use cancel::CancellationToken;
pub use compiled::{CompiledDistributions, FilterMask, describe};
pub use matcher::matches;
pub use metrics::PassMetrics;
pub(crate) use resolve::resolve_assignments;
