use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::assignment::{AssignmentStats, NpcOutfitAssignment, UnresolvedDistribution};
use crate::distribution::DistributionFile;
use crate::engine::{self, CancellationToken, CompiledDistributions, PassMetrics};
use crate::form::FormIndex;
use crate::npc::NpcFilterData;
use crate::Result;

/// Resolution context.
///
/// Holds the environment a pass reads but does not own: the loaded-record
/// index used for display names, and an optional cancellation token.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub forms: &'a FormIndex,
    pub cancel: Option<&'a CancellationToken>,
}

impl<'a> Context<'a> {
    pub fn new(forms: &'a FormIndex) -> Self {
        Context { forms, cancel: None }
    }

    pub fn with_cancel(mut self, cancel: &'a CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Options that affect a resolution pass.
#[derive(Debug, Clone)]
pub struct Options {
    /// Actors processed between cancellation checks.
    pub batch_size: usize,
    /// List entries held back because of raw filters in the report.
    pub include_unresolved: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options { batch_size: 512, include_unresolved: true }
    }
}

/// Result from [`resolve`] and [`resolve_with`].
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    /// One row per actor with at least one matching distribution, in
    /// snapshot order.
    pub assignments: Vec<NpcOutfitAssignment>,
    pub stats: AssignmentStats,
    /// Entries needing manual review, in load order.
    pub unresolved: Vec<UnresolvedDistribution>,
    pub metrics: PassMetrics,
}

impl ResolutionReport {
    pub fn assignment(&self, npc: &crate::FormKey) -> Option<&NpcOutfitAssignment> {
        self.assignments.iter().find(|a| a.npc == *npc)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &NpcOutfitAssignment> {
        self.assignments.iter().filter(|a| a.has_conflict)
    }
}

/// Resolve `npcs` against `files` with default [`Options`] and no cancellation.
///
/// `files` must already be in load order.
///
/// # Example
/// ```
/// use outfitter::{Dialect, FormIndex, NpcFilterData, RuleSource};
///
/// let forms = FormIndex::new();
/// let source = RuleSource::named("Guards_DISTR.ini", Dialect::Spid);
/// let file = outfitter::parse_rules(&source, "Outfit = 0x800~Guards.esp", &forms);
/// let npc = NpcFilterData::new("Skyrim.esm|A1".parse().unwrap());
///
/// let report = outfitter::resolve(&[file], &[npc], &forms).unwrap();
/// assert_eq!(report.assignments.len(), 1);
/// ```
pub fn resolve(files: &[DistributionFile], npcs: &[NpcFilterData], forms: &FormIndex) -> Result<ResolutionReport> {
    resolve_with(files, npcs, &Context::new(forms), &Options::default())
}

/// Resolve `npcs` against `files` using the provided `context`/`options`.
///
/// Fails with [`crate::Error::Cancelled`] when the context's token fires
/// mid-pass, and with a logic error on duplicate actor keys.
pub fn resolve_with(
    files: &[DistributionFile],
    npcs: &[NpcFilterData],
    context: &Context<'_>,
    options: &Options,
) -> Result<ResolutionReport> {
    let start = Instant::now();
    let mut metrics = PassMetrics { files: files.len(), npcs: npcs.len(), ..PassMetrics::default() };

    let compile_start = Instant::now();
    let compiled = CompiledDistributions::new(files, context.forms);
    metrics.compile = compile_start.elapsed();
    metrics.entries = compiled.entries.len();
    metrics.unresolved_entries = compiled.unresolved.len();
    debug!(entries = metrics.entries, unresolved = metrics.unresolved_entries, "compiled distributions");

    let matching_start = Instant::now();
    let assignments = engine::resolve_assignments(&compiled, npcs, context, options, &mut metrics)?;
    metrics.matching = matching_start.elapsed();

    let aggregate_start = Instant::now();
    let stats = engine::aggregate(&assignments, npcs);
    metrics.aggregate = aggregate_start.elapsed();

    let unresolved = if options.include_unresolved {
        compiled
            .unresolved
            .iter()
            .map(|c| UnresolvedDistribution {
                file_name: c.file.file_name().to_string(),
                line_number: c.entry.line_number,
                target: c.entry.target.clone(),
                raw_string_filters: c.entry.raw_string_filters.clone(),
                raw_form_filters: c.entry.raw_form_filters.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    metrics.total = start.elapsed();
    info!(
        files = metrics.files,
        npcs = metrics.npcs,
        assigned = assignments.len(),
        conflicts = assignments.iter().filter(|a| a.has_conflict).count(),
        elapsed_ms = metrics.total.as_millis() as u64,
        "resolution pass finished"
    );

    Ok(ResolutionReport { assignments, stats, unresolved, metrics })
}
