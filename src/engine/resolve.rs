//! Per-actor ranking and winner selection.
//!
//! For every actor and every target category:
//!
//! ```text
//! CategoryIndex::candidates(npc) ──▶ matcher::matches ──▶ matched ids (load order)
//!                                                           │
//!                                     winner = last id ◀────┤
//!                                     conflict = len > 1 ◀──┘
//! ```
//!
//! Load order is the order files were supplied, then line order inside a file,
//! so the last match is the one the host applies. Chance never affects the
//! winner: the preview does not roll.
//!
//! Actors are processed in snapshot order and the output keeps that order, so
//! two passes over the same inputs produce identical tables. Actors nothing
//! matched are left out; they keep their defaults.

use std::collections::HashSet;

use tracing::debug;

use super::compiled::{CompiledDistributions, CompiledEntry, FilterMask};
use super::matcher::matches;
use super::metrics::PassMetrics;
use crate::assignment::{NpcOutfitAssignment, OutfitDistribution};
use crate::distribution::{DistributionTarget, TargetCategory};
use crate::npc::NpcFilterData;
use crate::{Context, Error, Options, Result};

/// Resolve every actor in `npcs` against `compiled`.
///
/// Fails on duplicate actor keys, on an entry indexed under the wrong
/// category, and when the context's cancellation token fires.
pub(crate) fn resolve_assignments(
    compiled: &CompiledDistributions<'_>,
    npcs: &[NpcFilterData],
    context: &Context<'_>,
    options: &Options,
    metrics: &mut PassMetrics,
) -> Result<Vec<NpcOutfitAssignment>> {
    let mut seen = HashSet::with_capacity(npcs.len());
    for npc in npcs {
        if !seen.insert(&npc.form_key) {
            return Err(Error::DuplicateNpc(npc.form_key.clone()));
        }
    }

    let batch_size = options.batch_size.max(1);
    let mut assignments = Vec::new();

    for (batch_idx, batch) in npcs.chunks(batch_size).enumerate() {
        if context.cancel.is_some_and(|token| token.is_cancelled()) {
            debug!(batch = batch_idx, "resolution cancelled");
            return Err(Error::Cancelled);
        }
        metrics.batches += 1;

        for npc in batch {
            if let Some(assignment) = resolve_npc(compiled, npc, context, metrics)? {
                assignments.push(assignment);
            }
        }
    }

    Ok(assignments)
}

/// Resolve one actor. `None` when no entry in any category matched.
fn resolve_npc(
    compiled: &CompiledDistributions<'_>,
    npc: &NpcFilterData,
    context: &Context<'_>,
    metrics: &mut PassMetrics,
) -> Result<Option<NpcOutfitAssignment>> {
    let mut distributions = Vec::new();
    let mut has_conflict = false;
    let mut final_outfit = None;
    let mut final_keyword = None;

    for category in TargetCategory::ALL {
        let candidates = compiled.index(category).candidates(&npc.form_key);
        metrics.pairs_evaluated += candidates.len();

        let mut matched = Vec::new();
        for id in candidates {
            let candidate = compiled.get(id);
            if candidate.entry.target.category() != category {
                return Err(Error::Invariant(format!(
                    "{} line {} targets {} but was indexed as {:?}",
                    candidate.file.relative_path(),
                    candidate.entry.line_number,
                    candidate.entry.target,
                    category
                )));
            }
            if matches(candidate.entry, npc) {
                matched.push(candidate);
            }
        }
        metrics.matches += matched.len();

        let Some(winner) = matched.last() else {
            continue;
        };
        has_conflict |= matched.len() > 1;

        match &winner.entry.target {
            DistributionTarget::Outfit(key) => final_outfit = Some(key.clone()),
            DistributionTarget::Keyword(name) => final_keyword = Some(name.clone()),
        }

        let last = matched.len() - 1;
        for (pos, candidate) in matched.iter().enumerate() {
            distributions.push(to_distribution(candidate, pos == last, context));
        }
    }

    if distributions.is_empty() {
        return Ok(None);
    }

    let final_outfit_editor_id = final_outfit.as_ref().and_then(|k| context.forms.editor_id(k)).map(str::to_string);

    Ok(Some(NpcOutfitAssignment {
        npc: npc.form_key.clone(),
        editor_id: npc.editor_id.clone(),
        name: npc.name.clone(),
        final_outfit,
        final_outfit_editor_id,
        final_keyword,
        distributions,
        has_conflict,
    }))
}

fn to_distribution(candidate: &CompiledEntry<'_>, is_winner: bool, context: &Context<'_>) -> OutfitDistribution {
    let entry = candidate.entry;
    let mask = candidate.mask;

    OutfitDistribution {
        file_name: candidate.file.file_name().to_string(),
        relative_path: candidate.file.relative_path().to_string(),
        dialect: candidate.file.dialect(),
        line_number: entry.line_number,
        target: entry.target.clone(),
        target_label: entry.target.label(context.forms),
        is_winner,
        chance: entry.chance,
        targeting_description: candidate.description.clone(),
        targets_all_npcs: mask.is_empty(),
        uses_npc_targeting: mask.contains(FilterMask::NPC),
        uses_keyword_targeting: mask.contains(FilterMask::KEYWORD),
        uses_faction_targeting: mask.contains(FilterMask::FACTION),
        uses_race_targeting: mask.contains(FilterMask::RACE),
        uses_class_targeting: mask.contains(FilterMask::CLASS),
        uses_trait_targeting: mask.contains(FilterMask::TRAITS),
        uses_level_targeting: mask.contains(FilterMask::LEVEL),
    }
}
