//! Resolution output records.
//!
//! These are rebuilt from scratch on every pass and never mutated afterwards.
//! Interactive selection state belongs to the consumer, keyed by npc.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::distribution::{Dialect, DistributionTarget, TargetCategory};
use crate::form::FormKey;

/// One `(entry, actor)` match, ranked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutfitDistribution {
    pub file_name: String,
    pub relative_path: String,
    pub dialect: Dialect,
    pub line_number: usize,
    pub target: DistributionTarget,
    /// Editor id of the target where known, for display.
    pub target_label: String,
    pub is_winner: bool,
    /// Display only; the preview never rolls it.
    pub chance: Option<f32>,
    pub targeting_description: String,
    pub targets_all_npcs: bool,
    pub uses_npc_targeting: bool,
    pub uses_keyword_targeting: bool,
    pub uses_faction_targeting: bool,
    pub uses_race_targeting: bool,
    pub uses_class_targeting: bool,
    pub uses_trait_targeting: bool,
    pub uses_level_targeting: bool,
}

/// Everything that applies to one actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NpcOutfitAssignment {
    pub npc: FormKey,
    pub editor_id: Option<String>,
    pub name: Option<String>,
    /// Winning outfit; `None` keeps the actor's default.
    pub final_outfit: Option<FormKey>,
    pub final_outfit_editor_id: Option<String>,
    /// Winning keyword distribution, if any.
    pub final_keyword: Option<String>,
    /// Outfit distributions first, then keyword distributions, each in load order.
    pub distributions: Vec<OutfitDistribution>,
    /// More than one entry matched within a target category.
    pub has_conflict: bool,
}

impl NpcOutfitAssignment {
    pub fn winner(&self, category: TargetCategory) -> Option<&OutfitDistribution> {
        self.distributions.iter().find(|d| d.is_winner && d.target.category() == category)
    }

    pub fn distributions_for(&self, category: TargetCategory) -> impl Iterator<Item = &OutfitDistribution> {
        self.distributions.iter().filter(move |d| d.target.category() == category)
    }

    pub fn label(&self) -> String {
        self.editor_id.clone().unwrap_or_else(|| self.npc.to_string())
    }
}

/// Entry held back from automatic matching because of raw filters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedDistribution {
    pub file_name: String,
    pub line_number: usize,
    pub target: DistributionTarget,
    pub raw_string_filters: Option<String>,
    pub raw_form_filters: Option<String>,
}

/// Per-target statistics over an assignment table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentStats {
    /// Distinct actors touched by each target, as winner or contributor.
    #[serde(serialize_with = "serialize_counts")]
    pub per_target_actor_counts: BTreeMap<DistributionTarget, usize>,
    /// Targets no distribution actually changed relative to actor defaults.
    pub unchanged_targets: BTreeSet<DistributionTarget>,
}

impl AssignmentStats {
    pub fn actor_count(&self, target: &DistributionTarget) -> usize {
        self.per_target_actor_counts.get(target).copied().unwrap_or(0)
    }

    pub fn is_unchanged(&self, target: &DistributionTarget) -> bool {
        self.unchanged_targets.contains(target)
    }

    /// Targets that some distribution actually changed.
    pub fn changed_targets(&self) -> impl Iterator<Item = &DistributionTarget> {
        self.per_target_actor_counts.keys().filter(|t| !self.unchanged_targets.contains(*t))
    }
}

/// JSON object keys must be strings, so counts go out as a list of pairs.
fn serialize_counts<S: serde::Serializer>(
    counts: &BTreeMap<DistributionTarget, usize>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct TargetCount<'a> {
        target: &'a DistributionTarget,
        actors: usize,
    }

    serializer.collect_seq(counts.iter().map(|(target, &actors)| TargetCount { target, actors }))
}
