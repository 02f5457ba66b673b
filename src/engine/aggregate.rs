//! Per-target statistics over an assignment table.
//!
//! Counts are of *distinct* actors: an actor reached by two entries that
//! assign the same target is counted once for that target. Both winners and
//! overridden contributors count.
//!
//! A target is *unchanged* when every actor it wins for already had it
//! (outfit equal to the actor's default outfit, or keyword already carried).
//! A target that never wins anywhere is unchanged too: it has no effect on the
//! final state.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::assignment::{AssignmentStats, NpcOutfitAssignment};
use crate::distribution::DistributionTarget;
use crate::form::FormKey;
use crate::npc::NpcFilterData;

/// Build [`AssignmentStats`] for `assignments`, looking actors up in `npcs`.
///
/// An assignment whose actor is missing from `npcs` cannot be compared to a
/// default, so any win it holds counts as a change.
pub fn aggregate(assignments: &[NpcOutfitAssignment], npcs: &[NpcFilterData]) -> AssignmentStats {
    let by_key: HashMap<&FormKey, &NpcFilterData> = npcs.iter().map(|npc| (&npc.form_key, npc)).collect();

    let mut actors: BTreeMap<&DistributionTarget, HashSet<&FormKey>> = BTreeMap::new();
    let mut changed: HashSet<&DistributionTarget> = HashSet::new();

    for assignment in assignments {
        let npc = by_key.get(&assignment.npc).copied();
        for distribution in &assignment.distributions {
            actors.entry(&distribution.target).or_default().insert(&assignment.npc);
            if distribution.is_winner && !already_has(npc, &distribution.target) {
                changed.insert(&distribution.target);
            }
        }
    }

    let per_target_actor_counts: BTreeMap<DistributionTarget, usize> =
        actors.iter().map(|(target, set)| ((*target).clone(), set.len())).collect();
    let unchanged_targets: BTreeSet<DistributionTarget> =
        actors.keys().filter(|target| !changed.contains(*target)).map(|target| (*target).clone()).collect();

    AssignmentStats { per_target_actor_counts, unchanged_targets }
}

fn already_has(npc: Option<&NpcFilterData>, target: &DistributionTarget) -> bool {
    let Some(npc) = npc else {
        return false;
    };
    match target {
        DistributionTarget::Outfit(key) => npc.default_outfit.as_ref() == Some(key),
        DistributionTarget::Keyword(name) => npc.has_keyword(name),
    }
}
