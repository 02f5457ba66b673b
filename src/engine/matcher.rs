//! Entry-vs-actor filter matching.
//!
//! `matches` is a pure predicate. Categories are evaluated in a fixed order
//! and the first failing one short-circuits:
//!
//! ```text
//! npc ─▶ faction ─▶ race ─▶ keyword ─▶ class ─▶ traits ─▶ level ─▶ match
//! ```
//!
//! Within a category values are OR'd, with exclusions taking precedence: the
//! actor fails if it holds any excluded value, and when the category lists
//! inclusions it must hold at least one. Categories are AND'd. An entry with
//! nothing to check matches everyone. Entries carrying raw filters never match.

use crate::distribution::{DistributionEntry, FormFilter, KeywordFilter};
use crate::form::FormKey;
use crate::npc::NpcFilterData;

/// Whether `entry` applies to `npc`.
pub fn matches(entry: &DistributionEntry, npc: &NpcFilterData) -> bool {
    if entry.is_unresolved() {
        return false;
    }

    form_category(&entry.npc_filters, |key| *key == npc.form_key)
        && form_category(&entry.faction_filters, |key| npc.factions.contains(key))
        && form_category(&entry.race_filters, |key| npc.race.as_ref() == Some(key))
        && keyword_category(&entry.keyword_filters, npc)
        && class_category(&entry.class_form_keys, npc)
        && traits(entry, npc)
        && entry.level_filters.is_none_or(|range| range.contains(npc.level))
}

fn form_category(filters: &[FormFilter], holds: impl Fn(&FormKey) -> bool) -> bool {
    let mut wants_inclusion = false;
    let mut included = false;

    for filter in filters {
        let held = holds(&filter.form_key);
        if filter.excluded {
            if held {
                return false;
            }
        } else {
            wants_inclusion = true;
            included |= held;
        }
    }

    !wants_inclusion || included
}

fn keyword_category(filters: &[KeywordFilter], npc: &NpcFilterData) -> bool {
    let mut wants_inclusion = false;
    let mut included = false;

    for filter in filters {
        let held = npc.has_keyword(&filter.name);
        if filter.excluded {
            if held {
                return false;
            }
        } else {
            wants_inclusion = true;
            included |= held;
        }
    }

    !wants_inclusion || included
}

/// Classes are inclusion-only.
fn class_category(classes: &[FormKey], npc: &NpcFilterData) -> bool {
    classes.is_empty() || npc.class.as_ref().is_some_and(|class| classes.contains(class))
}

fn traits(entry: &DistributionEntry, npc: &NpcFilterData) -> bool {
    let t = &entry.trait_filters;
    t.is_female.is_none_or(|v| v == npc.is_female)
        && t.is_unique.is_none_or(|v| v == npc.is_unique)
        && t.is_child.is_none_or(|v| v == npc.is_child)
}
