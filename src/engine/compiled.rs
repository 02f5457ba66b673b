//! Entry compilation and indexing.
//!
//! This module holds the *static* side of a pass: everything derived from the
//! parsed files before any actor is looked at.
//!
//! 1. **Flatten** every file's entries into one list in load order
//!    (file order, then line order). An [`EntryId`] is an index into that list,
//!    so comparing ids compares precedence.
//! 2. **Set aside** entries with raw filters. They are reported for manual
//!    review and never matched.
//! 3. **Describe** each entry once: its [`FilterMask`] and a human-readable
//!    targeting description, instead of recomputing both per actor.
//! 4. **Index** entries per target category. Entries whose npc filters contain
//!    an inclusion can only ever match those actors, so they are filed under
//!    each included actor key (`pinned`); everything else is `open` and has to
//!    be tried against every actor.
//!
//! ## Invariants
//!
//! - `EntryId` order equals load order. Candidate lists handed out by
//!   [`CategoryIndex::candidates`] are sorted ascending and duplicate-free.
//! - `CompiledDistributions::entries` only contains resolvable entries.

use std::collections::HashMap;

use crate::distribution::{DistributionEntry, DistributionFile, FormFilter, KeywordFilter, TargetCategory};
use crate::form::{FormIndex, FormKey};

/// Entry identifier (index into `CompiledDistributions::entries`).
pub type EntryId = usize;

bitflags::bitflags! {
    /// Which filter categories an entry constrains.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FilterMask: u8 {
        const NPC     = 1 << 0;
        const FACTION = 1 << 1;
        const RACE    = 1 << 2;
        const KEYWORD = 1 << 3;
        const CLASS   = 1 << 4;
        const TRAITS  = 1 << 5;
        const LEVEL   = 1 << 6;
    }
}

impl FilterMask {
    pub fn of(entry: &DistributionEntry) -> Self {
        let mut mask = FilterMask::empty();
        mask.set(FilterMask::NPC, !entry.npc_filters.is_empty());
        mask.set(FilterMask::FACTION, !entry.faction_filters.is_empty());
        mask.set(FilterMask::RACE, !entry.race_filters.is_empty());
        mask.set(FilterMask::KEYWORD, !entry.keyword_filters.is_empty());
        mask.set(FilterMask::CLASS, !entry.class_form_keys.is_empty());
        mask.set(FilterMask::TRAITS, !entry.trait_filters.is_empty());
        mask.set(FilterMask::LEVEL, entry.level_filters.is_some());
        mask
    }
}

/// One entry together with its owning file and precomputed metadata.
#[derive(Debug, Clone)]
pub struct CompiledEntry<'a> {
    pub file: &'a DistributionFile,
    pub entry: &'a DistributionEntry,
    pub mask: FilterMask,
    pub description: String,
}

/// Per-category candidate index.
#[derive(Default, Debug)]
pub struct CategoryIndex {
    pub open: Vec<EntryId>,
    pub pinned: HashMap<FormKey, Vec<EntryId>>,
}

impl CategoryIndex {
    /// Entries that could match the actor `npc`, in load order.
    pub fn candidates(&self, npc: &FormKey) -> Vec<EntryId> {
        let Some(pinned) = self.pinned.get(npc) else {
            return self.open.clone();
        };

        let mut ids = Vec::with_capacity(self.open.len() + pinned.len());
        let (mut i, mut j) = (0, 0);
        while i < self.open.len() && j < pinned.len() {
            if self.open[i] <= pinned[j] {
                ids.push(self.open[i]);
                i += 1;
            } else {
                ids.push(pinned[j]);
                j += 1;
            }
        }
        ids.extend_from_slice(&self.open[i..]);
        ids.extend_from_slice(&pinned[j..]);
        ids
    }

    fn file(&mut self, id: EntryId, entry: &DistributionEntry) {
        let mut included = entry.npc_filters.iter().filter(|f| !f.excluded).map(|f| &f.form_key).peekable();
        if included.peek().is_none() {
            self.open.push(id);
            return;
        }
        for key in included {
            let slot = self.pinned.entry(key.clone()).or_default();
            // An entry may list the same actor twice.
            if slot.last() != Some(&id) {
                slot.push(id);
            }
        }
    }
}

/// Flattened, indexed view over an ordered file list.
#[derive(Debug)]
pub struct CompiledDistributions<'a> {
    pub entries: Vec<CompiledEntry<'a>>,
    pub unresolved: Vec<CompiledEntry<'a>>,
    outfit: CategoryIndex,
    keyword: CategoryIndex,
}

impl<'a> CompiledDistributions<'a> {
    /// Compile `files`, which must already be in load order.
    pub fn new(files: &'a [DistributionFile], forms: &FormIndex) -> Self {
        let mut entries = Vec::new();
        let mut unresolved = Vec::new();
        let mut outfit = CategoryIndex::default();
        let mut keyword = CategoryIndex::default();

        for file in files {
            for entry in file.entries() {
                let compiled = CompiledEntry {
                    file,
                    entry,
                    mask: FilterMask::of(entry),
                    description: describe(entry, forms),
                };

                if entry.is_unresolved() {
                    unresolved.push(compiled);
                    continue;
                }

                let id = entries.len();
                match entry.target.category() {
                    TargetCategory::Outfit => outfit.file(id, entry),
                    TargetCategory::Keyword => keyword.file(id, entry),
                }
                entries.push(compiled);
            }
        }

        CompiledDistributions { entries, unresolved, outfit, keyword }
    }

    pub fn index(&self, category: TargetCategory) -> &CategoryIndex {
        match category {
            TargetCategory::Outfit => &self.outfit,
            TargetCategory::Keyword => &self.keyword,
        }
    }

    pub fn get(&self, id: EntryId) -> &CompiledEntry<'a> {
        &self.entries[id]
    }
}

/// Human-readable summary of an entry's filters.
///
/// ```text
/// Factions: GuardFaction | Races: not NordRace | Traits: female | Level: 5-20
/// ```
pub fn describe(entry: &DistributionEntry, forms: &FormIndex) -> String {
    let mut parts = Vec::new();

    let forms_part = |label: &str, filters: &[FormFilter]| -> Option<String> {
        if filters.is_empty() {
            return None;
        }
        let names: Vec<String> = filters
            .iter()
            .map(|f| {
                let name = forms.display_name(&f.form_key);
                if f.excluded { format!("not {name}") } else { name }
            })
            .collect();
        Some(format!("{label}: {}", names.join(", ")))
    };

    parts.extend(forms_part("NPCs", &entry.npc_filters));
    parts.extend(forms_part("Factions", &entry.faction_filters));
    parts.extend(forms_part("Races", &entry.race_filters));

    if !entry.keyword_filters.is_empty() {
        let names: Vec<String> = entry
            .keyword_filters
            .iter()
            .map(|KeywordFilter { name, excluded }| if *excluded { format!("not {name}") } else { name.clone() })
            .collect();
        parts.push(format!("Keywords: {}", names.join(", ")));
    }

    if !entry.class_form_keys.is_empty() {
        let names: Vec<String> = entry.class_form_keys.iter().map(|k| forms.display_name(k)).collect();
        parts.push(format!("Classes: {}", names.join(", ")));
    }

    let traits = &entry.trait_filters;
    if !traits.is_empty() {
        let mut words = Vec::new();
        if let Some(female) = traits.is_female {
            words.push(if female { "female" } else { "male" });
        }
        if let Some(unique) = traits.is_unique {
            words.push(if unique { "unique" } else { "not unique" });
        }
        if let Some(child) = traits.is_child {
            words.push(if child { "child" } else { "adult" });
        }
        parts.push(format!("Traits: {}", words.join(", ")));
    }

    if let Some(levels) = &entry.level_filters {
        parts.push(format!("Level: {levels}"));
    }

    if let Some(raw) = &entry.raw_string_filters {
        parts.push(format!("Unresolved: {raw}"));
    }
    if let Some(raw) = &entry.raw_form_filters {
        parts.push(format!("Unresolved forms: {raw}"));
    }

    if parts.is_empty() { "All NPCs".to_string() } else { parts.join(" | ") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{Dialect, DistributionTarget, LevelRange};
    use std::path::PathBuf;

    fn key(text: &str) -> FormKey {
        text.parse().unwrap()
    }

    fn file(name: &str, entries: Vec<DistributionEntry>) -> DistributionFile {
        DistributionFile::new(PathBuf::from(name), name.to_string(), Dialect::Spid, Vec::new(), entries, 0)
    }

    fn outfit(line: usize) -> DistributionEntry {
        DistributionEntry::new(DistributionTarget::Outfit(key("Mod.esp|800")), line)
    }

    #[test]
    fn ids_follow_load_order_and_skip_unresolved() {
        let mut raw = outfit(2);
        raw.raw_form_filters = Some("Missing".into());
        let files = vec![
            file("a.ini", vec![outfit(1), raw]),
            file("b.ini", vec![DistributionEntry::new(DistributionTarget::Keyword("Kw".into()), 1)]),
        ];

        let compiled = CompiledDistributions::new(&files, &FormIndex::new());

        assert_eq!(compiled.entries.len(), 2);
        assert_eq!(compiled.unresolved.len(), 1);
        assert_eq!(compiled.get(0).file.file_name(), "a.ini");
        assert_eq!(compiled.get(1).file.file_name(), "b.ini");
        assert_eq!(compiled.index(TargetCategory::Outfit).open, vec![0]);
        assert_eq!(compiled.index(TargetCategory::Keyword).open, vec![1]);
    }

    #[test]
    fn pinned_entries_merge_in_load_order() {
        let bob = key("Skyrim.esm|B0B");
        let mut pinned_a = outfit(2);
        pinned_a.npc_filters = vec![FormFilter::include(bob.clone()), FormFilter::include(bob.clone())];
        let mut excluded_only = outfit(3);
        excluded_only.npc_filters = vec![FormFilter::exclude(bob.clone())];
        let mut pinned_b = outfit(5);
        pinned_b.npc_filters = vec![FormFilter::include(bob.clone())];

        let files = vec![file("a.ini", vec![outfit(1), pinned_a, excluded_only, outfit(4), pinned_b])];
        let compiled = CompiledDistributions::new(&files, &FormIndex::new());
        let index = compiled.index(TargetCategory::Outfit);

        assert_eq!(index.open, vec![0, 2, 3]);
        assert_eq!(index.candidates(&bob), vec![0, 1, 2, 3, 4]);
        assert_eq!(index.candidates(&key("Skyrim.esm|A11CE")), vec![0, 2, 3]);
    }

    #[test]
    fn mask_and_description() {
        let mut entry = outfit(1);
        entry.faction_filters = vec![FormFilter::include(key("Skyrim.esm|28848"))];
        entry.keyword_filters = vec![KeywordFilter::exclude("ActorTypeCreature")];
        entry.trait_filters.is_female = Some(true);
        entry.level_filters = Some(LevelRange { min: Some(5), max: Some(20) });

        let mask = FilterMask::of(&entry);
        assert_eq!(mask, FilterMask::FACTION | FilterMask::KEYWORD | FilterMask::TRAITS | FilterMask::LEVEL);

        let forms = FormIndex::from_records([crate::form::FormRecord {
            form_key: key("Skyrim.esm|28848"),
            editor_id: Some("GuardFaction".into()),
            kind: crate::form::FormKind::Faction,
        }]);
        assert_eq!(
            describe(&entry, &forms),
            "Factions: GuardFaction | Keywords: not ActorTypeCreature | Traits: female | Level: 5-20"
        );
        assert_eq!(describe(&outfit(1), &forms), "All NPCs");
    }
}
