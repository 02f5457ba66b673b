//! SkyPatcher npc grammar.
//!
//! ```text
//! filterByFactionsOr=Skyrim.esm|28848,GuardFaction:filterByGender=female:outfitDefault=Skyrim.esm|D3E05
//! ```
//!
//! A line is a `:`-separated list of `key=value` pairs; list values are
//! comma-separated and records are spelled `Plugin.esp|ID` or by editor id.
//! `outfitDefault` yields one outfit entry and `keywordsToAdd` one keyword
//! entry per listed keyword, all sharing the line's filters.
//!
//! The plain `filterByFactions`/`filterByKeywords` keys require *all* listed
//! values. The canonical model ORs within a category, so those keys are only
//! representable with a single value; longer lists are kept raw.
//!
//! Filter values must name a loaded record of the kind their key expects.
//! Keys of records that are not loaded, and records of another kind, are kept
//! raw as well.

use super::{DialectGrammar, LineError, RawFilters, outfit_target, resolve_keyword_name, resolve_record, split_list};
use crate::distribution::{DistributionEntry, DistributionTarget, FormFilter, KeywordFilter, LevelRange};
use crate::form::{FormIndex, FormKey, FormKind};

pub(crate) struct SkyPatcherGrammar;

/// Which filter list a record-valued key feeds.
#[derive(Clone, Copy)]
enum FormSlot {
    Npc,
    Faction,
    Race,
}

impl FormSlot {
    fn kind(self) -> FormKind {
        match self {
            FormSlot::Npc => FormKind::Npc,
            FormSlot::Faction => FormKind::Faction,
            FormSlot::Race => FormKind::Race,
        }
    }
}

impl DialectGrammar for SkyPatcherGrammar {
    fn parse_line(
        &self,
        text: &str,
        line_number: usize,
        forms: &FormIndex,
    ) -> Result<Vec<DistributionEntry>, LineError> {
        let mut filters = DistributionEntry::new(DistributionTarget::Keyword(String::new()), line_number);
        let mut raw = RawFilters::default();
        let mut targets = Vec::new();

        for segment in text.split(':').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or(LineError::NotKeyValue)?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() {
                return Err(LineError::NotKeyValue);
            }

            match key.to_ascii_lowercase().as_str() {
                "filterbynpcs" => records(value, FormSlot::Npc, false, &mut filters, &mut raw, forms),
                "filterbynpcsexcluded" => records(value, FormSlot::Npc, true, &mut filters, &mut raw, forms),
                "filterbyfactions" if split_list(value).count() > 1 => raw.form(segment),
                "filterbyfactions" | "filterbyfactionsor" => {
                    records(value, FormSlot::Faction, false, &mut filters, &mut raw, forms)
                }
                "filterbyfactionsexcluded" => records(value, FormSlot::Faction, true, &mut filters, &mut raw, forms),
                "filterbyraces" => records(value, FormSlot::Race, false, &mut filters, &mut raw, forms),
                "filterbyracesexcluded" => records(value, FormSlot::Race, true, &mut filters, &mut raw, forms),
                "filterbykeywords" if split_list(value).count() > 1 => raw.string(segment),
                "filterbykeywords" | "filterbykeywordsor" => keywords(value, false, &mut filters, &mut raw, forms),
                "filterbykeywordsexcluded" => keywords(value, true, &mut filters, &mut raw, forms),
                "filterbyclass" | "filterbyclasses" => {
                    for token in split_list(value) {
                        match resolve_record(token, FormKind::Class, forms) {
                            Some(key) => filters.class_form_keys.push(key),
                            None => raw.form(token),
                        }
                    }
                }
                "filterbygender" => {
                    filters.trait_filters.is_female = Some(match value.to_ascii_lowercase().as_str() {
                        "female" => true,
                        "male" => false,
                        _ => return Err(invalid(key, value)),
                    });
                }
                "filterbyminlevel" => {
                    let range = filters.level_filters.get_or_insert_with(LevelRange::default);
                    range.min = Some(value.parse().map_err(|_| LineError::InvalidLevel(value.to_string()))?);
                }
                "filterbymaxlevel" => {
                    let range = filters.level_filters.get_or_insert_with(LevelRange::default);
                    range.max = Some(value.parse().map_err(|_| LineError::InvalidLevel(value.to_string()))?);
                }
                "outfitdefault" => {
                    targets.push(outfit_target(value, forms)?);
                }
                "keywordstoadd" => {
                    for token in split_list(value) {
                        let name = if FormKey::looks_like(token) {
                            resolve_keyword_name(token, forms)
                                .ok_or_else(|| LineError::UnresolvedTarget(token.to_string()))?
                        } else {
                            token.to_string()
                        };
                        targets.push(DistributionTarget::Keyword(name));
                    }
                }
                other if other.starts_with("filterby") => raw.string(segment),
                _ => {}
            }
        }

        if let Some(LevelRange { min: Some(min), max: Some(max) }) = filters.level_filters {
            if min > max {
                return Err(LineError::InvalidLevel(format!("{min}/{max}")));
            }
        }

        raw.apply(&mut filters);
        Ok(targets.into_iter().map(|target| DistributionEntry { target, ..filters.clone() }).collect())
    }
}

fn invalid(key: &str, value: &str) -> LineError {
    LineError::InvalidValue { key: key.to_string(), value: value.to_string() }
}

fn records(
    value: &str,
    slot: FormSlot,
    excluded: bool,
    entry: &mut DistributionEntry,
    raw: &mut RawFilters,
    forms: &FormIndex,
) {
    for token in split_list(value) {
        let Some(form_key) = resolve_record(token, slot.kind(), forms) else {
            raw.form(token);
            continue;
        };
        let filter = FormFilter { form_key, excluded };
        match slot {
            FormSlot::Npc => entry.npc_filters.push(filter),
            FormSlot::Faction => entry.faction_filters.push(filter),
            FormSlot::Race => entry.race_filters.push(filter),
        }
    }
}

fn keywords(value: &str, excluded: bool, entry: &mut DistributionEntry, raw: &mut RawFilters, forms: &FormIndex) {
    for token in split_list(value) {
        match resolve_keyword_name(token, forms) {
            Some(name) => entry.keyword_filters.push(KeywordFilter { name, excluded }),
            None => raw.string(token),
        }
    }
}
