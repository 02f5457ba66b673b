//! SPID `_DISTR.ini` grammar.
//!
//! ```text
//! Outfit  = Target | StringFilters | FormFilters | LevelFilters | Traits | Count | Chance
//! Keyword = Name   | ...
//! ```
//!
//! Trailing sections may be omitted; `NONE` leaves a section empty. Only the
//! `Outfit` and `Keyword` keys produce entries. Other distribution types
//! (`Spell`, `Perk`, `Item`, ...) are valid lines with nothing to resolve here.

use super::{
    DialectGrammar, LineError, RawFilters, is_none_token, outfit_target, push_by_kind, resolve_keyword_name,
    split_exclusion, split_list,
};
use crate::distribution::{DistributionEntry, DistributionTarget, FormFilter, KeywordFilter, LevelRange};
use crate::form::{FormIndex, FormKey, FormKind, Reference};

const TARGET: usize = 0;
const STRING_FILTERS: usize = 1;
const FORM_FILTERS: usize = 2;
const LEVEL_FILTERS: usize = 3;
const TRAITS: usize = 4;
const CHANCE: usize = 6;

pub(crate) struct SpidGrammar;

impl DialectGrammar for SpidGrammar {
    fn parse_line(
        &self,
        text: &str,
        line_number: usize,
        forms: &FormIndex,
    ) -> Result<Vec<DistributionEntry>, LineError> {
        let (key, value) = text.split_once('=').ok_or(LineError::NotKeyValue)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(LineError::NotKeyValue);
        }

        let is_outfit = key.eq_ignore_ascii_case("outfit");
        if !is_outfit && !key.eq_ignore_ascii_case("keyword") {
            return Ok(Vec::new());
        }

        let sections: Vec<&str> = value.split('|').map(str::trim).collect();
        let section = |idx: usize| sections.get(idx).copied().filter(|s| !is_none_token(s));

        let target_text = section(TARGET).ok_or(LineError::MissingTarget)?;
        let target = if is_outfit { outfit_target(target_text, forms)? } else { keyword_target(target_text, forms)? };

        let mut entry = DistributionEntry::new(target, line_number);
        let mut raw = RawFilters::default();

        if let Some(text) = section(STRING_FILTERS) {
            string_filters(text, &mut entry, &mut raw, forms);
        }
        if let Some(text) = section(FORM_FILTERS) {
            form_filters(text, &mut entry, &mut raw, forms);
        }
        if let Some(text) = section(LEVEL_FILTERS) {
            level_filters(text, &mut entry, &mut raw)?;
        }
        if let Some(text) = section(TRAITS) {
            traits(text, &mut entry, &mut raw)?;
        }
        if let Some(text) = section(CHANCE) {
            entry.chance = chance(text)?;
        }

        raw.apply(&mut entry);
        Ok(vec![entry])
    }
}

/// Keyword targets are names; SPID creates the keyword if it does not exist.
fn keyword_target(text: &str, forms: &FormIndex) -> Result<DistributionTarget, LineError> {
    if FormKey::looks_like(text) {
        return resolve_keyword_name(text, forms)
            .map(DistributionTarget::Keyword)
            .ok_or_else(|| LineError::UnresolvedTarget(text.to_string()));
    }
    Ok(DistributionTarget::Keyword(text.to_string()))
}

/// String filters match by editor id. Only keywords and actors map onto the
/// model; `+` combinations and `*` wildcards are kept raw.
fn string_filters(text: &str, entry: &mut DistributionEntry, raw: &mut RawFilters, forms: &FormIndex) {
    for token in split_list(text) {
        if token.contains('+') || token.contains('*') {
            raw.string(token);
            continue;
        }

        let (name, excluded) = split_exclusion(token);
        match forms.by_editor_id(name) {
            Some(record) if record.kind == FormKind::Keyword => {
                let name = record.editor_id.clone().unwrap_or_else(|| name.to_string());
                entry.keyword_filters.push(KeywordFilter { name, excluded });
            }
            Some(record) if record.kind == FormKind::Npc => {
                entry.npc_filters.push(FormFilter { form_key: record.form_key.clone(), excluded });
            }
            _ => raw.string(token),
        }
    }
}

fn form_filters(text: &str, entry: &mut DistributionEntry, raw: &mut RawFilters, forms: &FormIndex) {
    for token in split_list(text) {
        if token.contains('+') {
            raw.form(token);
            continue;
        }

        let (reference, excluded) = split_exclusion(token);
        let placed = match forms.resolve(reference) {
            Reference::Known(record) => {
                push_by_kind(entry, record.kind, record.form_key.clone(), record.editor_id.as_deref(), excluded)
            }
            Reference::UnknownKey | Reference::Unresolved => false,
        };
        if !placed {
            raw.form(token);
        }
    }
}

/// `min/max`, `min`, or `/max` over actor level. Skill filters such as
/// `14(50/100)` cannot be evaluated against the snapshot and stay raw.
fn level_filters(text: &str, entry: &mut DistributionEntry, raw: &mut RawFilters) -> Result<(), LineError> {
    for token in split_list(text) {
        if regex!(r"^\d+\s*\(\s*\d*\s*(?:/\s*\d*\s*)?\)$").is_match(token) {
            raw.form(token);
            continue;
        }

        let caps = regex!(r"^(\d*)\s*(?:/\s*(\d*))?$")
            .captures(token)
            .ok_or_else(|| LineError::InvalidLevel(token.to_string()))?;
        let bound = |idx: usize| -> Result<Option<u16>, LineError> {
            match caps.get(idx).map(|m| m.as_str()).filter(|s| !s.is_empty()) {
                Some(digits) => digits.parse().map(Some).map_err(|_| LineError::InvalidLevel(token.to_string())),
                None => Ok(None),
            }
        };

        let range = LevelRange { min: bound(1)?, max: bound(2)? };
        if range.min.is_none() && range.max.is_none() {
            return Err(LineError::InvalidLevel(token.to_string()));
        }
        if let (Some(min), Some(max)) = (range.min, range.max) {
            if min > max {
                return Err(LineError::InvalidLevel(token.to_string()));
            }
        }
        entry.level_filters = Some(range);
    }
    Ok(())
}

fn traits(text: &str, entry: &mut DistributionEntry, raw: &mut RawFilters) -> Result<(), LineError> {
    for token in text.split(['/', ',']).map(str::trim).filter(|t| !t.is_empty()) {
        let filters = &mut entry.trait_filters;
        match token.to_ascii_uppercase().as_str() {
            "F" => filters.is_female = Some(true),
            "M" => filters.is_female = Some(false),
            "U" => filters.is_unique = Some(true),
            "-U" => filters.is_unique = Some(false),
            "C" => filters.is_child = Some(true),
            "-C" => filters.is_child = Some(false),
            // summonable, leveled, teammate, dead
            "S" | "-S" | "L" | "-L" | "T" | "-T" | "D" | "-D" => raw.string(token),
            _ => return Err(LineError::InvalidValue { key: "traits".into(), value: token.to_string() }),
        }
    }
    Ok(())
}

/// A chance of 100 is the same as no chance at all.
fn chance(text: &str) -> Result<Option<f32>, LineError> {
    let value: f32 = text.trim().parse().map_err(|_| LineError::InvalidChance(text.to_string()))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(LineError::InvalidChance(text.to_string()));
    }
    Ok(if value >= 100.0 { None } else { Some(value) })
}
