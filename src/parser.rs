//! Rule-file parsing.
//!
//! Both dialects go through the same line loop:
//!
//! ```text
//! content ── split lines ──┬─ blank              -> LineKind::Blank
//!                          ├─ ; # [section]       -> LineKind::Comment
//!                          └─ key = value ── DialectGrammar::parse_line
//!                                              ├─ Ok(entries)  -> LineKind::KeyValue
//!                                              └─ Err(_)       -> LineKind::Comment (malformed)
//! ```
//!
//! Parsing never fails as a whole. A line the grammar rejects is kept as a
//! comment so line statistics stay consistent, logged, and counted on the
//! resulting [`DistributionFile`].
//!
//! Each dialect is a [`DialectGrammar`] strategy selected by the file's
//! [`Dialect`] tag (`spid.rs`, `skypatcher.rs`). Grammars resolve references
//! through the [`FormIndex`] passed in; anything they cannot map onto the
//! canonical model is carried verbatim in the entry's raw filter fields.

#[path = "parser/skypatcher.rs"]
mod skypatcher;
#[path = "parser/spid.rs"]
mod spid;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::distribution::{
    Dialect, DistributionEntry, DistributionFile, DistributionLine, DistributionTarget, FormFilter, KeywordFilter,
    LineKind,
};
use crate::form::{FormIndex, FormKey, FormKind, Reference};

/// Where a rule file came from and how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSource {
    pub full_path: PathBuf,
    /// Path relative to the scanned data root, used for display.
    pub relative_path: String,
    pub dialect: Dialect,
}

impl RuleSource {
    pub fn new(full_path: impl Into<PathBuf>, relative_path: impl Into<String>, dialect: Dialect) -> Self {
        RuleSource { full_path: full_path.into(), relative_path: relative_path.into(), dialect }
    }

    /// A source identified by file name only, for in-memory content.
    pub fn named(file_name: &str, dialect: Dialect) -> Self {
        RuleSource::new(Path::new(file_name), file_name, dialect)
    }
}

/// Why a key-value line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("line has no `key = value` shape")]
    NotKeyValue,
    #[error("missing distribution target")]
    MissingTarget,
    #[error("target '{0}' does not name a loaded record")]
    UnresolvedTarget(String),
    #[error("'{0}' is not a valid chance (expected 0-100)")]
    InvalidChance(String),
    #[error("'{0}' is not a valid level filter")]
    InvalidLevel(String),
    #[error("'{value}' is not a valid value for {key}")]
    InvalidValue { key: String, value: String },
}

/// A dialect-specific line grammar.
pub(crate) trait DialectGrammar {
    /// Parse one trimmed, comment-stripped key-value line. `Ok(vec![])` means
    /// a valid line that distributes something other than outfits/keywords.
    fn parse_line(
        &self,
        text: &str,
        line_number: usize,
        forms: &FormIndex,
    ) -> Result<Vec<DistributionEntry>, LineError>;
}

fn grammar_for(dialect: Dialect) -> &'static dyn DialectGrammar {
    match dialect {
        Dialect::Spid => &spid::SpidGrammar,
        Dialect::SkyPatcher => &skypatcher::SkyPatcherGrammar,
    }
}

/// Parse `content` into a [`DistributionFile`].
pub fn parse(source: &RuleSource, content: &str, forms: &FormIndex) -> DistributionFile {
    let grammar = grammar_for(source.dialect);
    let mut lines = Vec::new();
    let mut entries = Vec::new();
    let mut malformed = 0;

    for (idx, raw) in content.lines().enumerate() {
        let line_number = idx + 1;
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let trimmed = raw.trim();

        let kind = if trimmed.is_empty() {
            LineKind::Blank
        } else if is_comment(trimmed) {
            LineKind::Comment
        } else {
            let body = strip_inline_comment(trimmed);
            let parsed = if body.contains('=') {
                grammar.parse_line(body, line_number, forms)
            } else {
                Err(LineError::NotKeyValue)
            };

            match parsed {
                Ok(mut produced) => {
                    entries.append(&mut produced);
                    LineKind::KeyValue
                }
                Err(err) => {
                    malformed += 1;
                    warn!(file = %source.relative_path, line = line_number, error = %err, "skipping malformed distribution line");
                    LineKind::Comment
                }
            }
        };

        lines.push(DistributionLine { line_number, kind, raw_text: raw.to_string() });
    }

    debug!(
        file = %source.relative_path,
        dialect = source.dialect.as_str(),
        lines = lines.len(),
        entries = entries.len(),
        malformed,
        "parsed distribution file"
    );

    DistributionFile::new(source.full_path.clone(), source.relative_path.clone(), source.dialect, lines, entries, malformed)
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with(';') || trimmed.starts_with('#') || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

fn strip_inline_comment(text: &str) -> &str {
    match text.find(';') {
        Some(pos) => text[..pos].trim_end(),
        None => text,
    }
}

/// `NONE` and the empty string both mean "no filter" in rule files.
pub(crate) fn is_none_token(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text.eq_ignore_ascii_case("none")
}

/// Split a comma list, dropping empty items.
pub(crate) fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|s| !s.is_empty() && !is_none_token(s))
}

/// Strip a leading `-` exclusion marker.
pub(crate) fn split_exclusion(token: &str) -> (&str, bool) {
    match token.strip_prefix('-') {
        Some(rest) => (rest.trim(), true),
        None => (token, false),
    }
}

/// Filter text that could not be mapped onto the canonical model.
#[derive(Debug, Default)]
pub(crate) struct RawFilters {
    strings: Vec<String>,
    forms: Vec<String>,
}

impl RawFilters {
    pub(crate) fn string(&mut self, text: impl Into<String>) {
        self.strings.push(text.into());
    }

    pub(crate) fn form(&mut self, text: impl Into<String>) {
        self.forms.push(text.into());
    }

    pub(crate) fn apply(self, entry: &mut DistributionEntry) {
        if !self.strings.is_empty() {
            entry.raw_string_filters = Some(self.strings.join(","));
        }
        if !self.forms.is_empty() {
            entry.raw_form_filters = Some(self.forms.join(","));
        }
    }
}

/// Resolve a key or editor id to a loaded record of `kind`. Keys of records
/// that are not loaded, and records of another kind, do not resolve.
pub(crate) fn resolve_record(text: &str, kind: FormKind, forms: &FormIndex) -> Option<FormKey> {
    match forms.resolve(text) {
        Reference::Known(record) if record.kind == kind => Some(record.form_key.clone()),
        _ => None,
    }
}

/// Outfit targets must name an outfit. A well-formed key of a record that is
/// not loaded is taken literally; the host validates it at runtime.
pub(crate) fn outfit_target(text: &str, forms: &FormIndex) -> Result<DistributionTarget, LineError> {
    match forms.resolve(text) {
        Reference::Known(record) if matches!(record.kind, FormKind::Outfit | FormKind::Other) => {
            Ok(DistributionTarget::Outfit(record.form_key.clone()))
        }
        Reference::UnknownKey => FormKey::parse(text)
            .map(DistributionTarget::Outfit)
            .ok_or_else(|| LineError::UnresolvedTarget(text.to_string())),
        _ => Err(LineError::UnresolvedTarget(text.to_string())),
    }
}

/// Resolve a keyword reference to its editor id. Keywords are matched by
/// name, so a key is only useful when the index knows its editor id.
pub(crate) fn resolve_keyword_name(text: &str, forms: &FormIndex) -> Option<String> {
    match forms.resolve(text) {
        Reference::Known(record) if matches!(record.kind, FormKind::Keyword | FormKind::Other) => {
            record.editor_id.clone()
        }
        _ => None,
    }
}

/// Place a resolved record into the filter category its kind implies.
/// Returns `false` when the kind has no category (or an excluded class).
pub(crate) fn push_by_kind(
    entry: &mut DistributionEntry,
    kind: FormKind,
    key: FormKey,
    editor_id: Option<&str>,
    excluded: bool,
) -> bool {
    let filter = FormFilter { form_key: key.clone(), excluded };
    match kind {
        FormKind::Npc => entry.npc_filters.push(filter),
        FormKind::Faction => entry.faction_filters.push(filter),
        FormKind::Race => entry.race_filters.push(filter),
        FormKind::Class if !excluded => entry.class_form_keys.push(key),
        FormKind::Keyword => match editor_id {
            Some(name) => entry.keyword_filters.push(KeywordFilter { name: name.to_string(), excluded }),
            None => return false,
        },
        FormKind::Class | FormKind::Outfit | FormKind::Other => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormRecord;

    fn forms() -> FormIndex {
        FormIndex::from_records([FormRecord {
            form_key: "Skyrim.esm|28848".parse().unwrap(),
            editor_id: Some("GuardFaction".into()),
            kind: FormKind::Faction,
        }])
    }

    #[test]
    fn classifies_every_line() {
        let content = "; header\n\n[General]\nOutfit = 0x800~Mod.esp\nthis is not a rule\n# note\n";
        let file = parse(&RuleSource::named("A_DISTR.ini", Dialect::Spid), content, &forms());

        let kinds: Vec<LineKind> = file.lines().iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LineKind::Comment,
                LineKind::Blank,
                LineKind::Comment,
                LineKind::KeyValue,
                LineKind::Comment,
                LineKind::Comment
            ]
        );
        assert_eq!(file.malformed_line_count(), 1);
        assert_eq!(file.entries().len(), 1);
        assert_eq!(file.lines()[3].raw_text, "Outfit = 0x800~Mod.esp");
    }

    #[test]
    fn malformed_line_does_not_abort_the_file() {
        let content = "Outfit = 0x800~Mod.esp|NONE|NONE|NONE|NONE|NONE|250\nOutfit = 0x801~Mod.esp\n";
        let file = parse(&RuleSource::named("A_DISTR.ini", Dialect::Spid), content, &forms());

        assert_eq!(file.malformed_line_count(), 1);
        assert_eq!(file.lines()[0].kind, LineKind::Comment);
        assert_eq!(file.entries().len(), 1);
        assert_eq!(file.entries()[0].line_number, 2);
    }

    #[test]
    fn inline_comments_are_stripped_but_raw_text_kept() {
        let content = "Outfit = 0x800~Mod.esp|NONE|GuardFaction ; guards only\n";
        let file = parse(&RuleSource::named("A_DISTR.ini", Dialect::Spid), content, &forms());

        assert_eq!(file.entries()[0].faction_filters.len(), 1);
        assert!(file.lines()[0].raw_text.ends_with("guards only"));
    }

    #[test]
    fn strategy_follows_dialect_tag() {
        let content = "filterByFactions=GuardFaction:outfitDefault=Mod.esp|800\n";
        let patcher = parse(&RuleSource::named("npc.ini", Dialect::SkyPatcher), content, &forms());
        assert_eq!(patcher.entries().len(), 1);

        // The same text is not a SPID target.
        let spid = parse(&RuleSource::named("A_DISTR.ini", Dialect::Spid), content, &forms());
        assert!(spid.entries().is_empty());
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let content = "\u{feff}Outfit = 0x800~Mod.esp\n";
        let file = parse(&RuleSource::named("A_DISTR.ini", Dialect::Spid), content, &forms());
        assert_eq!(file.entries().len(), 1);
        assert_eq!(file.lines()[0].raw_text, "Outfit = 0x800~Mod.esp");
    }
}
