//! Canonical distribution model shared by both rule dialects.
//!
//! Whatever the source syntax, a parsed rule ends up as a
//! [`DistributionEntry`]: one target plus inclusion/exclusion filters over
//! actor attributes and an optional chance. Files keep their line-level
//! classification alongside the entries so statistics can be reported without
//! re-reading the source.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::form::{FormIndex, FormKey};

/// Textual rule-file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// Spell Perk Item Distributor `_DISTR.ini` files.
    Spid,
    /// SkyPatcher npc `.ini` files.
    SkyPatcher,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Spid => "SPID",
            Dialect::SkyPatcher => "SkyPatcher",
        }
    }

    /// SkyPatcher has no chance field.
    pub fn supports_chance(&self) -> bool {
        matches!(self, Dialect::Spid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineKind {
    Comment,
    KeyValue,
    Blank,
}

/// One source line, kept for statistics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionLine {
    /// 1-based.
    pub line_number: usize,
    pub kind: LineKind,
    pub raw_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetCategory {
    Outfit,
    Keyword,
}

impl TargetCategory {
    pub const ALL: [TargetCategory; 2] = [TargetCategory::Outfit, TargetCategory::Keyword];
}

/// What a rule assigns.
///
/// Keyword names compare ASCII-case-insensitively, as the host does, so
/// `GuardTag` and `guardtag` are the same target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DistributionTarget {
    Outfit(FormKey),
    Keyword(String),
}

impl DistributionTarget {
    pub fn category(&self) -> TargetCategory {
        match self {
            DistributionTarget::Outfit(_) => TargetCategory::Outfit,
            DistributionTarget::Keyword(_) => TargetCategory::Keyword,
        }
    }

    pub fn as_outfit(&self) -> Option<&FormKey> {
        match self {
            DistributionTarget::Outfit(key) => Some(key),
            DistributionTarget::Keyword(_) => None,
        }
    }

    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            DistributionTarget::Keyword(name) => Some(name),
            DistributionTarget::Outfit(_) => None,
        }
    }

    /// Human label, using editor ids where the index knows them.
    pub fn label(&self, forms: &FormIndex) -> String {
        match self {
            DistributionTarget::Outfit(key) => forms.display_name(key),
            DistributionTarget::Keyword(name) => name.clone(),
        }
    }
}

impl PartialEq for DistributionTarget {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DistributionTarget {}

impl Hash for DistributionTarget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.category().hash(state);
        match self {
            DistributionTarget::Outfit(key) => key.hash(state),
            DistributionTarget::Keyword(name) => {
                for b in name.bytes() {
                    state.write_u8(b.to_ascii_lowercase());
                }
            }
        }
    }
}

impl Ord for DistributionTarget {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DistributionTarget::Outfit(a), DistributionTarget::Outfit(b)) => a.cmp(b),
            (DistributionTarget::Keyword(a), DistributionTarget::Keyword(b)) => {
                a.bytes().map(|c| c.to_ascii_lowercase()).cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
            }
            _ => self.category().cmp(&other.category()),
        }
    }
}

impl PartialOrd for DistributionTarget {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DistributionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionTarget::Outfit(key) => write!(f, "outfit {key}"),
            DistributionTarget::Keyword(name) => write!(f, "keyword {name}"),
        }
    }
}

/// A record reference with an exclusion marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormFilter {
    pub form_key: FormKey,
    pub excluded: bool,
}

impl FormFilter {
    pub fn include(form_key: FormKey) -> Self {
        FormFilter { form_key, excluded: false }
    }

    pub fn exclude(form_key: FormKey) -> Self {
        FormFilter { form_key, excluded: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeywordFilter {
    pub name: String,
    pub excluded: bool,
}

impl KeywordFilter {
    pub fn include(name: impl Into<String>) -> Self {
        KeywordFilter { name: name.into(), excluded: false }
    }

    pub fn exclude(name: impl Into<String>) -> Self {
        KeywordFilter { name: name.into(), excluded: true }
    }
}

/// `None` leaves the trait unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraitFilters {
    pub is_female: Option<bool>,
    pub is_unique: Option<bool>,
    pub is_child: Option<bool>,
}

impl TraitFilters {
    pub fn is_empty(&self) -> bool {
        self.is_female.is_none() && self.is_unique.is_none() && self.is_child.is_none()
    }
}

/// Inclusive actor-level bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelRange {
    pub min: Option<u16>,
    pub max: Option<u16>,
}

impl LevelRange {
    pub fn contains(&self, level: u16) -> bool {
        self.min.is_none_or(|min| level >= min) && self.max.is_none_or(|max| level <= max)
    }
}

impl fmt::Display for LevelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "{min}-{max}"),
            (Some(min), None) => write!(f, "{min}+"),
            (None, Some(max)) => write!(f, "<={max}"),
            (None, None) => f.write_str("any"),
        }
    }
}

/// One rule in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub target: DistributionTarget,
    /// Explicit actor allow/deny list.
    pub npc_filters: Vec<FormFilter>,
    pub faction_filters: Vec<FormFilter>,
    pub race_filters: Vec<FormFilter>,
    pub keyword_filters: Vec<KeywordFilter>,
    pub class_form_keys: Vec<FormKey>,
    pub trait_filters: TraitFilters,
    pub level_filters: Option<LevelRange>,
    /// Filter text the parser could not map onto the model. Carried verbatim.
    pub raw_string_filters: Option<String>,
    pub raw_form_filters: Option<String>,
    /// Percentage in `[0, 100]`.
    pub chance: Option<f32>,
    /// 1-based source line.
    pub line_number: usize,
}

impl DistributionEntry {
    pub fn new(target: DistributionTarget, line_number: usize) -> Self {
        DistributionEntry {
            target,
            npc_filters: Vec::new(),
            faction_filters: Vec::new(),
            race_filters: Vec::new(),
            keyword_filters: Vec::new(),
            class_form_keys: Vec::new(),
            trait_filters: TraitFilters::default(),
            level_filters: None,
            raw_string_filters: None,
            raw_form_filters: None,
            chance: None,
            line_number,
        }
    }

    /// Entries with raw filters are held back from automatic matching.
    pub fn is_unresolved(&self) -> bool {
        self.raw_string_filters.is_some() || self.raw_form_filters.is_some()
    }

    /// True when no category, trait, or level constraint is present.
    pub fn is_global(&self) -> bool {
        self.npc_filters.is_empty()
            && self.faction_filters.is_empty()
            && self.race_filters.is_empty()
            && self.keyword_filters.is_empty()
            && self.class_form_keys.is_empty()
            && self.trait_filters.is_empty()
            && self.level_filters.is_none()
            && !self.is_unresolved()
    }
}

/// A parsed rule file. Rebuilt whenever the source changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionFile {
    file_name: String,
    full_path: PathBuf,
    relative_path: String,
    dialect: Dialect,
    lines: Vec<DistributionLine>,
    entries: Vec<DistributionEntry>,
    outfit_distribution_count: usize,
    keyword_distribution_count: usize,
    malformed_line_count: usize,
}

impl DistributionFile {
    pub(crate) fn new(
        full_path: PathBuf,
        relative_path: String,
        dialect: Dialect,
        lines: Vec<DistributionLine>,
        entries: Vec<DistributionEntry>,
        malformed_line_count: usize,
    ) -> Self {
        let file_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| relative_path.clone());
        let outfit_distribution_count =
            entries.iter().filter(|e| e.target.category() == TargetCategory::Outfit).count();
        let keyword_distribution_count = entries.len() - outfit_distribution_count;

        DistributionFile {
            file_name,
            full_path,
            relative_path,
            dialect,
            lines,
            entries,
            outfit_distribution_count,
            keyword_distribution_count,
            malformed_line_count,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn lines(&self) -> &[DistributionLine] {
        &self.lines
    }

    pub fn entries(&self) -> &[DistributionEntry] {
        &self.entries
    }

    pub fn outfit_distribution_count(&self) -> usize {
        self.outfit_distribution_count
    }

    pub fn keyword_distribution_count(&self) -> usize {
        self.keyword_distribution_count
    }

    /// Key-value lines that failed to parse and were demoted to comments.
    pub fn malformed_line_count(&self) -> usize {
        self.malformed_line_count
    }

    pub fn count_lines(&self, kind: LineKind) -> usize {
        self.lines.iter().filter(|l| l.kind == kind).count()
    }

    /// Whether any entry uses chance, which SkyPatcher cannot express.
    pub fn uses_chance(&self) -> bool {
        self.entries.iter().any(|e| e.chance.is_some())
    }
}
