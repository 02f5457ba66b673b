//! Record references and the loaded-record index.
//!
//! A [`FormKey`] identifies a record by the plugin that defines it and its
//! local id inside that plugin. Rule files spell these in three ways:
//!
//! ```text
//! SPID         0x800~Skyrim.esm      (id first, tilde)
//! SkyPatcher   Skyrim.esm|800        (plugin first, pipe)
//! canonical    000800:Skyrim.esm     (six hex digits, colon)
//! ```
//!
//! All three parse to the same key; `Display` always emits the canonical form.
//! Plugin names compare ASCII-case-insensitively, as the host does.
//!
//! [`FormIndex`] is the explicit "currently loaded data" context handed to the
//! parser so it can turn editor ids into keys and classify form filters by
//! record kind.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Local ids carry at most 24 significant bits; the top byte is a load-order
/// slot and is discarded.
const LOCAL_ID_MASK: u32 = 0x00FF_FFFF;

/// A plugin-qualified record reference.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormKey {
    plugin: String,
    id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a form key (expected 0x800~Mod.esp, Mod.esp|800 or 000800:Mod.esp)")]
pub struct FormKeyParseError(pub String);

impl FormKey {
    pub fn new(plugin: impl Into<String>, id: u32) -> Self {
        FormKey { plugin: plugin.into(), id: id & LOCAL_ID_MASK }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Parse any of the three supported spellings.
    pub fn parse(text: &str) -> Option<FormKey> {
        let text = text.trim();
        let (plugin, hex) = if let Some(caps) = regex!(r"(?i)^(?:0x)?([0-9a-f]{1,8})~(.+\.es[lmp])$").captures(text) {
            (caps.get(2)?.as_str(), caps.get(1)?.as_str())
        } else if let Some(caps) = regex!(r"(?i)^(.+\.es[lmp])\|(?:0x)?([0-9a-f]{1,8})$").captures(text) {
            (caps.get(1)?.as_str(), caps.get(2)?.as_str())
        } else if let Some(caps) = regex!(r"(?i)^([0-9a-f]{6}):(.+\.es[lmp])$").captures(text) {
            (caps.get(2)?.as_str(), caps.get(1)?.as_str())
        } else {
            return None;
        };

        let id = u32::from_str_radix(hex, 16).ok()?;
        Some(FormKey::new(plugin.trim(), id))
    }

    /// Cheap syntactic check used by the parsers to decide between a key and
    /// an editor id before touching the index.
    pub fn looks_like(text: &str) -> bool {
        let lower = text.trim().to_ascii_lowercase();
        [".esp", ".esm", ".esl"].iter().any(|ext| lower.contains(ext))
    }
}

impl FromStr for FormKey {
    type Err = FormKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormKey::parse(s).ok_or_else(|| FormKeyParseError(s.to_string()))
    }
}

impl TryFrom<String> for FormKey {
    type Error = FormKeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FormKey> for String {
    fn from(key: FormKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}:{}", self.id, self.plugin)
    }
}

impl fmt::Debug for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormKey({self})")
    }
}

impl PartialEq for FormKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.plugin.eq_ignore_ascii_case(&other.plugin)
    }
}

impl Eq for FormKey {}

impl Hash for FormKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        for b in self.plugin.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl Ord for FormKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.plugin.bytes().map(|b| b.to_ascii_lowercase());
        let rhs = other.plugin.bytes().map(|b| b.to_ascii_lowercase());
        lhs.cmp(rhs).then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for FormKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Record types the parser cares about when classifying form filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormKind {
    Npc,
    Faction,
    Race,
    Class,
    Keyword,
    Outfit,
    #[serde(other)]
    Other,
}

/// One loaded record as reported by the scanning collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRecord {
    pub form_key: FormKey,
    #[serde(default)]
    pub editor_id: Option<String>,
    pub kind: FormKind,
}

/// Outcome of resolving a textual reference against the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference<'a> {
    /// The text named a loaded record.
    Known(&'a FormRecord),
    /// The text was a well-formed key, but no loaded record has it.
    UnknownKey,
    /// Neither a key nor a known editor id.
    Unresolved,
}

/// Lookup tables over the records currently loaded.
#[derive(Debug, Default, Clone)]
pub struct FormIndex {
    records: Vec<FormRecord>,
    by_key: HashMap<FormKey, usize>,
    by_editor_id: HashMap<String, usize>,
}

impl FormIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = FormRecord>) -> Self {
        let mut index = FormIndex::new();
        for record in records {
            index.insert(record);
        }
        index
    }

    /// Insert a record. A later record with the same key replaces the earlier
    /// one, matching plugin override order.
    pub fn insert(&mut self, record: FormRecord) {
        if let Some(&slot) = self.by_key.get(&record.form_key) {
            if let Some(old) = self.records[slot].editor_id.as_deref() {
                self.by_editor_id.remove(&old.to_ascii_lowercase());
            }
            if let Some(edid) = record.editor_id.as_deref() {
                self.by_editor_id.insert(edid.to_ascii_lowercase(), slot);
            }
            self.records[slot] = record;
            return;
        }

        let slot = self.records.len();
        self.by_key.insert(record.form_key.clone(), slot);
        if let Some(edid) = record.editor_id.as_deref() {
            self.by_editor_id.insert(edid.to_ascii_lowercase(), slot);
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &FormKey) -> Option<&FormRecord> {
        self.by_key.get(key).map(|&slot| &self.records[slot])
    }

    pub fn by_editor_id(&self, editor_id: &str) -> Option<&FormRecord> {
        self.by_editor_id.get(&editor_id.trim().to_ascii_lowercase()).map(|&slot| &self.records[slot])
    }

    pub fn editor_id(&self, key: &FormKey) -> Option<&str> {
        self.get(key).and_then(|r| r.editor_id.as_deref())
    }

    /// Resolve a key or editor id.
    pub fn resolve(&self, text: &str) -> Reference<'_> {
        if let Some(key) = FormKey::parse(text) {
            return match self.get(&key) {
                Some(record) => Reference::Known(record),
                None => Reference::UnknownKey,
            };
        }
        match self.by_editor_id(text) {
            Some(record) => Reference::Known(record),
            None => Reference::Unresolved,
        }
    }

    /// Editor id if loaded, canonical key otherwise.
    pub fn display_name(&self, key: &FormKey) -> String {
        self.editor_id(key).map(str::to_string).unwrap_or_else(|| key.to_string())
    }
}
