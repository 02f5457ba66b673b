//! Actor attribute snapshots.
//!
//! The scanning collaborator reports one [`NpcFilterData`] per actor. The
//! engine never mutates these; it only reads the attributes the matcher needs
//! plus the default outfit used for unchanged-target classification.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::form::{FormKey, FormRecord};

/// Read-only attribute set of one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcFilterData {
    pub form_key: FormKey,
    #[serde(default)]
    pub editor_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Keyword editor ids carried by the actor (including its race's).
    #[serde(default)]
    pub keywords: HashSet<String>,
    #[serde(default)]
    pub factions: HashSet<FormKey>,
    #[serde(default)]
    pub race: Option<FormKey>,
    #[serde(default)]
    pub class: Option<FormKey>,
    #[serde(default)]
    pub level: u16,
    #[serde(default)]
    pub is_female: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_child: bool,
    /// Outfit the actor wears when no distribution applies.
    #[serde(default)]
    pub default_outfit: Option<FormKey>,
}

impl NpcFilterData {
    /// A bare actor with no attributes, used as a starting point by callers
    /// and tests.
    pub fn new(form_key: FormKey) -> Self {
        NpcFilterData {
            form_key,
            editor_id: None,
            name: None,
            keywords: HashSet::new(),
            factions: HashSet::new(),
            race: None,
            class: None,
            level: 1,
            is_female: false,
            is_unique: false,
            is_child: false,
            default_outfit: None,
        }
    }

    pub fn has_keyword(&self, name: &str) -> bool {
        self.keywords.contains(name) || self.keywords.iter().any(|k| k.eq_ignore_ascii_case(name))
    }

    pub fn label(&self) -> String {
        self.editor_id.clone().unwrap_or_else(|| self.form_key.to_string())
    }
}

/// Everything the scanning collaborator hands over for one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSnapshot {
    #[serde(default)]
    pub forms: Vec<FormRecord>,
    #[serde(default)]
    pub npcs: Vec<NpcFilterData>,
}

impl DataSnapshot {
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup_ignores_case() {
        let mut npc = NpcFilterData::new("Skyrim.esm|1".parse().unwrap());
        npc.keywords.insert("ActorTypeNPC".to_string());

        assert!(npc.has_keyword("ActorTypeNPC"));
        assert!(npc.has_keyword("actortypenpc"));
        assert!(!npc.has_keyword("ActorTypeCreature"));
    }

    #[test]
    fn snapshot_deserializes_with_defaults() {
        let json = r#"{
            "forms": [{ "form_key": "Skyrim.esm|28848", "editor_id": "GuardFaction", "kind": "faction" },
                      { "form_key": "Skyrim.esm|9", "kind": "combatstyle" }],
            "npcs": [{ "form_key": "0x13BBF~Skyrim.esm", "factions": ["Skyrim.esm|28848"], "level": 12 }]
        }"#;

        let snapshot = DataSnapshot::from_json(json).unwrap();
        assert_eq!(snapshot.forms.len(), 2);
        assert_eq!(snapshot.forms[1].kind, crate::form::FormKind::Other);

        let npc = &snapshot.npcs[0];
        assert_eq!(npc.level, 12);
        assert!(npc.factions.contains(&"028848:Skyrim.esm".parse::<FormKey>().unwrap()));
        assert!(!npc.is_female);
        assert!(npc.default_outfit.is_none());
    }

    #[test]
    fn malformed_snapshot_is_an_error() {
        let err = DataSnapshot::from_json(r#"{ "npcs": [{ "form_key": "not a key" }] }"#).unwrap_err();
        assert!(matches!(err, crate::Error::Snapshot(_)));
    }
}
