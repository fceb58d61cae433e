//! Shared domain models.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Numeric identifier Zwift stores in `prefs.xml` for a world.
pub type WorldId = u32;

/// A selectable world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    /// Canonical display name (e.g. `New York`).
    pub name: String,
    /// Identifier written to the preferences file.
    pub id: WorldId,
}

const KNOWN_WORLDS: &[(&str, WorldId)] = &[
    ("Watopia", 1),
    ("Richmond", 2),
    ("London", 3),
    ("New York", 4),
    ("Innsbruck", 5),
    ("Yorkshire", 7),
    ("Makuri Islands", 9),
    ("France", 10),
    ("Paris", 11),
    ("Scotland", 13),
];

/// Closed, ordered set of worlds with constant-time lookups in both directions.
#[derive(Debug, Clone)]
pub struct WorldVocabulary {
    worlds: Vec<World>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<WorldId, usize>,
}

impl WorldVocabulary {
    /// Build a vocabulary from `(name, id)` pairs. Later duplicates of a name
    /// or id are ignored so the first entry stays canonical.
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, WorldId)>) -> Self {
        let mut worlds = Vec::new();
        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();
        for (name, id) in entries {
            let key = name.to_lowercase();
            if by_name.contains_key(&key) || by_id.contains_key(&id) {
                continue;
            }
            by_name.insert(key, worlds.len());
            by_id.insert(id, worlds.len());
            worlds.push(World {
                name: name.to_string(),
                id,
            });
        }
        Self {
            worlds,
            by_name,
            by_id,
        }
    }

    /// Worlds in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &World> {
        self.worlds.iter()
    }

    /// Number of known worlds.
    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    /// Whether the vocabulary has no entries.
    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    /// Look up a world by name, ignoring case and surrounding whitespace.
    pub fn by_name(&self, name: &str) -> Option<&World> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|&index| &self.worlds[index])
    }

    /// Look up a world by identifier.
    pub fn by_id(&self, id: WorldId) -> Option<&World> {
        self.by_id.get(&id).map(|&index| &self.worlds[index])
    }

    /// Identifier for `name`, if known.
    pub fn id_of(&self, name: &str) -> Option<WorldId> {
        self.by_name(name).map(|world| world.id)
    }

    /// Canonical name for `id`, if known.
    pub fn name_of(&self, id: WorldId) -> Option<&str> {
        self.by_id(id).map(|world| world.name.as_str())
    }

    /// Whether `id` belongs to the vocabulary.
    pub fn contains(&self, id: WorldId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Name to show for `id`, falling back to the bare number.
    pub fn display_name(&self, id: WorldId) -> String {
        self.name_of(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }
}

impl Default for WorldVocabulary {
    fn default() -> Self {
        Self::new(KNOWN_WORLDS.iter().copied())
    }
}
