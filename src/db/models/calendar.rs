use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Event mapping table (mapping key -> external calendar event id)
// ============================================================================

/// Persisted table mapping a synced item's mapping key to the id of the
/// external calendar event created for it.
///
/// Serialized as a flat JSON object: `{ "meetup-12": "EV-…", … }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventMap(BTreeMap<String, String>);

impl EventMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored blob. Anything that isn't a JSON object reads as an
    /// empty table; inside an object, entries whose value isn't a string are
    /// dropped and the rest are kept.
    pub fn from_stored(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
            return Self::default();
        };

        match serde_json::from_str::<BTreeMap<String, Value>>(raw) {
            Ok(entries) => Self(
                entries
                    .into_iter()
                    .filter_map(|(key, value)| match value {
                        Value::String(event_id) => Some((key, event_id)),
                        _ => None,
                    })
                    .collect(),
            ),
            Err(_) => Self::default(),
        }
    }

    pub fn to_stored(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn get(&self, mapping_key: &str) -> Option<&str> {
        self.0.get(mapping_key).map(String::as_str)
    }

    pub fn insert(&mut self, mapping_key: impl Into<String>, event_id: impl Into<String>) {
        self.0.insert(mapping_key.into(), event_id.into());
    }

    pub fn remove(&mut self, mapping_key: &str) -> Option<String> {
        self.0.remove(mapping_key)
    }

    pub fn contains_key(&self, mapping_key: &str) -> bool {
        self.0.contains_key(mapping_key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}
