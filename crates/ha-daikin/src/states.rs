//! Entity state store
//!
//! Holds the last state written by every entity of the integration. The
//! host reads entity states from here.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

/// State value written when the unit could not be reached
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// State value written before the first successful update
pub const STATE_UNKNOWN: &str = "unknown";

/// State of one entity at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityState {
    /// Full entity id (`climate.living_room_climate`)
    pub entity_id: String,

    /// State value (`cool`, `23.5`, `unavailable`)
    pub state: String,

    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state or its attributes were last written
    pub last_updated: DateTime<Utc>,
}

impl EntityState {
    /// Check if the entity was unreachable at the last write
    pub fn is_unavailable(&self) -> bool {
        self.state == STATE_UNAVAILABLE
    }

    /// Typed attribute lookup
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Concurrent map of entity id to current state
#[derive(Debug, Default)]
pub struct States {
    states: DashMap<String, EntityState>,
}

impl States {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a state, keeping `last_changed` when the value is unchanged
    pub fn set(
        &self,
        entity_id: &str,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
    ) -> EntityState {
        let state = state.into();
        let now = Utc::now();

        let last_changed = match self.states.get(entity_id) {
            Some(old) if old.state == state => old.last_changed,
            _ => now,
        };

        let new_state = EntityState {
            entity_id: entity_id.to_string(),
            state,
            attributes,
            last_changed,
            last_updated: now,
        };

        trace!(entity_id, state = %new_state.state, "Writing entity state");
        self.states.insert(entity_id.to_string(), new_state.clone());
        new_state
    }

    pub fn get(&self, entity_id: &str) -> Option<EntityState> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Check whether an entity id is already taken
    pub fn contains(&self, entity_id: &str) -> bool {
        self.states.contains_key(entity_id)
    }

    pub fn remove(&self, entity_id: &str) -> Option<EntityState> {
        let removed = self.states.remove(entity_id).map(|(_, s)| s);
        if removed.is_some() {
            debug!(entity_id, "Removed entity state");
        }
        removed
    }

    /// All entity ids in a domain (`climate`, `sensor`)
    pub fn entity_ids(&self, domain: &str) -> Vec<String> {
        let prefix = format!("{}.", domain);
        let mut ids: Vec<String> = self
            .states
            .iter()
            .filter(|r| r.key().starts_with(&prefix))
            .map(|r| r.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
