//! Entity contract and entity platforms
//!
//! An [`Entity`] exposes one aspect of a unit (its climate control, one
//! sensor reading). An [`EntityPlatform`] owns the entities one config
//! entry created for one platform: it assigns entity ids, writes their
//! states and polls them.

use async_trait::async_trait;
use daikin_api::{DaikinApi, DaikinResult};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::consts::{Platform, DEFAULT_MODEL, DOMAIN, MANUFACTURER};
use crate::states::{States, STATE_UNAVAILABLE, STATE_UNKNOWN};

/// Device a set of entities belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// (domain, id) pairs identifying the device
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
}

impl DeviceInfo {
    /// Device info for a Daikin unit, identified by its MAC address
    pub fn for_unit(api: &dyn DaikinApi) -> Self {
        Self {
            identifiers: vec![(DOMAIN.to_string(), api.mac())],
            name: api.name(),
            manufacturer: MANUFACTURER.to_string(),
            model: api.model().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            sw_version: api.firmware_version(),
        }
    }
}

/// One controllable or observable aspect of a unit
#[async_trait]
pub trait Entity: Send + Sync {
    /// Stable id used to recognise the entity across restarts
    fn unique_id(&self) -> &str;

    /// Display name, also the source of the entity id
    fn name(&self) -> &str;

    fn device_info(&self) -> &DeviceInfo;

    /// Current state value; `None` until the first update
    fn state(&self) -> Option<String>;

    /// State attributes
    fn attributes(&self) -> HashMap<String, Value>;

    /// Refresh from the unit
    async fn async_update(&self) -> DaikinResult<()>;
}

/// Turn a display name into an object id (`Living Room Climate` → `living_room_climate`)
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    if slug.is_empty() {
        "unnamed_device".to_string()
    } else {
        slug
    }
}

struct RegisteredEntity {
    entity_id: String,
    entity: Arc<dyn Entity>,
}

/// The entities of one (config entry, platform) pair
pub struct EntityPlatform {
    platform: Platform,
    config_entry_id: String,
    states: Arc<States>,
    entities: Mutex<Vec<RegisteredEntity>>,
    /// Entities whose last update failed
    unavailable: Mutex<HashSet<String>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl EntityPlatform {
    pub fn new(platform: Platform, config_entry_id: impl Into<String>, states: Arc<States>) -> Self {
        Self {
            platform,
            config_entry_id: config_entry_id.into(),
            states,
            entities: Mutex::new(Vec::new()),
            unavailable: Mutex::new(HashSet::new()),
            poll_task: Mutex::new(None),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn config_entry_id(&self) -> &str {
        &self.config_entry_id
    }

    /// First free entity id for a display name
    fn generate_entity_id(&self, name: &str) -> String {
        let base = format!("{}.{}", self.platform, slugify(name));
        if !self.states.contains(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| !self.states.contains(candidate))
            .unwrap_or(base)
    }

    /// Add entities, optionally refreshing each before its first state write
    ///
    /// Returns the assigned entity ids in the order the entities were given.
    #[instrument(skip(self, entities), fields(platform = %self.platform, entry = %self.config_entry_id))]
    pub async fn add_entities(
        &self,
        entities: Vec<Arc<dyn Entity>>,
        update_before_add: bool,
    ) -> Vec<String> {
        let mut assigned = Vec::with_capacity(entities.len());

        for entity in entities {
            let entity_id = self.generate_entity_id(entity.name());

            if update_before_add {
                self.update_entity(&entity_id, entity.as_ref()).await;
            } else {
                self.write_state(&entity_id, entity.as_ref());
            }

            debug!(entity_id = %entity_id, unique_id = entity.unique_id(), "Added entity");
            self.entities.lock().await.push(RegisteredEntity {
                entity_id: entity_id.clone(),
                entity,
            });
            assigned.push(entity_id);
        }

        assigned
    }

    /// Entity ids owned by this platform
    pub async fn entity_ids(&self) -> Vec<String> {
        self.entities
            .lock()
            .await
            .iter()
            .map(|e| e.entity_id.clone())
            .collect()
    }

    /// Look up an entity by its assigned id
    pub async fn get(&self, entity_id: &str) -> Option<Arc<dyn Entity>> {
        self.entities
            .lock()
            .await
            .iter()
            .find(|e| e.entity_id == entity_id)
            .map(|e| e.entity.clone())
    }

    /// Write an entity's current state without refreshing it
    pub fn write_state(&self, entity_id: &str, entity: &dyn Entity) {
        let mut attributes = entity.attributes();
        attributes.insert("friendly_name".to_string(), json!(entity.name()));
        let state = entity.state().unwrap_or_else(|| STATE_UNKNOWN.to_string());
        self.states.set(entity_id, state, attributes);
    }

    /// Refresh one entity and write the result
    ///
    /// A failed refresh marks the entity unavailable. Returns whether the
    /// refresh succeeded.
    pub async fn update_entity(&self, entity_id: &str, entity: &dyn Entity) -> bool {
        match entity.async_update().await {
            Ok(()) => {
                if self.unavailable.lock().await.remove(entity_id) {
                    info!(entity_id, "Entity is back online");
                }
                self.write_state(entity_id, entity);
                true
            }
            Err(err) => {
                if self.unavailable.lock().await.insert(entity_id.to_string()) {
                    warn!(entity_id, error = %err, "Update failed, marking entity unavailable");
                }
                let attributes =
                    HashMap::from([("friendly_name".to_string(), json!(entity.name()))]);
                self.states.set(entity_id, STATE_UNAVAILABLE, attributes);
                false
            }
        }
    }

    /// Refresh every entity once
    pub async fn poll_once(&self) {
        let snapshot: Vec<(String, Arc<dyn Entity>)> = self
            .entities
            .lock()
            .await
            .iter()
            .map(|e| (e.entity_id.clone(), e.entity.clone()))
            .collect();

        for (entity_id, entity) in snapshot {
            self.update_entity(&entity_id, entity.as_ref()).await;
        }
    }

    /// Start refreshing every entity on a fixed interval
    ///
    /// The first refresh happens one interval from now. Calling this again
    /// replaces the running poller.
    pub async fn start_polling(self: &Arc<Self>, interval: Duration) {
        let platform = Arc::clone(self);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let handle = tokio::spawn(async move {
            ticker.tick().await;
            loop {
                ticker.tick().await;
                platform.poll_once().await;
            }
        });

        if let Some(previous) = self.poll_task.lock().await.replace(handle) {
            previous.abort();
        }
        debug!(
            platform = %self.platform,
            entry = %self.config_entry_id,
            interval_secs = interval.as_secs(),
            "Started polling"
        );
    }

    /// Stop polling and remove every entity state
    pub async fn async_reset(&self) -> bool {
        if let Some(task) = self.poll_task.lock().await.take() {
            task.abort();
        }

        let entities = std::mem::take(&mut *self.entities.lock().await);
        for registered in &entities {
            self.states.remove(&registered.entity_id);
        }
        self.unavailable.lock().await.clear();

        debug!(
            platform = %self.platform,
            entry = %self.config_entry_id,
            removed = entities.len(),
            "Reset platform"
        );
        true
    }
}
