//! Config entries manager
//!
//! Indexes the configured units and drives their lifecycle through an
//! [`EntryLifecycle`] implementation.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::entry::{retry_delay, ConfigEntry, ConfigEntryState, InvalidTransition};
use crate::error::{SetupError, SetupResult};

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Entry {entry_id} not ready, retrying in {retry_in:?}")]
    NotReady { entry_id: String, retry_in: Duration },

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error("Unload failed for entry {0}")]
    UnloadFailed(String),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Integration hooks invoked while an entry is set up or unloaded
#[async_trait]
pub trait EntryLifecycle: Send + Sync {
    async fn setup_entry(&self, entry: &ConfigEntry) -> SetupResult<()>;

    /// Returns false when some platform refused to unload
    async fn unload_entry(&self, entry: &ConfigEntry) -> SetupResult<bool>;
}

/// Config entries manager
pub struct ConfigEntries {
    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    /// entry_id -> lock serialising setup and unload of that entry
    setup_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Default for ConfigEntries {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            setup_locks: DashMap::new(),
        }
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        self.entries.insert(entry.entry_id.clone(), entry.clone());
        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry.entry_id.clone());
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id.insert(
                (entry.domain.clone(), unique_id.clone()),
                entry.entry_id.clone(),
            );
        }
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }
        self.entries.remove(&entry.entry_id);
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        let ids: Vec<String> = self
            .by_domain
            .get(domain)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Whether an entry with this unique id already exists in the domain
    pub fn is_configured(&self, domain: &str, unique_id: &str) -> bool {
        self.by_unique_id
            .contains_key(&(domain.to_string(), unique_id.to_string()))
    }

    /// Add a new entry; a unique id may only be used once per domain
    pub fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            if self.is_configured(&entry.domain, unique_id) {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.index_entry(&entry);
        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        Ok(entry)
    }

    /// Replace the options of an entry
    ///
    /// Options are read at setup; a loaded entry must be reloaded for them
    /// to apply.
    pub fn update_options(
        &self,
        entry_id: &str,
        options: HashMap<String, serde_json::Value>,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.options = options;
        entry.modified_at = Utc::now();
        debug!("Updated options of config entry: {}", entry_id);
        Ok(entry.clone())
    }

    /// Drop an entry from the indexes; callers unload it first
    pub fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        self.unindex_entry(&entry);
        self.setup_locks.remove(entry_id);
        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );
        Ok(entry)
    }

    fn setup_lock(&self, entry_id: &str) -> Arc<Mutex<()>> {
        self.setup_locks
            .entry(entry_id.to_string())
            .or_default()
            .clone()
    }

    /// Apply a checked lifecycle transition and return the updated entry
    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(entry.clone())
    }

    /// Set an entry up through the integration's lifecycle hooks
    ///
    /// A not-ready failure leaves the entry in SetupRetry and reports how
    /// long the caller should wait before trying again.
    pub async fn setup(
        &self,
        entry_id: &str,
        lifecycle: &dyn EntryLifecycle,
    ) -> ConfigEntriesResult<()> {
        let lock = self.setup_lock(entry_id);
        let _guard = lock.lock().await;

        let entry = self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;

        match lifecycle.setup_entry(&entry).await {
            Ok(()) => {
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Err(err @ SetupError::NotReady(_)) => {
                let reason = err.to_string();
                let retry_in = retry_delay(entry.tries);
                self.transition(entry_id, ConfigEntryState::SetupRetry, Some(reason))?;
                if let Some(mut stored) = self.entries.get_mut(entry_id) {
                    stored.tries += 1;
                }
                warn!(
                    "Config entry '{}' for {} not ready yet: {}; retrying in {:?}",
                    entry.title, entry.domain, err, retry_in
                );
                Err(ConfigEntriesError::NotReady {
                    entry_id: entry_id.to_string(),
                    retry_in,
                })
            }
            Err(err) => {
                let reason = err.to_string();
                error!("Setup failed for entry {}: {}", entry_id, reason);
                self.transition(entry_id, ConfigEntryState::SetupError, Some(reason.clone()))?;
                Err(ConfigEntriesError::SetupFailed(reason))
            }
        }
    }

    /// Unload an entry through the integration's lifecycle hooks
    pub async fn unload(
        &self,
        entry_id: &str,
        lifecycle: &dyn EntryLifecycle,
    ) -> ConfigEntriesResult<()> {
        let lock = self.setup_lock(entry_id);
        let _guard = lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        match entry.state {
            ConfigEntryState::NotLoaded => return Ok(()),
            state if !state.is_recoverable() => {
                return Err(ConfigEntriesError::CannotUnload(state));
            }
            _ => {}
        }

        let was_loaded = entry.is_loaded();
        let entry = self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        // Entries that never loaded have nothing for the integration to tear down.
        let unloaded = if was_loaded {
            lifecycle.unload_entry(&entry).await
        } else {
            Ok(true)
        };

        match unloaded {
            Ok(true) => {
                self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
                info!("Unloaded entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Ok(false) => {
                self.transition(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some("a platform refused to unload".to_string()),
                )?;
                Err(ConfigEntriesError::UnloadFailed(entry_id.to_string()))
            }
            Err(err) => {
                error!("Error unloading entry {}: {}", entry_id, err);
                self.transition(entry_id, ConfigEntryState::FailedUnload, Some(err.to_string()))?;
                Err(ConfigEntriesError::UnloadFailed(entry_id.to_string()))
            }
        }
    }

    /// Unload then set up again
    pub async fn reload(
        &self,
        entry_id: &str,
        lifecycle: &dyn EntryLifecycle,
    ) -> ConfigEntriesResult<()> {
        self.unload(entry_id, lifecycle).await?;
        self.setup(entry_id, lifecycle).await
    }

    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
