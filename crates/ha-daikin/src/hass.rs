//! Runtime context of the integration
//!
//! [`Hass`] bundles what the lifecycle hooks and platforms share: the
//! client connector, the config entries, the entity state store, the
//! connected clients per entry and the loaded platforms.

use async_trait::async_trait;
use daikin_api::{DaikinApi, DaikinConnector};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::climate::{self, DaikinClimate};
use crate::config::DaikinOptions;
use crate::config_flow::{FlowInit, FlowManager, FlowResult, FlowResultOf};
use crate::consts::{Platform, TIMEOUT};
use crate::entity::EntityPlatform;
use crate::entries::{ConfigEntries, ConfigEntriesError, ConfigEntriesResult, EntryLifecycle};
use crate::entry::{ConfigEntry, ConfigEntryState};
use crate::error::{SetupError, SetupResult};
use crate::sensor;
use crate::services::{
    call_climate_service, ClimateTarget, ServiceCall, ServiceError, ServiceResult,
    CLIMATE_DOMAIN, CLIMATE_SERVICES,
};
use crate::states::States;

/// Shared state of the Daikin integration
pub struct Hass {
    connector: Arc<dyn DaikinConnector>,
    config_entries: Arc<ConfigEntries>,
    states: Arc<States>,
    flows: FlowManager,
    connect_timeout: Duration,

    /// entry_id -> connected client
    clients: DashMap<String, Arc<dyn DaikinApi>>,

    /// entry_id -> loaded platforms
    platforms: DashMap<String, Vec<Arc<EntityPlatform>>>,

    /// entity_id -> climate entity, for service dispatch
    climate_entities: DashMap<String, ClimateTarget>,

    /// entry_id -> cancel signal of the pending setup retry loop
    retry_tasks: DashMap<String, oneshot::Sender<()>>,
}

impl Hass {
    pub fn new(connector: Arc<dyn DaikinConnector>) -> Self {
        let config_entries = Arc::new(ConfigEntries::new());
        Self {
            flows: FlowManager::new(connector.clone(), config_entries.clone()),
            connector,
            config_entries,
            states: Arc::new(States::new()),
            connect_timeout: TIMEOUT,
            clients: DashMap::new(),
            platforms: DashMap::new(),
            climate_entities: DashMap::new(),
            retry_tasks: DashMap::new(),
        }
    }

    /// Override how long connection attempts may take
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.flows = FlowManager::new(self.connector.clone(), self.config_entries.clone())
            .with_timeout(timeout);
        self
    }

    pub fn connector(&self) -> &Arc<dyn DaikinConnector> {
        &self.connector
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn config_entries(&self) -> &Arc<ConfigEntries> {
        &self.config_entries
    }

    pub fn states(&self) -> &Arc<States> {
        &self.states
    }

    pub fn flows(&self) -> &FlowManager {
        &self.flows
    }

    /// Client connected for an entry
    pub fn client(&self, entry_id: &str) -> Option<Arc<dyn DaikinApi>> {
        self.clients.get(entry_id).map(|r| r.value().clone())
    }

    pub(crate) fn store_client(&self, entry_id: &str, api: Arc<dyn DaikinApi>) {
        self.clients.insert(entry_id.to_string(), api);
    }

    pub(crate) fn drop_client(&self, entry_id: &str) -> Option<Arc<dyn DaikinApi>> {
        self.clients.remove(entry_id).map(|(_, api)| api)
    }

    /// Make a climate entity reachable by the climate services
    pub fn register_climate(
        &self,
        entity_id: &str,
        entity: Arc<DaikinClimate>,
        platform: Arc<EntityPlatform>,
    ) {
        self.climate_entities
            .insert(entity_id.to_string(), ClimateTarget { entity, platform });
    }

    /// Climate entity registered under an entity id
    pub fn climate(&self, entity_id: &str) -> Option<Arc<DaikinClimate>> {
        self.climate_entities
            .get(entity_id)
            .map(|r| r.value().entity.clone())
    }

    /// Loaded platforms of an entry
    pub fn platforms(&self, entry_id: &str) -> Vec<Arc<EntityPlatform>> {
        self.platforms
            .get(entry_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Set up one platform for an entry and start polling its entities
    pub async fn forward_entry_setup(
        &self,
        entry: &ConfigEntry,
        platform: Platform,
    ) -> SetupResult<()> {
        let options = DaikinOptions::from_entry(entry)?;
        let entity_platform = Arc::new(EntityPlatform::new(
            platform,
            entry.entry_id.clone(),
            self.states.clone(),
        ));

        let result = match platform {
            Platform::Climate => climate::async_setup_entry(self, entry, &entity_platform).await,
            Platform::Sensor => sensor::async_setup_entry(self, entry, &entity_platform).await,
        };

        if let Err(err) = result {
            entity_platform.async_reset().await;
            return Err(SetupError::Platform {
                platform: platform.as_str(),
                reason: err.to_string(),
            });
        }

        if !entry.pref_disable_polling {
            entity_platform.start_polling(options.scan_interval).await;
        }

        self.platforms
            .entry(entry.entry_id.clone())
            .or_default()
            .push(entity_platform);
        debug!(entry = %entry.entry_id, platform = %platform, "Platform set up");
        Ok(())
    }

    /// Unload one platform of an entry
    ///
    /// A platform that was never set up counts as unloaded.
    pub async fn forward_entry_unload(
        &self,
        entry: &ConfigEntry,
        platform: Platform,
    ) -> SetupResult<bool> {
        let taken = self.platforms.get_mut(&entry.entry_id).and_then(|mut loaded| {
            let index = loaded.iter().position(|p| p.platform() == platform)?;
            Some(loaded.remove(index))
        });

        let Some(entity_platform) = taken else {
            return Ok(true);
        };

        let entity_ids = entity_platform.entity_ids().await;
        let unloaded = entity_platform.async_reset().await;
        for entity_id in &entity_ids {
            self.climate_entities.remove(entity_id);
        }

        self.platforms
            .remove_if(&entry.entry_id, |_, loaded| loaded.is_empty());
        debug!(entry = %entry.entry_id, platform = %platform, "Platform unloaded");
        Ok(unloaded)
    }

    /// Set up an entry, scheduling retries while the unit is not ready
    pub async fn setup_config_entry(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<()> {
        let result = self.config_entries.setup(entry_id, self.as_ref()).await;
        if let Err(ConfigEntriesError::NotReady { retry_in, .. }) = &result {
            self.schedule_retry(entry_id, *retry_in);
        }
        result
    }

    /// Keep retrying setup until it leaves the retry state
    ///
    /// Cancellation is only observed between attempts; an attempt that has
    /// started always runs to its final state.
    fn schedule_retry(self: &Arc<Self>, entry_id: &str, delay: Duration) {
        let hass = Arc::clone(self);
        let id = entry_id.to_string();
        let (cancel, mut cancelled) = oneshot::channel::<()>();

        // Replacing a previous sender cancels that loop.
        self.retry_tasks.insert(entry_id.to_string(), cancel);

        tokio::spawn(async move {
            let mut delay = delay;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancelled => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                let still_retrying = hass
                    .config_entries
                    .get(&id)
                    .is_some_and(|e| e.state == ConfigEntryState::SetupRetry);
                if !still_retrying {
                    break;
                }

                match hass.config_entries.setup(&id, hass.as_ref()).await {
                    Err(ConfigEntriesError::NotReady { retry_in, .. }) => delay = retry_in,
                    Ok(()) => break,
                    Err(err) => {
                        warn!(entry = %id, error = %err, "Retried setup failed");
                        break;
                    }
                }
            }
            drop(cancelled);
            // Only forget our own sender, not one a newer loop installed.
            hass.retry_tasks.remove_if(&id, |_, cancel| cancel.is_closed());
        });
    }

    fn cancel_retry(&self, entry_id: &str) {
        if self.retry_tasks.remove(entry_id).is_some() {
            debug!(entry = %entry_id, "Cancelled pending setup retry");
        }
    }

    /// Whether a setup retry is pending for an entry
    pub fn retry_pending(&self, entry_id: &str) -> bool {
        self.retry_tasks.contains_key(entry_id)
    }

    pub async fn unload_config_entry(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        self.cancel_retry(entry_id);
        self.config_entries.unload(entry_id, self).await
    }

    pub async fn reload_config_entry(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<()> {
        self.unload_config_entry(entry_id).await?;
        self.setup_config_entry(entry_id).await
    }

    /// Replace an entry's options, reloading it when loaded
    pub async fn update_entry_options(
        self: &Arc<Self>,
        entry_id: &str,
        options: std::collections::HashMap<String, serde_json::Value>,
    ) -> ConfigEntriesResult<()> {
        let entry = self.config_entries.update_options(entry_id, options)?;
        if entry.is_loaded() {
            info!(entry = %entry_id, "Options changed, reloading entry");
            self.reload_config_entry(entry_id).await?;
        }
        Ok(())
    }

    /// Unload an entry and forget it
    pub async fn remove_config_entry(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        self.unload_config_entry(entry_id).await?;
        self.config_entries.remove(entry_id)
    }

    /// Start a config flow; a created entry is set up right away
    pub async fn flow_init(self: &Arc<Self>, init: FlowInit) -> FlowResultOf<FlowResult> {
        let result = self.flows.init(init).await?;
        self.setup_created_entry(&result).await;
        Ok(result)
    }

    /// Continue a config flow; a created entry is set up right away
    pub async fn flow_configure(
        self: &Arc<Self>,
        flow_id: &str,
        user_input: std::collections::HashMap<String, serde_json::Value>,
    ) -> FlowResultOf<FlowResult> {
        let result = self.flows.configure(flow_id, user_input).await?;
        self.setup_created_entry(&result).await;
        Ok(result)
    }

    async fn setup_created_entry(self: &Arc<Self>, result: &FlowResult) {
        let Some(entry_id) = &result.entry_id else {
            return;
        };
        match self.setup_config_entry(entry_id).await {
            Ok(()) => info!(entry = %entry_id, "Daikin unit set up"),
            Err(ConfigEntriesError::NotReady { .. }) => {}
            Err(err) => error!(entry = %entry_id, error = %err, "Setting up new entry failed"),
        }
    }

    /// Dispatch a climate service call to the targeted entities
    pub async fn call_service(&self, call: &ServiceCall) -> ServiceResult<()> {
        if call.domain != CLIMATE_DOMAIN || !CLIMATE_SERVICES.contains(&call.service.as_str()) {
            return Err(ServiceError::NotFound {
                domain: call.domain.clone(),
                service: call.service.clone(),
            });
        }

        let entity_ids = call.entity_ids();
        if entity_ids.is_empty() {
            return Err(ServiceError::InvalidData("no entity_id given".to_string()));
        }

        // Resolve every target before calling any
        let targets = entity_ids
            .into_iter()
            .map(|entity_id| {
                let target = self
                    .climate_entities
                    .get(&entity_id)
                    .map(|r| r.value().clone())
                    .ok_or_else(|| ServiceError::EntityNotFound(entity_id.clone()))?;
                Ok((entity_id, target))
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        for (entity_id, target) in &targets {
            call_climate_service(entity_id, target, call).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EntryLifecycle for Hass {
    async fn setup_entry(&self, entry: &ConfigEntry) -> SetupResult<()> {
        crate::async_setup_entry(self, entry).await
    }

    async fn unload_entry(&self, entry: &ConfigEntry) -> SetupResult<bool> {
        crate::async_unload_entry(self, entry).await
    }
}
