//! Daikin air conditioner integration
//!
//! Connects Daikin units (BRP069, BRP072C, AirBase and SKYFi adapters) to
//! the home-automation host. Units are added through a config flow, each
//! unit becomes a config entry, and every entry exposes a climate entity
//! plus one sensor per reading the unit reports.
//!
//! # Key Types
//!
//! - [`Hass`] - Shared integration state and lifecycle driver
//! - [`DaikinFlowHandler`] - Setup wizard for one unit
//! - [`ConfigEntries`] - Manager for configured units
//! - [`DaikinClimate`] - Climate entity of a unit
//! - [`DaikinSensor`] - One reading of a unit
//!
//! # Lifecycle
//!
//! [`async_setup`] imports units declared in YAML, [`async_setup_entry`]
//! connects to a unit and sets up its platforms, [`async_unload_entry`]
//! tears them down again.

pub mod climate;
pub mod config;
pub mod config_flow;
pub mod consts;
pub mod entity;
pub mod entries;
pub mod entry;
pub mod error;
pub mod hass;
pub mod sensor;
pub mod services;
pub mod states;

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use config::{parse_domain_config, DaikinEntryData};
use consts::PLATFORMS;

// Re-export main types
pub use climate::{ClimateEntityFeature, DaikinClimate, HvacMode};
pub use config::{DaikinOptions, DeviceConfig};
pub use config_flow::{DaikinFlowHandler, FlowError, FlowInit, FlowManager, FlowResult, FlowStep};
pub use consts::{Platform, DOMAIN};
pub use entity::{DeviceInfo, Entity, EntityPlatform};
pub use entries::{ConfigEntries, ConfigEntriesError, ConfigEntriesResult, EntryLifecycle};
pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState};
pub use error::{ConfigError, ConfigResult, SetupError, SetupResult};
pub use hass::Hass;
pub use sensor::{DaikinSensor, SensorDescription, SENSOR_TYPES};
pub use services::{ServiceCall, ServiceError, ServiceResult};
pub use states::{EntityState, States};

/// Set up the integration from the host configuration
///
/// Every unit declared under the domain key is handed to an import flow.
/// Units that fail to import are logged and skipped.
pub async fn async_setup(hass: &Arc<Hass>, config: &serde_yaml::Value) -> ConfigResult<bool> {
    let devices = parse_domain_config(config)?;
    debug!(count = devices.len(), "Importing Daikin units from configuration");

    for device in devices {
        match hass.flow_init(FlowInit::Import(device.to_flow_input())).await {
            Ok(result) => debug!(host = %device.host, step = ?result.step, "Import flow finished"),
            Err(err) => warn!(host = %device.host, error = %err, "Import flow failed"),
        }
    }

    Ok(true)
}

/// Connect to the unit behind an entry and set up its platforms
///
/// Connection failures surface as [`SetupError::NotReady`] so the entry
/// is retried later.
pub async fn async_setup_entry(hass: &Hass, entry: &ConfigEntry) -> SetupResult<()> {
    let data = DaikinEntryData::from_entry(entry)?;

    let connected = match tokio::time::timeout(
        hass.connect_timeout(),
        hass.connector().connect(&data.connect_options()),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(daikin_api::DaikinError::Timeout),
    };

    let api = match connected {
        Ok(api) => api,
        Err(err) => {
            error!("Error connecting to Daikin device: {}", err);
            return Err(SetupError::NotReady(err));
        }
    };

    info!(host = %data.host, mac = %api.mac(), "Connected to Daikin unit");
    hass.store_client(&entry.entry_id, api);

    for platform in PLATFORMS {
        if let Err(err) = hass.forward_entry_setup(entry, platform).await {
            error!(entry = %entry.entry_id, error = %err, "Error setting up platform");
        }
    }

    Ok(())
}

/// Unload every platform of an entry
///
/// The stored client is only dropped when all platforms unloaded.
pub async fn async_unload_entry(hass: &Hass, entry: &ConfigEntry) -> SetupResult<bool> {
    let results = join_all(
        PLATFORMS
            .iter()
            .map(|platform| hass.forward_entry_unload(entry, *platform)),
    )
    .await;

    let mut unload_ok = true;
    for (platform, result) in PLATFORMS.iter().zip(results) {
        match result {
            Ok(true) => {}
            Ok(false) => unload_ok = false,
            Err(err) => {
                error!(entry = %entry.entry_id, platform = %platform, error = %err, "Error unloading platform");
                unload_ok = false;
            }
        }
    }

    if unload_ok {
        hass.drop_client(&entry.entry_id);
    }
    Ok(unload_ok)
}
