//! Climate services
//!
//! Service calls target climate entities by entity id. After a call the
//! entity is refreshed from the unit and its state rewritten.

use daikin_api::DaikinError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::climate::{DaikinClimate, HvacMode};
use crate::entity::{Entity, EntityPlatform};

/// Domain the climate services are registered under
pub const CLIMATE_DOMAIN: &str = "climate";

pub const SERVICE_SET_TEMPERATURE: &str = "set_temperature";
pub const SERVICE_SET_HVAC_MODE: &str = "set_hvac_mode";
pub const SERVICE_SET_FAN_MODE: &str = "set_fan_mode";
pub const SERVICE_SET_SWING_MODE: &str = "set_swing_mode";
pub const SERVICE_SET_PRESET_MODE: &str = "set_preset_mode";

/// Services dispatched to Daikin climate entities
pub const CLIMATE_SERVICES: [&str; 5] = [
    SERVICE_SET_TEMPERATURE,
    SERVICE_SET_HVAC_MODE,
    SERVICE_SET_FAN_MODE,
    SERVICE_SET_SWING_MODE,
    SERVICE_SET_PRESET_MODE,
];

/// Result type for service calls
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service call errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service not found: {domain}.{service}")]
    NotFound { domain: String, service: String },

    #[error("invalid service data: {0}")]
    InvalidData(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("service call failed: {0}")]
    CallFailed(#[from] DaikinError),
}

/// A call to a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCall {
    /// The domain the service belongs to (`climate`)
    pub domain: String,

    /// The service name (`set_hvac_mode`)
    pub service: String,

    /// Data passed to the service (`entity_id`, `hvac_mode`, ...)
    pub service_data: serde_json::Value,
}

impl ServiceCall {
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: serde_json::Value,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            service_data,
        }
    }

    /// Full service identifier (domain.service)
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }

    /// Get a value from service_data
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.service_data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    fn require<T: serde::de::DeserializeOwned>(&self, key: &str) -> ServiceResult<T> {
        self.get(key)
            .ok_or_else(|| ServiceError::InvalidData(format!("missing or invalid '{}'", key)))
    }

    /// Entity ids targeted by the call, from a single string or an array
    pub fn entity_ids(&self) -> Vec<String> {
        match self.service_data.get("entity_id") {
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            Some(serde_json::Value::Array(arr)) => arr
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => vec![],
        }
    }
}

/// A climate entity together with the platform that writes its state
#[derive(Clone)]
pub struct ClimateTarget {
    pub entity: Arc<DaikinClimate>,
    pub platform: Arc<EntityPlatform>,
}

fn parse_hvac_mode(climate: &DaikinClimate, value: &str) -> ServiceResult<HvacMode> {
    let mode: HvacMode = value.parse().map_err(ServiceError::InvalidData)?;
    if !climate.hvac_modes().contains(&mode) {
        return Err(ServiceError::InvalidData(format!(
            "hvac mode '{}' is not supported by {}",
            mode,
            climate.name()
        )));
    }
    Ok(mode)
}

fn check_listed(value: &str, listed: Option<&[String]>, what: &str) -> ServiceResult<()> {
    match listed {
        Some(values) if !values.iter().any(|v| v == value) => Err(ServiceError::InvalidData(
            format!("{} '{}' is not one of {:?}", what, value, values),
        )),
        _ => Ok(()),
    }
}

/// Run one climate service against one entity and rewrite its state
#[instrument(skip(target, call), fields(service = %call.service))]
pub async fn call_climate_service(
    entity_id: &str,
    target: &ClimateTarget,
    call: &ServiceCall,
) -> ServiceResult<()> {
    let climate = target.entity.as_ref();

    match call.service.as_str() {
        SERVICE_SET_TEMPERATURE => {
            let temperature: Option<f64> = call.get("temperature");
            let hvac_mode = match call.get::<String>("hvac_mode") {
                Some(mode) => Some(parse_hvac_mode(climate, &mode)?),
                None => None,
            };
            if temperature.is_none() && hvac_mode.is_none() {
                return Err(ServiceError::InvalidData(
                    "set_temperature needs 'temperature' or 'hvac_mode'".to_string(),
                ));
            }
            climate.async_set_temperature(temperature, hvac_mode).await?;
        }
        SERVICE_SET_HVAC_MODE => {
            let mode: String = call.require("hvac_mode")?;
            let mode = parse_hvac_mode(climate, &mode)?;
            climate.async_set_hvac_mode(mode).await?;
        }
        SERVICE_SET_FAN_MODE => {
            let fan_mode: String = call.require("fan_mode")?;
            check_listed(&fan_mode, climate.fan_modes(), "fan mode")?;
            climate.async_set_fan_mode(&fan_mode).await?;
        }
        SERVICE_SET_SWING_MODE => {
            let swing_mode: String = call.require("swing_mode")?;
            check_listed(&swing_mode, climate.swing_modes(), "swing mode")?;
            climate.async_set_swing_mode(&swing_mode).await?;
        }
        SERVICE_SET_PRESET_MODE => {
            let preset_mode: String = call.require("preset_mode")?;
            check_listed(&preset_mode, climate.preset_modes(), "preset mode")?;
            climate.async_set_preset_mode(&preset_mode).await?;
        }
        other => {
            return Err(ServiceError::NotFound {
                domain: call.domain.clone(),
                service: other.to_string(),
            });
        }
    }

    debug!(entity_id, "Service applied, refreshing entity");
    target.platform.update_entity(entity_id, climate).await;
    Ok(())
}
