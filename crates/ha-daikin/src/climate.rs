//! Climate platform for Daikin units

use async_trait::async_trait;
use daikin_api::{DaikinApi, DaikinError, DaikinResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::consts::{ATTR_INSIDE_TEMPERATURE, ATTR_OUTSIDE_TEMPERATURE, UNIT_CELSIUS};
use crate::entity::{DeviceInfo, Entity, EntityPlatform};
use crate::entry::ConfigEntry;
use crate::error::{SetupError, SetupResult};
use crate::hass::Hass;

/// Lowest target temperature offered to the user
pub const DEFAULT_MIN_TEMP: f64 = 7.0;
/// Highest target temperature offered to the user
pub const DEFAULT_MAX_TEMP: f64 = 35.0;

/// HVAC mode as exposed to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Off,
    Auto,
    Cool,
    Heat,
    FanOnly,
    Dry,
}

impl HvacMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HvacMode::Off => "off",
            HvacMode::Auto => "auto",
            HvacMode::Cool => "cool",
            HvacMode::Heat => "heat",
            HvacMode::FanOnly => "fan_only",
            HvacMode::Dry => "dry",
        }
    }

    /// Map a unit mode name; unknown names have no host equivalent
    pub fn from_daikin(mode: &str) -> Option<Self> {
        mode.parse().ok()
    }

    /// Unit mode name for this host mode
    pub fn to_daikin(self) -> &'static str {
        // Both vocabularies use the same names.
        self.as_str()
    }
}

impl FromStr for HvacMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(HvacMode::Off),
            "auto" => Ok(HvacMode::Auto),
            "cool" => Ok(HvacMode::Cool),
            "heat" => Ok(HvacMode::Heat),
            "fan_only" => Ok(HvacMode::FanOnly),
            "dry" => Ok(HvacMode::Dry),
            other => Err(format!("unknown hvac mode '{}'", other)),
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Climate features advertised to the host (bit values follow the host)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ClimateEntityFeature(u32);

impl ClimateEntityFeature {
    pub const TARGET_TEMPERATURE: Self = Self(1);
    pub const FAN_MODE: Self = Self(8);
    pub const PRESET_MODE: Self = Self(16);
    pub const SWING_MODE: Self = Self(32);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ClimateEntityFeature {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ClimateEntityFeature {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Values refreshed on every update
#[derive(Debug, Clone, Default)]
struct ClimateState {
    current_temperature: Option<f64>,
    target_temperature: Option<f64>,
    hvac_mode: Option<HvacMode>,
    fan_mode: Option<String>,
    swing_mode: Option<String>,
    preset_mode: Option<String>,
    extra: HashMap<String, Value>,
}

/// Climate control of one Daikin unit
pub struct DaikinClimate {
    api: Arc<dyn DaikinApi>,
    unique_id: String,
    name: String,
    device_info: DeviceInfo,
    supported_features: ClimateEntityFeature,
    hvac_modes: Vec<HvacMode>,
    fan_modes: Option<Vec<String>>,
    swing_modes: Option<Vec<String>>,
    preset_modes: Option<Vec<String>>,
    state: RwLock<ClimateState>,
}

fn non_empty(modes: &Option<Vec<String>>) -> bool {
    modes.as_ref().is_some_and(|m| !m.is_empty())
}

impl DaikinClimate {
    pub fn new(api: Arc<dyn DaikinApi>) -> Self {
        let fan_modes = api.fan_modes();
        let swing_modes = api.swing_modes();
        let preset_modes = api.preset_modes();

        let mut supported_features =
            ClimateEntityFeature::TARGET_TEMPERATURE | ClimateEntityFeature::FAN_MODE;
        if non_empty(&swing_modes) {
            supported_features |= ClimateEntityFeature::SWING_MODE;
        }
        if non_empty(&preset_modes) {
            supported_features |= ClimateEntityFeature::PRESET_MODE;
        }

        let mut hvac_modes = vec![HvacMode::Off];
        for mode in api.available_modes() {
            if let Some(mapped) = HvacMode::from_daikin(&mode) {
                if !hvac_modes.contains(&mapped) {
                    hvac_modes.push(mapped);
                }
            }
        }

        Self {
            unique_id: format!("{}-climate", api.mac()),
            name: format!("{} Climate", api.name()),
            device_info: DeviceInfo::for_unit(api.as_ref()),
            supported_features,
            hvac_modes,
            fan_modes,
            swing_modes,
            preset_modes,
            state: RwLock::new(ClimateState::default()),
            api,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ClimateState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn supported_features(&self) -> ClimateEntityFeature {
        self.supported_features
    }

    pub fn hvac_modes(&self) -> &[HvacMode] {
        &self.hvac_modes
    }

    pub fn fan_modes(&self) -> Option<&[String]> {
        self.fan_modes.as_deref()
    }

    pub fn swing_modes(&self) -> Option<&[String]> {
        self.swing_modes.as_deref()
    }

    pub fn preset_modes(&self) -> Option<&[String]> {
        self.preset_modes.as_deref()
    }

    pub fn hvac_mode(&self) -> Option<HvacMode> {
        self.read().hvac_mode
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.read().current_temperature
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.read().target_temperature
    }

    pub fn fan_mode(&self) -> Option<String> {
        self.read().fan_mode.clone()
    }

    pub fn temperature_unit(&self) -> &'static str {
        UNIT_CELSIUS
    }

    /// Set the target temperature and, when given, the HVAC mode
    pub async fn async_set_temperature(
        &self,
        temperature: Option<f64>,
        hvac_mode: Option<HvacMode>,
    ) -> DaikinResult<()> {
        if let Some(temperature) = temperature {
            self.api.set_target_temperature(temperature).await?;
        }
        if let Some(mode) = hvac_mode {
            self.async_set_hvac_mode(mode).await?;
        }
        Ok(())
    }

    /// Change the HVAC mode, powering the unit on or off as needed
    pub async fn async_set_hvac_mode(&self, hvac_mode: HvacMode) -> DaikinResult<()> {
        if hvac_mode == HvacMode::Off {
            return self.api.set_power(false).await;
        }

        if self.api.power() == Some(false) {
            self.api.set_power(true).await?;
        }
        self.api.set_mode(hvac_mode.to_daikin()).await
    }

    pub async fn async_set_fan_mode(&self, fan_mode: &str) -> DaikinResult<()> {
        self.api.set_fan_rate(fan_mode).await
    }

    /// Change the swing setting; a no-op on units without swing control
    pub async fn async_set_swing_mode(&self, swing_mode: &str) -> DaikinResult<()> {
        match self.api.set_swing_mode(swing_mode).await {
            Err(DaikinError::Unsupported(_)) => {
                debug!(entity = %self.name, "Unit has no swing control, ignoring");
                Ok(())
            }
            result => result,
        }
    }

    /// Change the preset; a no-op on units without presets
    pub async fn async_set_preset_mode(&self, preset_mode: &str) -> DaikinResult<()> {
        match self.api.set_preset_mode(preset_mode).await {
            Err(DaikinError::Unsupported(_)) => {
                debug!(entity = %self.name, "Unit has no presets, ignoring");
                Ok(())
            }
            result => result,
        }
    }
}

#[async_trait]
impl Entity for DaikinClimate {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    fn state(&self) -> Option<String> {
        self.read().hvac_mode.map(|m| m.as_str().to_string())
    }

    fn attributes(&self) -> HashMap<String, Value> {
        let state = self.read();
        let mut attrs = HashMap::from([
            ("hvac_modes".to_string(), json!(self.hvac_modes)),
            ("min_temp".to_string(), json!(DEFAULT_MIN_TEMP)),
            ("max_temp".to_string(), json!(DEFAULT_MAX_TEMP)),
            ("current_temperature".to_string(), json!(state.current_temperature)),
            ("temperature".to_string(), json!(state.target_temperature)),
            ("supported_features".to_string(), json!(self.supported_features)),
        ]);

        if let Some(fan_modes) = &self.fan_modes {
            attrs.insert("fan_modes".to_string(), json!(fan_modes));
            attrs.insert("fan_mode".to_string(), json!(state.fan_mode));
        }
        if self.supported_features.contains(ClimateEntityFeature::SWING_MODE) {
            attrs.insert("swing_modes".to_string(), json!(self.swing_modes));
            attrs.insert("swing_mode".to_string(), json!(state.swing_mode));
        }
        if self.supported_features.contains(ClimateEntityFeature::PRESET_MODE) {
            attrs.insert("preset_modes".to_string(), json!(self.preset_modes));
            attrs.insert("preset_mode".to_string(), json!(state.preset_mode));
        }

        attrs.extend(state.extra.clone());
        attrs
    }

    async fn async_update(&self) -> DaikinResult<()> {
        self.api.update_status().await?;

        let api = &self.api;
        let hvac_mode = match (api.power(), api.mode()) {
            (Some(true), Some(mode)) => HvacMode::from_daikin(&mode).unwrap_or(HvacMode::Auto),
            _ => HvacMode::Off,
        };

        let mut extra = HashMap::new();
        if let Some(inside) = api.inside_temperature() {
            extra.insert(ATTR_INSIDE_TEMPERATURE.to_string(), json!(inside));
        }
        if let Some(outside) = api.outside_temperature() {
            extra.insert(ATTR_OUTSIDE_TEMPERATURE.to_string(), json!(outside));
        }

        let refreshed = ClimateState {
            current_temperature: api.inside_temperature(),
            target_temperature: api.target_temperature(),
            hvac_mode: Some(hvac_mode),
            fan_mode: api.fan_rate(),
            swing_mode: api.swing_mode(),
            preset_mode: api.preset_mode(),
            extra,
        };

        *self.state.write().unwrap_or_else(|e| e.into_inner()) = refreshed;
        Ok(())
    }
}

/// Create the climate entity for the unit behind `entry`
pub async fn async_setup_entry(
    hass: &Hass,
    entry: &ConfigEntry,
    platform: &Arc<EntityPlatform>,
) -> SetupResult<()> {
    let api = hass
        .client(&entry.entry_id)
        .ok_or_else(|| SetupError::MissingClient(entry.entry_id.clone()))?;

    let climate = Arc::new(DaikinClimate::new(api));
    let entity_ids = platform
        .add_entities(vec![climate.clone() as Arc<dyn Entity>], true)
        .await;

    for entity_id in entity_ids {
        hass.register_climate(&entity_id, climate.clone(), platform.clone());
    }
    Ok(())
}
