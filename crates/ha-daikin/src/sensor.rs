//! Sensor platform for Daikin units
//!
//! Sensors are described by a static table. A sensor is created for every
//! description the unit can feed, either through a named attribute the
//! client computes or through a raw key in the unit's values.

use async_trait::async_trait;
use daikin_api::{DaikinApi, DaikinResult};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::consts::*;
use crate::entity::{DeviceInfo, Entity, EntityPlatform};
use crate::entry::ConfigEntry;
use crate::error::{SetupError, SetupResult};
use crate::hass::Hass;

/// Host device class of a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorDeviceClass {
    Temperature,
    Humidity,
    Frequency,
    Energy,
    Power,
}

/// Host state class of a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStateClass {
    Measurement,
    Total,
    TotalIncreasing,
}

/// How a raw unit value is parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Temperature,
    Humidity,
    Power,
    Energy,
    Frequency,
}

/// Static description of one sensor type
#[derive(Debug, Clone, Copy)]
pub struct SensorDescription {
    /// Sensor type, also the unique id suffix
    pub sensor_type: &'static str,
    /// Named client attribute or raw unit key feeding the sensor
    pub key: &'static str,
    pub name: &'static str,
    pub device_class: SensorDeviceClass,
    pub state_class: SensorStateClass,
    pub unit: &'static str,
    pub icon: &'static str,
    pub kind: SensorKind,
}

macro_rules! sensor {
    ($ty:expr, $key:expr, $name:expr, $class:ident, $state:ident, $unit:expr, $icon:expr, $kind:ident) => {
        SensorDescription {
            sensor_type: $ty,
            key: $key,
            name: $name,
            device_class: SensorDeviceClass::$class,
            state_class: SensorStateClass::$state,
            unit: $unit,
            icon: $icon,
            kind: SensorKind::$kind,
        }
    };
}

/// Every sensor the integration knows about
pub static SENSOR_TYPES: [SensorDescription; 11] = [
    sensor!(ATTR_INSIDE_TEMPERATURE, KEY_INSIDE_TEMPERATURE, "Inside Temperature",
        Temperature, Measurement, UNIT_CELSIUS, "mdi:thermometer", Temperature),
    sensor!(ATTR_OUTSIDE_TEMPERATURE, KEY_OUTSIDE_TEMPERATURE, "Outside Temperature",
        Temperature, Measurement, UNIT_CELSIUS, "mdi:thermometer", Temperature),
    sensor!(ATTR_HUMIDITY, KEY_HUMIDITY, "Humidity",
        Humidity, Measurement, UNIT_PERCENTAGE, "mdi:water-percent", Humidity),
    sensor!(ATTR_COMPRESSOR_FREQUENCY, KEY_COMPRESSOR_FREQUENCY, "Compressor Frequency",
        Frequency, Measurement, UNIT_HERTZ, "mdi:sine-wave", Frequency),
    sensor!(ATTR_COOL_ENERGY, KEY_COOL_ENERGY, "Cool Energy Consumption",
        Energy, TotalIncreasing, UNIT_KILO_WATT_HOUR, "mdi:snowflake", Energy),
    sensor!(ATTR_HEAT_ENERGY, KEY_HEAT_ENERGY, "Heat Energy Consumption",
        Energy, TotalIncreasing, UNIT_KILO_WATT_HOUR, "mdi:fire", Energy),
    sensor!(ATTR_DAILY_COOL_ENERGY, KEY_DAILY_COOL_ENERGY, "Daily Cool Energy Consumption",
        Energy, Total, UNIT_KILO_WATT_HOUR, "mdi:snowflake", Energy),
    sensor!(ATTR_DAILY_HEAT_ENERGY, KEY_DAILY_HEAT_ENERGY, "Daily Heat Energy Consumption",
        Energy, Total, UNIT_KILO_WATT_HOUR, "mdi:fire", Energy),
    sensor!(ATTR_CURRENT_TOTAL_POWER, KEY_CURRENT_TOTAL_POWER, "Current Power Consumption",
        Power, Measurement, UNIT_KILO_WATT, "mdi:flash", Power),
    sensor!(ATTR_CURRENT_COOL_POWER, KEY_CURRENT_COOL_POWER, "Current Cool Power Consumption",
        Power, Measurement, UNIT_KILO_WATT, "mdi:snowflake", Power),
    sensor!(ATTR_CURRENT_HEAT_POWER, KEY_CURRENT_HEAT_POWER, "Current Heat Power Consumption",
        Power, Measurement, UNIT_KILO_WATT, "mdi:fire", Power),
];

/// Whether the unit can feed a sensor
pub fn is_supported(api: &dyn DaikinApi, description: &SensorDescription) -> bool {
    api.has_attribute(description.key) || api.values().contains_key(description.key)
}

/// Parsed sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Float(f64),
    Int(i64),
}

/// One reading of one Daikin unit
pub struct DaikinSensor {
    api: Arc<dyn DaikinApi>,
    description: &'static SensorDescription,
    unique_id: String,
    name: String,
    device_info: DeviceInfo,
    native_value: RwLock<Option<SensorValue>>,
}

impl DaikinSensor {
    pub fn new(api: Arc<dyn DaikinApi>, description: &'static SensorDescription) -> Self {
        Self {
            unique_id: format!("{}-{}", api.mac(), description.sensor_type),
            name: format!("{} {}", api.name(), description.name),
            device_info: DeviceInfo::for_unit(api.as_ref()),
            native_value: RwLock::new(None),
            description,
            api,
        }
    }

    pub fn description(&self) -> &'static SensorDescription {
        self.description
    }

    pub fn native_value(&self) -> Option<SensorValue> {
        *self.native_value.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Current reading: named attribute first, raw value second
    fn read_value(&self) -> Option<SensorValue> {
        let key = self.description.key;

        if self.api.has_attribute(key) {
            return self.api.attribute(key).map(SensorValue::Float);
        }

        let values = self.api.values();
        if !values.contains_key(key) {
            return None;
        }

        match self.description.kind {
            SensorKind::Humidity => values.parse_i64(key).map(SensorValue::Int),
            SensorKind::Temperature
            | SensorKind::Power
            | SensorKind::Energy
            | SensorKind::Frequency => values.parse_f64(key).map(SensorValue::Float),
        }
    }
}

#[async_trait]
impl Entity for DaikinSensor {
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
        self.native_value().map(|v| json!(v).to_string())
    }

    fn attributes(&self) -> HashMap<String, Value> {
        let d = self.description;
        HashMap::from([
            ("unit_of_measurement".to_string(), json!(d.unit)),
            ("device_class".to_string(), json!(d.device_class)),
            ("state_class".to_string(), json!(d.state_class)),
            ("icon".to_string(), json!(d.icon)),
        ])
    }

    async fn async_update(&self) -> DaikinResult<()> {
        self.api.update_status().await?;
        let value = self.read_value();
        *self.native_value.write().unwrap_or_else(|e| e.into_inner()) = value;
        Ok(())
    }
}

/// Create the sensors the unit behind `entry` can feed
pub async fn async_setup_entry(
    hass: &Hass,
    entry: &ConfigEntry,
    platform: &EntityPlatform,
) -> SetupResult<()> {
    let api = hass
        .client(&entry.entry_id)
        .ok_or_else(|| SetupError::MissingClient(entry.entry_id.clone()))?;

    let sensors: Vec<Arc<dyn Entity>> = SENSOR_TYPES
        .iter()
        .filter(|d| is_supported(api.as_ref(), d))
        .map(|d| Arc::new(DaikinSensor::new(api.clone(), d)) as Arc<dyn Entity>)
        .collect();

    debug!(entry = %entry.entry_id, count = sensors.len(), "Creating Daikin sensors");
    platform.add_entities(sensors, true).await;
    Ok(())
}
