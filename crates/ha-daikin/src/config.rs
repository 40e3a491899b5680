//! Typed views over entry data, entry options and the YAML domain block

use daikin_api::ConnectOptions;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::consts::{
    CONF_API_KEY, CONF_HOST, CONF_PASSWORD, CONF_SCAN_INTERVAL, CONF_UUID,
    DEFAULT_SCAN_INTERVAL, DOMAIN, KEY_MAC,
};
use crate::entry::ConfigEntry;
use crate::error::{ConfigError, ConfigResult};

/// Connection data stored in a Daikin config entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaikinEntryData {
    pub host: String,
    pub mac: Option<String>,
    pub api_key: Option<String>,
    pub uuid: Option<String>,
    pub password: Option<String>,
}

impl DaikinEntryData {
    /// Read the connection data from an entry
    pub fn from_entry(entry: &ConfigEntry) -> ConfigResult<Self> {
        let host = entry
            .data_str(CONF_HOST)
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingKey { key: CONF_HOST })?;

        let text = |key: &str| entry.data_str(key).map(str::to_string);

        Ok(Self {
            host: host.to_string(),
            mac: text(KEY_MAC),
            api_key: text(CONF_API_KEY),
            uuid: text(CONF_UUID),
            password: text(CONF_PASSWORD),
        })
    }

    /// Entry data map; absent values are written as null
    pub fn to_data(&self) -> HashMap<String, Value> {
        HashMap::from([
            (CONF_HOST.to_string(), json!(self.host)),
            (KEY_MAC.to_string(), json!(self.mac)),
            (CONF_API_KEY.to_string(), json!(self.api_key)),
            (CONF_UUID.to_string(), json!(self.uuid)),
            (CONF_PASSWORD.to_string(), json!(self.password)),
        ])
    }

    /// Options for the client connector
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            host: self.host.clone(),
            key: self.api_key.clone(),
            uuid: self.uuid.clone(),
            password: self.password.clone(),
        }
    }
}

/// User-tunable options of a Daikin entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaikinOptions {
    /// How often entities refresh from the unit
    pub scan_interval: Duration,
}

impl Default for DaikinOptions {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }
}

impl DaikinOptions {
    /// Read options from an entry, falling back to defaults
    pub fn from_entry(entry: &ConfigEntry) -> ConfigResult<Self> {
        let mut options = Self::default();

        if let Some(value) = entry.options.get(CONF_SCAN_INTERVAL) {
            let secs = value
                .as_u64()
                .filter(|s| *s > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: CONF_SCAN_INTERVAL.to_string(),
                    reason: format!("expected a positive number of seconds, got {}", value),
                })?;
            options.scan_interval = Duration::from_secs(secs);
        }

        Ok(options)
    }
}

/// One unit declared in the YAML domain block
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceConfig {
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl DeviceConfig {
    /// Flow input equivalent to this declaration
    pub fn to_flow_input(&self) -> HashMap<String, Value> {
        let mut input = HashMap::from([(CONF_HOST.to_string(), json!(self.host))]);
        if let Some(key) = &self.api_key {
            input.insert(CONF_API_KEY.to_string(), json!(key));
        }
        if let Some(password) = &self.password {
            input.insert(CONF_PASSWORD.to_string(), json!(password));
        }
        input
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DomainBlock {
    Many(Vec<DeviceConfig>),
    One(DeviceConfig),
}

/// Extract the units declared under the integration's domain key
///
/// ```yaml
/// custom_daikin:
///   - host: 192.168.1.20
///   - host: 192.168.1.21
///     api_key: "0123456789abcdef"
/// ```
///
/// A missing or empty domain block yields no units.
pub fn parse_domain_config(config: &serde_yaml::Value) -> ConfigResult<Vec<DeviceConfig>> {
    let block = match config.get(DOMAIN) {
        None | Some(serde_yaml::Value::Null) => return Ok(Vec::new()),
        Some(block) => block.clone(),
    };

    let parsed: DomainBlock = serde_yaml::from_value(block)
        .map_err(|source| ConfigError::ParseYaml { domain: DOMAIN, source })?;

    Ok(match parsed {
        DomainBlock::Many(devices) => devices,
        DomainBlock::One(device) => vec![device],
    })
}
