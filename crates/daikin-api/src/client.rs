//! Daikin client traits
//!
//! Defines the interface for a connected Daikin unit. The implementation
//! is provided externally; the integration only talks to these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{DaikinError, DaikinResult};
use crate::values::Values;

/// Host and credentials for a connection attempt
///
/// BRP072C units need `key` together with a client `uuid`; SKYFi units use
/// `password`; older BRP069 units need neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// Hostname or IP address of the unit
    pub host: String,
    /// API key printed on the adapter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Client UUID registered alongside the key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Adapter password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ConnectOptions {
    /// Create options for a host without credentials
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Set the API key and client UUID
    pub fn with_key(mut self, key: impl Into<String>, uuid: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self.uuid = Some(uuid.into());
        self
    }

    /// Set the adapter password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// Factory that detects the adapter type and opens a session
#[async_trait]
pub trait DaikinConnector: Send + Sync {
    /// Connect to a unit and fetch its initial status
    async fn connect(&self, options: &ConnectOptions) -> DaikinResult<Arc<dyn DaikinApi>>;
}

/// A connected Daikin unit
///
/// Getters reflect the last status fetched by [`DaikinApi::update_status`].
/// An accessor returning `None` means the unit does not expose that
/// attribute.
#[async_trait]
pub trait DaikinApi: Send + Sync {
    /// MAC address of the adapter
    fn mac(&self) -> String;

    /// Name configured on the unit
    fn name(&self) -> String;

    /// Model string, if reported
    fn model(&self) -> Option<String> {
        None
    }

    /// Adapter firmware version, if reported
    fn firmware_version(&self) -> Option<String> {
        None
    }

    /// Operating modes in the unit's vocabulary (`auto`, `cool`, `heat`, ...)
    fn available_modes(&self) -> Vec<String>;

    /// Supported fan rates
    fn fan_modes(&self) -> Option<Vec<String>> {
        None
    }

    /// Supported swing settings
    fn swing_modes(&self) -> Option<Vec<String>> {
        None
    }

    /// Supported presets (away, eco, boost, ...)
    fn preset_modes(&self) -> Option<Vec<String>> {
        None
    }

    /// Whether the unit is powered on
    fn power(&self) -> Option<bool>;

    /// Current operating mode in the unit's vocabulary
    fn mode(&self) -> Option<String>;

    /// Indoor temperature in degrees Celsius
    fn inside_temperature(&self) -> Option<f64> {
        None
    }

    /// Outdoor temperature in degrees Celsius
    fn outside_temperature(&self) -> Option<f64> {
        None
    }

    /// Target temperature in degrees Celsius
    fn target_temperature(&self) -> Option<f64> {
        None
    }

    /// Current fan rate
    fn fan_rate(&self) -> Option<String> {
        None
    }

    /// Current swing setting
    fn swing_mode(&self) -> Option<String> {
        None
    }

    /// Current preset
    fn preset_mode(&self) -> Option<String> {
        None
    }

    /// Named numeric attribute computed by the client
    ///
    /// Covers derived readings like `current_total_power` or
    /// `daily_cool_energy` that have no single raw key.
    fn attribute(&self, _key: &str) -> Option<f64> {
        None
    }

    /// Whether the client computes the named attribute at all
    ///
    /// Distinct from [`DaikinApi::attribute`] returning `Some`: a supported
    /// attribute can still be empty before the first status fetch.
    fn has_attribute(&self, key: &str) -> bool {
        self.attribute(key).is_some()
    }

    /// Raw values from the last status fetch
    fn values(&self) -> Values;

    /// Refresh the status from the unit
    async fn update_status(&self) -> DaikinResult<()>;

    /// Switch the unit on or off
    async fn set_power(&self, on: bool) -> DaikinResult<()>;

    /// Change the operating mode
    async fn set_mode(&self, mode: &str) -> DaikinResult<()>;

    /// Change the target temperature
    async fn set_target_temperature(&self, temperature: f64) -> DaikinResult<()>;

    /// Change the fan rate
    async fn set_fan_rate(&self, fan_rate: &str) -> DaikinResult<()>;

    /// Change the swing setting
    async fn set_swing_mode(&self, _swing_mode: &str) -> DaikinResult<()> {
        Err(DaikinError::Unsupported("set_swing_mode"))
    }

    /// Change the preset
    async fn set_preset_mode(&self, _preset_mode: &str) -> DaikinResult<()> {
        Err(DaikinError::Unsupported("set_preset_mode"))
    }
}
