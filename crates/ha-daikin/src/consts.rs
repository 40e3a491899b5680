//! Constants for the Daikin integration

use std::time::Duration;

/// Integration domain
pub const DOMAIN: &str = "custom_daikin";

/// Manufacturer reported in device info
pub const MANUFACTURER: &str = "Daikin";

/// Model reported when the unit does not expose one
pub const DEFAULT_MODEL: &str = "Unknown";

/// How long the config flow waits for a unit to answer
pub const TIMEOUT: Duration = Duration::from_secs(60);

/// Default polling interval for entities
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

// Config entry keys
pub const CONF_HOST: &str = "host";
pub const CONF_API_KEY: &str = "api_key";
pub const CONF_PASSWORD: &str = "password";
pub const CONF_UUID: &str = "uuid";
pub const CONF_SCAN_INTERVAL: &str = "scan_interval";
pub const KEY_MAC: &str = "mac";

// Extra state attributes / sensor types
pub const ATTR_INSIDE_TEMPERATURE: &str = "inside_temperature";
pub const ATTR_OUTSIDE_TEMPERATURE: &str = "outside_temperature";
pub const ATTR_HUMIDITY: &str = "humidity";
pub const ATTR_COMPRESSOR_FREQUENCY: &str = "compressor_frequency";
pub const ATTR_COOL_ENERGY: &str = "cool_energy";
pub const ATTR_HEAT_ENERGY: &str = "heat_energy";
pub const ATTR_DAILY_COOL_ENERGY: &str = "daily_cool_energy";
pub const ATTR_DAILY_HEAT_ENERGY: &str = "daily_heat_energy";
pub const ATTR_CURRENT_TOTAL_POWER: &str = "current_total_power";
pub const ATTR_CURRENT_COOL_POWER: &str = "current_cool_power";
pub const ATTR_CURRENT_HEAT_POWER: &str = "current_heat_power";

// Raw unit keys
pub const KEY_INSIDE_TEMPERATURE: &str = "htemp";
pub const KEY_OUTSIDE_TEMPERATURE: &str = "otemp";
pub const KEY_HUMIDITY: &str = "shum";
pub const KEY_COMPRESSOR_FREQUENCY: &str = "cmpfreq";
pub const KEY_COOL_ENERGY: &str = "cool_energy";
pub const KEY_HEAT_ENERGY: &str = "heat_energy";
pub const KEY_DAILY_COOL_ENERGY: &str = "daily_cool_energy";
pub const KEY_DAILY_HEAT_ENERGY: &str = "daily_heat_energy";
pub const KEY_CURRENT_TOTAL_POWER: &str = "current_total_power";
pub const KEY_CURRENT_COOL_POWER: &str = "current_cool_power";
pub const KEY_CURRENT_HEAT_POWER: &str = "current_heat_power";

// Units
pub const UNIT_CELSIUS: &str = "°C";
pub const UNIT_PERCENTAGE: &str = "%";
pub const UNIT_KILO_WATT: &str = "kW";
pub const UNIT_KILO_WATT_HOUR: &str = "kWh";
pub const UNIT_HERTZ: &str = "Hz";

/// Entity platforms this integration forwards to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Climate,
    Sensor,
}

impl Platform {
    /// Entity domain of the platform
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Climate => "climate",
            Platform::Sensor => "sensor",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platforms set up for every config entry, in order
pub const PLATFORMS: [Platform; 2] = [Platform::Climate, Platform::Sensor];
