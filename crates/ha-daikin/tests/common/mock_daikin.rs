//! Mock Daikin unit for testing
//!
//! A configurable [`DaikinApi`] that keeps its state in memory and records
//! every command it receives.

use async_trait::async_trait;
use daikin_api::{DaikinApi, DaikinError, DaikinResult, Values};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
struct UnitState {
    power: Option<bool>,
    mode: Option<String>,
    inside_temperature: Option<f64>,
    outside_temperature: Option<f64>,
    target_temperature: Option<f64>,
    fan_rate: Option<String>,
    swing_mode: Option<String>,
    preset_mode: Option<String>,
    attributes: HashMap<String, f64>,
    values: Values,
    fail_updates: bool,
}

/// A mock Daikin unit
#[derive(Debug)]
pub struct MockDaikin {
    mac: String,
    name: String,
    model: Option<String>,
    firmware_version: Option<String>,
    available_modes: Vec<String>,
    fan_modes: Option<Vec<String>>,
    swing_modes: Option<Vec<String>>,
    preset_modes: Option<Vec<String>>,
    state: Mutex<UnitState>,
    commands: Mutex<Vec<String>>,
    updates: Mutex<usize>,
}

impl MockDaikin {
    /// A powered-off unit offering auto/cool/heat/dry/fan_only and fan rates
    pub fn new(mac: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            name: name.into(),
            model: None,
            firmware_version: None,
            available_modes: ["auto", "cool", "heat", "dry", "fan_only"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            fan_modes: Some(vec!["auto".to_string(), "silence".to_string(), "3".to_string()]),
            swing_modes: None,
            preset_modes: None,
            state: Mutex::new(UnitState {
                power: Some(false),
                mode: Some("cool".to_string()),
                fan_rate: Some("auto".to_string()),
                ..Default::default()
            }),
            commands: Mutex::new(Vec::new()),
            updates: Mutex::new(0),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_firmware(mut self, version: impl Into<String>) -> Self {
        self.firmware_version = Some(version.into());
        self
    }

    /// Set the modes in the unit's vocabulary
    pub fn with_modes(mut self, modes: &[&str]) -> Self {
        self.available_modes = modes.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn without_fan_modes(mut self) -> Self {
        self.fan_modes = None;
        self
    }

    /// Give the unit swing control
    pub fn with_swing_modes(mut self, modes: &[&str]) -> Self {
        self.swing_modes = Some(modes.iter().map(|m| m.to_string()).collect());
        self
    }

    /// Give the unit presets
    pub fn with_preset_modes(mut self, modes: &[&str]) -> Self {
        self.preset_modes = Some(modes.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn with_power(self, on: bool) -> Self {
        self.lock().power = Some(on);
        self
    }

    pub fn with_mode(self, mode: &str) -> Self {
        self.lock().mode = Some(mode.to_string());
        self
    }

    /// Set inside, outside and target temperatures
    pub fn with_temperatures(self, inside: f64, outside: f64, target: f64) -> Self {
        {
            let mut state = self.lock();
            state.inside_temperature = Some(inside);
            state.outside_temperature = Some(outside);
            state.target_temperature = Some(target);
        }
        self
    }

    /// Set a raw value reported by the unit
    pub fn with_value(self, key: &str, value: &str) -> Self {
        self.lock().values.insert(key, value);
        self
    }

    /// Set a named attribute computed by the client
    pub fn with_attribute(self, key: &str, value: f64) -> Self {
        self.lock().attributes.insert(key.to_string(), value);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, UnitState> {
        self.state.lock().unwrap()
    }

    fn record(&self, command: String) {
        self.commands.lock().unwrap().push(command);
    }

    /// Make status refreshes fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.lock().fail_updates = failing;
    }

    /// Change a raw value as if the unit reported it
    pub fn set_value(&self, key: &str, value: &str) {
        self.lock().values.insert(key, value);
    }

    pub fn set_inside_temperature(&self, temperature: f64) {
        self.lock().inside_temperature = Some(temperature);
    }

    /// Commands received so far, e.g. `set_power(true)`
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Number of status refreshes so far
    pub fn update_count(&self) -> usize {
        *self.updates.lock().unwrap()
    }
}

#[async_trait]
impl DaikinApi for MockDaikin {
    fn mac(&self) -> String {
        self.mac.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn model(&self) -> Option<String> {
        self.model.clone()
    }

    fn firmware_version(&self) -> Option<String> {
        self.firmware_version.clone()
    }

    fn available_modes(&self) -> Vec<String> {
        self.available_modes.clone()
    }

    fn fan_modes(&self) -> Option<Vec<String>> {
        self.fan_modes.clone()
    }

    fn swing_modes(&self) -> Option<Vec<String>> {
        self.swing_modes.clone()
    }

    fn preset_modes(&self) -> Option<Vec<String>> {
        self.preset_modes.clone()
    }

    fn power(&self) -> Option<bool> {
        self.lock().power
    }

    fn mode(&self) -> Option<String> {
        self.lock().mode.clone()
    }

    fn inside_temperature(&self) -> Option<f64> {
        self.lock().inside_temperature
    }

    fn outside_temperature(&self) -> Option<f64> {
        self.lock().outside_temperature
    }

    fn target_temperature(&self) -> Option<f64> {
        self.lock().target_temperature
    }

    fn fan_rate(&self) -> Option<String> {
        self.lock().fan_rate.clone()
    }

    fn swing_mode(&self) -> Option<String> {
        self.lock().swing_mode.clone()
    }

    fn preset_mode(&self) -> Option<String> {
        self.lock().preset_mode.clone()
    }

    fn attribute(&self, key: &str) -> Option<f64> {
        self.lock().attributes.get(key).copied()
    }

    fn values(&self) -> Values {
        self.lock().values.clone()
    }

    async fn update_status(&self) -> DaikinResult<()> {
        *self.updates.lock().unwrap() += 1;
        if self.lock().fail_updates {
            return Err(DaikinError::Connection("unit did not answer".to_string()));
        }
        Ok(())
    }

    async fn set_power(&self, on: bool) -> DaikinResult<()> {
        self.record(format!("set_power({})", on));
        self.lock().power = Some(on);
        Ok(())
    }

    async fn set_mode(&self, mode: &str) -> DaikinResult<()> {
        self.record(format!("set_mode({})", mode));
        self.lock().mode = Some(mode.to_string());
        Ok(())
    }

    async fn set_target_temperature(&self, temperature: f64) -> DaikinResult<()> {
        self.record(format!("set_target_temperature({})", temperature));
        self.lock().target_temperature = Some(temperature);
        Ok(())
    }

    async fn set_fan_rate(&self, fan_rate: &str) -> DaikinResult<()> {
        self.record(format!("set_fan_rate({})", fan_rate));
        self.lock().fan_rate = Some(fan_rate.to_string());
        Ok(())
    }

    async fn set_swing_mode(&self, swing_mode: &str) -> DaikinResult<()> {
        if self.swing_modes.is_none() {
            return Err(DaikinError::Unsupported("set_swing_mode"));
        }
        self.record(format!("set_swing_mode({})", swing_mode));
        self.lock().swing_mode = Some(swing_mode.to_string());
        Ok(())
    }

    async fn set_preset_mode(&self, preset_mode: &str) -> DaikinResult<()> {
        if self.preset_modes.is_none() {
            return Err(DaikinError::Unsupported("set_preset_mode"));
        }
        self.record(format!("set_preset_mode({})", preset_mode));
        self.lock().preset_mode = Some(preset_mode.to_string());
        Ok(())
    }
}
