//! Common test utilities for the Daikin integration
//!
//! Provides a scriptable Daikin unit, a connector that hands it out (or
//! fails on demand) and helpers to build a ready-to-use [`Hass`].

#![allow(dead_code)]

mod mock_connector;
mod mock_daikin;

pub use mock_connector::*;
pub use mock_daikin::*;

use ha_daikin::{ConfigEntry, Hass, DOMAIN};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Route integration logs to the test output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ha_daikin=debug")
        .with_test_writer()
        .try_init();
}

/// A Hass wired to the given connector
pub fn test_hass(connector: Arc<MockConnector>) -> Arc<Hass> {
    init_tracing();
    Arc::new(Hass::new(connector))
}

/// Flow input with only a host
pub fn host_input(host: &str) -> HashMap<String, Value> {
    HashMap::from([("host".to_string(), json!(host))])
}

/// Flow input from (key, value) pairs
pub fn flow_input(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect()
}

/// A config entry the way the config flow writes it
pub fn daikin_entry(host: &str, mac: &str) -> ConfigEntry {
    let data = HashMap::from([
        ("host".to_string(), json!(host)),
        ("mac".to_string(), json!(mac)),
        ("api_key".to_string(), Value::Null),
        ("uuid".to_string(), Value::Null),
        ("password".to_string(), Value::Null),
    ]);
    ConfigEntry::new(DOMAIN, host)
        .with_data(data)
        .with_unique_id(mac)
}

/// Add an entry for a unit and set it up
pub async fn setup_unit(hass: &Arc<Hass>, host: &str, mac: &str) -> String {
    let entry = hass
        .config_entries()
        .add(daikin_entry(host, mac))
        .expect("entry should be added");
    hass.setup_config_entry(&entry.entry_id)
        .await
        .expect("entry should set up");
    entry.entry_id
}

/// Assert an entity's state value
pub fn assert_state(hass: &Hass, entity_id: &str, expected: &str) {
    let state = hass.states().get(entity_id).map(|s| s.state);
    assert_eq!(
        state.as_deref(),
        Some(expected),
        "Expected entity {} to be in state '{}', but was {:?}",
        entity_id,
        expected,
        state
    );
}
