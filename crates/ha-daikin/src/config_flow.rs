//! Config flow for Daikin units
//!
//! The setup wizard asks for a host and optional credentials, connects to
//! the unit to learn its MAC address and creates a config entry keyed by
//! that address. [`FlowManager`] keeps in-progress flows between steps.

use daikin_api::{ConnectOptions, DaikinConnector, DaikinError};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::DaikinEntryData;
use crate::consts::{CONF_API_KEY, CONF_HOST, CONF_PASSWORD, DOMAIN, TIMEOUT};
use crate::entries::{ConfigEntries, ConfigEntriesError};
use crate::entry::{ConfigEntry, ConfigEntrySource};

/// Step id of the setup form
pub const STEP_USER: &str = "user";

/// Form error: api key and password are mutually exclusive
pub const ERROR_API_PASSWORD: &str = "api_password";
/// Form error: the unit did not answer in time
pub const ERROR_CANNOT_CONNECT: &str = "cannot_connect";
/// Form error: anything else went wrong while connecting
pub const ERROR_UNKNOWN: &str = "unknown";
/// Abort reason: an entry for this unit exists
pub const ABORT_ALREADY_CONFIGURED: &str = "already_configured";

/// Form field schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FormField {
    fn string(name: &str, required: bool, default: Option<Value>) -> Self {
        Self {
            name: name.to_string(),
            field_type: "string".to_string(),
            required: Some(required),
            default,
        }
    }
}

/// Outcome of one flow step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowStep {
    /// Show (or re-show) a form
    Form {
        step_id: String,
        data_schema: Vec<FormField>,
        errors: Option<HashMap<String, String>>,
    },
    /// Finish the flow with a new config entry
    CreateEntry {
        title: String,
        data: HashMap<String, Value>,
        version: u32,
    },
    /// Finish the flow without an entry
    Abort { reason: String },
}

impl FlowStep {
    /// Form error for the `base` field, if any
    pub fn base_error(&self) -> Option<&str> {
        match self {
            FlowStep::Form {
                errors: Some(errors),
                ..
            } => errors.get("base").map(String::as_str),
            _ => None,
        }
    }
}

/// Result of a flow step as reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowResult {
    pub flow_id: String,
    /// Integration domain
    pub handler: String,
    #[serde(flatten)]
    pub step: FlowStep,
    /// Id of the entry a `create_entry` step added
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
}

/// Flow errors
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Flow not found: {0}")]
    UnknownFlow(String),

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error(transparent)]
    Entries(#[from] ConfigEntriesError),
}

pub type FlowResultOf<T> = Result<T, FlowError>;

/// Non-empty string value from flow input
fn text(input: &HashMap<String, Value>, key: &str) -> Option<String> {
    input
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Setup wizard for one Daikin unit
pub struct DaikinFlowHandler {
    connector: Arc<dyn DaikinConnector>,
    entries: Arc<ConfigEntries>,
    timeout: Duration,
    /// Host remembered as the form default
    host: Option<String>,
    unique_id: Option<String>,
    source: ConfigEntrySource,
}

impl DaikinFlowHandler {
    pub const VERSION: u32 = 1;

    pub fn new(connector: Arc<dyn DaikinConnector>, entries: Arc<ConfigEntries>) -> Self {
        Self {
            connector,
            entries,
            timeout: TIMEOUT,
            host: None,
            unique_id: None,
            source: ConfigEntrySource::User,
        }
    }

    /// Override the connect timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    pub fn source(&self) -> ConfigEntrySource {
        self.source
    }

    /// Current form schema; the host default is the remembered host
    pub fn schema(&self) -> Vec<FormField> {
        vec![
            FormField::string(CONF_HOST, true, self.host.as_ref().map(|h| json!(h))),
            FormField::string(CONF_API_KEY, false, None),
            FormField::string(CONF_PASSWORD, false, None),
        ]
    }

    fn show_form(&self, error: Option<&str>) -> FlowStep {
        FlowStep::Form {
            step_id: STEP_USER.to_string(),
            data_schema: self.schema(),
            errors: error.map(|e| HashMap::from([("base".to_string(), e.to_string())])),
        }
    }

    /// User initiated step
    pub async fn async_step_user(
        &mut self,
        user_input: Option<HashMap<String, Value>>,
    ) -> FlowResultOf<FlowStep> {
        let Some(input) = user_input else {
            return Ok(self.show_form(None));
        };

        let host = input
            .get(CONF_HOST)
            .and_then(Value::as_str)
            .ok_or(FlowError::MissingField(CONF_HOST))?
            .to_string();
        let key = text(&input, CONF_API_KEY);
        let password = text(&input, CONF_PASSWORD);

        if key.is_some() && password.is_some() {
            self.host = Some(host);
            return Ok(self.show_form(Some(ERROR_API_PASSWORD)));
        }

        Ok(self.create_device(host, key, password).await)
    }

    /// Step for a unit declared in the YAML domain block
    pub async fn async_step_import(
        &mut self,
        import_input: HashMap<String, Value>,
    ) -> FlowResultOf<FlowStep> {
        self.source = ConfigEntrySource::Import;

        let host = text(&import_input, CONF_HOST).ok_or(FlowError::MissingField(CONF_HOST))?;
        let key = text(&import_input, CONF_API_KEY);
        let password = text(&import_input, CONF_PASSWORD);

        if key.is_some() && password.is_some() {
            warn!(host = %host, "Imported Daikin unit sets both api_key and password");
            return Ok(FlowStep::Abort {
                reason: ERROR_API_PASSWORD.to_string(),
            });
        }

        // Imports cannot re-show a form
        let step = self.create_device(host.clone(), key, password).await;
        if let Some(error) = step.base_error() {
            warn!(host = %host, error, "Could not import Daikin unit");
            return Ok(FlowStep::Abort {
                reason: error.to_string(),
            });
        }
        Ok(step)
    }

    /// Connect to the unit and turn the outcome into a flow step
    async fn create_device(
        &mut self,
        host: String,
        key: Option<String>,
        password: Option<String>,
    ) -> FlowStep {
        // BRP072C adapters need a client uuid together with the key
        let uuid = key.as_ref().map(|_| uuid::Uuid::new_v4().to_string());

        let options = ConnectOptions {
            host: host.clone(),
            key: key.clone(),
            uuid: uuid.clone(),
            password: password.clone(),
        };

        let connected = match tokio::time::timeout(self.timeout, self.connector.connect(&options)).await {
            Ok(result) => result,
            Err(_) => Err(DaikinError::Timeout),
        };

        let device = match connected {
            Ok(device) => device,
            Err(err) if err.is_timeout() => {
                debug!(host = %host, "Timed out connecting to Daikin unit");
                self.host = None;
                return self.show_form(Some(ERROR_CANNOT_CONNECT));
            }
            Err(err) => {
                error!("Error connecting to Daikin device: {}", err);
                return self.show_form(Some(ERROR_UNKNOWN));
            }
        };

        let data = DaikinEntryData {
            host,
            mac: Some(device.mac()),
            api_key: key,
            uuid,
            password,
        };
        self.create_entry(data)
    }

    fn create_entry(&mut self, data: DaikinEntryData) -> FlowStep {
        if self.unique_id.is_none() {
            self.unique_id = data.mac.clone();
        }

        if let Some(ref unique_id) = self.unique_id {
            if self.entries.is_configured(DOMAIN, unique_id) {
                debug!(unique_id = %unique_id, "Daikin unit already configured");
                return FlowStep::Abort {
                    reason: ABORT_ALREADY_CONFIGURED.to_string(),
                };
            }
        }

        FlowStep::CreateEntry {
            title: data.host.clone(),
            data: data.to_data(),
            version: Self::VERSION,
        }
    }
}

/// How a flow was started
#[derive(Debug, Clone)]
pub enum FlowInit {
    User(Option<HashMap<String, Value>>),
    Import(HashMap<String, Value>),
}

/// In-progress config flows
pub struct FlowManager {
    connector: Arc<dyn DaikinConnector>,
    entries: Arc<ConfigEntries>,
    timeout: Duration,
    flows: DashMap<String, DaikinFlowHandler>,
}

impl FlowManager {
    pub fn new(connector: Arc<dyn DaikinConnector>, entries: Arc<ConfigEntries>) -> Self {
        Self {
            connector,
            entries,
            timeout: TIMEOUT,
            flows: DashMap::new(),
        }
    }

    /// Override the connect timeout of new flows
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Start a flow and run its first step
    pub async fn init(&self, init: FlowInit) -> FlowResultOf<FlowResult> {
        let flow_id = ulid::Ulid::new().to_string();
        let mut handler =
            DaikinFlowHandler::new(self.connector.clone(), self.entries.clone())
                .with_timeout(self.timeout);

        debug!(flow_id = %flow_id, "Starting Daikin config flow");
        let step = match init {
            FlowInit::User(input) => handler.async_step_user(input).await?,
            FlowInit::Import(input) => handler.async_step_import(input).await?,
        };
        self.finish_step(flow_id, handler, step)
    }

    /// Submit input to a flow waiting on a form
    pub async fn configure(
        &self,
        flow_id: &str,
        user_input: HashMap<String, Value>,
    ) -> FlowResultOf<FlowResult> {
        // Taken out for the step so no map guard is held across the connect.
        let (flow_id, mut handler) = self
            .flows
            .remove(flow_id)
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;

        let step = match handler.async_step_user(Some(user_input)).await {
            Ok(step) => step,
            Err(err) => {
                self.flows.insert(flow_id, handler);
                return Err(err);
            }
        };
        self.finish_step(flow_id, handler, step)
    }

    /// Drop a flow without finishing it
    pub fn abort(&self, flow_id: &str) -> FlowResultOf<()> {
        self.flows
            .remove(flow_id)
            .map(|_| ())
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))
    }

    pub fn in_progress(&self) -> Vec<String> {
        self.flows.iter().map(|r| r.key().clone()).collect()
    }

    fn finish_step(
        &self,
        flow_id: String,
        handler: DaikinFlowHandler,
        step: FlowStep,
    ) -> FlowResultOf<FlowResult> {
        let mut entry_id = None;
        let mut step = step;

        match &step {
            FlowStep::Form { .. } => {
                self.flows.insert(flow_id.clone(), handler);
            }
            FlowStep::CreateEntry {
                title,
                data,
                version,
            } => {
                let mut entry = ConfigEntry::new(DOMAIN, title.clone())
                    .with_data(data.clone())
                    .with_source(handler.source());
                entry.version = *version;
                if let Some(unique_id) = handler.unique_id() {
                    entry = entry.with_unique_id(unique_id);
                }

                match self.entries.add(entry) {
                    Ok(entry) => {
                        info!(flow_id = %flow_id, entry_id = %entry.entry_id, "Config flow created entry");
                        entry_id = Some(entry.entry_id);
                    }
                    // Another flow for the same unit finished first
                    Err(ConfigEntriesError::AlreadyExists { .. }) => {
                        step = FlowStep::Abort {
                            reason: ABORT_ALREADY_CONFIGURED.to_string(),
                        };
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            FlowStep::Abort { reason } => {
                debug!(flow_id = %flow_id, reason = %reason, "Config flow aborted");
            }
        }

        Ok(FlowResult {
            flow_id,
            handler: DOMAIN.to_string(),
            step,
            entry_id,
        })
    }
}
