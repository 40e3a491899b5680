//! Config entries for configured Daikin units
//!
//! A [`ConfigEntry`] is the persisted record of one configured unit. Its
//! lifecycle is a small state machine:
//!
//! ```text
//! NotLoaded → SetupInProgress → Loaded
//!                            ↘ SetupError → SetupInProgress
//!                            ↘ SetupRetry → SetupInProgress
//!                            ↘ MigrationError (terminal)
//!
//! Loaded/SetupError/SetupRetry → UnloadInProgress → NotLoaded
//!                                                 ↘ FailedUnload (terminal)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Lifecycle state of a config entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    #[default]
    NotLoaded,
    SetupInProgress,
    Loaded,
    SetupError,
    SetupRetry,
    MigrationError,
    UnloadInProgress,
    FailedUnload,
}

/// Rejected lifecycle transition
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot move config entry from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
}

impl ConfigEntryState {
    /// Whether unload (and therefore reload) is allowed from this state
    pub fn is_recoverable(self) -> bool {
        use ConfigEntryState::*;
        matches!(self, NotLoaded | Loaded | SetupError | SetupRetry)
    }

    /// Check a transition against the lifecycle graph
    pub fn can_transition_to(self, to: ConfigEntryState) -> bool {
        use ConfigEntryState::*;
        match self {
            NotLoaded => to == SetupInProgress,
            SetupInProgress => matches!(to, Loaded | SetupError | SetupRetry | MigrationError),
            SetupError | SetupRetry => matches!(to, SetupInProgress | UnloadInProgress),
            Loaded => to == UnloadInProgress,
            UnloadInProgress => matches!(to, NotLoaded | FailedUnload),
            MigrationError | FailedUnload => false,
        }
    }

    /// Perform a checked transition
    pub fn try_transition(self, to: ConfigEntryState) -> Result<ConfigEntryState, InvalidTransition> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }
}

/// Delay before the next setup attempt of an entry that was not ready
///
/// 5s, 10s, 20s, 40s, then 80s for every later attempt, plus up to 100ms
/// of jitter so entries that failed together do not retry together.
pub fn retry_delay(tries: u32) -> Duration {
    let base = Duration::from_secs(5 * 2_u64.pow(tries.min(4)));
    let jitter = Duration::from_millis(rand::random::<u64>() % 100);
    base + jitter
}

/// Where an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    /// Created through the setup wizard
    #[default]
    User,
    /// Imported from the YAML domain block
    Import,
}

/// A configured Daikin unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain
    pub domain: String,

    /// Display name (the unit's host)
    pub title: String,

    /// Connection data written by the config flow
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    /// User-tunable options
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,

    #[serde(default = "default_version")]
    pub version: u32,

    /// Adapter MAC address once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    #[serde(default)]
    pub source: ConfigEntrySource,

    /// Current lifecycle state (not persisted)
    #[serde(skip, default)]
    pub state: ConfigEntryState,

    /// Why the entry is in a failed state (not persisted)
    #[serde(skip, default)]
    pub reason: Option<String>,

    /// Consecutive setup attempts that ended in SetupRetry (not persisted)
    #[serde(skip, default)]
    pub tries: u32,

    /// Disable background polling of the entry's entities
    #[serde(default)]
    pub pref_disable_polling: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl ConfigEntry {
    /// Create a new entry in the NotLoaded state
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: HashMap::new(),
            options: HashMap::new(),
            version: 1,
            unique_id: None,
            source: ConfigEntrySource::User,
            state: ConfigEntryState::NotLoaded,
            reason: None,
            tries: 0,
            pref_disable_polling: false,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_options(mut self, options: HashMap<String, serde_json::Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn with_source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }

    /// String value from the entry data, treating null as absent
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Move to a new lifecycle state, recording why
    pub fn try_set_state(
        &mut self,
        new_state: ConfigEntryState,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.state = self.state.try_transition(new_state)?;
        self.reason = reason;

        if !matches!(
            new_state,
            ConfigEntryState::SetupRetry | ConfigEntryState::SetupInProgress
        ) {
            self.tries = 0;
        }
        Ok(())
    }
}
