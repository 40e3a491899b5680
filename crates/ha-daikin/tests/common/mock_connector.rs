//! Mock connector for testing
//!
//! Hands out a [`MockDaikin`] per host, or fails the way a real adapter
//! would. Every connection attempt is recorded.

use async_trait::async_trait;
use daikin_api::{ConnectOptions, DaikinApi, DaikinConnector, DaikinError, DaikinResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::MockDaikin;

/// What a connection attempt to a host does
#[derive(Debug, Clone)]
pub enum ConnectBehavior {
    /// Connect to this unit
    Unit(Arc<MockDaikin>),
    /// Fail with this error
    Fail(DaikinError),
    /// Never answer
    Hang,
}

/// A mock connector
#[derive(Debug, Default)]
pub struct MockConnector {
    hosts: Mutex<HashMap<String, ConnectBehavior>>,
    attempts: Mutex<Vec<ConnectOptions>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a unit on a host
    pub fn with_unit(self, host: &str, unit: Arc<MockDaikin>) -> Self {
        self.set_behavior(host, ConnectBehavior::Unit(unit));
        self
    }

    /// Fail every attempt on a host
    pub fn with_failure(self, host: &str, error: DaikinError) -> Self {
        self.set_behavior(host, ConnectBehavior::Fail(error));
        self
    }

    /// Never answer on a host
    pub fn with_hang(self, host: &str) -> Self {
        self.set_behavior(host, ConnectBehavior::Hang);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Change what later attempts on a host do
    pub fn set_behavior(&self, host: &str, behavior: ConnectBehavior) {
        self.hosts
            .lock()
            .unwrap()
            .insert(host.to_string(), behavior);
    }

    /// Options of every attempt so far
    pub fn attempts(&self) -> Vec<ConnectOptions> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl DaikinConnector for MockConnector {
    async fn connect(&self, options: &ConnectOptions) -> DaikinResult<Arc<dyn DaikinApi>> {
        self.attempts.lock().unwrap().push(options.clone());

        let behavior = self.hosts.lock().unwrap().get(&options.host).cloned();
        match behavior {
            Some(ConnectBehavior::Unit(unit)) => Ok(unit as Arc<dyn DaikinApi>),
            Some(ConnectBehavior::Fail(err)) => Err(err),
            Some(ConnectBehavior::Hang) => std::future::pending().await,
            None => Err(DaikinError::Connection(format!(
                "no route to host {}",
                options.host
            ))),
        }
    }
}
