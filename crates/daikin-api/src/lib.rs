//! Daikin client boundary
//!
//! This crate defines the interface the integration expects from a Daikin
//! air-conditioner client. The client itself (network protocol, session and
//! authentication handling, unit-key parsing) lives outside this workspace
//! and is plugged in through [`DaikinConnector`].
//!
//! # Key Types
//!
//! - [`DaikinApi`] - A connected device session
//! - [`DaikinConnector`] - Factory that opens a session for a host
//! - [`ConnectOptions`] - Host and credentials for a connection attempt
//! - [`Values`] - Raw key/value snapshot reported by the unit

mod client;
mod error;
mod values;

pub use client::{ConnectOptions, DaikinApi, DaikinConnector};
pub use error::{DaikinError, DaikinResult};
pub use values::Values;
