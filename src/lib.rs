//! Client for the OpenEMS backend JSON-RPC API
//!
//! [`OpenEmsClient`] exposes blocking methods backed by the async [`EmsApi`].
//! The [`RuntimeBridge`] underneath runs each async call on a runtime it owns,
//! or on a dispatch worker when the caller is already inside a runtime.

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use client::{EmsApi, OpenEmsClient};
pub use config::ClientSettings;
pub use domain::{ComponentConfig, ConfigProperty, Edge, EdgeConfig, TimeSeries, TimeseriesQuery};
pub use error::{Error, Result};
pub use infrastructure::runtime::{BridgeError, DispatchPool, PendingCall, RuntimeBridge};
