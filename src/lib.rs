//! # Network Telemetry
//!
//! Live interface counters for a registry of simulated devices, served
//! through ONCE / STREAM / POLL subscriptions.
//!
//! ## Core Concepts
//!
//! - **Devices**: Named network elements owning per-interface counters
//! - **Update loops**: One background thread per device advancing counters on a fixed tick
//! - **Registry**: Name to device lookup shared by every subscription
//! - **Subscriptions**: Request in, sequence of counter or error responses out
//!
//! ## Example
//!
//! ```ignore
//! use netmon::{SubscribeRequest, TelemetryConfig, TelemetryServer, Topology};
//!
//! let server = TelemetryServer::new(TelemetryConfig::default())?;
//! server.provision(&Topology::lab())?;
//! server.start()?;
//!
//! // One snapshot
//! let handle = server.subscribe(SubscribeRequest::once("router1:eth0"))?;
//! let response = handle.recv()?;
//!
//! // Continuous push every 500ms until the handle is dropped
//! let stream = server.subscribe(SubscribeRequest::stream("switch1:gi0/0", 500))?;
//! ```

pub mod config;
pub mod devices;
pub mod error;
pub mod registry;
pub mod server;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use config::{DeviceSpec, TelemetryConfig, Topology, TrafficConfig};
pub use devices::{CounterUpdater, Device, FixedTraffic, RandomTraffic, TrafficPolicy, UpdaterHandle};
pub use error::{Result, TelemetryError};
pub use registry::DeviceRegistry;
pub use server::TelemetryServer;
pub use subscriptions::{
    cancel_pair, CancelHandle, CancelToken, ChannelSink, Completion, Dispatcher, ErrorCode,
    ResponseError, ResponsePayload, ResponseSink, SubscribeRequest, SubscribeResponse,
    SubscriptionHandle, SubscriptionId, SubscriptionManager, SubscriptionMode, Target,
    DEFAULT_INTERVAL_MS,
};
pub use types::*;
