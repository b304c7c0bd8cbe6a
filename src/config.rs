//! Server configuration and device provisioning input.

use crate::devices::RandomTraffic;
use crate::error::{Result, TelemetryError};
use crate::subscriptions::DEFAULT_INTERVAL_MS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Telemetry server configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// How often each device's counters advance.
    /// Default: 1000
    pub update_period_ms: u64,

    /// STREAM interval when a request gives none.
    /// Default: 1000
    pub default_interval_ms: u64,

    /// Responses buffered per subscription before the worker blocks.
    /// Default: 64
    pub response_buffer: usize,

    /// Increment ranges for simulated traffic.
    pub traffic: TrafficConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            update_period_ms: 1000,
            default_interval_ms: DEFAULT_INTERVAL_MS,
            response_buffer: 64,
            traffic: TrafficConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.update_period_ms == 0 {
            return Err(TelemetryError::InvalidConfig(
                "update_period_ms must be greater than zero".to_string(),
            ));
        }
        if self.default_interval_ms == 0 {
            return Err(TelemetryError::InvalidConfig(
                "default_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.response_buffer == 0 {
            return Err(TelemetryError::InvalidConfig(
                "response_buffer must be greater than zero".to_string(),
            ));
        }
        self.traffic.policy().map(|_| ())
    }

    pub fn update_period(&self) -> Duration {
        Duration::from_millis(self.update_period_ms)
    }

    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms)
    }
}

/// Inclusive ranges for per-tick counter increments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub bytes_min: u64,
    pub bytes_max: u64,
    pub packets_min: u64,
    pub packets_max: u64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            bytes_min: 50,
            bytes_max: 400,
            packets_min: 5,
            packets_max: 25,
        }
    }
}

impl TrafficConfig {
    /// Build the random traffic policy these ranges describe.
    pub fn policy(&self) -> Result<RandomTraffic> {
        RandomTraffic::new(
            self.bytes_min..=self.bytes_max,
            self.packets_min..=self.packets_max,
        )
    }
}

/// Devices and interfaces to create at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub devices: Vec<DeviceSpec>,
}

/// One device in a [`Topology`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub name: String,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

impl DeviceSpec {
    pub fn new<I, S>(name: impl Into<String>, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            interfaces: interfaces.into_iter().map(Into::into).collect(),
        }
    }
}

impl Topology {
    /// The stock lab: a router with three ports and a switch with two.
    pub fn lab() -> Self {
        Self {
            devices: vec![
                DeviceSpec::new("router1", ["eth0", "eth1", "eth2"]),
                DeviceSpec::new("switch1", ["gi0/0", "gi0/1"]),
            ],
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON topology file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Total interface count across all devices.
    pub fn interface_count(&self) -> usize {
        self.devices.iter().map(|d| d.interfaces.len()).sum()
    }
}
