//! Per-device counter store.

use super::traffic::{RandomTraffic, TrafficPolicy};
use crate::error::{Result, TelemetryError};
use crate::types::{InterfaceCounters, Timestamp};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A simulated network element and its interface counters.
///
/// Writers (`add_interface`, `update_counters`) take the exclusive lock for
/// their whole pass; readers share it. A read therefore always sees every
/// interface at the same tick.
pub struct Device {
    name: String,
    interfaces: RwLock<HashMap<String, InterfaceCounters>>,
    traffic: Arc<dyn TrafficPolicy>,
}

impl Device {
    /// Create an empty device with the default random traffic policy.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_traffic(name, Arc::new(RandomTraffic::default()))
    }

    /// Create an empty device with a custom traffic policy.
    pub fn with_traffic(name: impl Into<String>, traffic: Arc<dyn TrafficPolicy>) -> Self {
        Self {
            name: name.into(),
            interfaces: RwLock::new(HashMap::new()),
            traffic,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a new interface with zeroed counters.
    pub fn add_interface(&self, interface: &str) -> Result<()> {
        let mut interfaces = self.interfaces.write();
        if interfaces.contains_key(interface) {
            return Err(TelemetryError::InterfaceExists {
                device: self.name.clone(),
                interface: interface.to_string(),
            });
        }
        interfaces.insert(interface.to_string(), InterfaceCounters::new(interface));
        debug!(device = %self.name, interface, "interface added");
        Ok(())
    }

    /// Advance every interface by one tick of the traffic policy.
    ///
    /// New values are computed for all interfaces before any is written, so a
    /// tick that would overflow a counter leaves the device untouched.
    /// Returns the number of interfaces updated.
    pub fn update_counters(&self) -> Result<usize> {
        let mut interfaces = self.interfaces.write();
        let now = Timestamp::now();

        let mut next = Vec::with_capacity(interfaces.len());
        for (name, current) in interfaces.iter() {
            let inc = self.traffic.next_increment(current);
            let updated = current.checked_apply(&inc, now).ok_or_else(|| {
                TelemetryError::CounterOverflow {
                    device: self.name.clone(),
                    interface: name.clone(),
                }
            })?;
            next.push(updated);
        }

        let count = next.len();
        for updated in next {
            if let Some(slot) = interfaces.get_mut(&updated.interface_name) {
                *slot = updated;
            }
        }
        Ok(count)
    }

    /// Copy of one interface's current counters.
    pub fn get_counters(&self, interface: &str) -> Result<InterfaceCounters> {
        self.interfaces
            .read()
            .get(interface)
            .cloned()
            .ok_or_else(|| TelemetryError::InterfaceNotFound {
                device: self.name.clone(),
                interface: interface.to_string(),
            })
    }

    /// Copies of all interfaces' counters taken under one read lock, sorted by name.
    pub fn snapshot(&self) -> Vec<InterfaceCounters> {
        let mut all: Vec<_> = self.interfaces.read().values().cloned().collect();
        all.sort_by(|a, b| a.interface_name.cmp(&b.interface_name));
        all
    }

    /// Interface names, sorted.
    pub fn interface_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.interfaces.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_interface(&self, interface: &str) -> bool {
        self.interfaces.read().contains_key(interface)
    }

    pub fn len(&self) -> usize {
        self.interfaces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("interfaces", &self.len())
            .finish()
    }
}
