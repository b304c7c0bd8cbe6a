//! Server-wide registry of devices.

use crate::devices::{Device, TrafficPolicy};
use crate::error::{Result, TelemetryError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Maps device names to devices.
///
/// The registry lock is only held long enough to clone an `Arc<Device>`;
/// callers then work against the device's own lock. The two are never
/// held together.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Arc<Device>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store an empty device with the default traffic policy.
    pub fn add_device(&self, name: &str) -> Result<Arc<Device>> {
        self.insert(Device::new(name))
    }

    /// Create and store an empty device with a custom traffic policy.
    pub fn add_device_with_traffic(
        &self,
        name: &str,
        traffic: Arc<dyn TrafficPolicy>,
    ) -> Result<Arc<Device>> {
        self.insert(Device::with_traffic(name, traffic))
    }

    fn insert(&self, device: Device) -> Result<Arc<Device>> {
        let mut devices = self.devices.write();
        if devices.contains_key(device.name()) {
            return Err(TelemetryError::DeviceExists(device.name().to_string()));
        }
        let device = Arc::new(device);
        devices.insert(device.name().to_string(), Arc::clone(&device));
        info!(device = device.name(), "device registered");
        Ok(device)
    }

    /// Look up a device. Never creates one.
    pub fn get_device(&self, name: &str) -> Option<Arc<Device>> {
        self.devices.read().get(name).cloned()
    }

    /// Like [`get_device`](Self::get_device) but with a typed error.
    pub fn require_device(&self, name: &str) -> Result<Arc<Device>> {
        self.get_device(name)
            .ok_or_else(|| TelemetryError::DeviceNotFound(name.to_string()))
    }

    /// All devices, sorted by name.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        let mut all: Vec<_> = self.devices.read().values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Device names, sorted.
    pub fn device_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.devices.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::FixedTraffic;
    use crate::types::CounterIncrement;

    #[test]
    fn test_add_and_get() {
        let registry = DeviceRegistry::new();
        let device = registry.add_device("router1").unwrap();
        device.add_interface("eth0").unwrap();

        let found = registry.get_device("router1").unwrap();
        assert!(Arc::ptr_eq(&device, &found));
        assert!(found.has_interface("eth0"));
    }

    #[test]
    fn test_duplicate_device() {
        let registry = DeviceRegistry::new();
        let first = registry.add_device("router1").unwrap();
        first.add_interface("eth0").unwrap();

        let result = registry.add_device("router1");
        assert!(matches!(result, Err(TelemetryError::DeviceExists(_))));

        // Original device survives
        let found = registry.get_device("router1").unwrap();
        assert!(Arc::ptr_eq(&first, &found));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_does_not_create() {
        let registry = DeviceRegistry::new();
        assert!(registry.get_device("ghost").is_none());
        assert!(matches!(
            registry.require_device("ghost"),
            Err(TelemetryError::DeviceNotFound(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_custom_traffic() {
        let registry = DeviceRegistry::new();
        let device = registry
            .add_device_with_traffic(
                "switch1",
                Arc::new(FixedTraffic(CounterIncrement::symmetric(3, 1))),
            )
            .unwrap();
        device.add_interface("gi0/0").unwrap();
        device.update_counters().unwrap();
        assert_eq!(device.get_counters("gi0/0").unwrap().bytes_tx, 3);
    }

    #[test]
    fn test_names_sorted() {
        let registry = DeviceRegistry::new();
        registry.add_device("switch1").unwrap();
        registry.add_device("router1").unwrap();
        assert_eq!(registry.device_names(), vec!["router1", "switch1"]);
        let names: Vec<_> = registry.devices().iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["router1", "switch1"]);
    }
}
