//! Main server struct tying all components together.

use crate::config::{TelemetryConfig, Topology};
use crate::devices::{CounterUpdater, Device, TrafficPolicy, UpdaterHandle};
use crate::error::Result;
use crate::registry::DeviceRegistry;
use crate::subscriptions::{
    CancelToken, Completion, Dispatcher, ResponseSink, SubscribeRequest, SubscriptionHandle,
    SubscriptionManager,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// The telemetry server.
///
/// Provides a unified interface for:
/// - Provisioning devices and interfaces
/// - Running one counter update loop per device
/// - Serving ONCE / STREAM / POLL subscriptions
pub struct TelemetryServer {
    config: TelemetryConfig,

    registry: Arc<DeviceRegistry>,

    /// Traffic policy shared by every device this server creates.
    traffic: Arc<dyn TrafficPolicy>,

    dispatcher: Arc<Dispatcher>,

    subscriptions: SubscriptionManager,

    /// Running update loops by device name.
    updaters: Mutex<HashMap<String, UpdaterHandle>>,
}

impl TelemetryServer {
    /// Create a server using the configured random traffic.
    pub fn new(config: TelemetryConfig) -> Result<Self> {
        config.validate()?;
        let traffic = Arc::new(config.traffic.policy()?);
        Ok(Self::build(config, traffic))
    }

    /// Create a server with a custom traffic policy.
    pub fn with_traffic(config: TelemetryConfig, traffic: Arc<dyn TrafficPolicy>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, traffic))
    }

    fn build(config: TelemetryConfig, traffic: Arc<dyn TrafficPolicy>) -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let dispatcher = Arc::new(Dispatcher::with_default_interval(
            Arc::clone(&registry),
            config.default_interval(),
        ));
        let subscriptions =
            SubscriptionManager::with_buffer_size(Arc::clone(&dispatcher), config.response_buffer);

        Self {
            config,
            registry,
            traffic,
            dispatcher,
            subscriptions,
            updaters: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    // --- Provisioning ---

    /// Register an empty device.
    pub fn add_device(&self, name: &str) -> Result<Arc<Device>> {
        self.registry
            .add_device_with_traffic(name, Arc::clone(&self.traffic))
    }

    /// Create every device and interface in `topology`.
    ///
    /// Stops at the first duplicate; anything created before it stays.
    pub fn provision(&self, topology: &Topology) -> Result<()> {
        for entry in &topology.devices {
            let device = self.add_device(&entry.name)?;
            for interface in &entry.interfaces {
                device.add_interface(interface)?;
            }
        }
        info!(
            devices = topology.devices.len(),
            interfaces = topology.interface_count(),
            "topology provisioned"
        );
        Ok(())
    }

    // --- Update Loops ---

    /// Start an update loop for every device that does not have one yet.
    /// Returns how many were started.
    pub fn start(&self) -> Result<usize> {
        // Collected first so the registry lock is not held while spawning.
        let devices = self.registry.devices();

        let mut updaters = self.updaters.lock();
        let mut started = 0;
        for device in devices {
            if updaters.contains_key(device.name()) {
                continue;
            }
            let name = device.name().to_string();
            let handle = CounterUpdater::spawn(device, self.config.update_period())?;
            updaters.insert(name, handle);
            started += 1;
        }
        Ok(started)
    }

    /// Stop all update loops. Counters keep their last values.
    pub fn stop_updates(&self) -> usize {
        let drained: Vec<_> = self.updaters.lock().drain().collect();
        let count = drained.len();
        for (_, handle) in drained {
            handle.stop();
        }
        count
    }

    /// Number of devices with a running update loop.
    pub fn running_updaters(&self) -> usize {
        self.updaters.lock().len()
    }

    // --- Subscriptions ---

    /// Start a subscription on its own worker thread.
    pub fn subscribe(&self, request: SubscribeRequest) -> Result<SubscriptionHandle> {
        self.subscriptions.subscribe(request)
    }

    /// Run a subscription on the calling thread against a caller-owned sink.
    pub fn serve<S>(
        &self,
        request: &SubscribeRequest,
        sink: &mut S,
        cancel: &CancelToken,
    ) -> Result<Completion>
    where
        S: ResponseSink + ?Sized,
    {
        self.dispatcher.dispatch(request, sink, cancel)
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Cancel all subscriptions and stop all update loops.
    pub fn shutdown(&self) {
        let cancelled = self.subscriptions.cancel_all();
        let stopped = self.stop_updates();
        if cancelled > 0 || stopped > 0 {
            info!(cancelled, stopped, "telemetry server shut down");
        }
    }
}

impl Drop for TelemetryServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
