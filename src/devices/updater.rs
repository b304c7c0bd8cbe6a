//! Periodic counter update loop.

use super::device::Device;
use crate::error::{Result, TelemetryError};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Spawns the background loop that ticks a device's counters.
pub struct CounterUpdater;

impl CounterUpdater {
    /// Start ticking `device` every `period` on a dedicated thread.
    ///
    /// The loop runs until the returned handle is stopped or dropped. A tick
    /// that fails is logged and the loop carries on.
    pub fn spawn(device: Arc<Device>, period: Duration) -> Result<UpdaterHandle> {
        if period.is_zero() {
            return Err(TelemetryError::InvalidConfig(
                "update period must be greater than zero".to_string(),
            ));
        }

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let name = device.name().to_string();
        let thread = thread::Builder::new()
            .name(format!("counters-{}", name))
            .spawn(move || run_loop(&device, period, stop_rx))?;

        info!(device = %name, period_ms = period.as_millis() as u64, "counter updates started");

        Ok(UpdaterHandle {
            device: name,
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

fn run_loop(device: &Device, period: Duration, stop: Receiver<()>) -> u64 {
    let ticker = tick(period);
    let mut ticks = 0u64;

    loop {
        select! {
            // Fires when the handle drops its sender.
            recv(stop) -> _ => break,
            recv(ticker) -> _ => match device.update_counters() {
                Ok(updated) => {
                    ticks += 1;
                    debug!(device = device.name(), updated, "tick");
                }
                Err(e) => warn!(device = device.name(), error = %e, "counter update failed"),
            },
        }
    }

    ticks
}

/// Owns a running update loop. Dropping the handle stops the loop.
pub struct UpdaterHandle {
    device: String,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<u64>>,
}

impl UpdaterHandle {
    /// Name of the device being updated.
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop and wait for it. Returns the number of successful ticks.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        drop(self.stop.take());
        let ticks = match self.thread.take() {
            Some(thread) => thread.join().unwrap_or_else(|_| {
                warn!(device = %self.device, "counter update thread panicked");
                0
            }),
            None => return 0,
        };
        info!(device = %self.device, ticks, "counter updates stopped");
        ticks
    }
}

impl Drop for UpdaterHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
