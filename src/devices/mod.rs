//! Simulated devices and their interface counters.
//!
//! A [`Device`] owns a map of interface name to counters behind a single
//! read/write lock. Counters advance on a fixed tick driven by a
//! [`CounterUpdater`], one per device, using a pluggable [`TrafficPolicy`].
//!
//! # Example
//!
//! ```ignore
//! let device = Arc::new(Device::new("router1"));
//! device.add_interface("eth0")?;
//!
//! let updater = CounterUpdater::spawn(Arc::clone(&device), Duration::from_secs(1))?;
//! let counters = device.get_counters("eth0")?;
//! updater.stop();
//! ```

mod device;
mod traffic;
mod updater;

pub use device::Device;
pub use traffic::{FixedTraffic, RandomTraffic, TrafficPolicy};
pub use updater::{CounterUpdater, UpdaterHandle};
