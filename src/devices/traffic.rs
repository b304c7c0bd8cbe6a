//! Traffic generation policies.

use crate::error::{Result, TelemetryError};
use crate::types::{CounterIncrement, InterfaceCounters};
use rand::Rng;
use std::ops::RangeInclusive;

/// Decides how much each counter grows on a tick.
///
/// Increments must be non-negative by construction (`u64`), which keeps the
/// counters monotonic.
pub trait TrafficPolicy: Send + Sync {
    fn next_increment(&self, current: &InterfaceCounters) -> CounterIncrement;
}

impl<F> TrafficPolicy for F
where
    F: Fn(&InterfaceCounters) -> CounterIncrement + Send + Sync,
{
    fn next_increment(&self, current: &InterfaceCounters) -> CounterIncrement {
        self(current)
    }
}

/// Uniformly random increments drawn from fixed ranges.
#[derive(Clone, Debug)]
pub struct RandomTraffic {
    bytes: RangeInclusive<u64>,
    packets: RangeInclusive<u64>,
}

impl RandomTraffic {
    /// Create a policy. Both ranges must be non-empty and start at 1 or more.
    pub fn new(bytes: RangeInclusive<u64>, packets: RangeInclusive<u64>) -> Result<Self> {
        for (what, range) in [("bytes", &bytes), ("packets", &packets)] {
            if range.is_empty() || *range.start() == 0 {
                return Err(TelemetryError::InvalidConfig(format!(
                    "{} increment range {}..={} must be positive and non-empty",
                    what,
                    range.start(),
                    range.end()
                )));
            }
        }
        Ok(Self { bytes, packets })
    }

    pub fn bytes_range(&self) -> &RangeInclusive<u64> {
        &self.bytes
    }

    pub fn packets_range(&self) -> &RangeInclusive<u64> {
        &self.packets
    }
}

impl Default for RandomTraffic {
    fn default() -> Self {
        Self {
            bytes: 50..=400,
            packets: 5..=25,
        }
    }
}

impl TrafficPolicy for RandomTraffic {
    fn next_increment(&self, _current: &InterfaceCounters) -> CounterIncrement {
        let mut rng = rand::thread_rng();
        CounterIncrement {
            bytes_rx: rng.gen_range(self.bytes.clone()),
            bytes_tx: rng.gen_range(self.bytes.clone()),
            packets_rx: rng.gen_range(self.packets.clone()),
            packets_tx: rng.gen_range(self.packets.clone()),
        }
    }
}

/// The same increment on every tick. Useful for deterministic runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedTraffic(pub CounterIncrement);

impl TrafficPolicy for FixedTraffic {
    fn next_increment(&self, _current: &InterfaceCounters) -> CounterIncrement {
        self.0
    }
}
