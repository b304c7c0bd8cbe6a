//! Core types for the counter store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Timestamp(millis)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cumulative traffic counters for one interface.
///
/// Values handed out by the store are always copies; changing one never
/// reaches the live counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub interface_name: String,
    pub bytes_rx: u64,
    pub bytes_tx: u64,
    pub packets_rx: u64,
    pub packets_tx: u64,
    /// Time of the last mutation.
    pub timestamp: Timestamp,
}

impl InterfaceCounters {
    /// Fresh counters, all zero, stamped now.
    pub fn new(interface_name: impl Into<String>) -> Self {
        Self {
            interface_name: interface_name.into(),
            bytes_rx: 0,
            bytes_tx: 0,
            packets_rx: 0,
            packets_tx: 0,
            timestamp: Timestamp::now(),
        }
    }

    /// Counters after applying `inc`, or `None` if any counter would wrap.
    pub fn checked_apply(&self, inc: &CounterIncrement, at: Timestamp) -> Option<Self> {
        Some(Self {
            interface_name: self.interface_name.clone(),
            bytes_rx: self.bytes_rx.checked_add(inc.bytes_rx)?,
            bytes_tx: self.bytes_tx.checked_add(inc.bytes_tx)?,
            packets_rx: self.packets_rx.checked_add(inc.packets_rx)?,
            packets_tx: self.packets_tx.checked_add(inc.packets_tx)?,
            timestamp: at,
        })
    }
}

/// Amount added to each counter in one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterIncrement {
    pub bytes_rx: u64,
    pub bytes_tx: u64,
    pub packets_rx: u64,
    pub packets_tx: u64,
}

impl CounterIncrement {
    /// Same increment for bytes in both directions and packets in both directions.
    pub fn symmetric(bytes: u64, packets: u64) -> Self {
        Self {
            bytes_rx: bytes,
            bytes_tx: bytes,
            packets_rx: packets,
            packets_tx: packets,
        }
    }
}
