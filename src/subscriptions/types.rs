//! Subscription request and response types.

use crate::error::{Result, TelemetryError};
use crate::types::{InterfaceCounters, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Stream interval used when a request asks for none (or a non-positive one).
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// How responses are delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionMode {
    /// One snapshot, then done.
    Once = 0,
    /// Push a snapshot every interval until cancelled.
    Stream = 1,
    /// Reserved for caller-driven updates. Not implemented.
    Poll = 2,
}

impl SubscriptionMode {
    /// Numeric value used on the wire.
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for SubscriptionMode {
    type Error = i32;

    fn try_from(value: i32) -> std::result::Result<Self, i32> {
        match value {
            0 => Ok(SubscriptionMode::Once),
            1 => Ok(SubscriptionMode::Stream),
            2 => Ok(SubscriptionMode::Poll),
            other => Err(other),
        }
    }
}

impl fmt::Display for SubscriptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionMode::Once => "ONCE",
            SubscriptionMode::Stream => "STREAM",
            SubscriptionMode::Poll => "POLL",
        };
        f.write_str(s)
    }
}

/// A subscription request as it arrives from a caller.
///
/// `mode` is kept as the raw wire value so that unknown modes can be
/// reported on the stream instead of failing to decode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// `DEVICE:INTERFACE`.
    pub interface_name: String,
    pub mode: i32,
    #[serde(default)]
    pub interval_ms: Option<i64>,
}

impl SubscribeRequest {
    pub fn new(interface_name: impl Into<String>, mode: SubscriptionMode) -> Self {
        Self {
            interface_name: interface_name.into(),
            mode: mode.code(),
            interval_ms: None,
        }
    }

    pub fn once(interface_name: impl Into<String>) -> Self {
        Self::new(interface_name, SubscriptionMode::Once)
    }

    pub fn stream(interface_name: impl Into<String>, interval_ms: i64) -> Self {
        Self::new(interface_name, SubscriptionMode::Stream).with_interval_ms(interval_ms)
    }

    pub fn poll(interface_name: impl Into<String>) -> Self {
        Self::new(interface_name, SubscriptionMode::Poll)
    }

    pub fn with_interval_ms(mut self, interval_ms: i64) -> Self {
        self.interval_ms = Some(interval_ms);
        self
    }

    /// Decoded mode, or `None` if the wire value is unknown.
    pub fn mode(&self) -> Option<SubscriptionMode> {
        SubscriptionMode::try_from(self.mode).ok()
    }

    /// Requested interval, with unset or non-positive values replaced by `default`.
    pub fn interval(&self, default: Duration) -> Duration {
        match self.interval_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms as u64),
            _ => default,
        }
    }
}

/// A parsed `DEVICE:INTERFACE` identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    pub device: String,
    pub interface: String,
}

impl Target {
    /// Parse `DEVICE:INTERFACE`. Exactly one `:` and two non-empty parts.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(device), Some(interface), None) if !device.is_empty() && !interface.is_empty() => {
                Ok(Self {
                    device: device.to_string(),
                    interface: interface.to_string(),
                })
            }
            _ => Err(TelemetryError::InvalidTarget(s.to_string())),
        }
    }
}

impl FromStr for Target {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        Target::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.interface)
    }
}

/// Error codes reported on the response stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Target is not `DEVICE:INTERFACE`.
    InvalidFormat,
    /// Unknown device or unknown mode.
    DoesNotExist,
    /// Unknown interface on a known device.
    NotFound,
    /// Interface lookup failed while streaming.
    NotActive,
    NotImplemented,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::DoesNotExist => "DOES_NOT_EXIST",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::NotActive => "NOT_ACTIVE",
            ErrorCode::NotImplemented => "NOT_IMPLEMENTED",
        };
        f.write_str(s)
    }
}

/// Structured error carried in a response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: ErrorCode,
    pub message: String,
}

/// Either a counter snapshot or an error, never both.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePayload {
    Counters(InterfaceCounters),
    Error(ResponseError),
}

/// One message on a subscription's response stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeResponse {
    #[serde(flatten)]
    pub response: ResponsePayload,
    pub response_timestamp: Timestamp,
}

impl SubscribeResponse {
    pub fn counters(counters: InterfaceCounters) -> Self {
        Self {
            response: ResponsePayload::Counters(counters),
            response_timestamp: Timestamp::now(),
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            response: ResponsePayload::Error(ResponseError {
                code,
                message: message.into(),
            }),
            response_timestamp: Timestamp::now(),
        }
    }

    pub fn as_counters(&self) -> Option<&InterfaceCounters> {
        match &self.response {
            ResponsePayload::Counters(c) => Some(c),
            ResponsePayload::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ResponseError> {
        match &self.response {
            ResponsePayload::Error(e) => Some(e),
            ResponsePayload::Counters(_) => None,
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.as_error().map(|e| e.code)
    }

    pub fn is_error(&self) -> bool {
        self.as_error().is_some()
    }
}
