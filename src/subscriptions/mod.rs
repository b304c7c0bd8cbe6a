//! Subscriptions to interface counters.
//!
//! A subscription names one interface as `DEVICE:INTERFACE` and a mode:
//! - `ONCE`: one counter snapshot
//! - `STREAM`: a snapshot every interval until cancelled
//! - `POLL`: reserved, always answered with `NOT_IMPLEMENTED`
//!
//! Malformed targets, unknown devices and interfaces, and unknown modes are
//! reported as a single error response on the stream. Only transport
//! failures (a closed sink) abort a subscription with an `Err`.
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new(Arc::new(Dispatcher::new(registry)));
//! let handle = manager.subscribe(SubscribeRequest::stream("router1:eth0", 500))?;
//!
//! while let Ok(response) = handle.recv() {
//!     match response.response {
//!         ResponsePayload::Counters(c) => println!("{} rx={}", c.interface_name, c.bytes_rx),
//!         ResponsePayload::Error(e) => { eprintln!("{}: {}", e.code, e.message); break; }
//!     }
//! }
//! ```

mod dispatcher;
mod manager;
mod sink;
mod types;

pub use dispatcher::{Completion, Dispatcher};
pub use manager::{SubscriptionHandle, SubscriptionId, SubscriptionManager};
pub use sink::{cancel_pair, CancelHandle, CancelToken, ChannelSink, ResponseSink};
pub use types::{
    ErrorCode, ResponseError, ResponsePayload, SubscribeRequest, SubscribeResponse,
    SubscriptionMode, Target, DEFAULT_INTERVAL_MS,
};
