//! Runs subscriptions on worker threads and tracks the live ones.

use super::dispatcher::{Completion, Dispatcher};
use super::sink::{cancel_pair, CancelHandle, ChannelSink};
use super::types::{SubscribeRequest, SubscribeResponse};
use crate::error::{Result, TelemetryError};
use crossbeam_channel::bounded;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Default response buffer per subscription.
const DEFAULT_BUFFER_SIZE: usize = 64;

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Spawns one worker thread per subscription.
///
/// Each worker owns the sending half of a bounded channel; the caller reads
/// responses through the returned [`SubscriptionHandle`]. A full buffer
/// blocks the worker rather than dropping responses, until the subscription
/// is cancelled.
pub struct SubscriptionManager {
    dispatcher: Arc<Dispatcher>,
    /// Live subscriptions by ID.
    active: Arc<RwLock<HashMap<SubscriptionId, CancelHandle>>>,
    next_id: AtomicU64,
    buffer_size: usize,
}

impl SubscriptionManager {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self::with_buffer_size(dispatcher, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(dispatcher: Arc<Dispatcher>, buffer_size: usize) -> Self {
        Self {
            dispatcher,
            active: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Start a subscription.
    pub fn subscribe(&self, request: SubscribeRequest) -> Result<SubscriptionHandle> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded::<SubscribeResponse>(self.buffer_size);
        let (cancel, token) = cancel_pair();
        let mut sink = ChannelSink::new(sender, token.clone());

        self.active.write().insert(id, cancel.clone());

        let dispatcher = Arc::clone(&self.dispatcher);
        let active = Arc::clone(&self.active);
        let spawned = thread::Builder::new()
            .name(format!("subscription-{}", id.0))
            .spawn(move || {
                let result = dispatcher.dispatch(&request, &mut sink, &token);
                active.write().remove(&id);
                match &result {
                    Ok(completion) => {
                        debug!(id = id.0, interface = %request.interface_name, ?completion, "subscription ended")
                    }
                    Err(e) => {
                        debug!(id = id.0, interface = %request.interface_name, error = %e, "subscription aborted")
                    }
                }
                result
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                self.active.write().remove(&id);
                return Err(TelemetryError::Io(e));
            }
        };

        Ok(SubscriptionHandle {
            id,
            receiver,
            cancel,
            thread: Some(thread),
        })
    }

    /// Cancel a subscription by ID. Returns false if it is no longer live.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.active.write().remove(&id) {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every live subscription.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.active.write().drain().collect();
        for (_, cancel) in &drained {
            cancel.cancel();
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "cancelled subscriptions");
        }
        drained.len()
    }

    /// Number of subscriptions still running.
    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }
}

/// Caller's end of a running subscription.
///
/// Dropping the handle cancels the subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive responses. Disconnects when the subscription ends.
    pub receiver: crossbeam_channel::Receiver<SubscribeResponse>,
    cancel: CancelHandle,
    thread: Option<thread::JoinHandle<Result<Completion>>>,
}

impl SubscriptionHandle {
    /// Receive the next response (blocking).
    pub fn recv(&self) -> std::result::Result<SubscribeResponse, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a response (non-blocking).
    pub fn try_recv(&self) -> std::result::Result<SubscribeResponse, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> std::result::Result<SubscribeResponse, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Stop the subscription. Responses already buffered stay readable.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the worker to finish.
    ///
    /// A worker that panicked is reported as [`TelemetryError::WorkerPanicked`].
    pub fn join(mut self) -> Result<Completion> {
        // Only `join` takes the thread, and it consumes the handle.
        let Some(thread) = self.thread.take() else {
            return Err(TelemetryError::WorkerPanicked);
        };
        thread.join().unwrap_or_else(|_| {
            warn!(id = self.id.0, "subscription thread panicked");
            Err(TelemetryError::WorkerPanicked)
        })
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::FixedTraffic;
    use crate::registry::DeviceRegistry;
    use crate::subscriptions::ErrorCode;
    use crate::types::CounterIncrement;
    use std::time::Duration;

    fn manager() -> SubscriptionManager {
        let registry = DeviceRegistry::new();
        let device = registry
            .add_device_with_traffic(
                "router1",
                Arc::new(FixedTraffic(CounterIncrement::symmetric(1, 1))),
            )
            .unwrap();
        device.add_interface("eth0").unwrap();
        SubscriptionManager::new(Arc::new(Dispatcher::new(Arc::new(registry))))
    }

    #[test]
    fn test_once_then_disconnect() {
        let manager = manager();
        let handle = manager.subscribe(SubscribeRequest::once("router1:eth0")).unwrap();

        let response = handle.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(response.as_counters().is_some());
        // Worker is done, so the channel closes.
        assert!(handle.recv_timeout(Duration::from_secs(5)).is_err());
        assert_eq!(handle.join().unwrap(), Completion::Finished);
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn test_unsubscribe_stream() {
        let manager = manager();
        let handle = manager
            .subscribe(SubscribeRequest::stream("router1:eth0", 10))
            .unwrap();
        handle.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(manager.active_count(), 1);

        assert!(manager.unsubscribe(handle.id));
        assert!(!manager.unsubscribe(handle.id));
        assert_eq!(handle.join().unwrap(), Completion::Cancelled);
    }

    #[test]
    fn test_cancel_all() {
        let manager = manager();
        let a = manager.subscribe(SubscribeRequest::stream("router1:eth0", 10)).unwrap();
        let b = manager.subscribe(SubscribeRequest::stream("router1:eth0", 10)).unwrap();
        a.recv_timeout(Duration::from_secs(5)).unwrap();
        b.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(manager.cancel_all(), 2);
        assert_eq!(a.join().unwrap(), Completion::Cancelled);
        assert_eq!(b.join().unwrap(), Completion::Cancelled);
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn test_error_response_delivered() {
        let manager = manager();
        let handle = manager.subscribe(SubscribeRequest::poll("router1:eth0")).unwrap();
        let response = handle.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(response.error_code(), Some(ErrorCode::NotImplemented));
        assert_eq!(
            handle.join().unwrap(),
            Completion::Rejected(ErrorCode::NotImplemented)
        );
    }

    #[test]
    fn test_cancel_unblocks_full_buffer() {
        let manager = SubscriptionManager::with_buffer_size(manager().dispatcher, 1);
        let handle = manager
            .subscribe(SubscribeRequest::stream("router1:eth0", 1))
            .unwrap();
        // Nobody reads, so the worker fills the buffer and blocks.
        thread::sleep(Duration::from_millis(50));

        assert!(manager.unsubscribe(handle.id));
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let receiver = handle.receiver.clone();
        let joiner = thread::spawn(move || {
            let _ = done_tx.send(handle.join());
        });
        let result = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker did not exit after cancel");
        assert_eq!(result.unwrap(), Completion::Cancelled);
        joiner.join().unwrap();

        // The held response was dropped: one buffered response, then closed.
        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_join_reports_panicked_worker() {
        let (_sender, receiver) = bounded::<SubscribeResponse>(1);
        let (cancel, _token) = cancel_pair();
        let thread = thread::spawn(|| -> Result<Completion> { panic!("worker failed") });
        let handle = SubscriptionHandle {
            id: SubscriptionId(7),
            receiver,
            cancel,
            thread: Some(thread),
        };

        assert!(matches!(handle.join(), Err(TelemetryError::WorkerPanicked)));
    }

    #[test]
    fn test_dropped_handle_stops_worker() {
        let manager = manager();
        let handle = manager
            .subscribe(SubscribeRequest::stream("router1:eth0", 10))
            .unwrap();
        handle.recv_timeout(Duration::from_secs(5)).unwrap();
        drop(handle);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while manager.active_count() > 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(manager.active_count(), 0);
    }
}
