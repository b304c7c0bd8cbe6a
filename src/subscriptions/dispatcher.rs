//! Turns one subscription request into a sequence of responses.

use super::sink::{CancelToken, ResponseSink};
use super::types::{
    ErrorCode, SubscribeRequest, SubscribeResponse, SubscriptionMode, Target,
    DEFAULT_INTERVAL_MS,
};
use crate::devices::Device;
use crate::error::{Result, TelemetryError};
use crate::registry::DeviceRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How a dispatched subscription ended, when the stream itself stayed open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// All responses for the mode were delivered.
    Finished,
    /// A single error response was delivered.
    Rejected(ErrorCode),
    /// The caller cancelled; nothing more was sent.
    Cancelled,
}

/// Executes subscriptions against a device registry.
///
/// Every request-shape or lookup failure becomes exactly one error response
/// on the sink. The only `Err` returned is a failed send, which means the
/// transport is gone. A sink that reports [`TelemetryError::Cancelled`]
/// ends the subscription as [`Completion::Cancelled`].
pub struct Dispatcher {
    registry: Arc<DeviceRegistry>,
    default_interval: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self::with_default_interval(registry, Duration::from_millis(DEFAULT_INTERVAL_MS))
    }

    /// Use `default_interval` for STREAM requests without a positive interval.
    pub fn with_default_interval(registry: Arc<DeviceRegistry>, default_interval: Duration) -> Self {
        Self {
            registry,
            default_interval,
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Run `request` to completion, writing responses to `sink`.
    ///
    /// Blocks for the lifetime of a STREAM subscription.
    pub fn dispatch<S>(
        &self,
        request: &SubscribeRequest,
        sink: &mut S,
        cancel: &CancelToken,
    ) -> Result<Completion>
    where
        S: ResponseSink + ?Sized,
    {
        match self.run(request, sink, cancel) {
            Err(TelemetryError::Cancelled) => Ok(Completion::Cancelled),
            other => other,
        }
    }

    fn run<S>(
        &self,
        request: &SubscribeRequest,
        sink: &mut S,
        cancel: &CancelToken,
    ) -> Result<Completion>
    where
        S: ResponseSink + ?Sized,
    {
        let target = match Target::parse(&request.interface_name) {
            Ok(target) => target,
            Err(_) => {
                return reject(
                    sink,
                    ErrorCode::InvalidFormat,
                    format!(
                        "invalid interface name '{}'; expected DEVICE:INTERFACE",
                        request.interface_name
                    ),
                )
            }
        };

        let Some(mode) = request.mode() else {
            return reject(
                sink,
                ErrorCode::DoesNotExist,
                format!("invalid subscription mode {}", request.mode),
            );
        };

        // Registry lock is released before any device lock is taken.
        let Some(device) = self.registry.get_device(&target.device) else {
            return reject(
                sink,
                ErrorCode::DoesNotExist,
                format!("device '{}' not found", target.device),
            );
        };

        debug!(subscription = %target, %mode, "dispatching subscription");

        match mode {
            SubscriptionMode::Once => once(&device, &target, sink),
            SubscriptionMode::Stream => {
                let interval = request.interval(self.default_interval);
                stream(&device, &target, interval, sink, cancel)
            }
            SubscriptionMode::Poll => reject(
                sink,
                ErrorCode::NotImplemented,
                "POLL mode is not implemented",
            ),
        }
    }
}

fn reject<S>(sink: &mut S, code: ErrorCode, message: impl Into<String>) -> Result<Completion>
where
    S: ResponseSink + ?Sized,
{
    let message = message.into();
    debug!(%code, %message, "subscription rejected");
    sink.send(SubscribeResponse::error(code, message))?;
    Ok(Completion::Rejected(code))
}

fn once<S>(device: &Device, target: &Target, sink: &mut S) -> Result<Completion>
where
    S: ResponseSink + ?Sized,
{
    match device.get_counters(&target.interface) {
        Ok(counters) => {
            sink.send(SubscribeResponse::counters(counters))?;
            Ok(Completion::Finished)
        }
        Err(e) => reject(
            sink,
            e.code().unwrap_or(ErrorCode::NotFound),
            format!("failed to get counters for interface '{}': {}", target.interface, e),
        ),
    }
}

fn stream<S>(
    device: &Device,
    target: &Target,
    interval: Duration,
    sink: &mut S,
    cancel: &CancelToken,
) -> Result<Completion>
where
    S: ResponseSink + ?Sized,
{
    loop {
        if cancel.is_cancelled() {
            return Ok(Completion::Cancelled);
        }

        // First failed lookup ends the stream; the interface is not re-resolved.
        let counters = match device.get_counters(&target.interface) {
            Ok(counters) => counters,
            Err(e) => {
                return reject(
                    sink,
                    ErrorCode::NotActive,
                    format!("stream error getting counters for '{}': {}", target.interface, e),
                )
            }
        };

        sink.send(SubscribeResponse::counters(counters))?;

        if cancel.wait(interval) {
            return Ok(Completion::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::FixedTraffic;
    use crate::error::TelemetryError;
    use crate::subscriptions::sink::cancel_pair;
    use crate::types::CounterIncrement;

    fn registry() -> Arc<DeviceRegistry> {
        let registry = DeviceRegistry::new();
        let device = registry
            .add_device_with_traffic(
                "router1",
                Arc::new(FixedTraffic(CounterIncrement::symmetric(120, 10))),
            )
            .unwrap();
        device.add_interface("eth0").unwrap();
        device.update_counters().unwrap();
        Arc::new(registry)
    }

    fn run(request: SubscribeRequest) -> (Completion, Vec<SubscribeResponse>) {
        let dispatcher = Dispatcher::new(registry());
        let mut responses = Vec::new();
        let completion = dispatcher
            .dispatch(&request, &mut responses, &CancelToken::never())
            .unwrap();
        (completion, responses)
    }

    #[test]
    fn test_once_success() {
        let (completion, responses) = run(SubscribeRequest::once("router1:eth0"));
        assert_eq!(completion, Completion::Finished);
        assert_eq!(responses.len(), 1);

        let counters = responses[0].as_counters().unwrap();
        assert_eq!(counters.interface_name, "eth0");
        assert_eq!(counters.bytes_rx, 120);
        assert!(responses[0].as_error().is_none());
    }

    #[test]
    fn test_once_unknown_interface() {
        let (completion, responses) = run(SubscribeRequest::once("router1:eth7"));
        assert_eq!(completion, Completion::Rejected(ErrorCode::NotFound));
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].error_code(), Some(ErrorCode::NotFound));
    }

    #[test]
    fn test_unknown_device() {
        let (completion, responses) = run(SubscribeRequest::once("ghost:eth0"));
        assert_eq!(completion, Completion::Rejected(ErrorCode::DoesNotExist));
        assert_eq!(responses.len(), 1);
        assert!(responses[0].as_counters().is_none());
        assert!(responses[0].as_error().unwrap().message.contains("ghost"));
    }

    #[test]
    fn test_malformed_targets() {
        for bad in ["router1", "router1:eth0:extra", ""] {
            let (completion, responses) = run(SubscribeRequest::once(bad));
            assert_eq!(completion, Completion::Rejected(ErrorCode::InvalidFormat));
            assert_eq!(responses.len(), 1);
            assert_eq!(responses[0].error_code(), Some(ErrorCode::InvalidFormat));
        }
    }

    #[test]
    fn test_poll_not_implemented() {
        let (completion, responses) = run(SubscribeRequest::poll("router1:eth0"));
        assert_eq!(completion, Completion::Rejected(ErrorCode::NotImplemented));
        assert_eq!(responses.len(), 1);
    }

    #[test]
    fn test_unknown_mode() {
        let mut request = SubscribeRequest::once("router1:eth0");
        request.mode = 42;
        let (completion, responses) = run(request);
        assert_eq!(completion, Completion::Rejected(ErrorCode::DoesNotExist));
        assert_eq!(responses.len(), 1);
    }

    /// Sink that cancels after a fixed number of responses.
    struct CancelAfter {
        limit: usize,
        seen: Vec<SubscribeResponse>,
        handle: crate::subscriptions::CancelHandle,
    }

    impl ResponseSink for CancelAfter {
        fn send(&mut self, response: SubscribeResponse) -> Result<()> {
            self.seen.push(response);
            if self.seen.len() >= self.limit {
                self.handle.cancel();
            }
            Ok(())
        }
    }

    #[test]
    fn test_stream_until_cancelled() {
        let dispatcher = Dispatcher::new(registry());
        let (handle, token) = cancel_pair();
        let mut sink = CancelAfter {
            limit: 3,
            seen: Vec::new(),
            handle,
        };

        let completion = dispatcher
            .dispatch(&SubscribeRequest::stream("router1:eth0", 5), &mut sink, &token)
            .unwrap();
        assert_eq!(completion, Completion::Cancelled);
        assert_eq!(sink.seen.len(), 3);
        assert!(sink.seen.iter().all(|r| r.as_counters().is_some()));
    }

    #[test]
    fn test_stream_unknown_interface_ends_with_error() {
        let (completion, responses) = run(SubscribeRequest::stream("router1:eth9", 5));
        assert_eq!(completion, Completion::Rejected(ErrorCode::NotActive));
        assert_eq!(responses.len(), 1);
    }

    struct ClosedSink;

    impl ResponseSink for ClosedSink {
        fn send(&mut self, _response: SubscribeResponse) -> Result<()> {
            Err(TelemetryError::StreamClosed)
        }
    }

    #[test]
    fn test_stream_send_failure_propagates() {
        let dispatcher = Dispatcher::new(registry());
        let result = dispatcher.dispatch(
            &SubscribeRequest::stream("router1:eth0", 5),
            &mut ClosedSink,
            &CancelToken::never(),
        );
        assert!(matches!(result, Err(TelemetryError::StreamClosed)));
    }

    /// Sink whose buffer is always full until the token fires.
    struct BlockedSink(CancelToken);

    impl ResponseSink for BlockedSink {
        fn send(&mut self, _response: SubscribeResponse) -> Result<()> {
            self.0.wait(Duration::from_secs(30));
            Err(TelemetryError::Cancelled)
        }
    }

    #[test]
    fn test_cancelled_send_ends_stream() {
        let dispatcher = Dispatcher::new(registry());
        let (handle, token) = cancel_pair();
        let mut sink = BlockedSink(token.clone());

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.cancel();
        });
        let completion = dispatcher
            .dispatch(&SubscribeRequest::stream("router1:eth0", 5), &mut sink, &token)
            .unwrap();
        canceller.join().unwrap();
        assert_eq!(completion, Completion::Cancelled);
    }

    #[test]
    fn test_cancelled_before_start_sends_nothing() {
        let dispatcher = Dispatcher::new(registry());
        let (handle, token) = cancel_pair();
        handle.cancel();

        let mut responses = Vec::new();
        let completion = dispatcher
            .dispatch(&SubscribeRequest::stream("router1:eth0", 5), &mut responses, &token)
            .unwrap();
        assert_eq!(completion, Completion::Cancelled);
        assert!(responses.is_empty());
    }
}
