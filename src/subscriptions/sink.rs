//! Response delivery and cancellation primitives.

use super::types::SubscribeResponse;
use crate::error::{Result, TelemetryError};
use crossbeam_channel::{
    bounded, never, select, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Destination for a subscription's responses (the open stream).
///
/// A failed `send` means the transport is gone; the dispatcher stops and
/// propagates the error.
pub trait ResponseSink {
    fn send(&mut self, response: SubscribeResponse) -> Result<()>;
}

impl ResponseSink for Sender<SubscribeResponse> {
    fn send(&mut self, response: SubscribeResponse) -> Result<()> {
        let tx: &Sender<SubscribeResponse> = self;
        tx.send(response).map_err(|_| TelemetryError::StreamClosed)
    }
}

/// Bounded channel sink that gives up on a full buffer once cancelled.
///
/// A response that could not be queued before cancellation is dropped and
/// the send fails with [`TelemetryError::Cancelled`].
pub struct ChannelSink {
    sender: Sender<SubscribeResponse>,
    cancel: CancelToken,
}

impl ChannelSink {
    pub fn new(sender: Sender<SubscribeResponse>, cancel: CancelToken) -> Self {
        Self { sender, cancel }
    }
}

impl ResponseSink for ChannelSink {
    fn send(&mut self, response: SubscribeResponse) -> Result<()> {
        // Free slot: queue without looking at the token.
        let response = match self.sender.try_send(response) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Disconnected(_)) => return Err(TelemetryError::StreamClosed),
            Err(TrySendError::Full(response)) => response,
        };

        select! {
            send(self.sender, response) -> sent => sent.map_err(|_| TelemetryError::StreamClosed),
            recv(self.cancel.receiver) -> _ => Err(TelemetryError::Cancelled),
        }
    }
}

impl ResponseSink for Vec<SubscribeResponse> {
    fn send(&mut self, response: SubscribeResponse) -> Result<()> {
        self.push(response);
        Ok(())
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for &mut S {
    fn send(&mut self, response: SubscribeResponse) -> Result<()> {
        (**self).send(response)
    }
}

/// Create a linked cancel handle and token.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (sender, receiver) = bounded::<()>(0);
    (
        CancelHandle {
            sender: Arc::new(Mutex::new(Some(sender))),
        },
        CancelToken { receiver },
    )
}

/// Caller side of a cancellation signal. Clones share the same signal.
#[derive(Clone)]
pub struct CancelHandle {
    sender: Arc<Mutex<Option<Sender<()>>>>,
}

impl CancelHandle {
    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        // Dropping the only sender disconnects every token.
        self.sender.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.sender.lock().is_none()
    }
}

/// Worker side of a cancellation signal.
#[derive(Clone)]
pub struct CancelToken {
    receiver: Receiver<()>,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self { receiver: never() }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.receiver.try_recv(),
            Ok(()) | Err(TryRecvError::Disconnected)
        )
    }

    /// Sleep for up to `timeout`, waking early on cancellation.
    /// Returns true if cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        !matches!(
            self.receiver.recv_timeout(timeout),
            Err(RecvTimeoutError::Timeout)
        )
    }
}
