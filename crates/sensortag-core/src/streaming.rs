//! Delivery of characteristic notifications.
//!
//! A transport hands out one raw [`ValueReceiver`] per subscription. This
//! module drains it on a dedicated tokio task and exposes the values either
//! as a callback ([`NotifyHandle`]) or as an async [`Stream`]
//! ([`NotificationStream`]).
//!
//! Both shapes support graceful shutdown through a cancellation token. On
//! cancellation the task disables notifications on the characteristic before
//! exiting, as long as its subscription is still the current one.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::transport::{ObjectPath, SharedTransport, ValueReceiver};

/// Default capacity of a [`NotificationStream`]'s buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 16;

/// Raw value stream from [`Characteristic::subscribe`](crate::Characteristic::subscribe).
pub type ValueStream = NotificationStream<Vec<u8>>;

/// Decoded stream; a payload that fails to decode yields an `Err` item and
/// the stream continues.
pub type MeasurementStream<T> = NotificationStream<Result<T>>;

/// Disable notifications, unless `source` has already been closed by the
/// transport. A closed source means the subscription was replaced or torn
/// down, and stopping now would end the replacement instead.
async fn release(transport: &SharedTransport, path: &ObjectPath, source: &ValueReceiver) {
    if source.is_closed() {
        debug!("Subscription on {} already released", path);
        return;
    }
    if let Err(e) = transport.stop_notify(path).await {
        warn!("Failed to stop notifications on {}: {}", path, e);
    }
}

/// Handle to a callback subscription created by
/// [`Characteristic::start_notify`](crate::Characteristic::start_notify).
///
/// Dropping the handle detaches it: the callback keeps firing until the
/// characteristic stops notifying. Call [`cancel`](Self::cancel) to stop.
#[derive(Debug)]
pub struct NotifyHandle {
    uuid: Uuid,
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl NotifyHandle {
    pub(crate) fn spawn<F>(
        transport: SharedTransport,
        path: ObjectPath,
        uuid: Uuid,
        mut source: ValueReceiver,
        mut callback: F,
    ) -> Self
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let task_token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!("Notify callback on {} cancelled", path);
                        release(&transport, &path, &source).await;
                        break;
                    }
                    value = source.recv() => match value {
                        Some(value) => callback(&value),
                        None => {
                            debug!("Notification source for {} closed", path);
                            break;
                        }
                    }
                }
            }
        });

        Self {
            uuid,
            handle,
            cancel_token,
        }
    }

    /// UUID of the subscribed characteristic.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Stop notifications and the delivery task.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Cancel and wait for the delivery task to finish.
    pub async fn stop(self) {
        self.cancel_token.cancel();
        let _ = self.handle.await;
    }

    /// Get a cancellation token that can be used to cancel externally.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Check if the delivery task is still running.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// A stream of notification values.
///
/// Values are forwarded through a bounded channel; a slow consumer applies
/// backpressure to its own delivery task only. Closing or dropping the
/// stream disables notifications on the characteristic.
pub struct NotificationStream<T> {
    uuid: Uuid,
    receiver: mpsc::Receiver<T>,
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl<T> std::fmt::Debug for NotificationStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationStream")
            .field("uuid", &self.uuid)
            .field("active", &!self.handle.is_finished())
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish()
    }
}

impl<T: Send + 'static> NotificationStream<T> {
    /// Spawn the delivery task.
    ///
    /// `initial`, when present, is delivered before any notification.
    pub(crate) fn spawn<F>(
        transport: SharedTransport,
        path: ObjectPath,
        uuid: Uuid,
        mut source: ValueReceiver,
        buffer_size: usize,
        initial: Option<T>,
        mut map: F,
    ) -> Self
    where
        F: FnMut(Vec<u8>) -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let cancel_token = CancellationToken::new();
        let task_token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            if let Some(item) = initial
                && tx.send(item).await.is_err()
            {
                release(&transport, &path, &source).await;
                return;
            }

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!("Stream on {} cancelled, stopping gracefully", path);
                        release(&transport, &path, &source).await;
                        break;
                    }
                    value = source.recv() => match value {
                        Some(value) => {
                            if tx.send(map(value)).await.is_err() {
                                debug!("Stream receiver dropped, stopping");
                                release(&transport, &path, &source).await;
                                break;
                            }
                        }
                        None => {
                            debug!("Notification source for {} closed", path);
                            break;
                        }
                    }
                }
            }
        });

        Self {
            uuid,
            receiver: rx,
            handle,
            cancel_token,
        }
    }
}

impl<T> NotificationStream<T> {
    /// UUID of the subscribed characteristic.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Close the stream and stop notifications gracefully.
    pub fn close(self) {
        self.cancel_token.cancel();
    }

    /// Get a cancellation token that can be used to cancel the stream externally.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Check if the stream is still active (background task running).
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Check if the stream has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Wait for the next value.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }
}

impl<T> Drop for NotificationStream<T> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl<T> Stream for NotificationStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}
