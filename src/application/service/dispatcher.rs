// src/application/service/dispatcher.rs
// Queue + worker that decouples notification delivery from transitions

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::domain::models::UserId;
use crate::domain::service::{Notification, Notifier};

enum Envelope {
    Deliver {
        recipient: UserId,
        notification: Notification,
    },
    Flush(oneshot::Sender<()>),
}

/// Handle for enqueueing notifications. Cheap to clone; the worker exits
/// once every handle is dropped and the queue has drained.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<Envelope>,
    dropped: Arc<AtomicU64>,
}

impl NotificationDispatcher {
    /// Start the delivery worker on the current runtime.
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(notifier, receiver));
        log::info!("Notification dispatcher started (capacity {})", capacity.max(1));

        (
            Self {
                sender,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            handle,
        )
    }

    /// Enqueue without waiting. A full or closed queue drops the message.
    pub fn dispatch(&self, recipient: UserId, notification: Notification) {
        let kind = notification.kind;
        let envelope = Envelope::Deliver {
            recipient,
            notification,
        };
        match self.sender.try_send(envelope) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Notification queue full, dropping {:?} for user {}",
                    kind,
                    recipient
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "Notification queue closed, dropping {:?} for user {}",
                    kind,
                    recipient
                );
            }
        }
    }

    /// Wait until everything enqueued before this call has been handled.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.sender.send(Envelope::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    /// Messages discarded because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

async fn run_worker(notifier: Arc<dyn Notifier>, mut receiver: mpsc::Receiver<Envelope>) {
    while let Some(envelope) = receiver.recv().await {
        match envelope {
            Envelope::Deliver {
                recipient,
                notification,
            } => {
                let delivery = AssertUnwindSafe(notifier.send(recipient, &notification))
                    .catch_unwind()
                    .await;
                match delivery {
                    Ok(Ok(())) => {
                        log::debug!("Delivered {:?} to user {}", notification.kind, recipient)
                    }
                    Ok(Err(e)) => log::warn!(
                        "Failed to deliver {:?} to user {}: {}",
                        notification.kind,
                        recipient,
                        e
                    ),
                    Err(_) => log::error!(
                        "Notifier panicked delivering {:?} to user {}",
                        notification.kind,
                        recipient
                    ),
                }
            }
            Envelope::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    log::info!("Notification dispatcher stopped");
}
