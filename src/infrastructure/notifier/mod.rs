// src/infrastructure/notifier/mod.rs
// Notifier that writes outgoing messages to the log

use async_trait::async_trait;

use crate::domain::errors::NotifyResult;
use crate::domain::models::UserId;
use crate::domain::service::{Notification, Notifier};

/// Stand-in transport for deployments without a messaging gateway.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: UserId, notification: &Notification) -> NotifyResult<()> {
        log::info!(
            "Notify user {} [{:?}] {}: {}",
            recipient,
            notification.kind,
            notification.title,
            notification.body.replace('\n', " | ")
        );
        Ok(())
    }
}
