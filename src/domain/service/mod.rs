// src/domain/service/mod.rs
// Outbound service interfaces

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::errors::NotifyResult;
use crate::domain::models::{DealId, OrderId, ResponseId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewResponse,
    ResponseAccepted,
    ResponseRejected,
    DealCreated,
    DealConfirmed,
    DealCompleted,
    OrderExpired,
    DealExpired,
}

/// Entities a notification refers to, for deep links on the receiving side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationContext {
    pub order_id: Option<OrderId>,
    pub response_id: Option<ResponseId>,
    pub deal_id: Option<DealId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub context: NotificationContext,
}

/// Outbound message delivery. No ordering or retry guarantee is assumed.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: UserId, notification: &Notification) -> NotifyResult<()>;
}
