// src/domain/repository/mod.rs
// Repository interfaces for domain entities

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::StoreResult;
use crate::domain::models::{
    ConfirmRole, Deal, DealFilter, DealId, NewDeal, NewOrder, NewResponse, NewReview, Order,
    OrderFilter, OrderId, Response, ResponseFilter, ResponseId, Review, ReviewFilter, User,
    UserId,
};
use crate::domain::state::{DealStatus, OrderStatus, ResponseStatus};

/// Record store for orders, responses, deals and reviews.
///
/// Plain reads may observe state that a concurrent transaction is about to
/// change. Every write goes through a [`StoreTransaction`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>>;
    async fn get_response(&self, id: ResponseId) -> StoreResult<Option<Response>>;
    async fn get_deal(&self, id: DealId) -> StoreResult<Option<Deal>>;

    async fn query_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>>;
    async fn query_responses(&self, filter: &ResponseFilter) -> StoreResult<Vec<Response>>;
    async fn query_deals(&self, filter: &DealFilter) -> StoreResult<Vec<Deal>>;
    async fn query_reviews(&self, filter: &ReviewFilter) -> StoreResult<Vec<Review>>;

    /// Live deals created before `cutoff`, oldest first.
    async fn get_expired_deals(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Deal>> {
        let filter = DealFilter {
            statuses: DealStatus::LIVE.to_vec(),
            created_before: Some(cutoff),
            limit: Some(limit),
            ..Default::default()
        };
        self.query_deals(&filter).await
    }

    async fn health_check(&self) -> StoreResult<()>;

    /// Open a unit of work. Dropping it without `commit` discards its writes.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// Unit of work over the record store.
///
/// Reads inside a transaction see its own uncommitted writes. Implementations
/// must make the commit all-or-nothing and must keep two transactions from
/// interleaving writes to the same records.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn get_order(&mut self, id: OrderId) -> StoreResult<Option<Order>>;
    async fn get_response(&mut self, id: ResponseId) -> StoreResult<Option<Response>>;
    async fn get_deal(&mut self, id: DealId) -> StoreResult<Option<Deal>>;
    async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>>;

    async fn query_orders(&mut self, filter: &OrderFilter) -> StoreResult<Vec<Order>>;
    async fn query_responses(&mut self, filter: &ResponseFilter) -> StoreResult<Vec<Response>>;
    async fn query_deals(&mut self, filter: &DealFilter) -> StoreResult<Vec<Deal>>;
    async fn query_reviews(&mut self, filter: &ReviewFilter) -> StoreResult<Vec<Review>>;

    async fn create_order(&mut self, order: NewOrder) -> StoreResult<Order>;
    /// Persists a `waiting` response and bumps the order's response counter.
    async fn create_response(&mut self, response: NewResponse) -> StoreResult<Response>;
    async fn create_deal(&mut self, deal: NewDeal) -> StoreResult<Deal>;
    async fn create_review(&mut self, review: NewReview) -> StoreResult<Review>;

    /// Sets status and `updated_at`; also `completed_at` for `completed`.
    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus)
        -> StoreResult<Order>;
    async fn set_accepted_response(
        &mut self,
        order_id: OrderId,
        response_id: ResponseId,
    ) -> StoreResult<()>;
    /// Sets status and `reviewed_at`.
    async fn update_response_status(
        &mut self,
        id: ResponseId,
        status: ResponseStatus,
    ) -> StoreResult<Response>;
    /// Sets one side's confirmation flag and proof text, nothing else.
    async fn update_deal_confirmation(
        &mut self,
        id: DealId,
        role: ConfirmRole,
        proof: &str,
    ) -> StoreResult<Deal>;
    /// Sets status; also `completed_at` for `completed`.
    async fn update_deal_status(&mut self, id: DealId, status: DealStatus) -> StoreResult<Deal>;
    async fn record_dispute(&mut self, id: DealId, reason: &str) -> StoreResult<Deal>;
    /// Adds one to both the total and successful deal counters.
    async fn increment_deal_stats(&mut self, user_id: UserId) -> StoreResult<User>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Read access to user profiles, used to enrich notification text.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;
}
