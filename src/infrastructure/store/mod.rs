// src/infrastructure/store/mod.rs
// In-process record store with transactional writes and optional JSON snapshots

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::models::{
    ConfirmRole, Deal, DealFilter, DealId, NewDeal, NewOrder, NewResponse, NewReview, Order,
    OrderFilter, OrderId, Response, ResponseFilter, ResponseId, Review, ReviewFilter, ReviewId,
    ReviewKind, User, UserId,
};
use crate::domain::repository::{RecordStore, StoreTransaction, UserDirectory};
use crate::domain::state::{DealStatus, OrderStatus, ResponseStatus};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Sequences {
    order: i64,
    response: i64,
    deal: i64,
    review: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    users: BTreeMap<UserId, User>,
    orders: BTreeMap<OrderId, Order>,
    responses: BTreeMap<ResponseId, Response>,
    deals: BTreeMap<DealId, Deal>,
    reviews: BTreeMap<ReviewId, Review>,
    sequences: Sequences,
}

fn page<T>(items: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    let iter = items.into_iter().skip(offset);
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}

impl StoreState {
    fn orders_matching(&self, filter: &OrderFilter) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        page(orders, filter.offset, filter.limit)
    }

    fn responses_matching(&self, filter: &ResponseFilter) -> Vec<Response> {
        let mut responses: Vec<Response> = self
            .responses
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        responses.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        page(responses, 0, filter.limit)
    }

    fn deals_matching(&self, filter: &DealFilter) -> Vec<Deal> {
        let mut deals: Vec<Deal> = self
            .deals
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        deals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        page(deals, 0, filter.limit)
    }

    fn reviews_matching(&self, filter: &ReviewFilter) -> Vec<Review> {
        self.reviews
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    fn order_mut(&mut self, id: OrderId) -> StoreResult<&mut Order> {
        self.orders
            .get_mut(&id)
            .ok_or(StoreError::Missing { entity: "order", id })
    }

    fn response_mut(&mut self, id: ResponseId) -> StoreResult<&mut Response> {
        self.responses
            .get_mut(&id)
            .ok_or(StoreError::Missing { entity: "response", id })
    }

    fn deal_mut(&mut self, id: DealId) -> StoreResult<&mut Deal> {
        self.deals
            .get_mut(&id)
            .ok_or(StoreError::Missing { entity: "deal", id })
    }
}

/// Record store kept in memory, optionally mirrored to a JSON file.
///
/// A transaction holds the store-wide lock from `begin` until it is
/// committed or dropped and works on a private copy of the state, so
/// transactions are fully serialized and a dropped one leaves no trace.
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            snapshot_path: None,
        }
    }

    /// Store backed by a snapshot file. The file is read if present and
    /// rewritten on every commit.
    pub async fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if tokio::fs::try_exists(&path).await? {
            let contents = tokio::fs::read_to_string(&path).await?;
            let state: StoreState = serde_json::from_str(&contents)?;
            log::info!(
                "Loaded store snapshot {}: {} orders, {} deals",
                path.display(),
                state.orders.len(),
                state.deals.len()
            );
            state
        } else {
            log::info!("No store snapshot at {}, starting empty", path.display());
            StoreState::default()
        };

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            snapshot_path: Some(path),
        })
    }

    /// Provision or replace a user record.
    pub async fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.users.insert(user.id, user);
        if let Some(path) = &self.snapshot_path {
            write_snapshot(path, &state).await?;
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_snapshot(path: &Path, state: &StoreState) -> StoreResult<()> {
    let contents = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn get_response(&self, id: ResponseId) -> StoreResult<Option<Response>> {
        Ok(self.state.lock().await.responses.get(&id).cloned())
    }

    async fn get_deal(&self, id: DealId) -> StoreResult<Option<Deal>> {
        Ok(self.state.lock().await.deals.get(&id).cloned())
    }

    async fn query_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        Ok(self.state.lock().await.orders_matching(filter))
    }

    async fn query_responses(&self, filter: &ResponseFilter) -> StoreResult<Vec<Response>> {
        Ok(self.state.lock().await.responses_matching(filter))
    }

    async fn query_deals(&self, filter: &DealFilter) -> StoreResult<Vec<Deal>> {
        Ok(self.state.lock().await.deals_matching(filter))
    }

    async fn query_reviews(&self, filter: &ReviewFilter) -> StoreResult<Vec<Review>> {
        Ok(self.state.lock().await.reviews_matching(filter))
    }

    async fn health_check(&self) -> StoreResult<()> {
        if let Some(path) = &self.snapshot_path {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                if !tokio::fs::try_exists(dir).await? {
                    return Err(StoreError::Io(format!(
                        "snapshot directory {} does not exist",
                        dir.display()
                    )));
                }
            }
        }
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            snapshot_path: self.snapshot_path.clone(),
        }))
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
    snapshot_path: Option<PathBuf>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn get_order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn get_response(&mut self, id: ResponseId) -> StoreResult<Option<Response>> {
        Ok(self.working.responses.get(&id).cloned())
    }

    async fn get_deal(&mut self, id: DealId) -> StoreResult<Option<Deal>> {
        Ok(self.working.deals.get(&id).cloned())
    }

    async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn query_orders(&mut self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        Ok(self.working.orders_matching(filter))
    }

    async fn query_responses(&mut self, filter: &ResponseFilter) -> StoreResult<Vec<Response>> {
        Ok(self.working.responses_matching(filter))
    }

    async fn query_deals(&mut self, filter: &DealFilter) -> StoreResult<Vec<Deal>> {
        Ok(self.working.deals_matching(filter))
    }

    async fn query_reviews(&mut self, filter: &ReviewFilter) -> StoreResult<Vec<Review>> {
        Ok(self.working.reviews_matching(filter))
    }

    async fn create_order(&mut self, order: NewOrder) -> StoreResult<Order> {
        let now = Utc::now();
        self.working.sequences.order += 1;
        let record = Order {
            id: self.working.sequences.order,
            owner_id: order.owner_id,
            side: order.side,
            pair: order.pair,
            total: order.total,
            quantity: order.quantity,
            price: order.price,
            min_limit: order.min_limit,
            max_limit: order.max_limit,
            payment_methods: order.payment_methods,
            note: order.note,
            status: OrderStatus::Active,
            response_count: 0,
            accepted_response_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.working.orders.insert(record.id, record.clone());
        Ok(record)
    }

    async fn create_response(&mut self, response: NewResponse) -> StoreResult<Response> {
        let order = self.working.order_mut(response.order_id)?;
        order.response_count += 1;

        self.working.sequences.response += 1;
        let record = Response {
            id: self.working.sequences.response,
            order_id: response.order_id,
            responder_id: response.responder_id,
            message: response.message,
            status: ResponseStatus::Waiting,
            created_at: Utc::now(),
            reviewed_at: None,
        };
        self.working.responses.insert(record.id, record.clone());
        Ok(record)
    }

    async fn create_deal(&mut self, deal: NewDeal) -> StoreResult<Deal> {
        self.working.sequences.deal += 1;
        let record = Deal {
            id: self.working.sequences.deal,
            response_id: deal.response_id,
            order_id: deal.order_id,
            author_id: deal.author_id,
            counterparty_id: deal.counterparty_id,
            pair: deal.pair,
            side: deal.side,
            quantity: deal.quantity,
            price: deal.price,
            total: deal.total,
            payment_methods: deal.payment_methods,
            status: DealStatus::InProgress,
            author_confirmed: false,
            counterparty_confirmed: false,
            author_proof: String::new(),
            counterparty_proof: String::new(),
            dispute_reason: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.working.deals.insert(record.id, record.clone());
        Ok(record)
    }

    async fn create_review(&mut self, review: NewReview) -> StoreResult<Review> {
        self.working.sequences.review += 1;
        let record = Review {
            id: self.working.sequences.review,
            deal_id: review.deal_id,
            from_user_id: review.from_user_id,
            to_user_id: review.to_user_id,
            kind: ReviewKind::from_rating(review.rating),
            rating: review.rating,
            comment: review.comment,
            created_at: Utc::now(),
        };
        self.working.reviews.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
    ) -> StoreResult<Order> {
        let now = Utc::now();
        let order = self.working.order_mut(id)?;
        order.status = status;
        order.updated_at = now;
        if status == OrderStatus::Completed {
            order.completed_at = Some(now);
        }
        Ok(order.clone())
    }

    async fn set_accepted_response(
        &mut self,
        order_id: OrderId,
        response_id: ResponseId,
    ) -> StoreResult<()> {
        let order = self.working.order_mut(order_id)?;
        order.accepted_response_id = Some(response_id);
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn update_response_status(
        &mut self,
        id: ResponseId,
        status: ResponseStatus,
    ) -> StoreResult<Response> {
        let response = self.working.response_mut(id)?;
        response.status = status;
        if status != ResponseStatus::Waiting {
            response.reviewed_at = Some(Utc::now());
        }
        Ok(response.clone())
    }

    async fn update_deal_confirmation(
        &mut self,
        id: DealId,
        role: ConfirmRole,
        proof: &str,
    ) -> StoreResult<Deal> {
        let deal = self.working.deal_mut(id)?;
        match role {
            ConfirmRole::Author => {
                deal.author_confirmed = true;
                deal.author_proof = proof.to_string();
            }
            ConfirmRole::Counterparty => {
                deal.counterparty_confirmed = true;
                deal.counterparty_proof = proof.to_string();
            }
        }
        Ok(deal.clone())
    }

    async fn update_deal_status(&mut self, id: DealId, status: DealStatus) -> StoreResult<Deal> {
        let deal = self.working.deal_mut(id)?;
        deal.status = status;
        if status == DealStatus::Completed {
            deal.completed_at = Some(Utc::now());
        }
        Ok(deal.clone())
    }

    async fn record_dispute(&mut self, id: DealId, reason: &str) -> StoreResult<Deal> {
        let deal = self.working.deal_mut(id)?;
        deal.dispute_reason = Some(reason.to_string());
        Ok(deal.clone())
    }

    async fn increment_deal_stats(&mut self, user_id: UserId) -> StoreResult<User> {
        let user = self
            .working
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::Missing {
                entity: "user",
                id: user_id,
            })?;
        user.total_deals += 1;
        user.successful_deals += 1;
        Ok(user.clone())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction {
            mut guard,
            working,
            snapshot_path,
        } = *self;

        // Persist before publishing so a failed write leaves nothing applied.
        if let Some(path) = &snapshot_path {
            write_snapshot(path, &working).await?;
        }
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
