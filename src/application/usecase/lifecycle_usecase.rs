// src/application/usecase/lifecycle_usecase.rs
// Order -> Response -> Deal lifecycle transitions

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::application::service::formatter;
use crate::application::service::{AggregateKey, AggregateLocks, NotificationDispatcher};
use crate::domain::errors::{DealError, DealResult};
use crate::domain::models::{
    AssetPair, ConfirmRole, Deal, DealFilter, DealId, NewDeal, NewOrder, NewResponse, Order,
    OrderFilter, OrderId, OrderSide, PaymentMethod, Rating, Response, ResponseFilter, ResponseId,
    ReviewFilter, UserId, UserStats, MAX_MESSAGE_LEN,
};
use crate::domain::repository::{RecordStore, StoreTransaction, UserDirectory};
use crate::domain::state::{
    DealEvent, DealStatus, OrderEvent, OrderStatus, ResponseStatus, ReviewDecision,
};

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 100;

/// Terms of an order as submitted by its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub side: OrderSide,
    pub pair: AssetPair,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Defaults to the order total when omitted.
    pub min_limit: Option<Decimal>,
    /// Defaults to the order total when omitted.
    pub max_limit: Option<Decimal>,
    pub payment_methods: Vec<PaymentMethod>,
    pub note: String,
}

impl OrderDraft {
    fn total(&self) -> DealResult<Decimal> {
        self.quantity
            .checked_mul(self.price)
            .ok_or_else(|| DealError::Validation("order total out of range".into()))
    }

    /// Zero or omitted limits fall back to the order total.
    fn limits(&self, total: Decimal) -> (Decimal, Decimal) {
        let min = self.min_limit.filter(|m| !m.is_zero()).unwrap_or(total);
        let max = self.max_limit.filter(|m| !m.is_zero()).unwrap_or(total);
        (min, max)
    }

    fn validate(&self) -> DealResult<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(DealError::Validation("quantity must be positive".into()));
        }
        if self.price <= Decimal::ZERO {
            return Err(DealError::Validation("price must be positive".into()));
        }
        if self.payment_methods.is_empty() {
            return Err(DealError::Validation(
                "at least one payment method is required".into(),
            ));
        }
        if self.min_limit.is_some_and(|m| m < Decimal::ZERO)
            || self.max_limit.is_some_and(|m| m < Decimal::ZERO)
        {
            return Err(DealError::Validation("limits cannot be negative".into()));
        }
        let (min, max) = self.limits(self.total()?);
        if max < min {
            return Err(DealError::Validation(format!(
                "max limit {:.2} is below min limit {:.2}",
                max, min
            )));
        }
        if self.note.chars().count() > MAX_MESSAGE_LEN {
            return Err(DealError::Validation(format!(
                "note exceeds {} characters",
                MAX_MESSAGE_LEN
            )));
        }
        Ok(())
    }

    /// Call only after `validate` has passed.
    fn into_new_order(self, owner_id: UserId, total: Decimal) -> NewOrder {
        let (min_limit, max_limit) = self.limits(total);
        let mut payment_methods = self.payment_methods;
        payment_methods.sort();
        payment_methods.dedup();

        NewOrder {
            owner_id,
            side: self.side,
            pair: self.pair,
            quantity: self.quantity,
            price: self.price,
            total,
            min_limit,
            max_limit,
            payment_methods,
            note: self.note.trim().to_string(),
        }
    }
}

/// Result of a confirmation request.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// This side had confirmed before; nothing changed.
    AlreadyConfirmed(Deal),
    /// Confirmation recorded, the other side still has to confirm.
    AwaitingOther(Deal),
    /// Both sides confirmed; the deal is complete.
    Completed(Deal),
}

impl ConfirmOutcome {
    pub fn deal(&self) -> &Deal {
        match self {
            ConfirmOutcome::AlreadyConfirmed(deal)
            | ConfirmOutcome::AwaitingOther(deal)
            | ConfirmOutcome::Completed(deal) => deal,
        }
    }
}

/// A timed-out deal and the orders cancelled along with it.
#[derive(Debug, Clone, PartialEq)]
pub struct DealExpiry {
    pub deal: Deal,
    pub cancelled_orders: Vec<Order>,
}

#[async_trait]
pub trait DealLifecycleUseCase {
    async fn create_order(&self, owner_id: UserId, draft: OrderDraft) -> DealResult<Order>;

    async fn cancel_order(&self, owner_id: UserId, order_id: OrderId) -> DealResult<Order>;

    async fn create_response(
        &self,
        responder_id: UserId,
        order_id: OrderId,
        message: &str,
    ) -> DealResult<Response>;

    /// Accept one response: it becomes `accepted`, its waiting siblings
    /// `rejected`, a deal is opened and the order moves to `in_deal`, all in
    /// one unit of work.
    async fn accept_response(&self, owner_id: UserId, response_id: ResponseId) -> DealResult<Deal>;

    async fn reject_response(
        &self,
        owner_id: UserId,
        response_id: ResponseId,
        reason: Option<&str>,
    ) -> DealResult<Response>;

    async fn confirm_deal(
        &self,
        user_id: UserId,
        deal_id: DealId,
        is_author: bool,
        proof: &str,
    ) -> DealResult<ConfirmOutcome>;

    async fn open_dispute(&self, user_id: UserId, deal_id: DealId, reason: &str)
        -> DealResult<Deal>;

    /// Expire an open order created before `cutoff`.
    async fn expire_order(&self, order_id: OrderId, cutoff: DateTime<Utc>) -> DealResult<Order>;

    /// Expire a live deal created before `cutoff` and cancel the
    /// participants' `in_deal` orders that no other live or disputed deal
    /// backs.
    async fn expire_deal(&self, deal_id: DealId, cutoff: DateTime<Utc>) -> DealResult<DealExpiry>;

    async fn get_order(&self, order_id: OrderId) -> DealResult<Order>;

    async fn list_orders(&self, filter: OrderFilter) -> DealResult<Vec<Order>>;

    async fn get_order_responses(
        &self,
        owner_id: UserId,
        order_id: OrderId,
    ) -> DealResult<Vec<Response>>;

    /// Responses the user left on other people's orders, newest first.
    async fn get_user_responses(&self, responder_id: UserId) -> DealResult<Vec<Response>>;

    /// Responses left on any of the user's orders, newest first.
    async fn get_responses_to_my_orders(&self, owner_id: UserId) -> DealResult<Vec<Response>>;

    async fn get_user_deals(&self, user_id: UserId) -> DealResult<Vec<Deal>>;

    async fn get_user_stats(&self, user_id: UserId) -> DealResult<UserStats>;

    async fn get_deal(&self, user_id: UserId, deal_id: DealId) -> DealResult<Deal>;
}

pub struct LifecycleEngine {
    store: Arc<dyn RecordStore>,
    users: Arc<dyn UserDirectory>,
    dispatcher: NotificationDispatcher,
    locks: Arc<AggregateLocks>,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        users: Arc<dyn UserDirectory>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            users,
            dispatcher,
            locks: Arc::new(AggregateLocks::new()),
        }
    }

    /// Lock table shared with other writers of the same aggregates.
    pub fn locks(&self) -> Arc<AggregateLocks> {
        self.locks.clone()
    }

    /// Name used in notification text. Never fails.
    async fn display_name(&self, user_id: UserId) -> String {
        match self.users.get_user(user_id).await {
            Ok(Some(user)) => user.label(),
            Ok(None) => format!("User #{}", user_id),
            Err(e) => {
                log::warn!("Could not resolve name of user {}: {}", user_id, e);
                format!("User #{}", user_id)
            }
        }
    }

    async fn order_id_of_response(&self, response_id: ResponseId) -> DealResult<OrderId> {
        self.store
            .get_response(response_id)
            .await?
            .map(|response| response.order_id)
            .ok_or_else(|| DealError::not_found("response", response_id))
    }

    async fn order_id_of_deal(&self, deal_id: DealId) -> DealResult<OrderId> {
        self.store
            .get_deal(deal_id)
            .await?
            .map(|deal| deal.order_id)
            .ok_or_else(|| DealError::not_found("deal", deal_id))
    }
}

async fn load_order(tx: &mut dyn StoreTransaction, order_id: OrderId) -> DealResult<Order> {
    tx.get_order(order_id)
        .await?
        .ok_or_else(|| DealError::not_found("order", order_id))
}

async fn load_deal(tx: &mut dyn StoreTransaction, deal_id: DealId) -> DealResult<Deal> {
    tx.get_deal(deal_id)
        .await?
        .ok_or_else(|| DealError::not_found("deal", deal_id))
}

/// Loads a response and its order for an accept/reject decision by
/// `owner_id`, rejecting anything that is no longer decidable.
async fn load_for_review(
    tx: &mut dyn StoreTransaction,
    owner_id: UserId,
    response_id: ResponseId,
) -> DealResult<(Order, Response)> {
    let response = tx
        .get_response(response_id)
        .await?
        .ok_or_else(|| DealError::not_found("response", response_id))?;
    let order = load_order(tx, response.order_id).await?;

    if order.owner_id != owner_id {
        return Err(DealError::Forbidden(format!(
            "only the owner of order {} can review its responses",
            order.id
        )));
    }

    // An accepted response on the order means another decision won.
    let resolved = order.accepted_response_id.is_some();
    if response.status != ResponseStatus::Waiting {
        let detail = format!("response {} is already {}", response.id, response.status);
        return Err(if resolved {
            DealError::AlreadyResolved(detail)
        } else {
            DealError::InvalidState(detail)
        });
    }
    if !order.status.is_open() {
        let detail = format!("order {} is {}", order.id, order.status);
        return Err(if resolved {
            DealError::AlreadyResolved(detail)
        } else {
            DealError::InvalidState(detail)
        });
    }

    Ok((order, response))
}

/// Rejects every waiting response on `order_id` except `keep`.
async fn reject_waiting(
    tx: &mut dyn StoreTransaction,
    order_id: OrderId,
    keep: Option<ResponseId>,
) -> DealResult<Vec<Response>> {
    let filter = ResponseFilter {
        order_id: Some(order_id),
        statuses: vec![ResponseStatus::Waiting],
        ..Default::default()
    };
    let waiting = tx.query_responses(&filter).await?;

    let mut rejected = Vec::with_capacity(waiting.len());
    for response in waiting.into_iter().filter(|r| Some(r.id) != keep) {
        let status = response.status.review(ReviewDecision::Reject)?;
        rejected.push(tx.update_response_status(response.id, status).await?);
    }
    Ok(rejected)
}

#[async_trait]
impl DealLifecycleUseCase for LifecycleEngine {
    async fn create_order(&self, owner_id: UserId, draft: OrderDraft) -> DealResult<Order> {
        draft.validate()?;
        let total = draft.total()?;

        let mut tx = self.store.begin().await?;
        let owner = tx
            .get_user(owner_id)
            .await?
            .ok_or_else(|| DealError::not_found("user", owner_id))?;
        if !owner.is_active {
            return Err(DealError::Forbidden(format!(
                "user {} is not allowed to post orders",
                owner_id
            )));
        }

        let order = tx.create_order(draft.into_new_order(owner_id, total)).await?;
        tx.commit().await?;

        log::info!(
            "Order {} created by user {}: {} {:.8} {} at {:.2}",
            order.id,
            owner_id,
            order.side,
            order.quantity,
            order.pair,
            order.price
        );
        Ok(order)
    }

    async fn cancel_order(&self, owner_id: UserId, order_id: OrderId) -> DealResult<Order> {
        let _guard = self.locks.lock(AggregateKey::Order(order_id)).await;
        let mut tx = self.store.begin().await?;

        let order = load_order(&mut *tx, order_id).await?;
        if order.owner_id != owner_id {
            return Err(DealError::Forbidden(format!(
                "only the owner can cancel order {}",
                order_id
            )));
        }
        let next = order.status.apply(OrderEvent::CancelledByOwner)?;

        let rejected = reject_waiting(&mut *tx, order_id, None).await?;
        let order = tx.update_order_status(order_id, next).await?;
        tx.commit().await?;

        log::info!(
            "Order {} cancelled by owner, {} waiting responses rejected",
            order_id,
            rejected.len()
        );

        let author = self.display_name(owner_id).await;
        for response in &rejected {
            self.dispatcher.dispatch(
                response.responder_id,
                formatter::response_rejected(&order, response, &author, Some("order cancelled")),
            );
        }
        Ok(order)
    }

    async fn create_response(
        &self,
        responder_id: UserId,
        order_id: OrderId,
        message: &str,
    ) -> DealResult<Response> {
        let message = message.trim();
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(DealError::Validation(format!(
                "message exceeds {} characters",
                MAX_MESSAGE_LEN
            )));
        }

        let _guard = self.locks.lock(AggregateKey::Order(order_id)).await;
        let mut tx = self.store.begin().await?;

        let order = load_order(&mut *tx, order_id).await?;
        if order.owner_id == responder_id {
            return Err(DealError::Forbidden(
                "cannot respond to your own order".into(),
            ));
        }
        if !order.status.is_open() {
            return Err(DealError::InvalidState(format!(
                "order {} is {} and not open for responses",
                order_id, order.status
            )));
        }
        let next = order.status.apply(OrderEvent::ResponseReceived)?;

        let response = tx
            .create_response(NewResponse {
                order_id,
                responder_id,
                message: message.to_string(),
            })
            .await?;
        let order = if next != order.status {
            tx.update_order_status(order_id, next).await?
        } else {
            order
        };
        tx.commit().await?;

        log::info!(
            "Response {} from user {} on order {}",
            response.id,
            responder_id,
            order_id
        );

        let responder = self.display_name(responder_id).await;
        self.dispatcher.dispatch(
            order.owner_id,
            formatter::new_response(&order, &response, &responder),
        );
        Ok(response)
    }

    async fn accept_response(&self, owner_id: UserId, response_id: ResponseId) -> DealResult<Deal> {
        let order_id = self.order_id_of_response(response_id).await?;
        let _guard = self.locks.lock(AggregateKey::Order(order_id)).await;
        let mut tx = self.store.begin().await?;

        let (order, response) = load_for_review(&mut *tx, owner_id, response_id).await?;
        let accepted_status = response.status.review(ReviewDecision::Accept)?;
        let order_status = order.status.apply(OrderEvent::ResponseAccepted)?;

        let accepted = tx
            .update_response_status(response.id, accepted_status)
            .await?;
        let rejected = reject_waiting(&mut *tx, order.id, Some(accepted.id)).await?;
        let deal = tx
            .create_deal(NewDeal::from_acceptance(&order, &accepted))
            .await?;
        let order = tx.update_order_status(order.id, order_status).await?;
        tx.set_accepted_response(order.id, accepted.id).await?;
        tx.commit().await?;

        log::info!(
            "Response {} accepted on order {}: deal {} opened, {} responses rejected",
            accepted.id,
            order.id,
            deal.id,
            rejected.len()
        );

        let author = self.display_name(deal.author_id).await;
        let counterparty = self.display_name(deal.counterparty_id).await;
        self.dispatcher.dispatch(
            accepted.responder_id,
            formatter::response_accepted(&order, &accepted, &author),
        );
        for response in &rejected {
            self.dispatcher.dispatch(
                response.responder_id,
                formatter::response_rejected(&order, response, &author, None),
            );
        }
        self.dispatcher
            .dispatch(deal.author_id, formatter::deal_created(&deal, &counterparty));
        self.dispatcher
            .dispatch(deal.counterparty_id, formatter::deal_created(&deal, &author));

        Ok(deal)
    }

    async fn reject_response(
        &self,
        owner_id: UserId,
        response_id: ResponseId,
        reason: Option<&str>,
    ) -> DealResult<Response> {
        let order_id = self.order_id_of_response(response_id).await?;
        let _guard = self.locks.lock(AggregateKey::Order(order_id)).await;
        let mut tx = self.store.begin().await?;

        let (order, response) = load_for_review(&mut *tx, owner_id, response_id).await?;
        let status = response.status.review(ReviewDecision::Reject)?;
        let rejected = tx.update_response_status(response.id, status).await?;
        tx.commit().await?;

        log::info!("Response {} rejected on order {}", rejected.id, order.id);

        let author = self.display_name(owner_id).await;
        self.dispatcher.dispatch(
            rejected.responder_id,
            formatter::response_rejected(&order, &rejected, &author, reason),
        );
        Ok(rejected)
    }

    async fn confirm_deal(
        &self,
        user_id: UserId,
        deal_id: DealId,
        is_author: bool,
        proof: &str,
    ) -> DealResult<ConfirmOutcome> {
        let order_id = self.order_id_of_deal(deal_id).await?;
        let _guard = self
            .locks
            .lock_all(&[AggregateKey::Order(order_id), AggregateKey::Deal(deal_id)])
            .await;
        let mut tx = self.store.begin().await?;

        let deal = load_deal(&mut *tx, deal_id).await?;
        let role = ConfirmRole::from_is_author(is_author);
        if deal.participant_id(role) != user_id {
            return Err(DealError::Forbidden(format!(
                "user {} cannot confirm deal {} as {:?}",
                user_id, deal_id, role
            )));
        }
        if deal.is_confirmed_by(role) {
            tx.rollback().await?;
            log::debug!("Deal {} already confirmed by user {}", deal_id, user_id);
            return Ok(ConfirmOutcome::AlreadyConfirmed(deal));
        }

        let (author, counterparty) = match role {
            ConfirmRole::Author => (true, deal.counterparty_confirmed),
            ConfirmRole::Counterparty => (deal.author_confirmed, true),
        };
        let next = deal.status.apply(DealEvent::Confirmed {
            author,
            counterparty,
        })?;

        tx.update_deal_confirmation(deal_id, role, proof.trim())
            .await?;
        let deal = tx.update_deal_status(deal_id, next).await?;

        if next == DealStatus::Completed {
            tx.increment_deal_stats(deal.author_id).await?;
            tx.increment_deal_stats(deal.counterparty_id).await?;

            let order = load_order(&mut *tx, deal.order_id).await?;
            match order.status.apply(OrderEvent::DealCompleted) {
                Ok(status) => {
                    tx.update_order_status(order.id, status).await?;
                }
                Err(e) => log::warn!(
                    "Deal {} completed but order {} was left as is: {}",
                    deal.id,
                    order.id,
                    e
                ),
            }
        }
        tx.commit().await?;

        let confirmer = self.display_name(user_id).await;
        if next == DealStatus::Completed {
            log::info!("Deal {} completed", deal.id);
            let author = if is_author {
                confirmer.clone()
            } else {
                self.display_name(deal.author_id).await
            };
            let counterparty = if is_author {
                self.display_name(deal.counterparty_id).await
            } else {
                confirmer
            };
            let notification = formatter::deal_completed(&deal, &author, &counterparty);
            self.dispatcher
                .dispatch(deal.author_id, notification.clone());
            self.dispatcher.dispatch(deal.counterparty_id, notification);
            Ok(ConfirmOutcome::Completed(deal))
        } else {
            log::info!("Deal {} confirmed by user {}", deal.id, user_id);
            let waiting_id = deal.participant_id(role.other());
            let waiting = self.display_name(waiting_id).await;
            self.dispatcher.dispatch(
                waiting_id,
                formatter::deal_confirmed(&deal, &confirmer, &waiting),
            );
            Ok(ConfirmOutcome::AwaitingOther(deal))
        }
    }

    async fn open_dispute(
        &self,
        user_id: UserId,
        deal_id: DealId,
        reason: &str,
    ) -> DealResult<Deal> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DealError::Validation("dispute reason is required".into()));
        }
        if reason.chars().count() > MAX_MESSAGE_LEN {
            return Err(DealError::Validation(format!(
                "dispute reason exceeds {} characters",
                MAX_MESSAGE_LEN
            )));
        }

        let order_id = self.order_id_of_deal(deal_id).await?;
        let _guard = self
            .locks
            .lock_all(&[AggregateKey::Order(order_id), AggregateKey::Deal(deal_id)])
            .await;
        let mut tx = self.store.begin().await?;

        let deal = load_deal(&mut *tx, deal_id).await?;
        if !deal.is_participant(user_id) {
            return Err(DealError::Forbidden(format!(
                "user {} is not a participant of deal {}",
                user_id, deal_id
            )));
        }
        let next = deal.status.apply(DealEvent::Disputed)?;

        tx.update_deal_status(deal_id, next).await?;
        let deal = tx.record_dispute(deal_id, reason).await?;
        tx.commit().await?;

        log::warn!("Dispute opened on deal {} by user {}: {}", deal_id, user_id, reason);
        Ok(deal)
    }

    async fn expire_order(&self, order_id: OrderId, cutoff: DateTime<Utc>) -> DealResult<Order> {
        let _guard = self.locks.lock(AggregateKey::Order(order_id)).await;
        let mut tx = self.store.begin().await?;

        let order = load_order(&mut *tx, order_id).await?;
        if order.created_at >= cutoff {
            return Err(DealError::InvalidState(format!(
                "order {} has not reached its timeout",
                order_id
            )));
        }
        let next = order.status.apply(OrderEvent::TimedOut)?;
        let order = tx.update_order_status(order_id, next).await?;
        tx.commit().await?;

        log::info!("Order {} expired (created {})", order.id, order.created_at);
        self.dispatcher
            .dispatch(order.owner_id, formatter::order_expired(&order));
        Ok(order)
    }

    async fn expire_deal(&self, deal_id: DealId, cutoff: DateTime<Utc>) -> DealResult<DealExpiry> {
        let order_id = self.order_id_of_deal(deal_id).await?;
        let _guard = self
            .locks
            .lock_all(&[AggregateKey::Order(order_id), AggregateKey::Deal(deal_id)])
            .await;
        let mut tx = self.store.begin().await?;

        let deal = load_deal(&mut *tx, deal_id).await?;
        if deal.created_at >= cutoff {
            return Err(DealError::InvalidState(format!(
                "deal {} has not reached its timeout",
                deal_id
            )));
        }
        let next = deal.status.apply(DealEvent::TimedOut)?;
        let deal = tx.update_deal_status(deal_id, next).await?;

        let filter = OrderFilter {
            owners: vec![deal.author_id, deal.counterparty_id],
            statuses: vec![OrderStatus::InDeal],
            ..Default::default()
        };
        let mut cancelled_orders = Vec::new();
        for order in tx.query_orders(&filter).await? {
            let backing = DealFilter {
                order_id: Some(order.id),
                statuses: DealStatus::HOLDING.to_vec(),
                ..Default::default()
            };
            let still_live = tx
                .query_deals(&backing)
                .await?
                .into_iter()
                .any(|other| other.id != deal.id);
            if still_live {
                log::debug!("Order {} still backs an open deal, keeping it", order.id);
                continue;
            }
            let status = order.status.apply(OrderEvent::DealExpired)?;
            cancelled_orders.push(tx.update_order_status(order.id, status).await?);
        }
        tx.commit().await?;

        log::info!(
            "Deal {} expired, {} orders cancelled",
            deal.id,
            cancelled_orders.len()
        );

        let author = self.display_name(deal.author_id).await;
        let counterparty = self.display_name(deal.counterparty_id).await;
        self.dispatcher
            .dispatch(deal.author_id, formatter::deal_expired(&deal, &counterparty));
        self.dispatcher
            .dispatch(deal.counterparty_id, formatter::deal_expired(&deal, &author));

        Ok(DealExpiry {
            deal,
            cancelled_orders,
        })
    }

    async fn get_order(&self, order_id: OrderId) -> DealResult<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DealError::not_found("order", order_id))
    }

    async fn list_orders(&self, mut filter: OrderFilter) -> DealResult<Vec<Order>> {
        filter.limit = Some(
            filter
                .limit
                .unwrap_or(DEFAULT_LIST_LIMIT)
                .clamp(1, MAX_LIST_LIMIT),
        );
        Ok(self.store.query_orders(&filter).await?)
    }

    async fn get_order_responses(
        &self,
        owner_id: UserId,
        order_id: OrderId,
    ) -> DealResult<Vec<Response>> {
        let order = self.get_order(order_id).await?;
        if order.owner_id != owner_id {
            return Err(DealError::Forbidden(format!(
                "only the owner can list responses on order {}",
                order_id
            )));
        }
        let filter = ResponseFilter {
            order_id: Some(order_id),
            ..Default::default()
        };
        Ok(self.store.query_responses(&filter).await?)
    }

    async fn get_user_responses(&self, responder_id: UserId) -> DealResult<Vec<Response>> {
        let filter = ResponseFilter {
            responder_id: Some(responder_id),
            ..Default::default()
        };
        let mut responses = self.store.query_responses(&filter).await?;
        responses.reverse();
        Ok(responses)
    }

    async fn get_responses_to_my_orders(&self, owner_id: UserId) -> DealResult<Vec<Response>> {
        let orders = self
            .store
            .query_orders(&OrderFilter {
                owner_id: Some(owner_id),
                ..Default::default()
            })
            .await?;
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let filter = ResponseFilter {
            order_ids: orders.iter().map(|o| o.id).collect(),
            ..Default::default()
        };
        let mut responses = self.store.query_responses(&filter).await?;
        responses.reverse();
        Ok(responses)
    }

    async fn get_user_deals(&self, user_id: UserId) -> DealResult<Vec<Deal>> {
        let filter = DealFilter {
            participant_id: Some(user_id),
            ..Default::default()
        };
        let mut deals = self.store.query_deals(&filter).await?;
        deals.reverse();
        Ok(deals)
    }

    async fn get_user_stats(&self, user_id: UserId) -> DealResult<UserStats> {
        self.users
            .get_user(user_id)
            .await?
            .ok_or_else(|| DealError::not_found("user", user_id))?;

        let orders = self
            .store
            .query_orders(&OrderFilter {
                owner_id: Some(user_id),
                ..Default::default()
            })
            .await?;
        let deals = self
            .store
            .query_deals(&DealFilter {
                participant_id: Some(user_id),
                ..Default::default()
            })
            .await?;
        let reviews = self
            .store
            .query_reviews(&ReviewFilter {
                to_user_id: Some(user_id),
                ..Default::default()
            })
            .await?;

        let stats = UserStats::collect(
            user_id,
            &orders,
            &deals,
            Rating::from_reviews(user_id, &reviews),
        );
        log::debug!(
            "Stats for user {}: {} orders, {} deals",
            user_id,
            stats.total_orders,
            stats.total_deals
        );
        Ok(stats)
    }

    async fn get_deal(&self, user_id: UserId, deal_id: DealId) -> DealResult<Deal> {
        let deal = self
            .store
            .get_deal(deal_id)
            .await?
            .ok_or_else(|| DealError::not_found("deal", deal_id))?;
        if !deal.is_participant(user_id) {
            return Err(DealError::Forbidden(format!(
                "user {} is not a participant of deal {}",
                user_id, deal_id
            )));
        }
        Ok(deal)
    }
}
