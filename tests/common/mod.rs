//! Shared fixtures for integration tests: recording and failing notifiers,
//! a store wrapper that fails or panics on demand, and a wired-up desk.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;

use deal_desk::application::service::NotificationDispatcher;
use deal_desk::application::usecase::{LifecycleEngine, OrderDraft};
use deal_desk::domain::errors::{NotifyError, NotifyResult, StoreError, StoreResult};
use deal_desk::domain::models::{
    AssetPair, ConfirmRole, CryptoAsset, Deal, DealFilter, DealId, FiatCurrency, NewDeal,
    NewOrder, NewResponse, NewReview, Order, OrderFilter, OrderId, OrderSide, PaymentMethod,
    Response, ResponseFilter, ResponseId, Review, ReviewFilter, User, UserId,
};
use deal_desk::domain::repository::{RecordStore, StoreTransaction};
use deal_desk::domain::service::{Notification, NotificationKind, Notifier};
use deal_desk::domain::state::{DealStatus, OrderStatus, ResponseStatus};
use deal_desk::infrastructure::InMemoryStore;

pub const ALICE: UserId = 1;
pub const BOB: UserId = 2;
pub const CAROL: UserId = 3;
pub const DAVE: UserId = 4;

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, Notification)>>,
}

impl RecordingNotifier {
    pub async fn sent(&self) -> Vec<(UserId, Notification)> {
        self.sent.lock().await.clone()
    }

    pub async fn kinds_for(&self, user_id: UserId) -> Vec<NotificationKind> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(recipient, _)| *recipient == user_id)
            .map(|(_, n)| n.kind)
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: UserId, notification: &Notification) -> NotifyResult<()> {
        self.sent.lock().await.push((recipient, notification.clone()));
        Ok(())
    }
}

/// Notifier whose every delivery fails.
#[derive(Default)]
pub struct FailingNotifier {
    attempts: Mutex<usize>,
}

impl FailingNotifier {
    pub async fn attempts(&self) -> usize {
        *self.attempts.lock().await
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _recipient: UserId, _notification: &Notification) -> NotifyResult<()> {
        *self.attempts.lock().await += 1;
        Err(NotifyError::Delivery("gateway unavailable".into()))
    }
}

/// Delegates to an [`InMemoryStore`] but can be told to fail or panic on
/// the list queries the expiry scans use, or to fail deal creation inside
/// a transaction.
pub struct FaultyStore {
    inner: InMemoryStore,
    fail_scans: AtomicBool,
    panic_scans: AtomicBool,
    fail_deal_writes: Arc<AtomicBool>,
}

impl FaultyStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fail_scans: AtomicBool::new(false),
            panic_scans: AtomicBool::new(false),
            fail_deal_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_deal_writes(&self, on: bool) {
        self.fail_deal_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_scans(&self, on: bool) {
        self.fail_scans.store(on, Ordering::SeqCst);
    }

    pub fn panic_scans(&self, on: bool) {
        self.panic_scans.store(on, Ordering::SeqCst);
    }

    fn check_scan(&self) -> StoreResult<()> {
        if self.panic_scans.load(Ordering::SeqCst) {
            panic!("scan panicked");
        }
        if self.fail_scans.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        self.inner.get_order(id).await
    }

    async fn get_response(&self, id: ResponseId) -> StoreResult<Option<Response>> {
        self.inner.get_response(id).await
    }

    async fn get_deal(&self, id: DealId) -> StoreResult<Option<Deal>> {
        self.inner.get_deal(id).await
    }

    async fn query_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        self.check_scan()?;
        self.inner.query_orders(filter).await
    }

    async fn query_responses(&self, filter: &ResponseFilter) -> StoreResult<Vec<Response>> {
        self.inner.query_responses(filter).await
    }

    async fn query_deals(&self, filter: &DealFilter) -> StoreResult<Vec<Deal>> {
        self.check_scan()?;
        self.inner.query_deals(filter).await
    }

    async fn query_reviews(&self, filter: &ReviewFilter) -> StoreResult<Vec<Review>> {
        self.inner.query_reviews(filter).await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.check_scan()
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            fail_deal_writes: self.fail_deal_writes.clone(),
        }))
    }
}

struct FaultyTransaction {
    inner: Box<dyn StoreTransaction>,
    fail_deal_writes: Arc<AtomicBool>,
}

#[async_trait]
impl StoreTransaction for FaultyTransaction {
    async fn get_order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        self.inner.get_order(id).await
    }

    async fn get_response(&mut self, id: ResponseId) -> StoreResult<Option<Response>> {
        self.inner.get_response(id).await
    }

    async fn get_deal(&mut self, id: DealId) -> StoreResult<Option<Deal>> {
        self.inner.get_deal(id).await
    }

    async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        self.inner.get_user(id).await
    }

    async fn query_orders(&mut self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        self.inner.query_orders(filter).await
    }

    async fn query_responses(&mut self, filter: &ResponseFilter) -> StoreResult<Vec<Response>> {
        self.inner.query_responses(filter).await
    }

    async fn query_deals(&mut self, filter: &DealFilter) -> StoreResult<Vec<Deal>> {
        self.inner.query_deals(filter).await
    }

    async fn query_reviews(&mut self, filter: &ReviewFilter) -> StoreResult<Vec<Review>> {
        self.inner.query_reviews(filter).await
    }

    async fn create_order(&mut self, order: NewOrder) -> StoreResult<Order> {
        self.inner.create_order(order).await
    }

    async fn create_response(&mut self, response: NewResponse) -> StoreResult<Response> {
        self.inner.create_response(response).await
    }

    async fn create_deal(&mut self, deal: NewDeal) -> StoreResult<Deal> {
        if self.fail_deal_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("deal table unavailable".into()));
        }
        self.inner.create_deal(deal).await
    }

    async fn create_review(&mut self, review: NewReview) -> StoreResult<Review> {
        self.inner.create_review(review).await
    }

    async fn update_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
    ) -> StoreResult<Order> {
        self.inner.update_order_status(id, status).await
    }

    async fn set_accepted_response(
        &mut self,
        order_id: OrderId,
        response_id: ResponseId,
    ) -> StoreResult<()> {
        self.inner.set_accepted_response(order_id, response_id).await
    }

    async fn update_response_status(
        &mut self,
        id: ResponseId,
        status: ResponseStatus,
    ) -> StoreResult<Response> {
        self.inner.update_response_status(id, status).await
    }

    async fn update_deal_confirmation(
        &mut self,
        id: DealId,
        role: ConfirmRole,
        proof: &str,
    ) -> StoreResult<Deal> {
        self.inner.update_deal_confirmation(id, role, proof).await
    }

    async fn update_deal_status(&mut self, id: DealId, status: DealStatus) -> StoreResult<Deal> {
        self.inner.update_deal_status(id, status).await
    }

    async fn record_dispute(&mut self, id: DealId, reason: &str) -> StoreResult<Deal> {
        self.inner.record_dispute(id, reason).await
    }

    async fn increment_deal_stats(&mut self, user_id: UserId) -> StoreResult<User> {
        self.inner.increment_deal_stats(user_id).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.inner.rollback().await
    }
}

/// Store, notifier and engine wired together, with four users provisioned.
pub struct Desk {
    pub store: Arc<InMemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub dispatcher: NotificationDispatcher,
    pub engine: Arc<LifecycleEngine>,
}

impl Desk {
    pub async fn new() -> Self {
        Self::with_store(InMemoryStore::new()).await
    }

    pub async fn with_store(store: InMemoryStore) -> Self {
        seed_users(&store).await;
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::default());
        let (dispatcher, _worker) = NotificationDispatcher::spawn(notifier.clone(), 256);
        let engine = Arc::new(LifecycleEngine::new(
            store.clone(),
            store.clone(),
            dispatcher.clone(),
        ));

        Self {
            store,
            notifier,
            dispatcher,
            engine,
        }
    }

    /// Wait for queued notifications to reach the recording notifier.
    pub async fn settle(&self) {
        self.dispatcher.flush().await;
    }
}

pub async fn seed_users(store: &InMemoryStore) {
    for (id, name) in [(ALICE, "Alice"), (BOB, "Bob"), (CAROL, "Carol"), (DAVE, "Dave")] {
        store
            .insert_user(User::new(id, name))
            .await
            .expect("seed user");
    }
}

pub fn btc_rub_draft(side: OrderSide, quantity: Decimal, price: Decimal) -> OrderDraft {
    OrderDraft {
        side,
        pair: AssetPair::new(CryptoAsset::Btc, FiatCurrency::Rub),
        quantity,
        price,
        min_limit: None,
        max_limit: None,
        payment_methods: vec![PaymentMethod::Sberbank, PaymentMethod::Tinkoff],
        note: String::new(),
    }
}

/// The reference order: sell 0.01 BTC at 2,850,000 RUB.
pub fn reference_draft() -> OrderDraft {
    btc_rub_draft(OrderSide::Sell, dec!(0.01), dec!(2850000))
}
