// src/application/usecase/matching_usecase.rs
// Direct order-to-order matching (legacy path, bypasses responses)

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::service::{AggregateKey, AggregateLocks};
use crate::domain::errors::{DealError, DealResult};
use crate::domain::matching;
use crate::domain::models::{Order, OrderFilter, OrderId};
use crate::domain::repository::RecordStore;
use crate::domain::state::{OrderEvent, OrderStatus};

#[async_trait]
pub trait MatchingUseCase {
    /// Up to ten compatible counter-orders, best price first.
    async fn get_matching_orders(&self, order_id: OrderId) -> DealResult<Vec<Order>>;

    /// Flip both orders to `matched`, provided both are still `active`.
    async fn match_orders(&self, first: OrderId, second: OrderId) -> DealResult<(Order, Order)>;
}

pub struct OrderMatcher {
    store: Arc<dyn RecordStore>,
    locks: Arc<AggregateLocks>,
}

impl OrderMatcher {
    pub fn new(store: Arc<dyn RecordStore>, locks: Arc<AggregateLocks>) -> Self {
        Self { store, locks }
    }
}

#[async_trait]
impl MatchingUseCase for OrderMatcher {
    async fn get_matching_orders(&self, order_id: OrderId) -> DealResult<Vec<Order>> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DealError::not_found("order", order_id))?;
        if order.status != OrderStatus::Active {
            return Ok(Vec::new());
        }

        let filter = OrderFilter {
            side: Some(order.side.opposite()),
            pair: Some(order.pair),
            statuses: vec![OrderStatus::Active],
            exclude_owner: Some(order.owner_id),
            ..Default::default()
        };
        let pool = self.store.query_orders(&filter).await?;
        let matches = matching::select_matches(&order, pool);

        log::debug!("Order {}: {} matching candidates", order_id, matches.len());
        Ok(matches)
    }

    async fn match_orders(&self, first: OrderId, second: OrderId) -> DealResult<(Order, Order)> {
        if first == second {
            return Err(DealError::Validation("an order cannot match itself".into()));
        }

        let _guard = self
            .locks
            .lock_all(&[AggregateKey::Order(first), AggregateKey::Order(second)])
            .await;
        let mut tx = self.store.begin().await?;

        let a = tx
            .get_order(first)
            .await?
            .ok_or_else(|| DealError::not_found("order", first))?;
        let b = tx
            .get_order(second)
            .await?
            .ok_or_else(|| DealError::not_found("order", second))?;

        for order in [&a, &b] {
            if order.status != OrderStatus::Active {
                return Err(DealError::Unavailable(format!(
                    "order {} is {}",
                    order.id, order.status
                )));
            }
        }
        if !matching::is_compatible(&a, &b) {
            return Err(DealError::Validation(format!(
                "orders {} and {} are not compatible",
                a.id, b.id
            )));
        }

        let a_status = a.status.apply(OrderEvent::DirectMatch)?;
        let b_status = b.status.apply(OrderEvent::DirectMatch)?;
        let a = tx.update_order_status(a.id, a_status).await?;
        let b = tx.update_order_status(b.id, b_status).await?;
        tx.commit().await?;

        log::info!("Orders {} and {} matched directly", a.id, b.id);
        Ok((a, b))
    }
}
