// src/domain/matching.rs
// Compatibility rules for pairing two orders directly (legacy path)

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::domain::models::{Order, OrderSide};

pub const MAX_MATCHES: usize = 10;

/// Buyer must be willing to pay at least what the seller asks.
pub fn is_price_compatible(a: &Order, b: &Order) -> bool {
    match (a.side, b.side) {
        (OrderSide::Buy, OrderSide::Sell) => a.price >= b.price,
        (OrderSide::Sell, OrderSide::Buy) => a.price <= b.price,
        _ => false,
    }
}

/// The tradable quantity (the smaller of the two) valued at each side's
/// price has to fall inside that side's fiat limits. Zero limits are open.
pub fn is_amount_compatible(a: &Order, b: &Order) -> bool {
    let quantity = a.quantity.min(b.quantity);
    within_limits(a, quantity) && within_limits(b, quantity)
}

fn within_limits(order: &Order, quantity: Decimal) -> bool {
    let Some(value) = quantity.checked_mul(order.price) else {
        return false;
    };
    if order.min_limit > Decimal::ZERO && value < order.min_limit {
        return false;
    }
    if order.max_limit > Decimal::ZERO && value > order.max_limit {
        return false;
    }
    true
}

pub fn has_common_payment_methods(a: &Order, b: &Order) -> bool {
    let methods: HashSet<_> = a.payment_methods.iter().collect();
    b.payment_methods.iter().any(|m| methods.contains(m))
}

/// Full check: opposite sides, same pair, different owners, and all three
/// compatibility rules.
pub fn is_compatible(a: &Order, b: &Order) -> bool {
    a.side != b.side
        && a.pair == b.pair
        && a.owner_id != b.owner_id
        && is_price_compatible(a, b)
        && is_amount_compatible(a, b)
        && has_common_payment_methods(a, b)
}

/// Best price for `side` first (cheapest sell for a buyer, richest buy for
/// a seller), then oldest, then lowest id.
pub fn rank_candidates(side: OrderSide, candidates: &mut [Order]) {
    candidates.sort_by(|x, y| {
        let by_price = match side {
            OrderSide::Buy => x.price.cmp(&y.price),
            OrderSide::Sell => y.price.cmp(&x.price),
        };
        by_price
            .then_with(|| x.created_at.cmp(&y.created_at))
            .then_with(|| x.id.cmp(&y.id))
    });
}

/// Compatible counter-orders for `order`, ranked, at most [`MAX_MATCHES`].
pub fn select_matches(order: &Order, pool: Vec<Order>) -> Vec<Order> {
    let mut candidates: Vec<Order> = pool
        .into_iter()
        .filter(|candidate| candidate.id != order.id && is_compatible(order, candidate))
        .collect();
    rank_candidates(order.side, &mut candidates);
    candidates.truncate(MAX_MATCHES);
    candidates
}
