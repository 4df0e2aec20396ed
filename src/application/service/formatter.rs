// src/application/service/formatter.rs
// Message text for lifecycle notifications

use crate::domain::models::{Deal, Order, Response};
use crate::domain::service::{Notification, NotificationContext, NotificationKind};

fn order_context(order: &Order) -> NotificationContext {
    NotificationContext {
        order_id: Some(order.id),
        ..Default::default()
    }
}

fn deal_context(deal: &Deal) -> NotificationContext {
    NotificationContext {
        order_id: Some(deal.order_id),
        response_id: Some(deal.response_id),
        deal_id: Some(deal.id),
    }
}

/// Order headline, e.g. "SELL BTC/RUB".
fn headline(order: &Order) -> String {
    format!("{} {}", order.side, order.pair)
}

pub fn new_response(order: &Order, response: &Response, responder_name: &str) -> Notification {
    let body = format!(
        "{} responded to your order {} at {:.2} {}.\n\nMessage: \"{}\"\n\nVolume: {:.8} {} ({:.2} {})",
        responder_name,
        headline(order),
        order.price,
        order.pair.fiat,
        response.message,
        order.quantity,
        order.pair.crypto,
        order.total,
        order.pair.fiat,
    );

    Notification {
        kind: NotificationKind::NewResponse,
        title: "New response to your order".to_string(),
        body,
        context: NotificationContext {
            response_id: Some(response.id),
            ..order_context(order)
        },
    }
}

pub fn response_accepted(order: &Order, response: &Response, author_name: &str) -> Notification {
    let body = format!(
        "{} accepted your response to {}.\n\nDeal volume: {:.8} {} ({:.2} {})\n\nOpen the app to continue with the deal.",
        author_name,
        headline(order),
        order.quantity,
        order.pair.crypto,
        order.total,
        order.pair.fiat,
    );

    Notification {
        kind: NotificationKind::ResponseAccepted,
        title: "Your response was accepted".to_string(),
        body,
        context: NotificationContext {
            response_id: Some(response.id),
            ..order_context(order)
        },
    }
}

/// `reason` is appended when the owner gave one.
pub fn response_rejected(
    order: &Order,
    response: &Response,
    author_name: &str,
    reason: Option<&str>,
) -> Notification {
    let mut body = format!(
        "{} declined your response to {}.",
        author_name,
        headline(order)
    );
    if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
        body.push_str(&format!("\n\nReason: {}", reason));
    }
    body.push_str("\n\nOther orders are still open for responses.");

    Notification {
        kind: NotificationKind::ResponseRejected,
        title: "Your response was declined".to_string(),
        body,
        context: NotificationContext {
            response_id: Some(response.id),
            ..order_context(order)
        },
    }
}

/// Sent to each participant; `peer_name` is the other side.
pub fn deal_created(deal: &Deal, peer_name: &str) -> Notification {
    let body = format!(
        "Deal #{} opened between you and {}.\n\nDetails:\n- {} {}\n- Volume: {:.8} {}\n- Price: {:.2} {}\n- Total: {:.2} {}",
        deal.id,
        peer_name,
        deal.side,
        deal.pair,
        deal.quantity,
        deal.pair.crypto,
        deal.price,
        deal.pair.fiat,
        deal.total,
        deal.pair.fiat,
    );

    Notification {
        kind: NotificationKind::DealCreated,
        title: "Deal created".to_string(),
        body,
        context: deal_context(deal),
    }
}

pub fn deal_confirmed(deal: &Deal, confirmed_by: &str, waiting_for: &str) -> Notification {
    let body = format!(
        "{} confirmed their part of deal #{}.\n\nStatus:\n- {}: confirmed\n- {}: awaiting confirmation\n\nCheck the deal and confirm once the payment has been sent or received.",
        confirmed_by, deal.id, confirmed_by, waiting_for,
    );

    Notification {
        kind: NotificationKind::DealConfirmed,
        title: "Deal confirmed by the other side".to_string(),
        body,
        context: deal_context(deal),
    }
}

pub fn deal_completed(deal: &Deal, author_name: &str, counterparty_name: &str) -> Notification {
    let body = format!(
        "Deal #{} is complete.\n\nVolume: {:.8} {}\nTotal: {:.2} {}\nParticipants: {} and {}\n\nLeave a review to build your rating.",
        deal.id,
        deal.quantity,
        deal.pair.crypto,
        deal.total,
        deal.pair.fiat,
        author_name,
        counterparty_name,
    );

    Notification {
        kind: NotificationKind::DealCompleted,
        title: "Deal completed".to_string(),
        body,
        context: deal_context(deal),
    }
}

pub fn order_expired(order: &Order) -> Notification {
    let body = format!(
        "Your order #{} {} for {:.8} {} at {:.2} {} expired without a deal and was closed.",
        order.id,
        headline(order),
        order.quantity,
        order.pair.crypto,
        order.price,
        order.pair.fiat,
    );

    Notification {
        kind: NotificationKind::OrderExpired,
        title: "Order expired".to_string(),
        body,
        context: order_context(order),
    }
}

pub fn deal_expired(deal: &Deal, peer_name: &str) -> Notification {
    let body = format!(
        "Deal #{} with {} was not confirmed in time and has expired.\n\nVolume: {:.8} {}\nTotal: {:.2} {}",
        deal.id,
        peer_name,
        deal.quantity,
        deal.pair.crypto,
        deal.total,
        deal.pair.fiat,
    );

    Notification {
        kind: NotificationKind::DealExpired,
        title: "Deal expired".to_string(),
        body,
        context: deal_context(deal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AssetPair, CryptoAsset, FiatCurrency, OrderSide, PaymentMethod};
    use crate::domain::state::{DealStatus, OrderStatus, ResponseStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: 3,
            owner_id: 1,
            side: OrderSide::Sell,
            pair: AssetPair::new(CryptoAsset::Btc, FiatCurrency::Rub),
            quantity: dec!(0.01),
            price: dec!(2850000),
            total: dec!(28500),
            min_limit: dec!(28500),
            max_limit: dec!(28500),
            payment_methods: vec![PaymentMethod::Sberbank],
            note: String::new(),
            status: OrderStatus::Active,
            response_count: 1,
            accepted_response_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    fn response() -> Response {
        Response {
            id: 8,
            order_id: 3,
            responder_id: 2,
            message: "Ready now".to_string(),
            status: ResponseStatus::Waiting,
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }

    fn deal() -> Deal {
        Deal {
            id: 5,
            response_id: 8,
            order_id: 3,
            author_id: 1,
            counterparty_id: 2,
            pair: AssetPair::new(CryptoAsset::Btc, FiatCurrency::Rub),
            side: OrderSide::Sell,
            quantity: dec!(0.01),
            price: dec!(2850000),
            total: dec!(28500),
            payment_methods: vec![PaymentMethod::Sberbank],
            status: DealStatus::InProgress,
            author_confirmed: false,
            counterparty_confirmed: false,
            author_proof: String::new(),
            counterparty_proof: String::new(),
            dispute_reason: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn new_response_prints_fixed_precision_amounts() {
        let n = new_response(&order(), &response(), "Bob");
        assert_eq!(n.kind, NotificationKind::NewResponse);
        assert!(n.body.contains("Bob responded to your order SELL BTC/RUB at 2850000.00 RUB"));
        assert!(n.body.contains("0.01000000 BTC (28500.00 RUB)"));
        assert!(n.body.contains("\"Ready now\""));
        assert_eq!(n.context.order_id, Some(3));
        assert_eq!(n.context.response_id, Some(8));
    }

    #[test]
    fn rejection_reason_is_optional() {
        let without = response_rejected(&order(), &response(), "Alice", None);
        assert!(!without.body.contains("Reason"));
        let blank = response_rejected(&order(), &response(), "Alice", Some("  "));
        assert_eq!(blank.body, without.body);
        let with = response_rejected(&order(), &response(), "Alice", Some("price moved"));
        assert!(with.body.contains("Reason: price moved"));
    }

    #[test]
    fn deal_messages_carry_full_context() {
        let created = deal_created(&deal(), "Bob");
        assert!(created.body.starts_with("Deal #5 opened between you and Bob."));
        assert!(created.body.contains("Price: 2850000.00 RUB"));
        assert_eq!(
            created.context,
            NotificationContext {
                order_id: Some(3),
                response_id: Some(8),
                deal_id: Some(5),
            }
        );

        let confirmed = deal_confirmed(&deal(), "Bob", "Alice");
        assert!(confirmed.body.contains("- Bob: confirmed"));
        assert!(confirmed.body.contains("- Alice: awaiting confirmation"));

        let completed = deal_completed(&deal(), "Alice", "Bob");
        assert!(completed.body.contains("Participants: Alice and Bob"));
    }

    #[test]
    fn formatting_is_deterministic() {
        assert_eq!(order_expired(&order()), order_expired(&order()));
        assert_eq!(deal_expired(&deal(), "Bob"), deal_expired(&deal(), "Bob"));
    }
}
