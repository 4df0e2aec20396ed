// src/domain/state.rs
// Status enums for orders, responses and deals, with their transition tables

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DealError, DealResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Active,
    HasResponses,
    InDeal,
    Completed,
    Cancelled,
    Expired,
    /// Legacy direct-matching outcome.
    Matched,
}

/// Something that happened to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    ResponseReceived,
    ResponseAccepted,
    DealCompleted,
    CancelledByOwner,
    DealExpired,
    TimedOut,
    DirectMatch,
}

impl OrderStatus {
    pub const OPEN: [OrderStatus; 2] = [OrderStatus::Active, OrderStatus::HasResponses];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Active => "active",
            OrderStatus::HasResponses => "has_responses",
            OrderStatus::InDeal => "in_deal",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Expired => "expired",
            OrderStatus::Matched => "matched",
        }
    }

    /// Open orders are listed on the market and take responses.
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Active | OrderStatus::HasResponses)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Cancelled
                | OrderStatus::Expired
                | OrderStatus::Matched
        )
    }

    pub fn apply(self, event: OrderEvent) -> DealResult<OrderStatus> {
        use OrderEvent::*;
        use OrderStatus::*;

        let next = match (self, event) {
            (Active | HasResponses, ResponseReceived) => HasResponses,
            (Active | HasResponses, ResponseAccepted) => InDeal,
            (InDeal, DealCompleted) => Completed,
            (Active | HasResponses, CancelledByOwner) => Cancelled,
            (InDeal, DealExpired) => Cancelled,
            (Active | HasResponses, TimedOut) => Expired,
            (Active, DirectMatch) => Matched,
            (from, event) => {
                return Err(DealError::InvalidState(format!(
                    "order in status '{}' cannot handle {:?}",
                    from, event
                )))
            }
        };

        Ok(next)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(OrderStatus::Active),
            "has_responses" => Ok(OrderStatus::HasResponses),
            "in_deal" => Ok(OrderStatus::InDeal),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "expired" => Ok(OrderStatus::Expired),
            "matched" => Ok(OrderStatus::Matched),
            other => Err(DealError::Validation(format!("unknown order status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Waiting,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Accept,
    Reject,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Waiting => "waiting",
            ResponseStatus::Accepted => "accepted",
            ResponseStatus::Rejected => "rejected",
        }
    }

    /// A response is reviewed exactly once, from `waiting`.
    pub fn review(self, decision: ReviewDecision) -> DealResult<ResponseStatus> {
        match (self, decision) {
            (ResponseStatus::Waiting, ReviewDecision::Accept) => Ok(ResponseStatus::Accepted),
            (ResponseStatus::Waiting, ReviewDecision::Reject) => Ok(ResponseStatus::Rejected),
            (from, _) => Err(DealError::InvalidState(format!(
                "response already reviewed (status '{}')",
                from
            ))),
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    InProgress,
    WaitingConfirmation,
    Completed,
    Expired,
    Dispute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealEvent {
    /// Confirmation flags after a participant confirmed.
    Confirmed {
        author: bool,
        counterparty: bool,
    },
    TimedOut,
    Disputed,
}

impl DealStatus {
    pub const LIVE: [DealStatus; 2] = [DealStatus::InProgress, DealStatus::WaitingConfirmation];

    /// Deals that still tie up their order: live ones plus disputes awaiting
    /// resolution.
    pub const HOLDING: [DealStatus; 3] = [
        DealStatus::InProgress,
        DealStatus::WaitingConfirmation,
        DealStatus::Dispute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::InProgress => "in_progress",
            DealStatus::WaitingConfirmation => "waiting_confirmation",
            DealStatus::Completed => "completed",
            DealStatus::Expired => "expired",
            DealStatus::Dispute => "dispute",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, DealStatus::InProgress | DealStatus::WaitingConfirmation)
    }

    /// Status implied by the two confirmation flags.
    pub fn from_confirmations(author: bool, counterparty: bool) -> DealStatus {
        match (author, counterparty) {
            (true, true) => DealStatus::Completed,
            (false, false) => DealStatus::InProgress,
            _ => DealStatus::WaitingConfirmation,
        }
    }

    pub fn apply(self, event: DealEvent) -> DealResult<DealStatus> {
        if !self.is_live() {
            return Err(DealError::InvalidState(format!(
                "deal in status '{}' cannot handle {:?}",
                self, event
            )));
        }

        Ok(match event {
            DealEvent::Confirmed {
                author,
                counterparty,
            } => DealStatus::from_confirmations(author, counterparty),
            DealEvent::TimedOut => DealStatus::Expired,
            DealEvent::Disputed => DealStatus::Dispute,
        })
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_moves_to_has_responses_and_stays_there() {
        let status = OrderStatus::Active.apply(OrderEvent::ResponseReceived).unwrap();
        assert_eq!(status, OrderStatus::HasResponses);
        let status = status.apply(OrderEvent::ResponseReceived).unwrap();
        assert_eq!(status, OrderStatus::HasResponses);
    }

    #[test]
    fn order_in_deal_only_completes_or_is_cancelled_by_expiry() {
        let in_deal = OrderStatus::HasResponses
            .apply(OrderEvent::ResponseAccepted)
            .unwrap();
        assert_eq!(in_deal, OrderStatus::InDeal);
        assert_eq!(in_deal.apply(OrderEvent::DealCompleted).unwrap(), OrderStatus::Completed);
        assert_eq!(in_deal.apply(OrderEvent::DealExpired).unwrap(), OrderStatus::Cancelled);
        assert!(matches!(
            in_deal.apply(OrderEvent::CancelledByOwner),
            Err(DealError::InvalidState(_))
        ));
        assert!(in_deal.apply(OrderEvent::TimedOut).is_err());
    }

    #[test]
    fn terminal_orders_reject_every_event() {
        let events = [
            OrderEvent::ResponseReceived,
            OrderEvent::ResponseAccepted,
            OrderEvent::DealCompleted,
            OrderEvent::CancelledByOwner,
            OrderEvent::DealExpired,
            OrderEvent::TimedOut,
            OrderEvent::DirectMatch,
        ];
        for status in [
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Expired,
            OrderStatus::Matched,
        ] {
            assert!(status.is_terminal());
            for event in events {
                assert!(status.apply(event).is_err(), "{} accepted {:?}", status, event);
            }
        }
    }

    #[test]
    fn direct_match_requires_active() {
        assert_eq!(
            OrderStatus::Active.apply(OrderEvent::DirectMatch).unwrap(),
            OrderStatus::Matched
        );
        assert!(OrderStatus::HasResponses.apply(OrderEvent::DirectMatch).is_err());
    }

    #[test]
    fn response_is_reviewed_once() {
        let accepted = ResponseStatus::Waiting.review(ReviewDecision::Accept).unwrap();
        assert_eq!(accepted, ResponseStatus::Accepted);
        assert!(accepted.review(ReviewDecision::Reject).is_err());
        assert!(ResponseStatus::Rejected.review(ReviewDecision::Accept).is_err());
    }

    #[test]
    fn deal_status_follows_confirmation_flags() {
        assert_eq!(DealStatus::from_confirmations(false, false), DealStatus::InProgress);
        assert_eq!(DealStatus::from_confirmations(true, false), DealStatus::WaitingConfirmation);
        assert_eq!(DealStatus::from_confirmations(false, true), DealStatus::WaitingConfirmation);
        assert_eq!(DealStatus::from_confirmations(true, true), DealStatus::Completed);
    }

    #[test]
    fn finished_deals_reject_events() {
        for status in [DealStatus::Completed, DealStatus::Expired, DealStatus::Dispute] {
            assert!(status.apply(DealEvent::TimedOut).is_err());
            assert!(status
                .apply(DealEvent::Confirmed {
                    author: true,
                    counterparty: true
                })
                .is_err());
        }
        assert_eq!(
            DealStatus::WaitingConfirmation.apply(DealEvent::Disputed).unwrap(),
            DealStatus::Dispute
        );
    }

    #[test]
    fn order_status_round_trips_through_str() {
        for status in [OrderStatus::Active, OrderStatus::InDeal, OrderStatus::Matched] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("open".parse::<OrderStatus>().is_err());
    }
}
