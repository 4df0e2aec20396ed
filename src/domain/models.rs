// src/domain/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::DealError;
use crate::domain::state::{DealStatus, OrderStatus, ResponseStatus};

pub type UserId = i64;
pub type OrderId = i64;
pub type ResponseId = i64;
pub type DealId = i64;
pub type ReviewId = i64;

pub const MAX_MESSAGE_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = DealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(DealError::Validation(format!("invalid order side: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CryptoAsset {
    Btc,
    Eth,
    Usdt,
    Usdc,
    Ltc,
}

impl CryptoAsset {
    pub fn as_str(&self) -> &'static str {
        match self {
            CryptoAsset::Btc => "BTC",
            CryptoAsset::Eth => "ETH",
            CryptoAsset::Usdt => "USDT",
            CryptoAsset::Usdc => "USDC",
            CryptoAsset::Ltc => "LTC",
        }
    }
}

impl fmt::Display for CryptoAsset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CryptoAsset {
    type Err = DealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BTC" => Ok(CryptoAsset::Btc),
            "ETH" => Ok(CryptoAsset::Eth),
            "USDT" => Ok(CryptoAsset::Usdt),
            "USDC" => Ok(CryptoAsset::Usdc),
            "LTC" => Ok(CryptoAsset::Ltc),
            _ => Err(DealError::Validation(format!("unsupported cryptocurrency: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FiatCurrency {
    Rub,
    Usd,
    Eur,
    Uah,
}

impl FiatCurrency {
    pub fn as_str(&self) -> &'static str {
        match self {
            FiatCurrency::Rub => "RUB",
            FiatCurrency::Usd => "USD",
            FiatCurrency::Eur => "EUR",
            FiatCurrency::Uah => "UAH",
        }
    }
}

impl fmt::Display for FiatCurrency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FiatCurrency {
    type Err = DealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RUB" => Ok(FiatCurrency::Rub),
            "USD" => Ok(FiatCurrency::Usd),
            "EUR" => Ok(FiatCurrency::Eur),
            "UAH" => Ok(FiatCurrency::Uah),
            _ => Err(DealError::Validation(format!("unsupported fiat currency: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Sberbank,
    Tinkoff,
    Qiwi,
    YandexMoney,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Sberbank => "sberbank",
            PaymentMethod::Tinkoff => "tinkoff",
            PaymentMethod::Qiwi => "qiwi",
            PaymentMethod::YandexMoney => "yandex_money",
            PaymentMethod::Cash => "cash",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = DealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "sberbank" => Ok(PaymentMethod::Sberbank),
            "tinkoff" => Ok(PaymentMethod::Tinkoff),
            "qiwi" => Ok(PaymentMethod::Qiwi),
            "yandex_money" => Ok(PaymentMethod::YandexMoney),
            "cash" => Ok(PaymentMethod::Cash),
            other => Err(DealError::Validation(format!(
                "unsupported payment method: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub external_handle: Option<String>,
    pub is_active: bool,
    pub total_deals: u32,
    pub successful_deals: u32,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: UserId, display_name: &str) -> Self {
        Self {
            id,
            display_name: display_name.to_string(),
            external_handle: None,
            is_active: true,
            total_deals: 0,
            successful_deals: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_handle(mut self, handle: &str) -> Self {
        self.external_handle = Some(handle.to_string());
        self
    }

    /// Name used in notification text.
    pub fn label(&self) -> String {
        match &self.external_handle {
            Some(handle) => format!("{} (@{})", self.display_name, handle),
            None => self.display_name.clone(),
        }
    }
}

/// Trading pair: one crypto asset priced in one fiat currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetPair {
    pub crypto: CryptoAsset,
    pub fiat: FiatCurrency,
}

impl AssetPair {
    pub fn new(crypto: CryptoAsset, fiat: FiatCurrency) -> Self {
        Self { crypto, fiat }
    }
}

impl fmt::Display for AssetPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.crypto, self.fiat)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner_id: UserId,
    pub side: OrderSide,
    pub pair: AssetPair,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total: Decimal,
    /// Fiat bounds for a single deal; zero means unbounded.
    pub min_limit: Decimal,
    pub max_limit: Decimal,
    pub payment_methods: Vec<PaymentMethod>,
    pub note: String,
    pub status: OrderStatus,
    pub response_count: u32,
    pub accepted_response_id: Option<ResponseId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Validated terms of an order about to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub owner_id: UserId,
    pub side: OrderSide,
    pub pair: AssetPair,
    pub quantity: Decimal,
    pub price: Decimal,
    /// `quantity * price`, computed with an overflow check before persisting.
    pub total: Decimal,
    pub min_limit: Decimal,
    pub max_limit: Decimal,
    pub payment_methods: Vec<PaymentMethod>,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: ResponseId,
    pub order_id: OrderId,
    pub responder_id: UserId,
    pub message: String,
    pub status: ResponseStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewResponse {
    pub order_id: OrderId,
    pub responder_id: UserId,
    pub message: String,
}

/// Which side of a deal is acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmRole {
    Author,
    Counterparty,
}

impl ConfirmRole {
    pub fn from_is_author(is_author: bool) -> Self {
        if is_author {
            ConfirmRole::Author
        } else {
            ConfirmRole::Counterparty
        }
    }

    pub fn other(&self) -> ConfirmRole {
        match self {
            ConfirmRole::Author => ConfirmRole::Counterparty,
            ConfirmRole::Counterparty => ConfirmRole::Author,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub response_id: ResponseId,
    pub order_id: OrderId,
    pub author_id: UserId,
    pub counterparty_id: UserId,
    pub pair: AssetPair,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total: Decimal,
    pub payment_methods: Vec<PaymentMethod>,
    pub status: DealStatus,
    pub author_confirmed: bool,
    pub counterparty_confirmed: bool,
    pub author_proof: String,
    pub counterparty_proof: String,
    pub dispute_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Deal {
    pub fn participant_id(&self, role: ConfirmRole) -> UserId {
        match role {
            ConfirmRole::Author => self.author_id,
            ConfirmRole::Counterparty => self.counterparty_id,
        }
    }

    pub fn is_confirmed_by(&self, role: ConfirmRole) -> bool {
        match role {
            ConfirmRole::Author => self.author_confirmed,
            ConfirmRole::Counterparty => self.counterparty_confirmed,
        }
    }

    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.author_id == user_id || self.counterparty_id == user_id
    }

    /// The other participant, if `user_id` is one of the two.
    pub fn peer_of(&self, user_id: UserId) -> Option<UserId> {
        if user_id == self.author_id {
            Some(self.counterparty_id)
        } else if user_id == self.counterparty_id {
            Some(self.author_id)
        } else {
            None
        }
    }
}

/// Snapshot of an order's terms taken when a response is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDeal {
    pub response_id: ResponseId,
    pub order_id: OrderId,
    pub author_id: UserId,
    pub counterparty_id: UserId,
    pub pair: AssetPair,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total: Decimal,
    pub payment_methods: Vec<PaymentMethod>,
}

impl NewDeal {
    pub fn from_acceptance(order: &Order, response: &Response) -> Self {
        Self {
            response_id: response.id,
            order_id: order.id,
            author_id: order.owner_id,
            counterparty_id: response.responder_id,
            pair: order.pair,
            side: order.side,
            quantity: order.quantity,
            price: order.price,
            total: order.total,
            payment_methods: order.payment_methods.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    Positive,
    Neutral,
    Negative,
}

impl ReviewKind {
    pub fn from_rating(rating: u8) -> Self {
        match rating {
            4..=5 => ReviewKind::Positive,
            3 => ReviewKind::Neutral,
            _ => ReviewKind::Negative,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub deal_id: DealId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub rating: u8,
    pub kind: ReviewKind,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub deal_id: DealId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub rating: u8,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Rating {
    pub user_id: UserId,
    pub average: Decimal,
    pub total_reviews: u32,
    pub positive: u32,
    pub neutral: u32,
    pub negative: u32,
}

impl Rating {
    pub fn from_reviews(user_id: UserId, reviews: &[Review]) -> Self {
        let mut rating = Rating {
            user_id,
            ..Default::default()
        };
        if reviews.is_empty() {
            return rating;
        }

        let mut sum = Decimal::ZERO;
        for review in reviews {
            sum += Decimal::from(review.rating);
            match review.kind {
                ReviewKind::Positive => rating.positive += 1,
                ReviewKind::Neutral => rating.neutral += 1,
                ReviewKind::Negative => rating.negative += 1,
            }
        }
        rating.total_reviews = reviews.len() as u32;
        rating.average = (sum / Decimal::from(rating.total_reviews)).round_dp(2);
        rating
    }
}

/// Trading summary for a user profile.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UserStats {
    pub user_id: UserId,
    pub total_orders: u32,
    pub active_orders: u32,
    pub completed_orders: u32,
    pub total_deals: u32,
    pub completed_deals: u32,
    pub expired_deals: u32,
    /// Sum of completed deal totals, in each deal's own fiat currency.
    pub total_volume: Decimal,
    /// Completed share of all deals, in percent.
    pub success_rate: Decimal,
    pub first_deal_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub rating: Rating,
}

impl UserStats {
    pub fn collect(user_id: UserId, orders: &[Order], deals: &[Deal], rating: Rating) -> Self {
        let mut stats = UserStats {
            user_id,
            total_orders: orders.len() as u32,
            total_deals: deals.len() as u32,
            rating,
            ..Default::default()
        };

        for order in orders {
            match order.status {
                OrderStatus::Active | OrderStatus::HasResponses => stats.active_orders += 1,
                OrderStatus::Completed => stats.completed_orders += 1,
                _ => {}
            }
        }
        for deal in deals {
            match deal.status {
                DealStatus::Completed => {
                    stats.completed_deals += 1;
                    stats.total_volume = stats.total_volume.saturating_add(deal.total);
                }
                DealStatus::Expired => stats.expired_deals += 1,
                _ => {}
            }
        }

        stats.first_deal_at = deals.iter().map(|d| d.created_at).min();
        stats.last_activity_at = orders
            .iter()
            .map(|o| o.updated_at)
            .chain(deals.iter().map(|d| d.completed_at.unwrap_or(d.created_at)))
            .max();
        if stats.total_deals > 0 {
            stats.success_rate = (Decimal::from(stats.completed_deals) * Decimal::ONE_HUNDRED
                / Decimal::from(stats.total_deals))
            .round_dp(2);
        }
        stats
    }
}

/// Order query. Empty vectors and `None` mean "any".
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub side: Option<OrderSide>,
    pub pair: Option<AssetPair>,
    pub statuses: Vec<OrderStatus>,
    pub owner_id: Option<UserId>,
    pub owners: Vec<UserId>,
    pub exclude_owner: Option<UserId>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.side.map_or(true, |side| order.side == side)
            && self.pair.map_or(true, |pair| order.pair == pair)
            && (self.statuses.is_empty() || self.statuses.contains(&order.status))
            && self.owner_id.map_or(true, |id| order.owner_id == id)
            && (self.owners.is_empty() || self.owners.contains(&order.owner_id))
            && self.exclude_owner.map_or(true, |id| order.owner_id != id)
            && self.created_before.map_or(true, |t| order.created_at < t)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseFilter {
    pub order_id: Option<OrderId>,
    pub order_ids: Vec<OrderId>,
    pub responder_id: Option<UserId>,
    pub statuses: Vec<ResponseStatus>,
    pub limit: Option<usize>,
}

impl ResponseFilter {
    pub fn matches(&self, response: &Response) -> bool {
        self.order_id.map_or(true, |id| response.order_id == id)
            && (self.order_ids.is_empty() || self.order_ids.contains(&response.order_id))
            && self.responder_id.map_or(true, |id| response.responder_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&response.status))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DealFilter {
    pub participant_id: Option<UserId>,
    pub order_id: Option<OrderId>,
    pub statuses: Vec<DealStatus>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl DealFilter {
    pub fn matches(&self, deal: &Deal) -> bool {
        self.participant_id.map_or(true, |id| deal.is_participant(id))
            && self.order_id.map_or(true, |id| deal.order_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&deal.status))
            && self.created_before.map_or(true, |t| deal.created_at < t)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub deal_id: Option<DealId>,
    pub from_user_id: Option<UserId>,
    pub to_user_id: Option<UserId>,
}

impl ReviewFilter {
    pub fn matches(&self, review: &Review) -> bool {
        self.deal_id.map_or(true, |id| review.deal_id == id)
            && self.from_user_id.map_or(true, |id| review.from_user_id == id)
            && self.to_user_id.map_or(true, |id| review.to_user_id == id)
    }
}
