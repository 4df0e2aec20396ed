// src/application/dto/mod.rs
// Inbound request payloads

pub mod parser;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::models::{DealId, OrderId, ResponseId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(rename = "type")]
    pub side: String,
    pub cryptocurrency: String,
    pub fiat_currency: String,
    pub amount: Decimal,
    pub price: Decimal,
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    pub payment_methods: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOrdersRequest {
    #[serde(rename = "type", default)]
    pub side: Option<String>,
    #[serde(default)]
    pub cryptocurrency: Option<String>,
    #[serde(default)]
    pub fiat_currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponseRequest {
    pub order_id: OrderId,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponseRequest {
    pub response_id: ResponseId,
    pub action: ReviewAction,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmDealRequest {
    pub deal_id: DealId,
    pub is_author: bool,
    #[serde(default)]
    pub payment_proof: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReviewRequest {
    pub deal_id: DealId,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}
