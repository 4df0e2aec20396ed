// src/application/dto/parser.rs
// Parsers turning raw request bodies into validated domain values

use serde::de::DeserializeOwned;

use super::{
    ConfirmDealRequest, CreateOrderRequest, CreateResponseRequest, CreateReviewRequest,
    ListOrdersRequest, ReviewResponseRequest,
};
use crate::application::usecase::OrderDraft;
use crate::domain::errors::{DealError, DealResult};
use crate::domain::models::{
    AssetPair, CryptoAsset, FiatCurrency, OrderFilter, OrderSide, PaymentMethod,
};
use crate::domain::state::OrderStatus;

/// Deserialize a JSON body, reporting malformed input as a validation error.
pub fn parse_request<T: DeserializeOwned>(body: &str) -> DealResult<T> {
    serde_json::from_str(body)
        .map_err(|e| DealError::Validation(format!("malformed request: {}", e)))
}

pub fn parse_create_order(body: &str) -> DealResult<OrderDraft> {
    let request: CreateOrderRequest = parse_request(body)?;
    request.into_draft()
}

pub fn parse_list_orders(body: &str) -> DealResult<OrderFilter> {
    let request: ListOrdersRequest = parse_request(body)?;
    request.into_filter()
}

pub fn parse_create_response(body: &str) -> DealResult<CreateResponseRequest> {
    parse_request(body)
}

pub fn parse_review_response(body: &str) -> DealResult<ReviewResponseRequest> {
    parse_request(body)
}

pub fn parse_confirm_deal(body: &str) -> DealResult<ConfirmDealRequest> {
    parse_request(body)
}

pub fn parse_create_review(body: &str) -> DealResult<CreateReviewRequest> {
    parse_request(body)
}

impl CreateOrderRequest {
    pub fn into_draft(self) -> DealResult<OrderDraft> {
        let side: OrderSide = self.side.parse()?;
        let pair = AssetPair::new(
            self.cryptocurrency.parse::<CryptoAsset>()?,
            self.fiat_currency.parse::<FiatCurrency>()?,
        );
        let payment_methods = self
            .payment_methods
            .iter()
            .map(|m| m.parse::<PaymentMethod>())
            .collect::<DealResult<Vec<_>>>()?;

        Ok(OrderDraft {
            side,
            pair,
            quantity: self.amount,
            price: self.price,
            min_limit: self.min_amount,
            max_limit: self.max_amount,
            payment_methods,
            note: self.description,
        })
    }
}

impl ListOrdersRequest {
    pub fn into_filter(self) -> DealResult<OrderFilter> {
        let side = self.side.map(|s| s.parse::<OrderSide>()).transpose()?;
        let pair = match (self.cryptocurrency, self.fiat_currency) {
            (Some(crypto), Some(fiat)) => Some(AssetPair::new(crypto.parse()?, fiat.parse()?)),
            (None, None) => None,
            _ => {
                return Err(DealError::Validation(
                    "cryptocurrency and fiat_currency must be given together".into(),
                ))
            }
        };
        let statuses = match self.status {
            Some(status) => vec![status.parse::<OrderStatus>()?],
            None => OrderStatus::OPEN.to_vec(),
        };

        Ok(OrderFilter {
            side,
            pair,
            statuses,
            owner_id: self.user_id,
            limit: self.limit,
            offset: self.offset,
            ..Default::default()
        })
    }
}
