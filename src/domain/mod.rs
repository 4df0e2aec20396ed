// src/domain/mod.rs
pub mod errors;
pub mod matching;
pub mod models;
pub mod repository;
pub mod service;
pub mod state;

// Re-export common types for convenience
pub use errors::{AppError, AppResult, DealError, DealResult, NotifyError, StoreError, StoreResult};
pub use models::{
    AssetPair, ConfirmRole, CryptoAsset, Deal, DealId, FiatCurrency, Order, OrderId, OrderSide,
    PaymentMethod, Rating, Response, ResponseId, Review, User, UserId, UserStats,
};
pub use state::{DealStatus, OrderStatus, ResponseStatus};
