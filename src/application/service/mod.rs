// src/application/service/mod.rs
// Application services shared by the use cases

pub mod dispatcher;
pub mod formatter;
pub mod locks;

pub use dispatcher::NotificationDispatcher;
pub use locks::{AggregateGuard, AggregateKey, AggregateLocks};
