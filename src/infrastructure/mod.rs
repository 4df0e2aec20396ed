// src/infrastructure/mod.rs
pub mod notifier;
pub mod store;

pub use notifier::LogNotifier;
pub use store::InMemoryStore;
