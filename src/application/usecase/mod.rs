pub mod lifecycle_usecase;
pub mod matching_usecase;
pub mod review_usecase;

// Re-export public API
pub use lifecycle_usecase::{
    ConfirmOutcome, DealExpiry, DealLifecycleUseCase, LifecycleEngine, OrderDraft,
};
pub use matching_usecase::{MatchingUseCase, OrderMatcher};
pub use review_usecase::{ReviewManager, ReviewUseCase};
