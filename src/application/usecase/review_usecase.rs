// src/application/usecase/review_usecase.rs
// Post-deal reviews and user ratings

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::service::{AggregateKey, AggregateLocks};
use crate::domain::errors::{DealError, DealResult};
use crate::domain::models::{
    DealId, NewReview, Rating, Review, ReviewFilter, UserId, MAX_MESSAGE_LEN,
};
use crate::domain::repository::RecordStore;
use crate::domain::state::DealStatus;

#[async_trait]
pub trait ReviewUseCase {
    async fn create_review(
        &self,
        user_id: UserId,
        deal_id: DealId,
        rating: u8,
        comment: &str,
    ) -> DealResult<Review>;

    async fn get_user_reviews(&self, user_id: UserId) -> DealResult<Vec<Review>>;

    async fn get_user_rating(&self, user_id: UserId) -> DealResult<Rating>;
}

pub struct ReviewManager {
    store: Arc<dyn RecordStore>,
    locks: Arc<AggregateLocks>,
}

impl ReviewManager {
    pub fn new(store: Arc<dyn RecordStore>, locks: Arc<AggregateLocks>) -> Self {
        Self { store, locks }
    }
}

fn validate_review(rating: u8, comment: &str) -> DealResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(DealError::Validation(format!(
            "rating must be between 1 and 5, got {}",
            rating
        )));
    }
    if comment.chars().count() > MAX_MESSAGE_LEN {
        return Err(DealError::Validation(format!(
            "comment exceeds {} characters",
            MAX_MESSAGE_LEN
        )));
    }
    if rating <= 2 && comment.trim().is_empty() {
        return Err(DealError::Validation(
            "a comment is required for ratings of 1 or 2".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl ReviewUseCase for ReviewManager {
    async fn create_review(
        &self,
        user_id: UserId,
        deal_id: DealId,
        rating: u8,
        comment: &str,
    ) -> DealResult<Review> {
        validate_review(rating, comment)?;

        let _guard = self.locks.lock(AggregateKey::Deal(deal_id)).await;
        let mut tx = self.store.begin().await?;

        let deal = tx
            .get_deal(deal_id)
            .await?
            .ok_or_else(|| DealError::not_found("deal", deal_id))?;
        let target = deal.peer_of(user_id).ok_or_else(|| {
            DealError::Forbidden(format!(
                "user {} is not a participant of deal {}",
                user_id, deal_id
            ))
        })?;
        if deal.status != DealStatus::Completed {
            return Err(DealError::InvalidState(format!(
                "deal {} is {}, only completed deals can be reviewed",
                deal_id, deal.status
            )));
        }

        let existing = tx
            .query_reviews(&ReviewFilter {
                deal_id: Some(deal_id),
                from_user_id: Some(user_id),
                ..Default::default()
            })
            .await?;
        if !existing.is_empty() {
            return Err(DealError::InvalidState(format!(
                "user {} already reviewed deal {}",
                user_id, deal_id
            )));
        }

        let review = tx
            .create_review(NewReview {
                deal_id,
                from_user_id: user_id,
                to_user_id: target,
                rating,
                comment: comment.trim().to_string(),
            })
            .await?;
        tx.commit().await?;

        log::info!(
            "Review {} on deal {}: user {} rated user {} with {}",
            review.id,
            deal_id,
            user_id,
            target,
            rating
        );
        Ok(review)
    }

    async fn get_user_reviews(&self, user_id: UserId) -> DealResult<Vec<Review>> {
        let filter = ReviewFilter {
            to_user_id: Some(user_id),
            ..Default::default()
        };
        let mut reviews = self.store.query_reviews(&filter).await?;
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(reviews)
    }

    async fn get_user_rating(&self, user_id: UserId) -> DealResult<Rating> {
        let reviews = self.get_user_reviews(user_id).await?;
        Ok(Rating::from_reviews(user_id, &reviews))
    }
}
