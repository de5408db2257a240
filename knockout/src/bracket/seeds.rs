//! Seed registry: per-category seed lookup and assignment.

use super::errors::{CategoryError, CategoryResult};
use super::models::{CategoryId, ParticipantId};
use crate::store::BracketRepository;
use std::sync::Arc;

/// Seed registry
///
/// Seed values are not checked for uniqueness here. A build rejects a layout
/// that repeats a seed, or that gives a participant a seed another enrolled
/// participant outside the layout still holds.
#[derive(Clone)]
pub struct SeedRegistry {
    repo: Arc<dyn BracketRepository>,
}

impl SeedRegistry {
    pub fn new(repo: Arc<dyn BracketRepository>) -> Self {
        Self { repo }
    }

    /// Set a participant's seed in a category
    ///
    /// Enrolls the participant in the category if they are not enrolled yet.
    ///
    /// # Errors
    ///
    /// * `CategoryError::InvalidSeed` - Seed below 1
    /// * `CategoryError::CategoryNotFound` - Unknown category
    /// * `CategoryError::ParticipantNotFound` - Unknown participant
    pub async fn assign_seed(
        &self,
        participant_id: ParticipantId,
        category_id: CategoryId,
        seed: i32,
    ) -> CategoryResult<()> {
        if seed < 1 {
            return Err(CategoryError::InvalidSeed(seed));
        }
        if self.repo.get_category(category_id).await?.is_none() {
            return Err(CategoryError::CategoryNotFound(category_id));
        }
        if self.repo.get_participant(participant_id).await?.is_none() {
            return Err(CategoryError::ParticipantNotFound(participant_id));
        }

        self.repo
            .upsert_seed(participant_id, category_id, seed)
            .await?;

        log::info!(
            "Seed {} assigned to participant {} in category {}",
            seed,
            participant_id,
            category_id
        );
        Ok(())
    }

    /// Look up a participant's seed in a category
    ///
    /// `None` when the participant is unseeded or not enrolled.
    pub async fn seed_of(
        &self,
        participant_id: ParticipantId,
        category_id: CategoryId,
    ) -> CategoryResult<Option<i32>> {
        let enrollment = self
            .repo
            .get_enrollment(participant_id, category_id)
            .await?;
        Ok(enrollment.and_then(|e| e.seed))
    }
}
