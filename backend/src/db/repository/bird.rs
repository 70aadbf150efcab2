//! Bird repository trait: birds, identifiers, composition and weights.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{BirdId, WeightId};
use crate::models::{
    Bird, BirdFilter, BirdRecordWrite, BreedShare, ListParams, Page, WeightInput, WeightRecord,
};

/// Repository trait for birds and the records owned by a bird.
///
/// # Atomicity
/// `create_bird`, `update_bird` and `delete_bird` touch several tables
/// (identifiers, breed shares, coop occupancy, dependants) and must either
/// apply completely or not at all.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait BirdRepository: Send + Sync {
    // ==================== Health & Connection ====================

    /// Check if the storage backend is reachable.
    ///
    /// # Returns
    /// - `Ok(true)` if the backend is healthy
    /// - `Ok(false)` if it is unhealthy but no error occurred
    /// - `Err(RepositoryError)` if the check itself failed
    async fn health_check(&self) -> RepositoryResult<bool>;

    // ==================== Birds ====================

    /// Insert a bird with its identifiers and breed composition.
    ///
    /// # Errors
    /// * `ValidationError` (field `coopId`) if the coop doesn't exist or is
    ///   at capacity
    /// * `ValidationError` (field `identifiers[i].value`) if an identifier is
    ///   already used by another bird
    async fn create_bird(&self, bird: &BirdRecordWrite) -> RepositoryResult<Bird>;

    /// Replace a bird, including its identifiers and breed composition.
    ///
    /// # Errors
    /// * `NotFound` if the bird doesn't exist
    /// * the same validation errors as [`BirdRepository::create_bird`]
    async fn update_bird(&self, id: BirdId, bird: &BirdRecordWrite) -> RepositoryResult<Bird>;

    /// Fetch one bird.
    ///
    /// # Errors
    /// * `NotFound` if the bird doesn't exist
    async fn get_bird(&self, id: BirdId) -> RepositoryResult<Bird>;

    /// List birds matching `filter`, newest first.
    async fn list_birds(
        &self,
        filter: &BirdFilter,
        params: ListParams,
    ) -> RepositoryResult<Page<Bird>>;

    /// Delete a bird.
    ///
    /// Weights, health incidents, vaccinations, medications, identifiers and
    /// breed shares are removed with it. Offspring and eggs keep their rows
    /// with the parent reference cleared.
    async fn delete_bird(&self, id: BirdId) -> RepositoryResult<()>;

    /// Overwrite only the breed composition of a bird.
    async fn set_breed_composition(
        &self,
        id: BirdId,
        composition: &[BreedShare],
    ) -> RepositoryResult<Bird>;

    /// Birds having `id` as sire or dam, oldest hatch first.
    async fn list_offspring(&self, id: BirdId) -> RepositoryResult<Vec<Bird>>;

    // ==================== Weights ====================

    async fn add_weight(
        &self,
        bird_id: BirdId,
        weight: &WeightInput,
    ) -> RepositoryResult<WeightRecord>;

    /// Weight history of a bird, most recent measurement first.
    async fn list_weights(&self, bird_id: BirdId) -> RepositoryResult<Vec<WeightRecord>>;

    async fn delete_weight(&self, id: WeightId) -> RepositoryResult<()>;
}
