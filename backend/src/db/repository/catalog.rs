//! Breeds and coops.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{BreedId, CoopId};
use crate::models::{Breed, BreedInput, CoopInput, CoopSummary};

/// Repository trait for reference data.
///
/// Breed and coop names are unique. A breed that appears in any bird's
/// composition cannot be deleted; deleting a coop unassigns its birds,
/// eggs and feed consumption records.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn create_breed(&self, breed: &BreedInput) -> RepositoryResult<Breed>;

    async fn update_breed(&self, id: BreedId, breed: &BreedInput) -> RepositoryResult<Breed>;

    async fn get_breed(&self, id: BreedId) -> RepositoryResult<Breed>;

    /// All breeds ordered by name.
    async fn list_breeds(&self) -> RepositoryResult<Vec<Breed>>;

    async fn delete_breed(&self, id: BreedId) -> RepositoryResult<()>;

    async fn create_coop(&self, coop: &CoopInput) -> RepositoryResult<CoopSummary>;

    /// Lowering the capacity below the current occupancy is rejected.
    async fn update_coop(&self, id: CoopId, coop: &CoopInput) -> RepositoryResult<CoopSummary>;

    async fn get_coop(&self, id: CoopId) -> RepositoryResult<CoopSummary>;

    /// All coops ordered by name, with occupancy.
    async fn list_coops(&self) -> RepositoryResult<Vec<CoopSummary>>;

    async fn delete_coop(&self, id: CoopId) -> RepositoryResult<()>;
}
