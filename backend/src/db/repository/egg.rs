//! Egg records.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::EggId;
use crate::models::{EggFilter, EggInput, EggRecord, ListParams, Page};

#[async_trait]
pub trait EggRepository: Send + Sync {
    async fn create_egg(&self, egg: &EggInput, actor: &str) -> RepositoryResult<EggRecord>;

    async fn update_egg(&self, id: EggId, egg: &EggInput) -> RepositoryResult<EggRecord>;

    async fn get_egg(&self, id: EggId) -> RepositoryResult<EggRecord>;

    /// Eggs matching `filter`, most recently laid first.
    async fn list_eggs(
        &self,
        filter: &EggFilter,
        params: ListParams,
    ) -> RepositoryResult<Page<EggRecord>>;

    async fn delete_egg(&self, id: EggId) -> RepositoryResult<()>;
}
