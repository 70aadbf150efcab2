//! Feed inventory and consumption.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{FeedConsumptionId, FeedInventoryId};
use crate::models::{
    ConsumptionFilter, FeedConsumption, FeedConsumptionInput, FeedInventory, FeedInventoryInput,
    ListParams, Page,
};

/// Repository trait for feed stock.
///
/// Recording consumption decrements the lot's remaining quantity in the
/// same transaction; deleting a consumption record restores it.
#[async_trait]
pub trait FeedRepository: Send + Sync {
    async fn create_inventory(&self, item: &FeedInventoryInput) -> RepositoryResult<FeedInventory>;

    async fn update_inventory(
        &self,
        id: FeedInventoryId,
        item: &FeedInventoryInput,
    ) -> RepositoryResult<FeedInventory>;

    async fn get_inventory(&self, id: FeedInventoryId) -> RepositoryResult<FeedInventory>;

    /// Inventory lots, most recent purchase first.
    async fn list_inventory(&self, params: ListParams) -> RepositoryResult<Page<FeedInventory>>;

    /// Rejected while consumption records still reference the lot.
    async fn delete_inventory(&self, id: FeedInventoryId) -> RepositoryResult<()>;

    /// # Errors
    /// * `ValidationError` (field `inventoryId` or `coopId`) if a referenced
    ///   row doesn't exist
    /// * `ValidationError` (field `quantityKg`) if the lot does not hold
    ///   enough feed
    async fn record_consumption(
        &self,
        record: &FeedConsumptionInput,
        actor: &str,
    ) -> RepositoryResult<FeedConsumption>;

    async fn list_consumption(
        &self,
        filter: &ConsumptionFilter,
        params: ListParams,
    ) -> RepositoryResult<Page<FeedConsumption>>;

    async fn delete_consumption(&self, id: FeedConsumptionId) -> RepositoryResult<()>;
}
