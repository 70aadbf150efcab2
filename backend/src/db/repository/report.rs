//! Report execution and saved presets.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::PresetId;
use crate::models::{PresetInput, ReportPreset};
use crate::reports::{RelationResolver, ReportPage, ReportType, ResolvedQuery};

/// Executes resolved report queries.
///
/// Implementations must compute `total` over every predicate, including
/// the breed set, before applying the window.
#[async_trait]
pub trait ReportRepository: RelationResolver {
    async fn run_report(&self, query: &ResolvedQuery) -> RepositoryResult<ReportPage>;
}

/// Per-user saved report configurations.
///
/// When a preset is stored with `is_default`, every other preset of the
/// same owner and report type loses the flag in the same transaction.
#[async_trait]
pub trait PresetRepository: Send + Sync {
    async fn create_preset(
        &self,
        owner_id: &str,
        preset: &PresetInput,
    ) -> RepositoryResult<ReportPreset>;

    async fn update_preset(
        &self,
        id: PresetId,
        preset: &PresetInput,
    ) -> RepositoryResult<ReportPreset>;

    async fn get_preset(&self, id: PresetId) -> RepositoryResult<ReportPreset>;

    /// Presets of one owner ordered by name.
    async fn list_presets(
        &self,
        owner_id: &str,
        report_type: Option<ReportType>,
    ) -> RepositoryResult<Vec<ReportPreset>>;

    async fn delete_preset(&self, id: PresetId) -> RepositoryResult<()>;
}
