//! Service layer: business rules on top of any repository implementation.
//!
//! Every function is generic over `R: FullRepository + ?Sized`, so it works
//! with `Arc<dyn FullRepository>` from the factory as well as with a
//! concrete `LocalRepository` in tests. Input payloads are validated here;
//! rules that need a consistent view of several rows (coop capacity,
//! identifier uniqueness, feed stock) are enforced by the repository inside
//! its write transaction.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use super::repository::{FullRepository, RepositoryError, RepositoryResult};
use crate::api::*;
use crate::models::{
    calculate_child_breed_composition, is_complete_composition, total_percentage,
    BirdRecordWrite, Validate, ValidationError,
};
use crate::reports::{export_filename, summarize, ReportPlan, ResolvedQuery};

/// Errors surfaced by the service layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Input failed a validation rule; carries the first failing field.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Report query could not be planned.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Caller may not touch this resource.
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ServiceError {
    ServiceError::Validation(ValidationError::new(field, message))
}

/// Turn a missing referenced row into a field error on the request.
fn missing_as_invalid<T>(result: RepositoryResult<T>, field: &str, what: &str) -> ServiceResult<T> {
    result.map_err(|e| {
        if e.is_not_found() {
            invalid(field, format!("{} does not exist", what))
        } else {
            ServiceError::Repository(e)
        }
    })
}

/// Check if the repository is reachable.
pub async fn health_check<R: FullRepository + ?Sized>(repo: &R) -> RepositoryResult<bool> {
    repo.health_check().await
}

// ==================== Birds ====================

/// Load and check the parents referenced by a bird payload.
///
/// The sire must not be female, the dam must not be male, and neither may
/// be the bird itself.
async fn load_parents<R: FullRepository + ?Sized>(
    repo: &R,
    sire_id: Option<BirdId>,
    dam_id: Option<BirdId>,
    self_id: Option<BirdId>,
) -> ServiceResult<(Option<Bird>, Option<Bird>)> {
    if let Some(id) = self_id {
        if sire_id == Some(id) {
            return Err(invalid("sireId", "a bird cannot be its own parent"));
        }
        if dam_id == Some(id) {
            return Err(invalid("damId", "a bird cannot be its own parent"));
        }
    }

    let sire = match sire_id {
        Some(id) => {
            let sire =
                missing_as_invalid(repo.get_bird(id).await, "sireId", &format!("bird {}", id))?;
            if sire.sex == Sex::Female {
                return Err(invalid("sireId", "sire must not be female"));
            }
            Some(sire)
        }
        None => None,
    };
    let dam = match dam_id {
        Some(id) => {
            let dam =
                missing_as_invalid(repo.get_bird(id).await, "damId", &format!("bird {}", id))?;

            if dam.sex == Sex::Male {
                return Err(invalid("damId", "dam must not be male"));
            }
            Some(dam)
        }
        None => None,
    };
    Ok((sire, dam))
}

async fn check_breeds_exist<R: FullRepository + ?Sized>(
    repo: &R,
    shares: &[BreedShare],
) -> ServiceResult<()> {
    if shares.is_empty() {
        return Ok(());
    }
    let known: HashSet<BreedId> = repo.list_breeds().await?.into_iter().map(|b| b.id).collect();
    for (idx, share) in shares.iter().enumerate() {
        if !known.contains(&share.breed_id) {
            return Err(invalid(
                format!("breedComposition[{}].breedId", idx),
                format!("breed {} does not exist", share.breed_id),
            ));
        }
    }
    Ok(())
}

async fn check_coop_exists<R: FullRepository + ?Sized>(
    repo: &R,
    coop_id: Option<CoopId>,
) -> ServiceResult<()> {
    if let Some(id) = coop_id {
        missing_as_invalid(repo.get_coop(id).await, "coopId", &format!("coop {}", id))?;
    }
    Ok(())
}

fn derived_composition(sire: Option<&Bird>, dam: Option<&Bird>) -> Vec<BreedShare> {
    calculate_child_breed_composition(
        sire.map(|b| b.breed_composition.as_slice()),
        dam.map(|b| b.breed_composition.as_slice()),
    )
}

/// Create a bird. Without an explicit composition, it is derived from the
/// parents.
pub async fn create_bird<R: FullRepository + ?Sized>(
    repo: &R,
    input: BirdInput,
    actor: &str,
) -> ServiceResult<Bird> {
    input.validate()?;
    let (sire, dam) = load_parents(repo, input.sire_id, input.dam_id, None).await?;
    check_coop_exists(repo, input.coop_id).await?;

    let composition = match &input.breed_composition {
        Some(shares) => {
            check_breeds_exist(repo, shares).await?;
            shares.clone()
        }
        None => derived_composition(sire.as_ref(), dam.as_ref()),
    };

    let record = BirdRecordWrite::from_input(input, composition, actor);
    let bird = repo.create_bird(&record).await?;
    log::info!("Bird {} '{}' created by {}", bird.id, bird.name, actor);
    Ok(bird)
}

/// Replace a bird.
///
/// Without an explicit composition the stored composition is kept, unless
/// the parents changed and at least one is set, in which case it is
/// re-derived from them.
pub async fn update_bird<R: FullRepository + ?Sized>(
    repo: &R,
    id: BirdId,
    input: BirdInput,
    actor: &str,
) -> ServiceResult<Bird> {
    let existing = repo.get_bird(id).await?;
    input.validate()?;
    let (sire, dam) = load_parents(repo, input.sire_id, input.dam_id, Some(id)).await?;
    check_coop_exists(repo, input.coop_id).await?;

    let parents_changed = input.sire_id != existing.sire_id || input.dam_id != existing.dam_id;
    let composition = match &input.breed_composition {
        Some(shares) => {
            check_breeds_exist(repo, shares).await?;
            shares.clone()
        }
        None if parents_changed && (sire.is_some() || dam.is_some()) => {
            derived_composition(sire.as_ref(), dam.as_ref())
        }
        None => existing.breed_composition,
    };

    let record = BirdRecordWrite::from_input(input, composition, actor);
    Ok(repo.update_bird(id, &record).await?)
}

pub async fn get_bird<R: FullRepository + ?Sized>(repo: &R, id: BirdId) -> ServiceResult<Bird> {
    Ok(repo.get_bird(id).await?)
}

pub async fn list_birds<R: FullRepository + ?Sized>(
    repo: &R,
    filter: &BirdFilter,
    params: ListParams,
) -> ServiceResult<Page<Bird>> {
    Ok(repo.list_birds(filter, params).await?)
}

pub async fn delete_bird<R: FullRepository + ?Sized>(repo: &R, id: BirdId) -> ServiceResult<()> {
    repo.delete_bird(id).await?;
    log::info!("Bird {} deleted", id);
    Ok(())
}

/// Recompute a bird's composition from its current parents.
pub async fn recalculate_composition<R: FullRepository + ?Sized>(
    repo: &R,
    id: BirdId,
) -> ServiceResult<Bird> {
    let bird = repo.get_bird(id).await?;
    if bird.sire_id.is_none() && bird.dam_id.is_none() {
        return Err(invalid("sireId", "bird has no recorded parents"));
    }
    let sire = match bird.sire_id {
        Some(sire_id) => Some(repo.get_bird(sire_id).await?),
        None => None,
    };
    let dam = match bird.dam_id {
        Some(dam_id) => Some(repo.get_bird(dam_id).await?),
        None => None,
    };
    let composition = derived_composition(sire.as_ref(), dam.as_ref());
    Ok(repo.set_breed_composition(id, &composition).await?)
}

/// Composition a chick of `sire` and `dam` would receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionPreview {
    pub composition: Vec<BreedShare>,
    pub total: f64,
    pub complete: bool,
}

pub async fn composition_preview<R: FullRepository + ?Sized>(
    repo: &R,
    sire_id: Option<BirdId>,
    dam_id: Option<BirdId>,
) -> ServiceResult<CompositionPreview> {
    if sire_id.is_some() && sire_id == dam_id {
        return Err(invalid("damId", "sire and dam must be different birds"));
    }
    let (sire, dam) = load_parents(repo, sire_id, dam_id, None).await?;
    let composition = derived_composition(sire.as_ref(), dam.as_ref());
    Ok(CompositionPreview {
        total: total_percentage(&composition),
        complete: is_complete_composition(&composition),
        composition,
    })
}

pub async fn list_offspring<R: FullRepository + ?Sized>(
    repo: &R,
    id: BirdId,
) -> ServiceResult<Vec<Bird>> {
    Ok(repo.list_offspring(id).await?)
}

pub async fn add_weight<R: FullRepository + ?Sized>(
    repo: &R,
    bird_id: BirdId,
    input: WeightInput,
) -> ServiceResult<WeightRecord> {
    repo.get_bird(bird_id).await?;
    input.validate()?;
    Ok(repo.add_weight(bird_id, &input).await?)
}

pub async fn list_weights<R: FullRepository + ?Sized>(
    repo: &R,
    bird_id: BirdId,
) -> ServiceResult<Vec<WeightRecord>> {
    Ok(repo.list_weights(bird_id).await?)
}

pub async fn delete_weight<R: FullRepository + ?Sized>(
    repo: &R,
    id: WeightId,
) -> ServiceResult<()> {
    Ok(repo.delete_weight(id).await?)
}

// ==================== Breeds & coops ====================

pub async fn create_breed<R: FullRepository + ?Sized>(
    repo: &R,
    input: BreedInput,
) -> ServiceResult<Breed> {
    input.validate()?;
    let breed = repo.create_breed(&input).await?;
    log::info!("Breed {} '{}' created", breed.id, breed.name);
    Ok(breed)
}

pub async fn update_breed<R: FullRepository + ?Sized>(
    repo: &R,
    id: BreedId,
    input: BreedInput,
) -> ServiceResult<Breed> {
    repo.get_breed(id).await?;
    input.validate()?;
    Ok(repo.update_breed(id, &input).await?)
}

pub async fn get_breed<R: FullRepository + ?Sized>(repo: &R, id: BreedId) -> ServiceResult<Breed> {
    Ok(repo.get_breed(id).await?)
}

pub async fn list_breeds<R: FullRepository + ?Sized>(repo: &R) -> ServiceResult<Vec<Breed>> {
    Ok(repo.list_breeds().await?)
}

pub async fn delete_breed<R: FullRepository + ?Sized>(repo: &R, id: BreedId) -> ServiceResult<()> {
    Ok(repo.delete_breed(id).await?)
}

pub async fn create_coop<R: FullRepository + ?Sized>(
    repo: &R,
    input: CoopInput,
) -> ServiceResult<CoopSummary> {
    input.validate()?;
    let coop = repo.create_coop(&input).await?;
    log::info!("Coop {} '{}' created", coop.coop.id, coop.coop.name);
    Ok(coop)
}

pub async fn update_coop<R: FullRepository + ?Sized>(
    repo: &R,
    id: CoopId,
    input: CoopInput,
) -> ServiceResult<CoopSummary> {
    repo.get_coop(id).await?;
    input.validate()?;
    Ok(repo.update_coop(id, &input).await?)
}

pub async fn get_coop<R: FullRepository + ?Sized>(
    repo: &R,
    id: CoopId,
) -> ServiceResult<CoopSummary> {
    Ok(repo.get_coop(id).await?)
}

pub async fn list_coops<R: FullRepository + ?Sized>(repo: &R) -> ServiceResult<Vec<CoopSummary>> {
    Ok(repo.list_coops().await?)
}

pub async fn delete_coop<R: FullRepository + ?Sized>(repo: &R, id: CoopId) -> ServiceResult<()> {
    Ok(repo.delete_coop(id).await?)
}

// ==================== Eggs ====================

async fn check_egg_references<R: FullRepository + ?Sized>(
    repo: &R,
    input: &EggInput,
) -> ServiceResult<()> {
    load_parents(repo, input.sire_id, input.dam_id, None).await?;
    check_coop_exists(repo, input.coop_id).await
}

pub async fn create_egg<R: FullRepository + ?Sized>(
    repo: &R,
    input: EggInput,
    actor: &str,
) -> ServiceResult<EggRecord> {
    input.validate()?;
    check_egg_references(repo, &input).await?;
    Ok(repo.create_egg(&input, actor).await?)
}

pub async fn update_egg<R: FullRepository + ?Sized>(
    repo: &R,
    id: EggId,
    input: EggInput,
) -> ServiceResult<EggRecord> {
    repo.get_egg(id).await?;
    input.validate()?;
    check_egg_references(repo, &input).await?;
    Ok(repo.update_egg(id, &input).await?)
}

pub async fn get_egg<R: FullRepository + ?Sized>(repo: &R, id: EggId) -> ServiceResult<EggRecord> {
    Ok(repo.get_egg(id).await?)
}

pub async fn list_eggs<R: FullRepository + ?Sized>(
    repo: &R,
    filter: &EggFilter,
    params: ListParams,
) -> ServiceResult<Page<EggRecord>> {
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if to < from {
            return Err(invalid("to", "must not be before 'from'"));
        }
    }
    Ok(repo.list_eggs(filter, params).await?)
}

pub async fn delete_egg<R: FullRepository + ?Sized>(repo: &R, id: EggId) -> ServiceResult<()> {
    Ok(repo.delete_egg(id).await?)
}

// ==================== Feed ====================

pub async fn create_inventory<R: FullRepository + ?Sized>(
    repo: &R,
    input: FeedInventoryInput,
) -> ServiceResult<FeedInventory> {
    input.validate()?;
    Ok(repo.create_inventory(&input).await?)
}

pub async fn update_inventory<R: FullRepository + ?Sized>(
    repo: &R,
    id: FeedInventoryId,
    input: FeedInventoryInput,
) -> ServiceResult<FeedInventory> {
    repo.get_inventory(id).await?;
    input.validate()?;
    Ok(repo.update_inventory(id, &input).await?)
}

pub async fn get_inventory<R: FullRepository + ?Sized>(
    repo: &R,
    id: FeedInventoryId,
) -> ServiceResult<FeedInventory> {
    Ok(repo.get_inventory(id).await?)
}

pub async fn list_inventory<R: FullRepository + ?Sized>(
    repo: &R,
    params: ListParams,
) -> ServiceResult<Page<FeedInventory>> {
    Ok(repo.list_inventory(params).await?)
}

pub async fn delete_inventory<R: FullRepository + ?Sized>(
    repo: &R,
    id: FeedInventoryId,
) -> ServiceResult<()> {
    Ok(repo.delete_inventory(id).await?)
}

/// Record feed usage; the inventory lot is decremented in the same write.
pub async fn record_consumption<R: FullRepository + ?Sized>(
    repo: &R,
    input: FeedConsumptionInput,
    actor: &str,
) -> ServiceResult<FeedConsumption> {
    input.validate()?;
    let record = repo.record_consumption(&input, actor).await?;
    log::info!(
        "{} kg consumed from feed lot {} by {}",
        record.quantity_kg,
        record.inventory_id,
        actor
    );
    Ok(record)
}

pub async fn list_consumption<R: FullRepository + ?Sized>(
    repo: &R,
    filter: &ConsumptionFilter,
    params: ListParams,
) -> ServiceResult<Page<FeedConsumption>> {
    Ok(repo.list_consumption(filter, params).await?)
}

pub async fn delete_consumption<R: FullRepository + ?Sized>(
    repo: &R,
    id: FeedConsumptionId,
) -> ServiceResult<()> {
    Ok(repo.delete_consumption(id).await?)
}

// ==================== Health ====================

async fn check_bird_reference<R: FullRepository + ?Sized>(
    repo: &R,
    bird_id: BirdId,
) -> ServiceResult<()> {
    missing_as_invalid(repo.get_bird(bird_id).await, "birdId", &format!("bird {}", bird_id))?;
    Ok(())
}

pub async fn create_incident<R: FullRepository + ?Sized>(
    repo: &R,
    input: IncidentInput,
    actor: &str,
) -> ServiceResult<HealthIncident> {
    input.validate()?;
    check_bird_reference(repo, input.bird_id).await?;
    Ok(repo.create_incident(&input, actor).await?)
}

pub async fn update_incident<R: FullRepository + ?Sized>(
    repo: &R,
    id: IncidentId,
    input: IncidentInput,
) -> ServiceResult<HealthIncident> {
    repo.get_incident(id).await?;
    input.validate()?;
    check_bird_reference(repo, input.bird_id).await?;
    Ok(repo.update_incident(id, &input).await?)
}

pub async fn get_incident<R: FullRepository + ?Sized>(
    repo: &R,
    id: IncidentId,
) -> ServiceResult<HealthIncident> {
    Ok(repo.get_incident(id).await?)
}

pub async fn list_incidents<R: FullRepository + ?Sized>(
    repo: &R,
    bird_id: Option<BirdId>,
    params: ListParams,
) -> ServiceResult<Page<HealthIncident>> {
    Ok(repo.list_incidents(bird_id, params).await?)
}

pub async fn delete_incident<R: FullRepository + ?Sized>(
    repo: &R,
    id: IncidentId,
) -> ServiceResult<()> {
    Ok(repo.delete_incident(id).await?)
}

pub async fn create_vaccination<R: FullRepository + ?Sized>(
    repo: &R,
    input: VaccinationInput,
) -> ServiceResult<Vaccination> {
    input.validate()?;
    check_bird_reference(repo, input.bird_id).await?;
    Ok(repo.create_vaccination(&input).await?)
}

pub async fn list_vaccinations<R: FullRepository + ?Sized>(
    repo: &R,
    bird_id: Option<BirdId>,
    params: ListParams,
) -> ServiceResult<Page<Vaccination>> {
    Ok(repo.list_vaccinations(bird_id, params).await?)
}

pub async fn delete_vaccination<R: FullRepository + ?Sized>(
    repo: &R,
    id: VaccinationId,
) -> ServiceResult<()> {
    Ok(repo.delete_vaccination(id).await?)
}

pub async fn create_medication<R: FullRepository + ?Sized>(
    repo: &R,
    input: MedicationInput,
) -> ServiceResult<Medication> {
    input.validate()?;
    check_bird_reference(repo, input.bird_id).await?;
    Ok(repo.create_medication(&input).await?)
}

pub async fn list_medications<R: FullRepository + ?Sized>(
    repo: &R,
    bird_id: Option<BirdId>,
    params: ListParams,
) -> ServiceResult<Page<Medication>> {
    Ok(repo.list_medications(bird_id, params).await?)
}

pub async fn delete_medication<R: FullRepository + ?Sized>(
    repo: &R,
    id: MedicationId,
) -> ServiceResult<()> {
    Ok(repo.delete_medication(id).await?)
}

// ==================== Reports ====================

async fn resolve<R: FullRepository + ?Sized>(
    repo: &R,
    plan: ReportPlan,
) -> ServiceResult<ResolvedQuery> {
    Ok(plan.resolve(repo).await?)
}

/// Plan, resolve and run one windowed report page.
pub async fn execute_report<R: FullRepository + ?Sized>(
    repo: &R,
    query: &ReportQuery,
) -> ServiceResult<ReportPage> {
    let resolved = resolve(repo, query.plan()?).await?;
    Ok(repo.run_report(&resolved).await?)
}

/// Group counts over the whole filtered result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub report_type: ReportType,
    pub columns: Vec<ReportColumn>,
    pub total: usize,
    pub groups: Vec<SummaryGroup>,
}

/// Group the unwindowed result by the selected columns.
pub async fn summarize_report<R: FullRepository + ?Sized>(
    repo: &R,
    query: &ReportQuery,
) -> ServiceResult<ReportSummary> {
    let resolved = resolve(repo, query.plan()?.without_window()).await?;
    let page = repo.run_report(&resolved).await?;
    Ok(ReportSummary {
        report_type: page.report_type,
        groups: summarize(&page.rows, &resolved.columns),
        columns: page.columns,
        total: page.total,
    })
}

/// Rendered CSV export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportExport {
    pub filename: String,
    pub content: String,
}

/// Render the unwindowed result as CSV.
pub async fn export_report<R: FullRepository + ?Sized>(
    repo: &R,
    query: &ReportQuery,
    localized: bool,
    today: NaiveDate,
) -> ServiceResult<ReportExport> {
    let resolved = resolve(repo, query.plan()?.without_window()).await?;
    let page = repo.run_report(&resolved).await?;
    let content = crate::reports::to_csv(&page, localized)
        .map_err(|e| RepositoryError::internal(format!("CSV export failed: {:#}", e)))?;
    log::info!("Exported {} {} row(s) as CSV", page.total, page.report_type);
    Ok(ReportExport {
        filename: export_filename(page.report_type, today),
        content,
    })
}

// ==================== Presets ====================

/// Validate a preset payload, including its config against the column
/// registry.
fn validate_preset(input: &PresetInput) -> ServiceResult<()> {
    input.validate()?;
    ReportQuery::from_preset(input.report_type, &input.config).plan()?;
    Ok(())
}

async fn get_owned_preset<R: FullRepository + ?Sized>(
    repo: &R,
    owner_id: &str,
    id: PresetId,
) -> ServiceResult<ReportPreset> {
    let preset = repo.get_preset(id).await?;
    if preset.owner_id != owner_id {
        return Err(ServiceError::Forbidden(format!(
            "preset {} belongs to another user",
            id
        )));
    }
    Ok(preset)
}

pub async fn create_preset<R: FullRepository + ?Sized>(
    repo: &R,
    owner_id: &str,
    input: PresetInput,
) -> ServiceResult<ReportPreset> {
    validate_preset(&input)?;
    Ok(repo.create_preset(owner_id, &input).await?)
}

pub async fn update_preset<R: FullRepository + ?Sized>(
    repo: &R,
    owner_id: &str,
    id: PresetId,
    input: PresetInput,
) -> ServiceResult<ReportPreset> {
    get_owned_preset(repo, owner_id, id).await?;
    validate_preset(&input)?;
    Ok(repo.update_preset(id, &input).await?)
}

pub async fn get_preset<R: FullRepository + ?Sized>(
    repo: &R,
    owner_id: &str,
    id: PresetId,
) -> ServiceResult<ReportPreset> {
    get_owned_preset(repo, owner_id, id).await
}

pub async fn list_presets<R: FullRepository + ?Sized>(
    repo: &R,
    owner_id: &str,
    report_type: Option<ReportType>,
) -> ServiceResult<Vec<ReportPreset>> {
    Ok(repo.list_presets(owner_id, report_type).await?)
}

pub async fn delete_preset<R: FullRepository + ?Sized>(
    repo: &R,
    owner_id: &str,
    id: PresetId,
) -> ServiceResult<()> {
    get_owned_preset(repo, owner_id, id).await?;
    Ok(repo.delete_preset(id).await?)
}
