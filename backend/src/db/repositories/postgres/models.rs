use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde_json::Value;

use super::schema::{
    bird_breeds, bird_identifiers, birds, breeds, coops, eggs, feed_consumption, feed_inventory,
    health_incidents, medications, report_presets, vaccinations, weight_records,
};
use crate::api::*;
use crate::db::repository::{RepositoryError, RepositoryResult};
use crate::models::BirdRecordWrite;

/// Decode a text column holding one of the closed enumerations.
pub fn parse_enum<T: FromStr<Err = String>>(value: &str) -> RepositoryResult<T> {
    value.parse().map_err(|e: String| {
        RepositoryError::internal(format!("Corrupt enum value in database: {}", e))
    })

}

fn parse_opt_enum<T: FromStr<Err = String>>(value: Option<String>) -> RepositoryResult<Option<T>> {
    value.as_deref().map(parse_enum).transpose()
}

// ==================== Breeds & coops ====================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = breeds)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BreedDbRow {
    pub id: i64,
    pub name: String,
    pub name_localized: Option<String>,
    pub origin: Option<String>,
    pub egg_color: Option<String>,
    pub comb_type: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<BreedDbRow> for Breed {
    type Error = RepositoryError;

    fn try_from(row: BreedDbRow) -> RepositoryResult<Self> {
        Ok(Breed {
            id: BreedId(row.id),
            name: row.name,
            name_localized: row.name_localized,
            origin: row.origin,
            egg_color: row.egg_color,
            comb_type: parse_opt_enum(row.comb_type)?,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = breeds)]
#[diesel(treat_none_as_null = true)]
pub struct BreedWriteRow {
    pub name: String,
    pub name_localized: Option<String>,
    pub origin: Option<String>,
    pub egg_color: Option<String>,
    pub comb_type: Option<String>,
    pub description: Option<String>,
}

impl From<&BreedInput> for BreedWriteRow {
    fn from(input: &BreedInput) -> Self {
        Self {
            name: input.name.trim().to_string(),
            name_localized: input.name_localized.clone(),
            origin: input.origin.clone(),
            egg_color: input.egg_color.clone(),
            comb_type: input.comb_type.map(|c| c.to_string()),
            description: input.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = coops)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CoopDbRow {
    pub id: i64,
    pub name: String,
    pub capacity: Option<i32>,
    pub location: Option<String>,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CoopDbRow> for Coop {
    fn from(row: CoopDbRow) -> Self {
        Coop {
            id: CoopId(row.id),
            name: row.name,
            capacity: row.capacity,
            location: row.location,
            is_active: row.is_active,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = coops)]
#[diesel(treat_none_as_null = true)]
pub struct CoopWriteRow {
    pub name: String,
    pub capacity: Option<i32>,
    pub location: Option<String>,
    pub is_active: bool,
    pub notes: Option<String>,
}

impl From<&CoopInput> for CoopWriteRow {
    fn from(input: &CoopInput) -> Self {
        Self {
            name: input.name.trim().to_string(),
            capacity: input.capacity,
            location: input.location.clone(),
            is_active: input.is_active,
            notes: input.notes.clone(),
        }
    }
}

// ==================== Birds ====================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = birds)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BirdDbRow {
    pub id: i64,
    pub name: String,
    pub sex: String,
    pub status: String,
    pub hatch_date: Option<NaiveDate>,
    pub sire_id: Option<i64>,
    pub dam_id: Option<i64>,
    pub coop_id: Option<i64>,
    pub comb_type: Option<String>,
    pub color: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BirdDbRow {
    pub fn into_bird(
        self,
        identifiers: Vec<BirdIdentifier>,
        breed_composition: Vec<BreedShare>,
    ) -> RepositoryResult<Bird> {
        Ok(Bird {
            id: BirdId(self.id),
            name: self.name,
            sex: parse_enum(&self.sex)?,
            status: parse_enum(&self.status)?,
            hatch_date: self.hatch_date,
            sire_id: self.sire_id.map(BirdId),
            dam_id: self.dam_id.map(BirdId),
            coop_id: self.coop_id.map(CoopId),
            breed_composition,
            comb_type: parse_opt_enum(self.comb_type)?,
            color: self.color,
            identifiers,
            notes: self.notes,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Bird columns written on insert and on full replacement.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = birds)]
#[diesel(treat_none_as_null = true)]
pub struct BirdWriteRow {
    pub name: String,
    pub sex: String,
    pub status: String,
    pub hatch_date: Option<NaiveDate>,
    pub sire_id: Option<i64>,
    pub dam_id: Option<i64>,
    pub coop_id: Option<i64>,
    pub comb_type: Option<String>,
    pub color: Option<String>,
    pub notes: Option<String>,
}

impl From<&BirdRecordWrite> for BirdWriteRow {
    fn from(bird: &BirdRecordWrite) -> Self {
        Self {
            name: bird.name.clone(),
            sex: bird.sex.to_string(),
            status: bird.status.to_string(),
            hatch_date: bird.hatch_date,
            sire_id: bird.sire_id.map(|id| id.value()),
            dam_id: bird.dam_id.map(|id| id.value()),
            coop_id: bird.coop_id.map(|id| id.value()),
            comb_type: bird.comb_type.map(|c| c.to_string()),
            color: bird.color.clone(),
            notes: bird.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bird_identifiers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct IdentifierDbRow {
    pub id: i64,
    pub bird_id: i64,
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bird_identifiers)]
pub struct NewIdentifierRow {
    pub bird_id: i64,
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = bird_breeds)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BirdBreedRow {
    pub bird_id: i64,
    pub breed_id: i64,
    pub percentage: f64,
    pub position: i32,
}

pub fn identifier_rows(bird_id: i64, identifiers: &[BirdIdentifier]) -> Vec<NewIdentifierRow> {
    identifiers
        .iter()
        .map(|i| NewIdentifierRow {
            bird_id,
            kind: i.kind.to_string(),
            value: i.value.clone(),
        })
        .collect()
}

pub fn breed_rows(bird_id: i64, shares: &[BreedShare]) -> Vec<BirdBreedRow> {
    shares
        .iter()
        .enumerate()
        .map(|(position, share)| BirdBreedRow {
            bird_id,
            breed_id: share.breed_id.value(),
            percentage: share.percentage,
            position: position as i32,
        })
        .collect()
}

/// Attach identifier and breed rows to their birds, keeping `rows` order.
pub fn assemble_birds(
    rows: Vec<BirdDbRow>,
    identifiers: Vec<IdentifierDbRow>,
    shares: Vec<BirdBreedRow>,
) -> RepositoryResult<Vec<Bird>> {
    let mut identifiers_by_bird: HashMap<i64, Vec<BirdIdentifier>> = HashMap::new();
    for row in identifiers {
        identifiers_by_bird
            .entry(row.bird_id)
            .or_default()
            .push(BirdIdentifier {
                kind: parse_enum(&row.kind)?,
                value: row.value,
            });
    }
    let mut shares_by_bird: HashMap<i64, Vec<BreedShare>> = HashMap::new();
    for row in shares {
        shares_by_bird.entry(row.bird_id).or_default().push(BreedShare {
            breed_id: BreedId(row.breed_id),
            percentage: row.percentage,
        });
    }

    rows.into_iter()
        .map(|row| {
            let identifiers = identifiers_by_bird.remove(&row.id).unwrap_or_default();
            let shares = shares_by_bird.remove(&row.id).unwrap_or_default();
            row.into_bird(identifiers, shares)
        })
        .collect()
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = weight_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WeightDbRow {
    pub id: i64,
    pub bird_id: i64,
    pub recorded_on: NaiveDate,
    pub weight_grams: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<WeightDbRow> for WeightRecord {
    fn from(row: WeightDbRow) -> Self {
        WeightRecord {
            id: WeightId(row.id),
            bird_id: BirdId(row.bird_id),
            recorded_on: row.recorded_on,
            weight_grams: row.weight_grams,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = weight_records)]
pub struct NewWeightRow {
    pub bird_id: i64,
    pub recorded_on: NaiveDate,
    pub weight_grams: f64,
    pub notes: Option<String>,
}

// ==================== Eggs ====================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = eggs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EggDbRow {
    pub id: i64,
    pub dam_id: Option<i64>,
    pub sire_id: Option<i64>,
    pub coop_id: Option<i64>,
    pub laid_date: NaiveDate,
    pub weight_grams: Option<f64>,
    pub shell_quality: Option<String>,
    pub shell_color: Option<String>,
    pub outcome: String,
    pub incubation_start: Option<NaiveDate>,
    pub hatch_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EggDbRow> for EggRecord {
    type Error = RepositoryError;

    fn try_from(row: EggDbRow) -> RepositoryResult<Self> {
        Ok(EggRecord {
            id: EggId(row.id),
            dam_id: row.dam_id.map(BirdId),
            sire_id: row.sire_id.map(BirdId),
            coop_id: row.coop_id.map(CoopId),
            laid_date: row.laid_date,
            weight_grams: row.weight_grams,
            shell_quality: parse_opt_enum(row.shell_quality)?,
            shell_color: row.shell_color,
            outcome: parse_enum(&row.outcome)?,
            incubation_start: row.incubation_start,
            hatch_date: row.hatch_date,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = eggs)]
#[diesel(treat_none_as_null = true)]
pub struct EggWriteRow {
    pub dam_id: Option<i64>,
    pub sire_id: Option<i64>,
    pub coop_id: Option<i64>,
    pub laid_date: NaiveDate,
    pub weight_grams: Option<f64>,
    pub shell_quality: Option<String>,
    pub shell_color: Option<String>,
    pub outcome: String,
    pub incubation_start: Option<NaiveDate>,
    pub hatch_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl From<&EggInput> for EggWriteRow {
    fn from(input: &EggInput) -> Self {
        Self {
            dam_id: input.dam_id.map(|id| id.value()),
            sire_id: input.sire_id.map(|id| id.value()),
            coop_id: input.coop_id.map(|id| id.value()),
            laid_date: input.laid_date,
            weight_grams: input.weight_grams,
            shell_quality: input.shell_quality.map(|q| q.to_string()),
            shell_color: input.shell_color.clone(),
            outcome: input.outcome.to_string(),
            incubation_start: input.incubation_start,
            hatch_date: input.hatch_date,
            notes: input.notes.clone(),
        }
    }
}

// ==================== Feed ====================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = feed_inventory)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InventoryDbRow {
    pub id: i64,
    pub feed_type: String,
    pub brand: Option<String>,
    pub quantity_kg: f64,
    pub unit_cost: Option<f64>,
    pub purchase_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<InventoryDbRow> for FeedInventory {
    type Error = RepositoryError;

    fn try_from(row: InventoryDbRow) -> RepositoryResult<Self> {
        Ok(FeedInventory {
            id: FeedInventoryId(row.id),
            feed_type: parse_enum(&row.feed_type)?,
            brand: row.brand,
            quantity_kg: row.quantity_kg,
            unit_cost: row.unit_cost,
            purchase_date: row.purchase_date,
            expiry_date: row.expiry_date,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = feed_inventory)]
#[diesel(treat_none_as_null = true)]
pub struct InventoryWriteRow {
    pub feed_type: String,
    pub brand: Option<String>,
    pub quantity_kg: f64,
    pub unit_cost: Option<f64>,
    pub purchase_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl From<&FeedInventoryInput> for InventoryWriteRow {
    fn from(input: &FeedInventoryInput) -> Self {
        Self {
            feed_type: input.feed_type.to_string(),
            brand: input.brand.clone(),
            quantity_kg: input.quantity_kg,
            unit_cost: input.unit_cost,
            purchase_date: input.purchase_date,
            expiry_date: input.expiry_date,
            notes: input.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = feed_consumption)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ConsumptionDbRow {
    pub id: i64,
    pub inventory_id: i64,
    pub coop_id: Option<i64>,
    pub quantity_kg: f64,
    pub consumed_on: NaiveDate,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<ConsumptionDbRow> for FeedConsumption {
    fn from(row: ConsumptionDbRow) -> Self {
        FeedConsumption {
            id: FeedConsumptionId(row.id),
            inventory_id: FeedInventoryId(row.inventory_id),
            coop_id: row.coop_id.map(CoopId),
            quantity_kg: row.quantity_kg,
            consumed_on: row.consumed_on,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = feed_consumption)]
pub struct NewConsumptionRow {
    pub inventory_id: i64,
    pub coop_id: Option<i64>,
    pub quantity_kg: f64,
    pub consumed_on: NaiveDate,
    pub notes: Option<String>,
    pub created_by: String,
}

// ==================== Health ====================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = health_incidents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct IncidentDbRow {
    pub id: i64,
    pub bird_id: i64,
    pub incident_date: NaiveDate,
    pub category: String,
    pub severity: String,
    pub description: String,
    pub treatment: Option<String>,
    pub resolved: bool,
    pub resolved_date: Option<NaiveDate>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<IncidentDbRow> for HealthIncident {
    type Error = RepositoryError;

    fn try_from(row: IncidentDbRow) -> RepositoryResult<Self> {
        Ok(HealthIncident {
            id: IncidentId(row.id),
            bird_id: BirdId(row.bird_id),
            incident_date: row.incident_date,
            category: parse_enum(&row.category)?,
            severity: parse_enum(&row.severity)?,
            description: row.description,
            treatment: row.treatment,
            resolved: row.resolved,
            resolved_date: row.resolved_date,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = health_incidents)]
#[diesel(treat_none_as_null = true)]
pub struct IncidentWriteRow {
    pub bird_id: i64,
    pub incident_date: NaiveDate,
    pub category: String,
    pub severity: String,
    pub description: String,
    pub treatment: Option<String>,
    pub resolved: bool,
    pub resolved_date: Option<NaiveDate>,
}

impl From<&IncidentInput> for IncidentWriteRow {
    fn from(input: &IncidentInput) -> Self {
        Self {
            bird_id: input.bird_id.value(),
            incident_date: input.incident_date,
            category: input.category.to_string(),
            severity: input.severity.to_string(),
            description: input.description.trim().to_string(),
            treatment: input.treatment.clone(),
            resolved: input.resolved,
            resolved_date: input.resolved_date,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = vaccinations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VaccinationDbRow {
    pub id: i64,
    pub bird_id: i64,
    pub vaccine_name: String,
    pub administered_on: NaiveDate,
    pub next_due_on: Option<NaiveDate>,
    pub dose: Option<String>,
    pub administered_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<VaccinationDbRow> for Vaccination {
    fn from(row: VaccinationDbRow) -> Self {
        Vaccination {
            id: VaccinationId(row.id),
            bird_id: BirdId(row.bird_id),
            vaccine_name: row.vaccine_name,
            administered_on: row.administered_on,
            next_due_on: row.next_due_on,
            dose: row.dose,
            administered_by: row.administered_by,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = vaccinations)]
pub struct NewVaccinationRow {
    pub bird_id: i64,
    pub vaccine_name: String,
    pub administered_on: NaiveDate,
    pub next_due_on: Option<NaiveDate>,
    pub dose: Option<String>,
    pub administered_by: Option<String>,
    pub notes: Option<String>,
}

impl From<&VaccinationInput> for NewVaccinationRow {
    fn from(input: &VaccinationInput) -> Self {
        Self {
            bird_id: input.bird_id.value(),
            vaccine_name: input.vaccine_name.trim().to_string(),
            administered_on: input.administered_on,
            next_due_on: input.next_due_on,
            dose: input.dose.clone(),
            administered_by: input.administered_by.clone(),
            notes: input.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = medications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MedicationDbRow {
    pub id: i64,
    pub bird_id: i64,
    pub medication_name: String,
    pub dosage: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub withdrawal_days: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MedicationDbRow> for Medication {
    fn from(row: MedicationDbRow) -> Self {
        Medication {
            id: MedicationId(row.id),
            bird_id: BirdId(row.bird_id),
            medication_name: row.medication_name,
            dosage: row.dosage,
            start_date: row.start_date,
            end_date: row.end_date,
            withdrawal_days: row.withdrawal_days,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = medications)]
pub struct NewMedicationRow {
    pub bird_id: i64,
    pub medication_name: String,
    pub dosage: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub withdrawal_days: Option<i32>,
    pub notes: Option<String>,
}

impl From<&MedicationInput> for NewMedicationRow {
    fn from(input: &MedicationInput) -> Self {
        Self {
            bird_id: input.bird_id.value(),
            medication_name: input.medication_name.trim().to_string(),
            dosage: input.dosage.clone(),
            start_date: input.start_date,
            end_date: input.end_date,
            withdrawal_days: input.withdrawal_days,
            notes: input.notes.clone(),
        }
    }
}

// ==================== Presets ====================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = report_presets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PresetDbRow {
    pub id: i64,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub report_type: String,
    pub config: Value,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PresetDbRow> for ReportPreset {
    type Error = RepositoryError;

    fn try_from(row: PresetDbRow) -> RepositoryResult<Self> {
        let config: PresetConfig = serde_json::from_value(row.config).map_err(|e| {
            RepositoryError::internal(format!("Failed to parse preset config JSON: {}", e))
        })?;
        Ok(ReportPreset {
            id: PresetId(row.id),
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            report_type: parse_enum(&row.report_type)?,
            config,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = report_presets)]
#[diesel(treat_none_as_null = true)]
pub struct PresetWriteRow {
    pub name: String,
    pub description: Option<String>,
    pub report_type: String,
    pub config: Value,
    pub is_default: bool,
}

impl TryFrom<&PresetInput> for PresetWriteRow {
    type Error = RepositoryError;

    fn try_from(input: &PresetInput) -> RepositoryResult<Self> {
        let config = serde_json::to_value(&input.config).map_err(|e| {
            RepositoryError::internal(format!("Failed to serialize preset config: {}", e))
        })?;
        Ok(Self {
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            report_type: input.report_type.to_string(),
            config,
            is_default: input.is_default,
        })
    }
}
