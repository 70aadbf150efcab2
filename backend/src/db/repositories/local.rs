//! In-memory local repository implementation.
//!
//! All data lives in ordered maps behind a single `parking_lot::RwLock`.
//! Every multi-step write (bird + identifiers + composition + coop check,
//! feed consumption + stock decrement, default preset switch, cascading
//! deletes) validates first and mutates second under one write guard, so a
//! rejected write leaves no partial state behind.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::*;
use crate::db::repository::*;
use crate::models::BirdRecordWrite;
use crate::reports::{
    engine, BirdRow, EggRow, IncidentRow, NamedShare, RelationKind, RelationResolver,
    ReportPage, ReportType, ResolvedQuery,
};

/// In-memory local repository.
///
/// Ideal for unit tests and local development: fast, deterministic and
/// isolated. Cloning shares the underlying data.
///
/// # Example
/// ```ignore
/// let repo = LocalRepository::new();
/// let breed = BreedInput { name: "Leghorn".into(), ..Default::default() };
/// repo.create_breed(&breed).await?;
/// assert_eq!(repo.list_breeds().await?.len(), 1);
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    birds: BTreeMap<BirdId, Bird>,
    breeds: BTreeMap<BreedId, Breed>,
    coops: BTreeMap<CoopId, Coop>,
    eggs: BTreeMap<EggId, EggRecord>,
    weights: BTreeMap<WeightId, WeightRecord>,
    inventory: BTreeMap<FeedInventoryId, FeedInventory>,
    consumption: BTreeMap<FeedConsumptionId, FeedConsumption>,
    incidents: BTreeMap<IncidentId, HealthIncident>,
    vaccinations: BTreeMap<VaccinationId, Vaccination>,
    medications: BTreeMap<MedicationId, Medication>,
    presets: BTreeMap<PresetId, ReportPreset>,

    // Shared ID counter
    next_id: i64,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            birds: BTreeMap::new(),
            breeds: BTreeMap::new(),
            coops: BTreeMap::new(),
            eggs: BTreeMap::new(),
            weights: BTreeMap::new(),
            inventory: BTreeMap::new(),
            consumption: BTreeMap::new(),
            incidents: BTreeMap::new(),
            vaccinations: BTreeMap::new(),
            medications: BTreeMap::new(),
            presets: BTreeMap::new(),
            next_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalData {
    fn next_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn occupancy(&self, coop_id: CoopId, excluding: Option<BirdId>) -> usize {
        self.birds
            .values()
            .filter(|b| b.coop_id == Some(coop_id) && b.is_active() && Some(b.id) != excluding)
            .count()
    }

    fn coop_summary(&self, coop: &Coop) -> CoopSummary {
        CoopSummary {
            coop: coop.clone(),
            occupancy: self.occupancy(coop.id, None),
        }
    }

    /// Rules checked inside the write guard for bird inserts and updates.
    fn check_bird_write(&self, id: Option<BirdId>, bird: &BirdRecordWrite) -> RepositoryResult<()> {
        if let Some(coop_id) = bird.coop_id {
            let coop = self.coops.get(&coop_id).ok_or_else(|| {
                RepositoryError::invalid_field("coopId", format!("coop {} does not exist", coop_id))
            })?;
            if bird.status == BirdStatus::Active
                && !coop.has_room_for(self.occupancy(coop_id, id), 1)
            {
                return Err(RepositoryError::invalid_field(
                    "coopId",
                    format!("coop '{}' is at capacity", coop.name),
                ));
            }
        }

        for (idx, identifier) in bird.identifiers.iter().enumerate() {
            let taken = self.birds.values().any(|other| {
                Some(other.id) != id
                    && other
                        .identifiers
                        .iter()
                        .any(|i| i.kind == identifier.kind && i.value == identifier.value)
            });
            if taken {
                return Err(RepositoryError::invalid_field(
                    format!("identifiers[{}].value", idx),
                    format!(
                        "{} '{}' is already assigned to another bird",
                        identifier.kind, identifier.value
                    ),
                ));
            }
        }
        Ok(())
    }

    fn breed_name_taken(&self, name: &str, excluding: Option<BreedId>) -> bool {
        let name = name.trim().to_lowercase();
        self.breeds
            .values()
            .any(|b| Some(b.id) != excluding && b.name.to_lowercase() == name)
    }

    fn coop_name_taken(&self, name: &str, excluding: Option<CoopId>) -> bool {
        let name = name.trim().to_lowercase();
        self.coops
            .values()
            .any(|c| Some(c.id) != excluding && c.name.to_lowercase() == name)
    }

    fn bird_name(&self, id: Option<BirdId>) -> Option<String> {
        id.and_then(|id| self.birds.get(&id)).map(|b| b.name.clone())
    }

    fn coop_name(&self, id: Option<CoopId>) -> Option<String> {
        id.and_then(|id| self.coops.get(&id)).map(|c| c.name.clone())
    }

    fn bird_row(&self, bird: &Bird, today: chrono::NaiveDate) -> BirdRow {
        BirdRow {
            bird: bird.clone(),
            coop_name: self.coop_name(bird.coop_id),
            sire_name: self.bird_name(bird.sire_id),
            dam_name: self.bird_name(bird.dam_id),
            breeds: bird
                .breed_composition
                .iter()
                .map(|share| NamedShare {
                    breed_id: share.breed_id,
                    name: self
                        .breeds
                        .get(&share.breed_id)
                        .map(|b| b.name.clone())
                        .unwrap_or_else(|| format!("#{}", share.breed_id)),
                    percentage: share.percentage,
                })
                .collect(),
            today,
        }
    }

    fn clear_default_presets(&mut self, owner_id: &str, report_type: ReportType, keep: PresetId) {
        for preset in self.presets.values_mut() {
            if preset.owner_id == owner_id
                && preset.report_type == report_type
                && preset.id != keep
            {
                preset.is_default = false;
            }
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        let mut data = self.data.write();
        *data = LocalData {
            is_healthy: data.is_healthy,
            ..Default::default()
        };
    }

    pub fn bird_count(&self) -> usize {
        self.data.read().birds.len()
    }

    /// Helper to check health and return error if unhealthy.
    fn check_health(&self) -> RepositoryResult<()> {
        if !self.data.read().is_healthy {
            return Err(RepositoryError::connection("Local repository is not healthy"));
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&LocalData) -> RepositoryResult<T>) -> RepositoryResult<T> {
        self.check_health()?;
        f(&self.data.read())
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut LocalData) -> RepositoryResult<T>,
    ) -> RepositoryResult<T> {
        self.check_health()?;
        f(&mut self.data.write())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (chrono::DateTime<Utc>, i64)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn missing(entity: &str, id: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::not_found_entity(entity, id)
}

#[async_trait]
impl BirdRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn create_bird(&self, bird: &BirdRecordWrite) -> RepositoryResult<Bird> {
        self.write(|data| {
            data.check_bird_write(None, bird)?;
            let now = Utc::now();
            let stored = Bird {
                id: BirdId(data.next_id()),
                name: bird.name.clone(),
                sex: bird.sex,
                status: bird.status,
                hatch_date: bird.hatch_date,
                sire_id: bird.sire_id,
                dam_id: bird.dam_id,
                coop_id: bird.coop_id,
                breed_composition: bird.breed_composition.clone(),
                comb_type: bird.comb_type,
                color: bird.color.clone(),
                identifiers: bird.identifiers.clone(),
                notes: bird.notes.clone(),
                created_by: bird.actor.clone(),
                created_at: now,
                updated_at: now,
            };
            data.birds.insert(stored.id, stored.clone());
            Ok(stored)
        })
    }

    async fn update_bird(&self, id: BirdId, bird: &BirdRecordWrite) -> RepositoryResult<Bird> {
        self.write(|data| {
            if !data.birds.contains_key(&id) {
                return Err(missing("bird", id));
            }
            data.check_bird_write(Some(id), bird)?;
            let stored = data.birds.get_mut(&id).ok_or_else(|| missing("bird", id))?;
            stored.name = bird.name.clone();
            stored.sex = bird.sex;
            stored.status = bird.status;
            stored.hatch_date = bird.hatch_date;
            stored.sire_id = bird.sire_id;
            stored.dam_id = bird.dam_id;
            stored.coop_id = bird.coop_id;
            stored.breed_composition = bird.breed_composition.clone();
            stored.comb_type = bird.comb_type;
            stored.color = bird.color.clone();
            stored.identifiers = bird.identifiers.clone();
            stored.notes = bird.notes.clone();
            stored.updated_at = Utc::now();
            Ok(stored.clone())
        })
    }

    async fn get_bird(&self, id: BirdId) -> RepositoryResult<Bird> {
        self.read(|data| data.birds.get(&id).cloned().ok_or_else(|| missing("bird", id)))
    }

    async fn list_birds(
        &self,
        filter: &BirdFilter,
        params: ListParams,
    ) -> RepositoryResult<Page<Bird>> {
        self.read(|data| {
            let mut birds: Vec<Bird> = data
                .birds
                .values()
                .filter(|b| filter.matches(b))
                .cloned()
                .collect();
            newest_first(&mut birds, |b| (b.created_at, b.id.value()));
            Ok(params.paginate(birds))
        })
    }

    async fn delete_bird(&self, id: BirdId) -> RepositoryResult<()> {
        self.write(|data| {
            data.birds.remove(&id).ok_or_else(|| missing("bird", id))?;
            data.weights.retain(|_, w| w.bird_id != id);
            data.incidents.retain(|_, i| i.bird_id != id);
            data.vaccinations.retain(|_, v| v.bird_id != id);
            data.medications.retain(|_, m| m.bird_id != id);
            for bird in data.birds.values_mut() {
                if bird.sire_id == Some(id) {
                    bird.sire_id = None;
                }
                if bird.dam_id == Some(id) {
                    bird.dam_id = None;
                }
            }
            for egg in data.eggs.values_mut() {
                if egg.sire_id == Some(id) {
                    egg.sire_id = None;
                }
                if egg.dam_id == Some(id) {
                    egg.dam_id = None;
                }
            }
            log::debug!("Deleted bird {} and its dependent records", id);
            Ok(())
        })
    }

    async fn set_breed_composition(
        &self,
        id: BirdId,
        composition: &[BreedShare],
    ) -> RepositoryResult<Bird> {
        self.write(|data| {
            let bird = data.birds.get_mut(&id).ok_or_else(|| missing("bird", id))?;
            bird.breed_composition = composition.to_vec();
            bird.updated_at = Utc::now();
            Ok(bird.clone())
        })
    }

    async fn list_offspring(&self, id: BirdId) -> RepositoryResult<Vec<Bird>> {
        self.read(|data| {
            if !data.birds.contains_key(&id) {
                return Err(missing("bird", id));
            }
            let mut offspring: Vec<Bird> = data
                .birds
                .values()
                .filter(|b| b.sire_id == Some(id) || b.dam_id == Some(id))
                .cloned()
                .collect();
            offspring.sort_by_key(|b| (b.hatch_date.is_none(), b.hatch_date, b.id));
            Ok(offspring)
        })
    }

    async fn add_weight(
        &self,
        bird_id: BirdId,
        weight: &WeightInput,
    ) -> RepositoryResult<WeightRecord> {
        self.write(|data| {
            if !data.birds.contains_key(&bird_id) {
                return Err(missing("bird", bird_id));
            }
            let record = WeightRecord {
                id: WeightId(data.next_id()),
                bird_id,
                recorded_on: weight.recorded_on,
                weight_grams: weight.weight_grams,
                notes: weight.notes.clone(),
                created_at: Utc::now(),
            };
            data.weights.insert(record.id, record.clone());
            Ok(record)
        })
    }

    async fn list_weights(&self, bird_id: BirdId) -> RepositoryResult<Vec<WeightRecord>> {
        self.read(|data| {
            if !data.birds.contains_key(&bird_id) {
                return Err(missing("bird", bird_id));
            }
            let mut weights: Vec<WeightRecord> = data
                .weights
                .values()
                .filter(|w| w.bird_id == bird_id)
                .cloned()
                .collect();
            weights.sort_by(|a, b| (b.recorded_on, b.id).cmp(&(a.recorded_on, a.id)));
            Ok(weights)
        })
    }

    async fn delete_weight(&self, id: WeightId) -> RepositoryResult<()> {
        self.write(|data| {
            data.weights.remove(&id).map(|_| ()).ok_or_else(|| missing("weight", id))
        })
    }
}

#[async_trait]
impl CatalogRepository for LocalRepository {
    async fn create_breed(&self, breed: &BreedInput) -> RepositoryResult<Breed> {
        self.write(|data| {
            if data.breed_name_taken(&breed.name, None) {
                return Err(RepositoryError::invalid_field("name", "breed name already exists"));
            }
            let stored = Breed {
                id: BreedId(data.next_id()),
                name: breed.name.trim().to_string(),
                name_localized: breed.name_localized.clone(),
                origin: breed.origin.clone(),
                egg_color: breed.egg_color.clone(),
                comb_type: breed.comb_type,
                description: breed.description.clone(),
                created_at: Utc::now(),
            };
            data.breeds.insert(stored.id, stored.clone());
            Ok(stored)
        })
    }

    async fn update_breed(&self, id: BreedId, breed: &BreedInput) -> RepositoryResult<Breed> {
        self.write(|data| {
            if data.breed_name_taken(&breed.name, Some(id)) {
                return Err(RepositoryError::invalid_field("name", "breed name already exists"));
            }
            let stored = data.breeds.get_mut(&id).ok_or_else(|| missing("breed", id))?;
            stored.name = breed.name.trim().to_string();
            stored.name_localized = breed.name_localized.clone();
            stored.origin = breed.origin.clone();
            stored.egg_color = breed.egg_color.clone();
            stored.comb_type = breed.comb_type;
            stored.description = breed.description.clone();
            Ok(stored.clone())
        })
    }

    async fn get_breed(&self, id: BreedId) -> RepositoryResult<Breed> {
        self.read(|data| data.breeds.get(&id).cloned().ok_or_else(|| missing("breed", id)))
    }

    async fn list_breeds(&self) -> RepositoryResult<Vec<Breed>> {
        self.read(|data| {
            let mut breeds: Vec<Breed> = data.breeds.values().cloned().collect();
            breeds.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(breeds)
        })
    }

    async fn delete_breed(&self, id: BreedId) -> RepositoryResult<()> {
        self.write(|data| {
            if !data.breeds.contains_key(&id) {
                return Err(missing("breed", id));
            }
            let users = data
                .birds
                .values()
                .filter(|b| b.breed_composition.iter().any(|s| s.breed_id == id))
                .count();
            if users > 0 {
                return Err(RepositoryError::invalid_field(
                    "breedId",
                    format!("breed is used in the composition of {} bird(s)", users),
                ));
            }
            data.breeds.remove(&id);
            Ok(())
        })
    }

    async fn create_coop(&self, coop: &CoopInput) -> RepositoryResult<CoopSummary> {
        self.write(|data| {
            if data.coop_name_taken(&coop.name, None) {
                return Err(RepositoryError::invalid_field("name", "coop name already exists"));
            }
            let stored = Coop {
                id: CoopId(data.next_id()),
                name: coop.name.trim().to_string(),
                capacity: coop.capacity,
                location: coop.location.clone(),
                is_active: coop.is_active,
                notes: coop.notes.clone(),
                created_at: Utc::now(),
            };
            data.coops.insert(stored.id, stored.clone());
            Ok(data.coop_summary(&stored))
        })
    }

    async fn update_coop(&self, id: CoopId, coop: &CoopInput) -> RepositoryResult<CoopSummary> {
        self.write(|data| {
            if !data.coops.contains_key(&id) {
                return Err(missing("coop", id));
            }
            if data.coop_name_taken(&coop.name, Some(id)) {
                return Err(RepositoryError::invalid_field("name", "coop name already exists"));
            }
            let occupancy = data.occupancy(id, None);
            if coop.capacity.is_some_and(|c| (c.max(0) as usize) < occupancy) {
                return Err(RepositoryError::invalid_field(
                    "capacity",
                    format!("coop currently holds {} active bird(s)", occupancy),
                ));
            }
            let stored = data.coops.get_mut(&id).ok_or_else(|| missing("coop", id))?;
            stored.name = coop.name.trim().to_string();
            stored.capacity = coop.capacity;
            stored.location = coop.location.clone();
            stored.is_active = coop.is_active;
            stored.notes = coop.notes.clone();
            let stored = stored.clone();
            Ok(data.coop_summary(&stored))
        })
    }

    async fn get_coop(&self, id: CoopId) -> RepositoryResult<CoopSummary> {
        self.read(|data| {
            let coop = data.coops.get(&id).ok_or_else(|| missing("coop", id))?;
            Ok(data.coop_summary(coop))
        })
    }

    async fn list_coops(&self) -> RepositoryResult<Vec<CoopSummary>> {
        self.read(|data| {
            let mut coops: Vec<CoopSummary> =
                data.coops.values().map(|c| data.coop_summary(c)).collect();
            coops.sort_by(|a, b| a.coop.name.cmp(&b.coop.name));
            Ok(coops)
        })
    }

    async fn delete_coop(&self, id: CoopId) -> RepositoryResult<()> {
        self.write(|data| {
            data.coops.remove(&id).ok_or_else(|| missing("coop", id))?;
            for bird in data.birds.values_mut().filter(|b| b.coop_id == Some(id)) {
                bird.coop_id = None;
            }
            for egg in data.eggs.values_mut().filter(|e| e.coop_id == Some(id)) {
                egg.coop_id = None;
            }
            for record in data.consumption.values_mut().filter(|c| c.coop_id == Some(id)) {
                record.coop_id = None;
            }
            Ok(())
        })
    }
}

#[async_trait]
impl EggRepository for LocalRepository {
    async fn create_egg(&self, egg: &EggInput, actor: &str) -> RepositoryResult<EggRecord> {
        self.write(|data| {
            let stored = EggRecord {
                id: EggId(data.next_id()),
                dam_id: egg.dam_id,
                sire_id: egg.sire_id,
                coop_id: egg.coop_id,
                laid_date: egg.laid_date,
                weight_grams: egg.weight_grams,
                shell_quality: egg.shell_quality,
                shell_color: egg.shell_color.clone(),
                outcome: egg.outcome,
                incubation_start: egg.incubation_start,
                hatch_date: egg.hatch_date,
                notes: egg.notes.clone(),
                created_by: actor.to_string(),
                created_at: Utc::now(),
            };
            data.eggs.insert(stored.id, stored.clone());
            Ok(stored)
        })
    }

    async fn update_egg(&self, id: EggId, egg: &EggInput) -> RepositoryResult<EggRecord> {
        self.write(|data| {
            let stored = data.eggs.get_mut(&id).ok_or_else(|| missing("egg", id))?;
            stored.dam_id = egg.dam_id;
            stored.sire_id = egg.sire_id;
            stored.coop_id = egg.coop_id;
            stored.laid_date = egg.laid_date;
            stored.weight_grams = egg.weight_grams;
            stored.shell_quality = egg.shell_quality;
            stored.shell_color = egg.shell_color.clone();
            stored.outcome = egg.outcome;
            stored.incubation_start = egg.incubation_start;
            stored.hatch_date = egg.hatch_date;
            stored.notes = egg.notes.clone();
            Ok(stored.clone())
        })
    }

    async fn get_egg(&self, id: EggId) -> RepositoryResult<EggRecord> {
        self.read(|data| data.eggs.get(&id).cloned().ok_or_else(|| missing("egg", id)))
    }

    async fn list_eggs(
        &self,
        filter: &EggFilter,
        params: ListParams,
    ) -> RepositoryResult<Page<EggRecord>> {
        self.read(|data| {
            let mut eggs: Vec<EggRecord> = data
                .eggs
                .values()
                .filter(|e| filter.matches(e))
                .cloned()
                .collect();
            eggs.sort_by(|a, b| (b.laid_date, b.id).cmp(&(a.laid_date, a.id)));
            Ok(params.paginate(eggs))
        })
    }

    async fn delete_egg(&self, id: EggId) -> RepositoryResult<()> {
        self.write(|data| data.eggs.remove(&id).map(|_| ()).ok_or_else(|| missing("egg", id)))
    }
}

#[async_trait]
impl FeedRepository for LocalRepository {
    async fn create_inventory(&self, item: &FeedInventoryInput) -> RepositoryResult<FeedInventory> {
        self.write(|data| {
            let stored = FeedInventory {
                id: FeedInventoryId(data.next_id()),
                feed_type: item.feed_type,
                brand: item.brand.clone(),
                quantity_kg: item.quantity_kg,
                unit_cost: item.unit_cost,
                purchase_date: item.purchase_date,
                expiry_date: item.expiry_date,
                notes: item.notes.clone(),
                created_at: Utc::now(),
            };
            data.inventory.insert(stored.id, stored.clone());
            Ok(stored)
        })
    }

    async fn update_inventory(
        &self,
        id: FeedInventoryId,
        item: &FeedInventoryInput,
    ) -> RepositoryResult<FeedInventory> {
        self.write(|data| {
            let stored = data
                .inventory
                .get_mut(&id)
                .ok_or_else(|| missing("feed inventory", id))?;
            stored.feed_type = item.feed_type;
            stored.brand = item.brand.clone();
            stored.quantity_kg = item.quantity_kg;
            stored.unit_cost = item.unit_cost;
            stored.purchase_date = item.purchase_date;
            stored.expiry_date = item.expiry_date;
            stored.notes = item.notes.clone();
            Ok(stored.clone())
        })
    }

    async fn get_inventory(&self, id: FeedInventoryId) -> RepositoryResult<FeedInventory> {
        self.read(|data| {
            data.inventory
                .get(&id)
                .cloned()
                .ok_or_else(|| missing("feed inventory", id))
        })
    }

    async fn list_inventory(&self, params: ListParams) -> RepositoryResult<Page<FeedInventory>> {
        self.read(|data| {
            let mut items: Vec<FeedInventory> = data.inventory.values().cloned().collect();
            items.sort_by(|a, b| (b.purchase_date, b.id).cmp(&(a.purchase_date, a.id)));
            Ok(params.paginate(items))
        })
    }

    async fn delete_inventory(&self, id: FeedInventoryId) -> RepositoryResult<()> {
        self.write(|data| {
            if !data.inventory.contains_key(&id) {
                return Err(missing("feed inventory", id));
            }
            if data.consumption.values().any(|c| c.inventory_id == id) {
                return Err(RepositoryError::invalid_field(
                    "inventoryId",
                    "inventory lot still has consumption records",
                ));
            }
            data.inventory.remove(&id);
            Ok(())
        })
    }

    async fn record_consumption(
        &self,
        record: &FeedConsumptionInput,
        actor: &str,
    ) -> RepositoryResult<FeedConsumption> {
        self.write(|data| {
            if let Some(coop_id) = record.coop_id {
                if !data.coops.contains_key(&coop_id) {
                    return Err(RepositoryError::invalid_field(
                        "coopId",
                        format!("coop {} does not exist", coop_id),
                    ));
                }
            }
            let id = FeedConsumptionId(data.next_id());
            let lot = data.inventory.get_mut(&record.inventory_id).ok_or_else(|| {
                RepositoryError::invalid_field(
                    "inventoryId",
                    format!("feed inventory {} does not exist", record.inventory_id),
                )
            })?;
            if record.quantity_kg > lot.quantity_kg {
                return Err(RepositoryError::invalid_field(
                    "quantityKg",
                    format!("only {} kg remaining in this lot", lot.quantity_kg),
                ));
            }
            lot.quantity_kg -= record.quantity_kg;

            let stored = FeedConsumption {
                id,
                inventory_id: record.inventory_id,
                coop_id: record.coop_id,
                quantity_kg: record.quantity_kg,
                consumed_on: record.consumed_on,
                notes: record.notes.clone(),
                created_by: actor.to_string(),
                created_at: Utc::now(),
            };
            data.consumption.insert(stored.id, stored.clone());
            Ok(stored)
        })
    }

    async fn list_consumption(
        &self,
        filter: &ConsumptionFilter,
        params: ListParams,
    ) -> RepositoryResult<Page<FeedConsumption>> {
        self.read(|data| {
            let mut records: Vec<FeedConsumption> = data
                .consumption
                .values()
                .filter(|c| filter.matches(c))
                .cloned()
                .collect();
            records.sort_by(|a, b| (b.consumed_on, b.id).cmp(&(a.consumed_on, a.id)));
            Ok(params.paginate(records))
        })
    }

    async fn delete_consumption(&self, id: FeedConsumptionId) -> RepositoryResult<()> {
        self.write(|data| {
            let record = data
                .consumption
                .remove(&id)
                .ok_or_else(|| missing("feed consumption", id))?;
            if let Some(lot) = data.inventory.get_mut(&record.inventory_id) {
                lot.quantity_kg += record.quantity_kg;
            }
            Ok(())
        })
    }
}

#[async_trait]
impl HealthRepository for LocalRepository {
    async fn create_incident(
        &self,
        incident: &IncidentInput,
        actor: &str,
    ) -> RepositoryResult<HealthIncident> {
        self.write(|data| {
            let stored = HealthIncident {
                id: IncidentId(data.next_id()),
                bird_id: incident.bird_id,
                incident_date: incident.incident_date,
                category: incident.category,
                severity: incident.severity,
                description: incident.description.trim().to_string(),
                treatment: incident.treatment.clone(),
                resolved: incident.resolved,
                resolved_date: incident.resolved_date,
                created_by: actor.to_string(),
                created_at: Utc::now(),
            };
            data.incidents.insert(stored.id, stored.clone());
            Ok(stored)
        })
    }

    async fn update_incident(
        &self,
        id: IncidentId,
        incident: &IncidentInput,
    ) -> RepositoryResult<HealthIncident> {
        self.write(|data| {
            let stored = data
                .incidents
                .get_mut(&id)
                .ok_or_else(|| missing("health incident", id))?;
            stored.bird_id = incident.bird_id;
            stored.incident_date = incident.incident_date;
            stored.category = incident.category;
            stored.severity = incident.severity;
            stored.description = incident.description.trim().to_string();
            stored.treatment = incident.treatment.clone();
            stored.resolved = incident.resolved;
            stored.resolved_date = incident.resolved_date;
            Ok(stored.clone())
        })
    }

    async fn get_incident(&self, id: IncidentId) -> RepositoryResult<HealthIncident> {
        self.read(|data| {
            data.incidents
                .get(&id)
                .cloned()
                .ok_or_else(|| missing("health incident", id))
        })
    }

    async fn list_incidents(
        &self,
        bird_id: Option<BirdId>,
        params: ListParams,
    ) -> RepositoryResult<Page<HealthIncident>> {
        self.read(|data| {
            let mut incidents: Vec<HealthIncident> = data
                .incidents
                .values()
                .filter(|i| bird_id.map_or(true, |id| i.bird_id == id))
                .cloned()
                .collect();
            incidents.sort_by(|a, b| (b.incident_date, b.id).cmp(&(a.incident_date, a.id)));
            Ok(params.paginate(incidents))
        })
    }

    async fn delete_incident(&self, id: IncidentId) -> RepositoryResult<()> {
        self.write(|data| {
            data.incidents
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| missing("health incident", id))
        })
    }

    async fn create_vaccination(
        &self,
        vaccination: &VaccinationInput,
    ) -> RepositoryResult<Vaccination> {
        self.write(|data| {
            let stored = Vaccination {
                id: VaccinationId(data.next_id()),
                bird_id: vaccination.bird_id,
                vaccine_name: vaccination.vaccine_name.trim().to_string(),
                administered_on: vaccination.administered_on,
                next_due_on: vaccination.next_due_on,
                dose: vaccination.dose.clone(),
                administered_by: vaccination.administered_by.clone(),
                notes: vaccination.notes.clone(),
                created_at: Utc::now(),
            };
            data.vaccinations.insert(stored.id, stored.clone());
            Ok(stored)
        })
    }

    async fn list_vaccinations(
        &self,
        bird_id: Option<BirdId>,
        params: ListParams,
    ) -> RepositoryResult<Page<Vaccination>> {
        self.read(|data| {
            let mut vaccinations: Vec<Vaccination> = data
                .vaccinations
                .values()
                .filter(|v| bird_id.map_or(true, |id| v.bird_id == id))
                .cloned()
                .collect();
            vaccinations.sort_by(|a, b| (b.administered_on, b.id).cmp(&(a.administered_on, a.id)));
            Ok(params.paginate(vaccinations))
        })
    }

    async fn delete_vaccination(&self, id: VaccinationId) -> RepositoryResult<()> {
        self.write(|data| {
            data.vaccinations
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| missing("vaccination", id))
        })
    }

    async fn create_medication(
        &self,
        medication: &MedicationInput,
    ) -> RepositoryResult<Medication> {
        self.write(|data| {
            let stored = Medication {
                id: MedicationId(data.next_id()),
                bird_id: medication.bird_id,
                medication_name: medication.medication_name.trim().to_string(),
                dosage: medication.dosage.clone(),
                start_date: medication.start_date,
                end_date: medication.end_date,
                withdrawal_days: medication.withdrawal_days,
                notes: medication.notes.clone(),
                created_at: Utc::now(),
            };
            data.medications.insert(stored.id, stored.clone());
            Ok(stored)
        })
    }

    async fn list_medications(
        &self,
        bird_id: Option<BirdId>,
        params: ListParams,
    ) -> RepositoryResult<Page<Medication>> {
        self.read(|data| {
            let mut medications: Vec<Medication> = data
                .medications
                .values()
                .filter(|m| bird_id.map_or(true, |id| m.bird_id == id))
                .cloned()
                .collect();
            medications.sort_by(|a, b| (b.start_date, b.id).cmp(&(a.start_date, a.id)));
            Ok(params.paginate(medications))
        })
    }

    async fn delete_medication(&self, id: MedicationId) -> RepositoryResult<()> {
        self.write(|data| {
            data.medications
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| missing("medication", id))
        })
    }
}

#[async_trait]
impl RelationResolver for LocalRepository {
    async fn resolve_relation(
        &self,
        kind: RelationKind,
        names: &[String],
    ) -> RepositoryResult<Vec<i64>> {
        self.read(|data| {
            let ids = match kind {
                RelationKind::Coop => data
                    .coops
                    .values()
                    .filter(|c| names.contains(&c.name))
                    .map(|c| c.id.value())
                    .collect(),
                RelationKind::Bird => data
                    .birds
                    .values()
                    .filter(|b| names.contains(&b.name))
                    .map(|b| b.id.value())
                    .collect(),
            };
            Ok(ids)
        })
    }
}

#[async_trait]
impl ReportRepository for LocalRepository {
    async fn run_report(&self, query: &ResolvedQuery) -> RepositoryResult<ReportPage> {
        self.read(|data| {
            let page = match query.report_type {
                ReportType::Birds => {
                    let today = Utc::now().date_naive();
                    let rows: Vec<BirdRow> =
                        data.birds.values().map(|b| data.bird_row(b, today)).collect();
                    engine::execute(rows, query)
                }
                ReportType::Eggs => {
                    let rows: Vec<EggRow> = data
                        .eggs
                        .values()
                        .map(|egg| EggRow {
                            egg: egg.clone(),
                            dam_name: data.bird_name(egg.dam_id),
                            sire_name: data.bird_name(egg.sire_id),
                            coop_name: data.coop_name(egg.coop_id),
                        })
                        .collect();
                    engine::execute(rows, query)
                }
                ReportType::Health => {
                    let rows: Vec<IncidentRow> = data
                        .incidents
                        .values()
                        .map(|incident| {
                            let bird = data.birds.get(&incident.bird_id);
                            let coop_id = bird.and_then(|b| b.coop_id);
                            IncidentRow {
                                incident: incident.clone(),
                                bird_name: bird.map(|b| b.name.clone()),
                                coop_id,
                                coop_name: data.coop_name(coop_id),
                            }
                        })
                        .collect();
                    engine::execute(rows, query)
                }
            };
            Ok(page)
        })
    }
}

#[async_trait]
impl PresetRepository for LocalRepository {
    async fn create_preset(
        &self,
        owner_id: &str,
        preset: &PresetInput,
    ) -> RepositoryResult<ReportPreset> {
        self.write(|data| {
            let now = Utc::now();
            let stored = ReportPreset {
                id: PresetId(data.next_id()),
                owner_id: owner_id.to_string(),
                name: preset.name.trim().to_string(),
                description: preset.description.clone(),
                report_type: preset.report_type,
                config: preset.config.clone(),
                is_default: preset.is_default,
                created_at: now,
                updated_at: now,
            };
            if stored.is_default {
                data.clear_default_presets(owner_id, stored.report_type, stored.id);
            }
            data.presets.insert(stored.id, stored.clone());
            Ok(stored)
        })
    }

    async fn update_preset(
        &self,
        id: PresetId,
        preset: &PresetInput,
    ) -> RepositoryResult<ReportPreset> {
        self.write(|data| {
            let stored = data.presets.get_mut(&id).ok_or_else(|| missing("preset", id))?;
            stored.name = preset.name.trim().to_string();
            stored.description = preset.description.clone();
            stored.report_type = preset.report_type;
            stored.config = preset.config.clone();
            stored.is_default = preset.is_default;
            stored.updated_at = Utc::now();
            let stored = stored.clone();
            if stored.is_default {
                data.clear_default_presets(&stored.owner_id, stored.report_type, stored.id);
            }
            Ok(stored)
        })
    }

    async fn get_preset(&self, id: PresetId) -> RepositoryResult<ReportPreset> {
        self.read(|data| data.presets.get(&id).cloned().ok_or_else(|| missing("preset", id)))
    }

    async fn list_presets(
        &self,
        owner_id: &str,
        report_type: Option<ReportType>,
    ) -> RepositoryResult<Vec<ReportPreset>> {
        self.read(|data| {
            let mut presets: Vec<ReportPreset> = data
                .presets
                .values()
                .filter(|p| {
                    p.owner_id == owner_id && report_type.map_or(true, |t| p.report_type == t)
                })

                .cloned()
                .collect();
            presets.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            Ok(presets)
        })
    }

    async fn delete_preset(&self, id: PresetId) -> RepositoryResult<()> {
        self.write(|data| data.presets.remove(&id).map(|_| ()).ok_or_else(|| missing("preset", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bird_write(name: &str) -> BirdRecordWrite {
        BirdRecordWrite {
            name: name.to_string(),
            sex: Sex::Female,
            status: BirdStatus::Active,
            hatch_date: None,
            sire_id: None,
            dam_id: None,
            coop_id: None,
            breed_composition: vec![],
            comb_type: None,
            color: None,
            identifiers: vec![],
            notes: None,
            actor: "tester".into(),
        }
    }

    #[tokio::test]
    async fn test_health_toggle() {
        let repo = LocalRepository::new();
        assert!(repo.health_check().await.unwrap());
        repo.set_healthy(false);
        assert!(!repo.health_check().await.unwrap());
        assert!(repo.list_breeds().await.is_err());
    }

    #[tokio::test]
    async fn test_ids_are_assigned_sequentially() {
        let repo = LocalRepository::new();
        let a = repo.create_bird(&bird_write("A")).await.unwrap();
        let b = repo.create_bird(&bird_write("B")).await.unwrap();
        assert!(b.id > a.id);
        assert_eq!(repo.bird_count(), 2);
        repo.clear();
        assert_eq!(repo.bird_count(), 0);
    }

    #[tokio::test]
    async fn test_weights_newest_first() {
        let repo = LocalRepository::new();
        let bird = repo.create_bird(&bird_write("A")).await.unwrap();
        for day in [1, 15, 8] {
            repo.add_weight(
                bird.id,
                &WeightInput {
                    recorded_on: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
                    weight_grams: 1200.0 + day as f64,
                    notes: None,
                },
            )
            .await
            .unwrap();
        }
        let weights = repo.list_weights(bird.id).await.unwrap();
        let days: Vec<_> = weights.iter().map(|w| w.recorded_on.format("%d").to_string()).collect();
        assert_eq!(days, vec!["15", "08", "01"]);
    }

    #[tokio::test]
    async fn test_relation_resolution_by_name() {
        let repo = LocalRepository::new();
        let coop = repo
            .create_coop(&CoopInput {
                name: "North".into(),
                capacity: None,
                location: None,
                is_active: true,
                notes: None,
            })
            .await
            .unwrap();
        let ids = repo
            .resolve_relation(RelationKind::Coop, &["North".to_string(), "South".to_string()])
            .await
            .unwrap();
        assert_eq!(ids, vec![coop.coop.id.value()]);
    }
}
