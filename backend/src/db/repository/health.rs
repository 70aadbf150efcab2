//! Health incidents, vaccinations and medications.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{BirdId, IncidentId, MedicationId, VaccinationId};
use crate::models::{
    HealthIncident, IncidentInput, ListParams, Medication, MedicationInput, Page, Vaccination,
    VaccinationInput,
};

/// Repository trait for health records. Lists are newest first and can be
/// narrowed to one bird.
#[async_trait]
pub trait HealthRepository: Send + Sync {
    async fn create_incident(
        &self,
        incident: &IncidentInput,
        actor: &str,
    ) -> RepositoryResult<HealthIncident>;

    async fn update_incident(
        &self,
        id: IncidentId,
        incident: &IncidentInput,
    ) -> RepositoryResult<HealthIncident>;

    async fn get_incident(&self, id: IncidentId) -> RepositoryResult<HealthIncident>;

    async fn list_incidents(
        &self,
        bird_id: Option<BirdId>,
        params: ListParams,
    ) -> RepositoryResult<Page<HealthIncident>>;

    async fn delete_incident(&self, id: IncidentId) -> RepositoryResult<()>;

    async fn create_vaccination(
        &self,
        vaccination: &VaccinationInput,
    ) -> RepositoryResult<Vaccination>;

    async fn list_vaccinations(
        &self,
        bird_id: Option<BirdId>,
        params: ListParams,
    ) -> RepositoryResult<Page<Vaccination>>;

    async fn delete_vaccination(&self, id: VaccinationId) -> RepositoryResult<()>;

    async fn create_medication(&self, medication: &MedicationInput) -> RepositoryResult<Medication>;

    async fn list_medications(
        &self,
        bird_id: Option<BirdId>,
        params: ListParams,
    ) -> RepositoryResult<Page<Medication>>;

    async fn delete_medication(&self, id: MedicationId) -> RepositoryResult<()>;
}
