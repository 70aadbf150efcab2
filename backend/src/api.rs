//! Public API surface for the backend.
//!
//! This file consolidates the identifier types and re-exports the domain
//! and report types used by the HTTP layer and by integration tests.
//! All types derive Serialize/Deserialize for JSON serialization.

use crate::define_id_type;

pub use crate::models::{
    Bird, BirdFilter, BirdIdentifier, BirdInput, BirdStatus, BirdSummary, Breed, BreedInput,
    BreedShare, CombType, ConsumptionFilter, Coop, CoopInput, CoopSummary, EggFilter, EggInput,
    EggOutcome, EggRecord, EggView, FeedConsumption, FeedConsumptionInput, FeedInventory,
    FeedInventoryInput, FeedType, HealthIncident, IdentifierKind, IncidentCategory,
    IncidentInput, ListParams, Medication, MedicationInput, MedicationView, Page, PresetConfig,
    PresetInput, ReportPreset, Role, Severity, Sex, ShellQuality, Vaccination, VaccinationInput,
    WeightInput, WeightRecord,
};
pub use crate::reports::{
    CellValue, ColumnType, ReportColumn, ReportError, ReportPage, ReportQuery, ReportRow,
    ReportType, SortDirection, SummaryGroup,
};

define_id_type!(i64, BirdId);
define_id_type!(i64, BreedId);
define_id_type!(i64, CoopId);
define_id_type!(i64, EggId);
define_id_type!(i64, WeightId);
define_id_type!(i64, FeedInventoryId);
define_id_type!(i64, FeedConsumptionId);
define_id_type!(i64, IncidentId);
define_id_type!(i64, VaccinationId);
define_id_type!(i64, MedicationId);
define_id_type!(i64, PresetId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct_types_with_shared_behaviour() {
        let bird = BirdId::new(3);
        let breed = BreedId::new(3);
        assert_eq!(bird.value(), breed.value());
        assert_eq!(format!("{}-{}", bird, breed), "3-3");
    }

    #[test]
    fn test_id_ordering() {
        let mut ids = vec![EggId(5), EggId(1), EggId(3)];
        ids.sort();
        assert_eq!(ids, vec![EggId(1), EggId(3), EggId(5)]);
    }
}
