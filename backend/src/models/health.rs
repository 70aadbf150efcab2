//! Health incidents, vaccinations and medications.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{
    not_before, optional_name, require_name, Validate, ValidationError, ValidationResult,
};
use crate::api::{BirdId, IncidentId, MedicationId, VaccinationId};
use crate::define_string_enum;

define_string_enum!(IncidentCategory {
    Illness => "illness",
    Injury => "injury",
    Parasite => "parasite",
    Respiratory => "respiratory",
    Digestive => "digestive",
    Other => "other",
});

define_string_enum!(Severity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthIncident {
    pub id: IncidentId,
    pub bird_id: BirdId,
    pub incident_date: NaiveDate,
    pub category: IncidentCategory,
    pub severity: Severity,
    pub description: String,
    pub treatment: Option<String>,
    pub resolved: bool,
    pub resolved_date: Option<NaiveDate>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentInput {
    pub bird_id: BirdId,
    pub incident_date: NaiveDate,
    pub category: IncidentCategory,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub treatment: Option<String>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolved_date: Option<NaiveDate>,
}

impl Validate for IncidentInput {
    fn validate(&self) -> ValidationResult {
        if self.description.trim().is_empty() {
            return Err(ValidationError::new("description", "must not be empty"));
        }
        if self.resolved_date.is_some() && !self.resolved {
            return Err(ValidationError::new(
                "resolvedDate",
                "requires the incident to be resolved",
            ));
        }
        not_before(
            "resolvedDate",
            self.resolved_date,
            Some(self.incident_date),
            "incidentDate",
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vaccination {
    pub id: VaccinationId,
    pub bird_id: BirdId,
    pub vaccine_name: String,
    pub administered_on: NaiveDate,
    pub next_due_on: Option<NaiveDate>,
    pub dose: Option<String>,
    pub administered_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccinationInput {
    pub bird_id: BirdId,
    pub vaccine_name: String,
    pub administered_on: NaiveDate,
    #[serde(default)]
    pub next_due_on: Option<NaiveDate>,
    #[serde(default)]
    pub dose: Option<String>,
    #[serde(default)]
    pub administered_by: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for VaccinationInput {
    fn validate(&self) -> ValidationResult {
        require_name("vaccineName", &self.vaccine_name)?;
        not_before(
            "nextDueOn",
            self.next_due_on,
            Some(self.administered_on),
            "administeredOn",
        )?;
        optional_name("administeredBy", self.administered_by.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: MedicationId,
    pub bird_id: BirdId,
    pub medication_name: String,
    pub dosage: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub withdrawal_days: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Medication {
    /// Last day on which eggs or meat must not be used.
    pub fn withdrawal_ends_on(&self) -> Option<NaiveDate> {
        let days = u64::try_from(self.withdrawal_days?).ok()?;
        self.end_date
            .unwrap_or(self.start_date)
            .checked_add_days(Days::new(days))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationView {
    #[serde(flatten)]
    pub medication: Medication,
    pub withdrawal_ends_on: Option<NaiveDate>,
}

impl From<Medication> for MedicationView {
    fn from(medication: Medication) -> Self {
        let withdrawal_ends_on = medication.withdrawal_ends_on();
        Self {
            medication,
            withdrawal_ends_on,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationInput {
    pub bird_id: BirdId,
    pub medication_name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub withdrawal_days: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for MedicationInput {
    fn validate(&self) -> ValidationResult {
        require_name("medicationName", &self.medication_name)?;
        not_before("endDate", self.end_date, Some(self.start_date), "startDate")?;
        if self.withdrawal_days.is_some_and(|d| d < 0) {
            return Err(ValidationError::new("withdrawalDays", "must not be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_resolved_date_requires_resolution() {
        let input = IncidentInput {
            bird_id: BirdId(1),
            incident_date: date(2024, 2, 1),
            category: IncidentCategory::Respiratory,
            severity: Severity::Medium,
            description: "sneezing".into(),
            treatment: None,
            resolved: false,
            resolved_date: Some(date(2024, 2, 5)),
        };
        assert_eq!(input.validate().unwrap_err().field, "resolvedDate");
    }

    #[test]
    fn test_withdrawal_end_from_end_date() {
        let med = Medication {
            id: MedicationId(1),
            bird_id: BirdId(1),
            medication_name: "Tylosin".into(),
            dosage: None,
            start_date: date(2024, 3, 1),
            end_date: Some(date(2024, 3, 5)),
            withdrawal_days: Some(7),
            notes: None,
            created_at: Utc::now(),
        };
        assert_eq!(med.withdrawal_ends_on(), Some(date(2024, 3, 12)));
        let open_ended = Medication {
            end_date: None,
            ..med.clone()
        };
        assert_eq!(open_ended.withdrawal_ends_on(), Some(date(2024, 3, 8)));
        let none = Medication {
            withdrawal_days: None,
            ..med
        };
        assert_eq!(none.withdrawal_ends_on(), None);
    }

    #[test]
    fn test_vaccination_next_due_after_administration() {
        let input = VaccinationInput {
            bird_id: BirdId(1),
            vaccine_name: "Newcastle".into(),
            administered_on: date(2024, 1, 10),
            next_due_on: Some(date(2024, 1, 1)),
            dose: None,
            administered_by: None,
            notes: None,
        };
        assert_eq!(input.validate().unwrap_err().field, "nextDueOn");
    }
}
