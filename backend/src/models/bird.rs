//! Birds, their identifiers and weight history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::breed_composition::{is_complete_composition, total_percentage, BreedShare};
use super::validation::{
    optional_name, require_name, require_positive, Validate, ValidationError, ValidationResult,
};
use crate::api::{BirdId, CoopId, WeightId};
use crate::define_string_enum;

define_string_enum!(Sex {
    Male => "male",
    Female => "female",
    Unknown => "unknown",
});

define_string_enum!(BirdStatus {
    Active => "active",
    Sold => "sold",
    Deceased => "deceased",
    Culled => "culled",
});

define_string_enum!(CombType {
    Single => "single",
    Rose => "rose",
    Pea => "pea",
    Walnut => "walnut",
    Buttercup => "buttercup",
    Strawberry => "strawberry",
    VShaped => "v_shaped",
});

define_string_enum!(IdentifierKind {
    LegBand => "leg_band",
    WingBand => "wing_band",
    Microchip => "microchip",
    Other => "other",
});

impl Default for BirdStatus {
    fn default() -> Self {
        BirdStatus::Active
    }
}

impl Default for Sex {
    fn default() -> Self {
        Sex::Unknown
    }
}

/// Physical identifier attached to a bird (band, chip...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirdIdentifier {
    pub kind: IdentifierKind,
    pub value: String,
}

/// Stored bird.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bird {
    pub id: BirdId,
    pub name: String,
    pub sex: Sex,
    pub status: BirdStatus,
    pub hatch_date: Option<NaiveDate>,
    pub sire_id: Option<BirdId>,
    pub dam_id: Option<BirdId>,
    pub coop_id: Option<CoopId>,
    pub breed_composition: Vec<BreedShare>,
    pub comb_type: Option<CombType>,
    pub color: Option<String>,
    pub identifiers: Vec<BirdIdentifier>,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bird {
    /// Value of the first identifier of the given kind.
    pub fn identifier(&self, kind: IdentifierKind) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|i| i.kind == kind)
            .map(|i| i.value.as_str())
    }

    /// Age in whole weeks on `today`, when the hatch date is known.
    pub fn age_weeks(&self, today: NaiveDate) -> Option<i64> {
        self.hatch_date
            .map(|hatched| (today - hatched).num_days().max(0) / 7)
    }

    pub fn is_active(&self) -> bool {
        self.status == BirdStatus::Active
    }
}

/// Bird as returned by the API, with composition diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirdSummary {
    #[serde(flatten)]
    pub bird: Bird,
    pub composition_total: f64,
    pub composition_complete: bool,
}

impl From<Bird> for BirdSummary {
    fn from(bird: Bird) -> Self {
        let composition_total = total_percentage(&bird.breed_composition);
        let composition_complete = is_complete_composition(&bird.breed_composition);
        Self {
            bird,
            composition_total,
            composition_complete,
        }
    }
}

/// Create/replace payload for a bird.
///
/// `breed_composition: None` lets the service derive the composition from
/// the parents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirdInput {
    pub name: String,
    #[serde(default)]
    pub sex: Sex,
    #[serde(default)]
    pub status: BirdStatus,
    #[serde(default)]
    pub hatch_date: Option<NaiveDate>,
    #[serde(default)]
    pub sire_id: Option<BirdId>,
    #[serde(default)]
    pub dam_id: Option<BirdId>,
    #[serde(default)]
    pub coop_id: Option<CoopId>,
    #[serde(default)]
    pub breed_composition: Option<Vec<BreedShare>>,
    #[serde(default)]
    pub comb_type: Option<CombType>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub identifiers: Vec<BirdIdentifier>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for BirdInput {
    fn validate(&self) -> ValidationResult {
        require_name("name", &self.name)?;
        if let (Some(sire), Some(dam)) = (self.sire_id, self.dam_id) {
            if sire == dam {
                return Err(ValidationError::new(
                    "damId",
                    "sire and dam must be different birds",
                ));
            }
        }
        if let Some(shares) = &self.breed_composition {
            for (idx, share) in shares.iter().enumerate() {
                if !share.percentage.is_finite() || !(0.0..=100.0).contains(&share.percentage) {
                    return Err(ValidationError::new(
                        format!("breedComposition[{}].percentage", idx),
                        "must be between 0 and 100",
                    ));
                }
                if shares[..idx].iter().any(|s| s.breed_id == share.breed_id) {
                    return Err(ValidationError::new(
                        format!("breedComposition[{}].breedId", idx),
                        "breed listed more than once",
                    ));
                }
            }
        }
        optional_name("color", self.color.as_deref())?;
        for (idx, identifier) in self.identifiers.iter().enumerate() {
            if identifier.value.trim().is_empty() {
                return Err(ValidationError::new(
                    format!("identifiers[{}].value", idx),
                    "must not be empty",
                ));
            }
            if self.identifiers[..idx]
                .iter()
                .any(|other| other.kind == identifier.kind)
            {
                return Err(ValidationError::new(
                    format!("identifiers[{}].kind", idx),
                    format!("only one {} identifier is allowed", identifier.kind),
                ));
            }
        }
        Ok(())
    }
}

/// Fully resolved bird write, produced by the service layer.
#[derive(Debug, Clone, PartialEq)]
pub struct BirdRecordWrite {
    pub name: String,
    pub sex: Sex,
    pub status: BirdStatus,
    pub hatch_date: Option<NaiveDate>,
    pub sire_id: Option<BirdId>,
    pub dam_id: Option<BirdId>,
    pub coop_id: Option<CoopId>,
    pub breed_composition: Vec<BreedShare>,
    pub comb_type: Option<CombType>,
    pub color: Option<String>,
    pub identifiers: Vec<BirdIdentifier>,
    pub notes: Option<String>,
    pub actor: String,
}

impl BirdRecordWrite {
    pub fn from_input(input: BirdInput, breed_composition: Vec<BreedShare>, actor: &str) -> Self {
        Self {
            name: input.name.trim().to_string(),
            sex: input.sex,
            status: input.status,
            hatch_date: input.hatch_date,
            sire_id: input.sire_id,
            dam_id: input.dam_id,
            coop_id: input.coop_id,
            breed_composition,
            comb_type: input.comb_type,
            color: input.color,
            identifiers: input
                .identifiers
                .into_iter()
                .map(|i| BirdIdentifier {
                    kind: i.kind,
                    value: i.value.trim().to_string(),
                })
                .collect(),
            notes: input.notes,
            actor: actor.to_string(),
        }
    }
}

/// Filters for the bird listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirdFilter {
    #[serde(default)]
    pub status: Option<BirdStatus>,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub coop_id: Option<CoopId>,
    /// Case-insensitive substring of the name or of any identifier value.
    #[serde(default)]
    pub search: Option<String>,
}

impl BirdFilter {
    pub fn matches(&self, bird: &Bird) -> bool {
        if self.status.is_some_and(|s| s != bird.status) {
            return false;
        }
        if self.sex.is_some_and(|s| s != bird.sex) {
            return false;
        }
        if self.coop_id.is_some() && self.coop_id != bird.coop_id {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                bird.name.to_lowercase().contains(&term)
                    || bird
                        .identifiers
                        .iter()
                        .any(|i| i.value.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }
}

/// Body weight measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightRecord {
    pub id: WeightId,
    pub bird_id: BirdId,
    pub recorded_on: NaiveDate,
    pub weight_grams: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightInput {
    pub recorded_on: NaiveDate,
    pub weight_grams: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for WeightInput {
    fn validate(&self) -> ValidationResult {
        require_positive("weightGrams", self.weight_grams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BreedId;

    fn input(name: &str) -> BirdInput {
        BirdInput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_bird_input_requires_name() {
        let err = input(" ").validate().unwrap_err();
        assert_eq!(err.field, "name");
    }

    #[test]
    fn test_bird_input_rejects_same_parents() {
        let mut bird = input("Rocky");
        bird.sire_id = Some(BirdId(4));
        bird.dam_id = Some(BirdId(4));
        assert_eq!(bird.validate().unwrap_err().field, "damId");
    }

    #[test]
    fn test_bird_input_rejects_out_of_range_share() {
        let mut bird = input("Rocky");
        bird.breed_composition = Some(vec![
            BreedShare::new(BreedId(1), 60.0),
            BreedShare::new(BreedId(2), 140.0),
        ]);
        let err = bird.validate().unwrap_err();
        assert_eq!(err.field, "breedComposition[1].percentage");
    }

    #[test]
    fn test_bird_input_allows_partial_composition() {
        let mut bird = input("Rocky");
        bird.breed_composition = Some(vec![BreedShare::new(BreedId(1), 40.0)]);
        assert!(bird.validate().is_ok());
    }

    #[test]
    fn test_bird_input_rejects_duplicate_identifier_kind() {
        let mut bird = input("Rocky");
        bird.identifiers = vec![
            BirdIdentifier {
                kind: IdentifierKind::LegBand,
                value: "A1".into(),
            },
            BirdIdentifier {
                kind: IdentifierKind::LegBand,
                value: "A2".into(),
            },
        ];
        assert_eq!(bird.validate().unwrap_err().field, "identifiers[1].kind");
    }

    #[test]
    fn test_age_weeks() {
        let now = Utc::now();
        let bird = Bird {
            id: BirdId(1),
            name: "Hen".into(),
            sex: Sex::Female,
            status: BirdStatus::Active,
            hatch_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            sire_id: None,
            dam_id: None,
            coop_id: None,
            breed_composition: vec![],
            comb_type: None,
            color: None,
            identifiers: vec![],
            notes: None,
            created_by: "u1".into(),
            created_at: now,
            updated_at: now,
        };
        let today = NaiveDate::from_ymd_opt(2024, 1, 22).unwrap();
        assert_eq!(bird.age_weeks(today), Some(3));
    }

    #[test]
    fn test_filter_search_matches_identifier() {
        let now = Utc::now();
        let bird = Bird {
            id: BirdId(1),
            name: "Hen".into(),
            sex: Sex::Female,
            status: BirdStatus::Active,
            hatch_date: None,
            sire_id: None,
            dam_id: None,
            coop_id: None,
            breed_composition: vec![],
            comb_type: None,
            color: None,
            identifiers: vec![BirdIdentifier {
                kind: IdentifierKind::LegBand,
                value: "TH-0042".into(),
            }],
            notes: None,
            created_by: "u1".into(),
            created_at: now,
            updated_at: now,
        };
        let filter = BirdFilter {
            search: Some("th-00".into()),
            ..Default::default()
        };
        assert!(filter.matches(&bird));
        let filter = BirdFilter {
            sex: Some(Sex::Male),
            ..Default::default()
        };
        assert!(!filter.matches(&bird));
    }
}
