//! Egg laying and incubation records.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{
    not_before, optional_name, optional_positive, Validate, ValidationError, ValidationResult,
};
use crate::api::{BirdId, CoopId, EggId};
use crate::define_string_enum;

/// Chicken eggs hatch 21 days after incubation starts.
pub const INCUBATION_DAYS: u64 = 21;

define_string_enum!(ShellQuality {
    Excellent => "excellent",
    Good => "good",
    Thin => "thin",
    Rough => "rough",
    Cracked => "cracked",
});

define_string_enum!(EggOutcome {
    Pending => "pending",
    Incubating => "incubating",
    Hatched => "hatched",
    Infertile => "infertile",
    EarlyDeath => "early_death",
    LateDeath => "late_death",
    Broken => "broken",
    Consumed => "consumed",
    Sold => "sold",
});

impl Default for EggOutcome {
    fn default() -> Self {
        EggOutcome::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EggRecord {
    pub id: EggId,
    pub dam_id: Option<BirdId>,
    pub sire_id: Option<BirdId>,
    pub coop_id: Option<CoopId>,
    pub laid_date: NaiveDate,
    pub weight_grams: Option<f64>,
    pub shell_quality: Option<ShellQuality>,
    pub shell_color: Option<String>,
    pub outcome: EggOutcome,
    pub incubation_start: Option<NaiveDate>,
    pub hatch_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl EggRecord {
    pub fn expected_hatch_date(&self) -> Option<NaiveDate> {
        expected_hatch_date(self.incubation_start)
    }
}

pub fn expected_hatch_date(incubation_start: Option<NaiveDate>) -> Option<NaiveDate> {
    incubation_start.and_then(|start| start.checked_add_days(Days::new(INCUBATION_DAYS)))
}

/// Egg record as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EggView {
    #[serde(flatten)]
    pub egg: EggRecord,
    pub expected_hatch_date: Option<NaiveDate>,
}

impl From<EggRecord> for EggView {
    fn from(egg: EggRecord) -> Self {
        let expected_hatch_date = egg.expected_hatch_date();
        Self {
            egg,
            expected_hatch_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EggInput {
    #[serde(default)]
    pub dam_id: Option<BirdId>,
    #[serde(default)]
    pub sire_id: Option<BirdId>,
    #[serde(default)]
    pub coop_id: Option<CoopId>,
    pub laid_date: NaiveDate,
    #[serde(default)]
    pub weight_grams: Option<f64>,
    #[serde(default)]
    pub shell_quality: Option<ShellQuality>,
    #[serde(default)]
    pub shell_color: Option<String>,
    #[serde(default)]
    pub outcome: EggOutcome,
    #[serde(default)]
    pub incubation_start: Option<NaiveDate>,
    #[serde(default)]
    pub hatch_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for EggInput {
    fn validate(&self) -> ValidationResult {
        if let (Some(sire), Some(dam)) = (self.sire_id, self.dam_id) {
            if sire == dam {
                return Err(ValidationError::new(
                    "sireId",
                    "sire and dam must be different birds",
                ));
            }
        }
        optional_positive("weightGrams", self.weight_grams)?;
        optional_name("shellColor", self.shell_color.as_deref())?;
        not_before(
            "incubationStart",
            self.incubation_start,
            Some(self.laid_date),
            "laidDate",
        )?;
        match self.incubation_start {
            Some(_) => not_before(
                "hatchDate",
                self.hatch_date,
                self.incubation_start,
                "incubationStart",
            )?,
            None => not_before("hatchDate", self.hatch_date, Some(self.laid_date), "laidDate")?,
        }
        if self.outcome == EggOutcome::Hatched && self.hatch_date.is_none() {
            return Err(ValidationError::new(
                "hatchDate",
                "is required when the outcome is hatched",
            ));
        }
        Ok(())
    }
}

/// Filters for the egg listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EggFilter {
    #[serde(default)]
    pub dam_id: Option<BirdId>,
    #[serde(default)]
    pub outcome: Option<EggOutcome>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl EggFilter {
    pub fn matches(&self, egg: &EggRecord) -> bool {
        (self.dam_id.is_none() || self.dam_id == egg.dam_id)
            && self.outcome.map_or(true, |o| o == egg.outcome)
            && self.from.map_or(true, |from| egg.laid_date >= from)
            && self.to.map_or(true, |to| egg.laid_date <= to)
    }
}
