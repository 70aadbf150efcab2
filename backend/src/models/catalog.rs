//! Reference data: breeds and coops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bird::CombType;
use super::validation::{optional_name, require_name, Validate, ValidationError, ValidationResult};
use crate::api::{BreedId, CoopId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breed {
    pub id: BreedId,
    pub name: String,
    pub name_localized: Option<String>,
    pub origin: Option<String>,
    pub egg_color: Option<String>,
    pub comb_type: Option<CombType>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreedInput {
    pub name: String,
    #[serde(default)]
    pub name_localized: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub egg_color: Option<String>,
    #[serde(default)]
    pub comb_type: Option<CombType>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Validate for BreedInput {
    fn validate(&self) -> ValidationResult {
        require_name("name", &self.name)?;
        optional_name("nameLocalized", self.name_localized.as_deref())?;
        optional_name("origin", self.origin.as_deref())?;
        optional_name("eggColor", self.egg_color.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coop {
    pub id: CoopId,
    pub name: String,
    pub capacity: Option<i32>,
    pub location: Option<String>,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Coop {
    /// Whether `occupancy` birds plus `incoming` more still fit.
    pub fn has_room_for(&self, occupancy: usize, incoming: usize) -> bool {
        match self.capacity {
            Some(capacity) => occupancy + incoming <= capacity.max(0) as usize,
            None => true,
        }
    }
}

/// Coop with the number of active birds currently assigned to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoopSummary {
    #[serde(flatten)]
    pub coop: Coop,
    pub occupancy: usize,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoopInput {
    pub name: String,
    #[serde(default)]
    pub capacity: Option<i32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for CoopInput {
    fn validate(&self) -> ValidationResult {
        require_name("name", &self.name)?;
        if let Some(capacity) = self.capacity {
            if capacity <= 0 {
                return Err(ValidationError::new("capacity", "must be a positive number"));
            }
        }
        optional_name("location", self.location.as_deref())
    }
}
