//! Saved report configurations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{require_name, Validate, ValidationResult};
use crate::api::PresetId;
use crate::reports::{ReportType, SortDirection};

/// The reusable part of a report query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetConfig {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub sort_column: Option<String>,
    #[serde(default)]
    pub sort_direction: Option<SortDirection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPreset {
    pub id: PresetId,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub report_type: ReportType,
    pub config: PresetConfig,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub report_type: ReportType,
    #[serde(default)]
    pub config: PresetConfig,
    #[serde(default)]
    pub is_default: bool,
}

impl Validate for PresetInput {
    /// Name rules only; the config is checked against the column registry
    /// by the report planner.
    fn validate(&self) -> ValidationResult {
        require_name("name", &self.name)
    }
}
