//! Data Transfer Objects for the HTTP API.
//!
//! Domain payloads travel as-is (they already derive Serialize/Deserialize
//! in camelCase); this module adds the response envelopes and the typed
//! query strings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::{
    BirdFilter, BirdId, BirdStatus, ConsumptionFilter, CoopId, EggFilter, EggOutcome,
    FeedInventoryId, ListParams, ReportColumn, ReportType, Sex,
};

/// `{ "data": ... }` envelope for single resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// Bare `limit`/`offset` query.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl From<PageQuery> for ListParams {
    fn from(q: PageQuery) -> Self {
        ListParams::new(q.limit, q.offset)
    }
}

/// Query string of `GET /v1/birds`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirdListQuery {
    #[serde(default)]
    pub status: Option<BirdStatus>,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub coop_id: Option<CoopId>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl BirdListQuery {
    pub fn split(self) -> (BirdFilter, ListParams) {
        (
            BirdFilter {
                status: self.status,
                sex: self.sex,
                coop_id: self.coop_id,
                search: self.search,
            },
            ListParams::new(self.limit, self.offset),
        )
    }
}

/// Query string of `GET /v1/eggs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EggListQuery {
    #[serde(default)]
    pub dam_id: Option<BirdId>,
    #[serde(default)]
    pub outcome: Option<EggOutcome>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl EggListQuery {
    pub fn split(self) -> (EggFilter, ListParams) {
        (
            EggFilter {
                dam_id: self.dam_id,
                outcome: self.outcome,
                from: self.from,
                to: self.to,
            },
            ListParams::new(self.limit, self.offset),
        )
    }
}

/// Query string of `GET /v1/feed/consumption`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionListQuery {
    #[serde(default)]
    pub inventory_id: Option<FeedInventoryId>,
    #[serde(default)]
    pub coop_id: Option<CoopId>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl ConsumptionListQuery {
    pub fn split(self) -> (ConsumptionFilter, ListParams) {
        (
            ConsumptionFilter {
                inventory_id: self.inventory_id,
                coop_id: self.coop_id,
            },
            ListParams::new(self.limit, self.offset),
        )
    }
}

/// Query string of the health record listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthListQuery {
    #[serde(default)]
    pub bird_id: Option<BirdId>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl HealthListQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.limit, self.offset)
    }
}

/// Query string of `GET /v1/breeds/composition-preview`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionPreviewQuery {
    #[serde(default)]
    pub sire_id: Option<BirdId>,
    #[serde(default)]
    pub dam_id: Option<BirdId>,
}

/// Query string of `GET /v1/reports/presets`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetListQuery {
    #[serde(default)]
    pub report_type: Option<String>,
}

/// Query string of `POST /v1/reports/export`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ExportQuery {
    /// Use the localized column headers.
    #[serde(default)]
    pub localized: bool,
}

/// Column registry entry list for one report type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnsResponse {
    pub report_type: ReportType,
    pub columns: Vec<ReportColumn>,
    pub default_columns: Vec<&'static str>,
    pub default_sort_column: &'static str,
}
