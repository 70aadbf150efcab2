//! Flattened report rows.
//!
//! Each report type has a row type joining an entity with the names of its
//! relations. Rows expose their cells by column id through
//! [`ReportRecord`], which is all the engine, summary and CSV writer need.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;

use super::columns::{ReportColumn, ReportType};
use crate::api::{BreedId, CoopId};
use crate::models::{Bird, EggRecord, HealthIncident, IdentifierKind};

/// A single typed cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Bool(bool),
    Null,
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(CellValue::Null, CellValue::text)
    }

    pub fn opt_date(value: Option<NaiveDate>) -> Self {
        value.map_or(CellValue::Null, CellValue::Date)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Ordering used for ascending sorts. Values of different kinds only
    /// meet when a column is null; nulls are handled by the caller.
    pub fn compare(&self, other: &CellValue) -> Ordering {
        match (self, other) {
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            (CellValue::Number(a), CellValue::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (CellValue::Date(a), CellValue::Date(b)) => a.cmp(b),
            (CellValue::Timestamp(a), CellValue::Timestamp(b)) => a.cmp(b),
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Timestamp(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Null => Ok(()),
        }
    }
}

/// Row exposing its cells by column id.
pub trait ReportRecord {
    fn row_id(&self) -> i64;

    fn cell(&self, column: &str) -> CellValue;

    /// Id of the related row behind a relation column.
    fn relation_id(&self, _column: &str) -> Option<i64> {
        None
    }

    fn breed_ids(&self) -> Vec<BreedId> {
        Vec::new()
    }
}

/// Projected row returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub id: i64,
    pub cells: BTreeMap<String, CellValue>,
}

impl ReportRow {
    pub fn project<R: ReportRecord + ?Sized>(
        record: &R,
        columns: &[&'static ReportColumn],
    ) -> Self {
        Self {
            id: record.row_id(),
            cells: columns
                .iter()
                .map(|c| (c.id.to_string(), record.cell(c.id)))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> &CellValue {
        self.cells.get(column).unwrap_or(&CellValue::Null)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    pub report_type: ReportType,
    pub columns: Vec<ReportColumn>,
    pub rows: Vec<ReportRow>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl ReportPage {
    pub fn empty(
        report_type: ReportType,
        columns: &[&'static ReportColumn],
        limit: usize,
        offset: usize,
    ) -> Self {
        Self {
            report_type,
            columns: columns.iter().map(|c| **c).collect(),
            rows: Vec::new(),
            total: 0,
            limit,
            offset,
        }
    }
}

/// Breed name with its share, in composition order.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedShare {
    pub breed_id: BreedId,
    pub name: String,
    pub percentage: f64,
}

#[derive(Debug, Clone)]
pub struct BirdRow {
    pub bird: Bird,
    pub coop_name: Option<String>,
    pub sire_name: Option<String>,
    pub dam_name: Option<String>,
    pub breeds: Vec<NamedShare>,
    pub today: NaiveDate,
}

impl BirdRow {
    fn breed_label(&self) -> CellValue {
        if self.breeds.is_empty() {
            return CellValue::Null;
        }
        let parts: Vec<String> = self
            .breeds
            .iter()
            .map(|share| format!("{} {}%", share.name, share.percentage))
            .collect();
        CellValue::Text(parts.join(", "))
    }
}

impl ReportRecord for BirdRow {
    fn row_id(&self) -> i64 {
        self.bird.id.value()
    }

    fn cell(&self, column: &str) -> CellValue {
        let bird = &self.bird;
        match column {
            "name" => CellValue::text(&bird.name),
            "bandNumber" => CellValue::opt_text(bird.identifier(IdentifierKind::LegBand)),
            "sex" => CellValue::text(bird.sex.as_str()),
            "status" => CellValue::text(bird.status.as_str()),
            "breed" => self.breed_label(),
            "coop" => CellValue::opt_text(self.coop_name.as_deref()),
            "sire" => CellValue::opt_text(self.sire_name.as_deref()),
            "dam" => CellValue::opt_text(self.dam_name.as_deref()),
            "hatchDate" => CellValue::opt_date(bird.hatch_date),
            "ageWeeks" => bird
                .age_weeks(self.today)
                .map_or(CellValue::Null, |w| CellValue::Number(w as f64)),
            "combType" => CellValue::opt_text(bird.comb_type.map(|c| c.as_str())),
            "color" => CellValue::opt_text(bird.color.as_deref()),
            "notes" => CellValue::opt_text(bird.notes.as_deref()),
            "createdAt" => CellValue::Timestamp(bird.created_at),
            _ => CellValue::Null,
        }
    }

    fn relation_id(&self, column: &str) -> Option<i64> {
        match column {
            "coop" => self.bird.coop_id.map(|id| id.value()),
            "sire" => self.bird.sire_id.map(|id| id.value()),
            "dam" => self.bird.dam_id.map(|id| id.value()),
            _ => None,
        }
    }

    fn breed_ids(&self) -> Vec<BreedId> {
        self.bird
            .breed_composition
            .iter()
            .map(|share| share.breed_id)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct EggRow {
    pub egg: EggRecord,
    pub dam_name: Option<String>,
    pub sire_name: Option<String>,
    pub coop_name: Option<String>,
}

impl ReportRecord for EggRow {
    fn row_id(&self) -> i64 {
        self.egg.id.value()
    }

    fn cell(&self, column: &str) -> CellValue {
        let egg = &self.egg;
        match column {
            "laidDate" => CellValue::Date(egg.laid_date),
            "dam" => CellValue::opt_text(self.dam_name.as_deref()),
            "sire" => CellValue::opt_text(self.sire_name.as_deref()),
            "coop" => CellValue::opt_text(self.coop_name.as_deref()),
            "weightGrams" => egg.weight_grams.map_or(CellValue::Null, CellValue::Number),
            "shellQuality" => CellValue::opt_text(egg.shell_quality.map(|q| q.as_str())),
            "shellColor" => CellValue::opt_text(egg.shell_color.as_deref()),
            "outcome" => CellValue::text(egg.outcome.as_str()),
            "incubationStart" => CellValue::opt_date(egg.incubation_start),
            "hatchDate" => CellValue::opt_date(egg.hatch_date),
            "notes" => CellValue::opt_text(egg.notes.as_deref()),
            "createdAt" => CellValue::Timestamp(egg.created_at),
            _ => CellValue::Null,
        }
    }

    fn relation_id(&self, column: &str) -> Option<i64> {
        match column {
            "dam" => self.egg.dam_id.map(|id| id.value()),
            "sire" => self.egg.sire_id.map(|id| id.value()),
            "coop" => self.egg.coop_id.map(|id| id.value()),
            _ => None,
        }
    }
}

/// Health incident joined with its bird; `coop` is the bird's coop.
#[derive(Debug, Clone)]
pub struct IncidentRow {
    pub incident: HealthIncident,
    pub bird_name: Option<String>,
    pub coop_id: Option<CoopId>,
    pub coop_name: Option<String>,
}

impl ReportRecord for IncidentRow {
    fn row_id(&self) -> i64 {
        self.incident.id.value()
    }

    fn cell(&self, column: &str) -> CellValue {
        let incident = &self.incident;
        match column {
            "incidentDate" => CellValue::Date(incident.incident_date),
            "bird" => CellValue::opt_text(self.bird_name.as_deref()),
            "coop" => CellValue::opt_text(self.coop_name.as_deref()),
            "category" => CellValue::text(incident.category.as_str()),
            "severity" => CellValue::text(incident.severity.as_str()),
            "description" => CellValue::text(&incident.description),
            "treatment" => CellValue::opt_text(incident.treatment.as_deref()),
            "resolved" => CellValue::Bool(incident.resolved),
            "resolvedDate" => CellValue::opt_date(incident.resolved_date),
            "createdAt" => CellValue::Timestamp(incident.created_at),
            _ => CellValue::Null,
        }
    }

    fn relation_id(&self, column: &str) -> Option<i64> {
        match column {
            "bird" => Some(self.incident.bird_id.value()),
            "coop" => self.coop_id.map(|id| id.value()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_display() {
        assert_eq!(CellValue::Number(58.0).to_string(), "58");
        assert_eq!(CellValue::Number(58.5).to_string(), "58.5");
        assert_eq!(
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()).to_string(),
            "2024-01-02"
        );
        assert_eq!(CellValue::Null.to_string(), "");
        assert_eq!(CellValue::Bool(true).to_string(), "true");
    }

    #[test]
    fn test_cell_serializes_untagged() {
        let json = serde_json::to_value(vec![
            CellValue::text("hen"),
            CellValue::Number(1.5),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
            CellValue::Null,
        ])
        .unwrap();
        assert_eq!(json, serde_json::json!(["hen", 1.5, "2024-01-02", null]));
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            CellValue::text("a").compare(&CellValue::text("b")),
            Ordering::Less
        );
        assert_eq!(
            CellValue::Number(3.0).compare(&CellValue::Number(2.0)),
            Ordering::Greater
        );
    }
}
