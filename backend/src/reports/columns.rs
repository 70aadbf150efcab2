//! Static column registry for the report builder.
//!
//! Each report type has a fixed table of typed columns with bilingual
//! labels. The table drives query validation, projection, CSV headers and
//! the column picker in the UI.

use serde::Serialize;

use crate::define_string_enum;
use crate::models::{
    BirdStatus, CombType, EggOutcome, IncidentCategory, Severity, Sex, ShellQuality,
};

define_string_enum!(ReportType {
    Birds => "birds",
    Eggs => "eggs",
    Health => "health",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Select,
    Date,
    Number,
    Boolean,
}

/// Entity a relation-valued column points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Coop,
    Bird,
}

/// How filter values for a column are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Equality against the column's own value.
    Value,
    /// Values are names of related rows, resolved to ids before filtering.
    Relation(RelationKind),
    /// Values are breed ids matched against the bird's breed set.
    BreedSet,
}

fn no_options(options: &&'static [&'static str]) -> bool {
    options.is_empty()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportColumn {
    pub id: &'static str,
    pub label: &'static str,
    pub label_localized: &'static str,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub filterable: bool,
    pub sortable: bool,
    #[serde(skip_serializing_if = "no_options")]
    pub options: &'static [&'static str],
    #[serde(skip)]
    pub filter_kind: FilterKind,
}

impl ReportColumn {
    const fn new(
        id: &'static str,
        label: &'static str,
        label_localized: &'static str,
        column_type: ColumnType,
    ) -> Self {
        Self {
            id,
            label,
            label_localized,
            column_type,
            filterable: false,
            sortable: false,
            options: &[],
            filter_kind: FilterKind::Value,
        }
    }

    const fn text(id: &'static str, label: &'static str, th: &'static str) -> Self {
        Self::new(id, label, th, ColumnType::Text)
    }

    const fn date(id: &'static str, label: &'static str, th: &'static str) -> Self {
        Self::new(id, label, th, ColumnType::Date)
    }

    const fn select(
        id: &'static str,
        label: &'static str,
        th: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        Self {
            options,
            ..Self::new(id, label, th, ColumnType::Select)
        }
    }

    const fn relation(
        id: &'static str,
        label: &'static str,
        th: &'static str,
        kind: RelationKind,
    ) -> Self {
        Self {
            filterable: true,
            filter_kind: FilterKind::Relation(kind),
            ..Self::new(id, label, th, ColumnType::Text)
        }
    }

    const fn filterable(self) -> Self {
        Self {
            filterable: true,
            ..self
        }
    }

    const fn sortable(self) -> Self {
        Self {
            sortable: true,
            ..self
        }
    }

    /// Label in the requested language.
    pub fn label_for(&self, localized: bool) -> &'static str {
        if localized {
            self.label_localized
        } else {
            self.label
        }
    }
}

static BIRD_COLUMNS: &[ReportColumn] = &[
    ReportColumn::text("name", "Name", "ชื่อ").filterable().sortable(),
    ReportColumn::text("bandNumber", "Band Number", "หมายเลขห่วงขา").filterable(),
    ReportColumn::select("sex", "Sex", "เพศ", Sex::VALUES)
        .filterable()
        .sortable(),
    ReportColumn::select("status", "Status", "สถานะ", BirdStatus::VALUES)
        .filterable()
        .sortable(),
    ReportColumn {
        filterable: true,
        filter_kind: FilterKind::BreedSet,
        ..ReportColumn::new("breed", "Breed", "สายพันธุ์", ColumnType::Select)
    },
    ReportColumn::relation("coop", "Coop", "โรงเรือน", RelationKind::Coop),
    ReportColumn::relation("sire", "Sire", "พ่อพันธุ์", RelationKind::Bird),
    ReportColumn::relation("dam", "Dam", "แม่พันธุ์", RelationKind::Bird),
    ReportColumn::date("hatchDate", "Hatch Date", "วันฟัก")
        .filterable()
        .sortable(),
    ReportColumn::new("ageWeeks", "Age (weeks)", "อายุ (สัปดาห์)", ColumnType::Number),
    ReportColumn::select("combType", "Comb Type", "ลักษณะหงอน", CombType::VALUES)
        .filterable()
        .sortable(),
    ReportColumn::text("color", "Color", "สี").filterable().sortable(),
    ReportColumn::text("notes", "Notes", "หมายเหตุ"),
    ReportColumn::date("createdAt", "Created At", "วันที่บันทึก").sortable(),
];

static EGG_COLUMNS: &[ReportColumn] = &[
    ReportColumn::date("laidDate", "Laid Date", "วันที่ไข่")
        .filterable()
        .sortable(),
    ReportColumn::relation("dam", "Dam", "แม่พันธุ์", RelationKind::Bird),
    ReportColumn::relation("sire", "Sire", "พ่อพันธุ์", RelationKind::Bird),
    ReportColumn::relation("coop", "Coop", "โรงเรือน", RelationKind::Coop),
    ReportColumn::new("weightGrams", "Weight (g)", "น้ำหนัก (กรัม)", ColumnType::Number).sortable(),
    ReportColumn::select(
        "shellQuality",
        "Shell Quality",
        "คุณภาพเปลือก",
        ShellQuality::VALUES,
    )
    .filterable()
    .sortable(),
    ReportColumn::text("shellColor", "Shell Color", "สีเปลือก")
        .filterable()
        .sortable(),
    ReportColumn::select("outcome", "Outcome", "ผลลัพธ์", EggOutcome::VALUES)
        .filterable()
        .sortable(),
    ReportColumn::date("incubationStart", "Incubation Start", "วันเริ่มฟัก")
        .filterable()
        .sortable(),
    ReportColumn::date("hatchDate", "Hatch Date", "วันฟักออก")
        .filterable()
        .sortable(),
    ReportColumn::text("notes", "Notes", "หมายเหตุ"),
    ReportColumn::date("createdAt", "Created At", "วันที่บันทึก").sortable(),
];

static HEALTH_COLUMNS: &[ReportColumn] = &[
    ReportColumn::date("incidentDate", "Incident Date", "วันที่พบ")
        .filterable()
        .sortable(),
    ReportColumn::relation("bird", "Bird", "ไก่", RelationKind::Bird),
    ReportColumn::relation("coop", "Coop", "โรงเรือน", RelationKind::Coop),
    ReportColumn::select("category", "Category", "ประเภท", IncidentCategory::VALUES)
        .filterable()
        .sortable(),
    ReportColumn::select("severity", "Severity", "ความรุนแรง", Severity::VALUES)
        .filterable()
        .sortable(),
    ReportColumn::text("description", "Description", "รายละเอียด"),
    ReportColumn::text("treatment", "Treatment", "การรักษา"),
    ReportColumn::new("resolved", "Resolved", "หายแล้ว", ColumnType::Boolean)
        .filterable()
        .sortable(),
    ReportColumn::date("resolvedDate", "Resolved Date", "วันที่หาย")
        .filterable()
        .sortable(),
    ReportColumn::date("createdAt", "Created At", "วันที่บันทึก").sortable(),
];

static BIRD_DEFAULTS: &[&str] = &[
    "name",
    "bandNumber",
    "sex",
    "status",
    "breed",
    "coop",
    "hatchDate",
];
static EGG_DEFAULTS: &[&str] = &[
    "laidDate",
    "dam",
    "coop",
    "weightGrams",
    "shellQuality",
    "outcome",
];

static HEALTH_DEFAULTS: &[&str] = &["incidentDate", "bird", "category", "severity", "resolved"];

/// Column used when a query does not ask for a sort.
pub const DEFAULT_SORT_COLUMN: &str = "createdAt";

pub fn report_columns(report_type: ReportType) -> &'static [ReportColumn] {
    match report_type {
        ReportType::Birds => BIRD_COLUMNS,
        ReportType::Eggs => EGG_COLUMNS,
        ReportType::Health => HEALTH_COLUMNS,
    }
}

pub fn default_column_ids(report_type: ReportType) -> &'static [&'static str] {
    match report_type {
        ReportType::Birds => BIRD_DEFAULTS,
        ReportType::Eggs => EGG_DEFAULTS,
        ReportType::Health => HEALTH_DEFAULTS,
    }
}

pub fn find_column(report_type: ReportType, id: &str) -> Option<&'static ReportColumn> {
    report_columns(report_type).iter().find(|c| c.id == id)
}

pub fn default_columns(report_type: ReportType) -> Vec<&'static ReportColumn> {
    default_column_ids(report_type)
        .iter()
        .filter_map(|id| find_column(report_type, id))
        .collect()
}

pub fn filterable_columns(report_type: ReportType) -> Vec<&'static ReportColumn> {
    report_columns(report_type)
        .iter()
        .filter(|c| c.filterable)
        .collect()
}

pub fn sortable_columns(report_type: ReportType) -> Vec<&'static ReportColumn> {
    report_columns(report_type)
        .iter()
        .filter(|c| c.sortable)
        .collect()
}
