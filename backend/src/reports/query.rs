//! Report query validation and planning.
//!
//! A [`ReportQuery`] arrives with raw strings. [`ReportQuery::plan`] checks
//! it against the column registry and produces a typed [`ReportPlan`];
//! [`ReportPlan::resolve`] then turns relation-valued filters (names) into
//! id predicates using a [`RelationResolver`].

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::columns::{
    default_columns, find_column, ColumnType, FilterKind, RelationKind, ReportColumn, ReportType,
    DEFAULT_SORT_COLUMN,
};
use super::rows::CellValue;
use crate::api::BreedId;
use crate::db::repository::RepositoryResult;
use crate::define_string_enum;
use crate::models::{PresetConfig, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, MAX_PAGE_OFFSET};

define_string_enum!(SortDirection {
    Asc => "asc",
    Desc => "desc",
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error("invalid report type '{0}' (expected one of: birds, eggs, health)")]
    InvalidReportType(String),

    #[error("unknown column '{column}' for the {report_type} report")]
    UnknownColumn {
        field: String,
        report_type: ReportType,
        column: String,
    },

    #[error("column '{0}' cannot be filtered")]
    NotFilterable(String),

    #[error("column '{0}' cannot be sorted")]
    NotSortable(String),

    #[error("invalid sort direction '{0}' (expected asc or desc)")]
    InvalidSortDirection(String),

    #[error("invalid value '{value}' for column '{column}': {reason}")]
    InvalidFilterValue {
        column: String,
        value: String,
        reason: String,
    },

    #[error("offset {0} is out of range")]
    OffsetOutOfRange(usize),
}

impl ReportError {
    /// Request field the error points at.
    pub fn field(&self) -> String {
        match self {
            ReportError::InvalidReportType(_) => "reportType".to_string(),
            ReportError::UnknownColumn { field, .. } => field.clone(),
            ReportError::NotFilterable(column) | ReportError::InvalidFilterValue { column, .. } => {
                format!("filters.{}", column)
            }
            ReportError::NotSortable(_) => "sortColumn".to_string(),
            ReportError::InvalidSortDirection(_) => "sortDirection".to_string(),
            ReportError::OffsetOutOfRange(_) => "offset".to_string(),
        }
    }
}

/// Report request as sent by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub report_type: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub sort_column: Option<String>,
    #[serde(default)]
    pub sort_direction: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: &'static ReportColumn,
    pub direction: SortDirection,
}

/// Parsed filter values for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValues {
    Values(Vec<CellValue>),
    Names(RelationKind, Vec<String>),
    Breeds(Vec<BreedId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilter {
    pub column: &'static ReportColumn,
    pub values: FilterValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportPlan {
    pub report_type: ReportType,
    pub columns: Vec<&'static ReportColumn>,
    pub filters: Vec<ColumnFilter>,
    pub sort: SortSpec,
    pub window: Option<Window>,
}

/// Row predicate after relation names have been resolved.
///
/// Predicates on different columns are ANDed, values within one predicate
/// are ORed.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals {
        column: &'static str,
        values: Vec<CellValue>,
    },
    RelationIn {
        column: &'static str,
        ids: Vec<i64>,
    },
    BreedIn {
        breed_ids: Vec<BreedId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    pub report_type: ReportType,
    pub columns: Vec<&'static ReportColumn>,
    pub predicates: Vec<Predicate>,
    pub sort: SortSpec,
    pub window: Option<Window>,
}

impl ResolvedQuery {
    /// True when a relation filter resolved to no rows, so nothing can match.
    pub fn matches_nothing(&self) -> bool {
        self.predicates
            .iter()
            .any(|p| matches!(p, Predicate::RelationIn { ids, .. } if ids.is_empty()))
    }
}

/// Looks up related rows by name for relation-valued filters.
#[async_trait]
pub trait RelationResolver: Send + Sync {
    async fn resolve_relation(
        &self,
        kind: RelationKind,
        names: &[String],
    ) -> RepositoryResult<Vec<i64>>;
}

impl ReportQuery {
    pub fn new(report_type: ReportType) -> Self {
        Self {
            report_type: report_type.as_str().to_string(),
            ..Default::default()
        }
    }

    pub fn from_preset(report_type: ReportType, config: &PresetConfig) -> Self {
        Self {
            report_type: report_type.as_str().to_string(),
            columns: config.columns.clone(),
            filters: config.filters.clone(),
            sort_column: config.sort_column.clone(),
            sort_direction: config.sort_direction.map(|d| d.as_str().to_string()),
            limit: None,
            offset: None,
        }
    }

    pub fn with_filter(mut self, column: &str, values: &[&str]) -> Self {
        self.filters.insert(
            column.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub fn with_sort(mut self, column: &str, direction: &str) -> Self {
        self.sort_column = Some(column.to_string());
        self.sort_direction = Some(direction.to_string());
        self
    }

    pub fn with_window(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Validate against the registry and build a windowed plan.
    pub fn plan(&self) -> Result<ReportPlan, ReportError> {
        let report_type = ReportType::from_str(self.report_type.trim())
            .map_err(|_| ReportError::InvalidReportType(self.report_type.clone()))?;
        let unknown = |field: String, column: &str| ReportError::UnknownColumn {
            field,
            report_type,
            column: column.to_string(),
        };

        let columns = if self.columns.is_empty() {
            default_columns(report_type)
        } else {
            let mut columns = Vec::with_capacity(self.columns.len());
            for (idx, id) in self.columns.iter().enumerate() {
                let column = find_column(report_type, id)
                    .ok_or_else(|| unknown(format!("columns[{}]", idx), id))?;
                if !columns.contains(&column) {
                    columns.push(column);
                }
            }
            columns
        };

        let mut filters = Vec::new();
        for (id, raw_values) in &self.filters {
            let column =
                find_column(report_type, id).ok_or_else(|| unknown(format!("filters.{}", id), id))?;
            if !column.filterable {
                return Err(ReportError::NotFilterable(id.clone()));
            }
            let raw_values: Vec<&str> = raw_values
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .collect();
            if raw_values.is_empty() {
                continue;
            }
            filters.push(ColumnFilter {
                column,
                values: parse_filter_values(column, &raw_values)?,
            });
        }

        let sort_column = match self.sort_column.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                let column = find_column(report_type, id)
                    .ok_or_else(|| unknown("sortColumn".to_string(), id))?;
                if !column.sortable {
                    return Err(ReportError::NotSortable(id.to_string()));
                }
                column
            }
            _ => find_column(report_type, DEFAULT_SORT_COLUMN)
                .ok_or_else(|| unknown("sortColumn".to_string(), DEFAULT_SORT_COLUMN))?,
        };
        let direction = match self.sort_direction.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => SortDirection::from_str(&raw.to_lowercase())
                .map_err(|_| ReportError::InvalidSortDirection(raw.to_string()))?,
            _ => SortDirection::Desc,
        };

        let offset = self.offset.unwrap_or(0);
        if offset > MAX_PAGE_OFFSET {
            return Err(ReportError::OffsetOutOfRange(offset));
        }
        let window = Window {
            limit: self
                .limit
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .clamp(1, MAX_PAGE_LIMIT),
            offset,
        };

        Ok(ReportPlan {
            report_type,
            columns,
            filters,
            sort: SortSpec {
                column: sort_column,
                direction,
            },
            window: Some(window),
        })
    }
}

fn parse_filter_values(
    column: &'static ReportColumn,
    raw_values: &[&str],
) -> Result<FilterValues, ReportError> {
    let invalid = |value: &str, reason: &str| ReportError::InvalidFilterValue {
        column: column.id.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    match column.filter_kind {
        FilterKind::Relation(kind) => Ok(FilterValues::Names(
            kind,
            raw_values.iter().map(|v| v.to_string()).collect(),
        )),
        FilterKind::BreedSet => raw_values
            .iter()
            .map(|v| {
                v.parse::<i64>()
                    .map(BreedId)
                    .map_err(|_| invalid(v, "expected a breed id"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(FilterValues::Breeds),
        FilterKind::Value => raw_values
            .iter()
            .map(|v| parse_cell(column, v).map_err(|reason| invalid(v, reason)))
            .collect::<Result<Vec<_>, _>>()
            .map(FilterValues::Values),
    }
}

fn parse_cell(column: &ReportColumn, raw: &str) -> Result<CellValue, &'static str> {
    match column.column_type {
        ColumnType::Text => Ok(CellValue::Text(raw.to_string())),
        ColumnType::Select => {
            if column.options.contains(&raw) {
                Ok(CellValue::Text(raw.to_string()))
            } else {
                Err("not one of the allowed options")
            }
        }
        ColumnType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(CellValue::Date)
            .map_err(|_| "expected a date in YYYY-MM-DD format"),
        ColumnType::Number => raw
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(CellValue::Number)
            .ok_or("expected a number"),
        ColumnType::Boolean => match raw.to_lowercase().as_str() {
            "true" => Ok(CellValue::Bool(true)),
            "false" => Ok(CellValue::Bool(false)),
            _ => Err("expected true or false"),
        },
    }
}

impl ReportPlan {
    /// Same plan over the whole result set (summary and export).
    pub fn without_window(mut self) -> Self {
        self.window = None;
        self
    }

    /// Resolve relation names to ids. Lookups run once per relation column.
    pub async fn resolve<R>(self, resolver: &R) -> RepositoryResult<ResolvedQuery>
    where
        R: RelationResolver + ?Sized,
    {
        let mut predicates = Vec::with_capacity(self.filters.len());
        for filter in self.filters {
            let predicate = match filter.values {
                FilterValues::Values(values) => Predicate::Equals {
                    column: filter.column.id,
                    values,
                },
                FilterValues::Names(kind, names) => {
                    let mut ids = resolver.resolve_relation(kind, &names).await?;
                    ids.sort_unstable();
                    ids.dedup();
                    log::debug!(
                        "Resolved {} filter {:?} to {} id(s)",
                        filter.column.id,
                        names,
                        ids.len()
                    );
                    Predicate::RelationIn {
                        column: filter.column.id,
                        ids,
                    }
                }
                FilterValues::Breeds(breed_ids) => Predicate::BreedIn { breed_ids },
            };
            predicates.push(predicate);
        }

        Ok(ResolvedQuery {
            report_type: self.report_type,
            columns: self.columns,
            predicates,
            sort: self.sort,
            window: self.window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn birds() -> ReportQuery {
        ReportQuery::new(ReportType::Birds)
    }

    #[test]
    fn test_invalid_report_type() {
        let query = ReportQuery {
            report_type: "ducks".into(),
            ..Default::default()
        };
        let err = query.plan().unwrap_err();
        assert_eq!(err, ReportError::InvalidReportType("ducks".into()));
        assert_eq!(err.field(), "reportType");
    }

    #[test]
    fn test_empty_columns_fall_back_to_defaults() {
        let plan = birds().plan().unwrap();
        let ids: Vec<_> = plan.columns.iter().map(|c| c.id).collect();
        assert_eq!(
            ids,
            vec!["name", "bandNumber", "sex", "status", "breed", "coop", "hatchDate"]
        );
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let mut query = birds();
        query.columns = vec!["name".into(), "wingspan".into()];
        let err = query.plan().unwrap_err();
        assert_eq!(err.field(), "columns[1]");
        assert!(matches!(err, ReportError::UnknownColumn { .. }));
    }

    #[test]
    fn test_default_sort_is_most_recent_first() {
        let plan = birds().plan().unwrap();
        assert_eq!(plan.sort.column.id, "createdAt");
        assert_eq!(plan.sort.direction, SortDirection::Desc);
    }

    #[test]
    fn test_sort_on_relation_column_rejected() {
        let err = birds().with_sort("coop", "asc").plan().unwrap_err();
        assert_eq!(err, ReportError::NotSortable("coop".into()));
    }

    #[test]
    fn test_invalid_sort_direction() {
        let err = birds().with_sort("name", "sideways").plan().unwrap_err();
        assert_eq!(err.field(), "sortDirection");
        let plan = birds().with_sort("name", "ASC").plan().unwrap();
        assert_eq!(plan.sort.direction, SortDirection::Asc);
    }

    #[test]
    fn test_filter_on_non_filterable_column() {
        let err = birds().with_filter("notes", &["x"]).plan().unwrap_err();
        assert_eq!(err, ReportError::NotFilterable("notes".into()));
    }

    #[test]
    fn test_select_filter_checks_options() {
        let err = birds().with_filter("sex", &["rooster"]).plan().unwrap_err();
        assert_eq!(err.field(), "filters.sex");
        let plan = birds().with_filter("sex", &["male", "female"]).plan().unwrap();
        assert_eq!(
            plan.filters[0].values,
            FilterValues::Values(vec![
                CellValue::Text("male".into()),
                CellValue::Text("female".into())
            ])
        );
    }

    #[test]
    fn test_date_and_breed_filters_are_parsed() {
        let plan = birds()
            .with_filter("hatchDate", &["2024-02-29"])
            .with_filter("breed", &["3", " 7 "])
            .plan()
            .unwrap();
        let breed = plan.filters.iter().find(|f| f.column.id == "breed").unwrap();
        assert_eq!(breed.values, FilterValues::Breeds(vec![BreedId(3), BreedId(7)]));
        assert!(birds().with_filter("hatchDate", &["29/02/2024"]).plan().is_err());
        assert!(birds().with_filter("breed", &["leghorn"]).plan().is_err());
    }

    #[test]
    fn test_empty_filter_values_are_ignored() {
        let plan = birds().with_filter("status", &["", "  "]).plan().unwrap();
        assert!(plan.filters.is_empty());
    }

    #[test]
    fn test_window_defaults_and_clamp() {
        let plan = birds().plan().unwrap();
        assert_eq!(plan.window, Some(Window { limit: 50, offset: 0 }));
        let plan = birds().with_window(9_999, 20).plan().unwrap();
        assert_eq!(plan.window, Some(Window { limit: 500, offset: 20 }));
        assert_eq!(plan.without_window().window, None);
    }

    #[test]
    fn test_offset_beyond_bigint_range_is_rejected() {
        let plan = birds().with_window(10, MAX_PAGE_OFFSET).plan().unwrap();
        assert_eq!(
            plan.window,
            Some(Window {
                limit: 10,
                offset: MAX_PAGE_OFFSET
            })
        );

        let err = birds()
            .with_window(10, MAX_PAGE_OFFSET + 1)
            .plan()
            .unwrap_err();
        assert_eq!(err, ReportError::OffsetOutOfRange(MAX_PAGE_OFFSET + 1));
        assert_eq!(err.field(), "offset");
    }

    struct FixedResolver;

    #[async_trait]
    impl RelationResolver for FixedResolver {
        async fn resolve_relation(
            &self,
            kind: RelationKind,
            names: &[String],
        ) -> RepositoryResult<Vec<i64>> {
            Ok(match kind {
                RelationKind::Coop if names.iter().any(|n| n == "North") => vec![4, 4],
                _ => vec![],
            })
        }
    }

    #[tokio::test]
    async fn test_resolve_relation_filters() {
        let resolved = birds()
            .with_filter("coop", &["North"])
            .plan()
            .unwrap()
            .resolve(&FixedResolver)
            .await
            .unwrap();
        assert_eq!(
            resolved.predicates,
            vec![Predicate::RelationIn {
                column: "coop",
                ids: vec![4]
            }]
        );
        assert!(!resolved.matches_nothing());

        let resolved = birds()
            .with_filter("sire", &["Nobody"])
            .plan()
            .unwrap()
            .resolve(&FixedResolver)
            .await
            .unwrap();
        assert!(resolved.matches_nothing());
    }
}
