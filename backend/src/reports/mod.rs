//! Ad-hoc report builder.
//!
//! - [`columns`]: static column registry per report type
//! - [`query`]: request validation, planning and relation resolution
//! - [`rows`]: flattened row types and typed cells
//! - [`engine`]: in-memory filter/sort/paginate executor
//! - [`summary`] and [`export`]: group counts and CSV output

pub mod columns;
pub mod engine;
pub mod export;
pub mod query;
pub mod rows;
pub mod summary;

pub use columns::{
    default_column_ids, default_columns, filterable_columns, find_column, report_columns,
    sortable_columns, ColumnType, FilterKind, RelationKind, ReportColumn, ReportType,
    DEFAULT_SORT_COLUMN,
};
pub use export::{export_filename, to_csv};
pub use query::{
    ColumnFilter, FilterValues, Predicate, RelationResolver, ReportError, ReportPlan, ReportQuery,
    ResolvedQuery, SortDirection, SortSpec, Window,
};
pub use rows::{
    BirdRow, CellValue, EggRow, IncidentRow, NamedShare, ReportPage, ReportRecord, ReportRow,
};
pub use summary::{summarize, SummaryGroup};
