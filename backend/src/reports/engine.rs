//! In-memory report execution.
//!
//! Used by repositories that hold their rows in process. The total is
//! computed after every predicate (including the breed set) has been
//! applied, and only then is the pagination window sliced.

use std::cmp::Ordering;

use super::query::{Predicate, ResolvedQuery, SortSpec};
use super::rows::{ReportPage, ReportRecord, ReportRow};
use super::SortDirection;

pub fn matches<R: ReportRecord + ?Sized>(record: &R, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|predicate| match predicate {
        Predicate::Equals { column, values } => {
            let cell = record.cell(column);
            values.iter().any(|v| *v == cell)
        }
        Predicate::RelationIn { column, ids } => record
            .relation_id(column)
            .is_some_and(|id| ids.contains(&id)),
        Predicate::BreedIn { breed_ids } => record
            .breed_ids()
            .iter()
            .any(|id| breed_ids.contains(id)),
    })
}

/// Ordering for `sort`: nulls last in both directions, ties broken by
/// row id descending.
pub fn compare_records<R: ReportRecord + ?Sized>(a: &R, b: &R, sort: &SortSpec) -> Ordering {
    let left = a.cell(sort.column.id);
    let right = b.cell(sort.column.id);
    let by_value = match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match sort.direction {
            SortDirection::Asc => left.compare(&right),
            SortDirection::Desc => right.compare(&left),
        },
    };
    by_value.then_with(|| b.row_id().cmp(&a.row_id()))
}

pub fn execute<R: ReportRecord>(mut records: Vec<R>, query: &ResolvedQuery) -> ReportPage {
    records.retain(|record| matches(record, &query.predicates));
    records.sort_by(|a, b| compare_records(a, b, &query.sort));

    let total = records.len();
    let (limit, offset) = match query.window {
        Some(window) => (window.limit, window.offset),
        None => (total, 0),
    };
    let rows: Vec<ReportRow> = records
        .iter()
        .skip(offset)
        .take(limit)
        .map(|record| ReportRow::project(record, &query.columns))
        .collect();

    ReportPage {
        report_type: query.report_type,
        columns: query.columns.iter().map(|c| **c).collect(),
        rows,
        total,
        limit,
        offset,
    }
}
