//! SQL execution of resolved report queries.
//!
//! Predicates, the breed set included, become `WHERE` clauses so `total` is
//! counted by the database before the window is applied. Related names are
//! fetched for the returned page only.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use std::collections::HashMap;

use super::models::{BirdDbRow, EggDbRow, IncidentDbRow};
use super::schema::{bird_breeds, bird_identifiers, birds, breeds, coops, eggs, health_incidents};
use super::{load_birds, PostgresRepository};
use crate::api::{CoopId, EggRecord, HealthIncident, IdentifierKind};
use crate::db::repository::{ReportRepository, RepositoryError, RepositoryResult};
use crate::reports::{
    BirdRow, CellValue, EggRow, IncidentRow, NamedShare, Predicate, RelationKind,
    RelationResolver, ReportPage, ReportRow, ReportType, ResolvedQuery, SortDirection,
    SortSpec,
};

/// Order a boxed query by `column` in the requested direction, nulls last,
/// then by id descending.
macro_rules! sort_by {
    ($query:expr, $direction:expr, $column:expr, $id:expr) => {
        match $direction {
            SortDirection::Asc => $query.order_by($column.asc().nulls_last()),
            SortDirection::Desc => $query.order_by($column.desc().nulls_last()),
        }
        .then_order_by($id.desc())
    };
}

fn texts(values: &[CellValue]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| match v {
            CellValue::Text(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

fn dates(values: &[CellValue]) -> Vec<NaiveDate> {
    values
        .iter()
        .filter_map(|v| match v {
            CellValue::Date(d) => Some(*d),
            _ => None,
        })
        .collect()
}

fn bools(values: &[CellValue]) -> Vec<bool> {
    values
        .iter()
        .filter_map(|v| match v {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        })
        .collect()
}

fn unsupported(report_type: ReportType, column: &str) -> RepositoryError {
    RepositoryError::query(format!(
        "column '{}' is not supported by the {} report query",
        column, report_type
    ))
}

fn window(query: &ResolvedQuery) -> Option<(i64, i64)> {
    query
        .window
        .map(|w| (to_bigint(w.limit), to_bigint(w.offset)))
}

fn to_bigint(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn finish<R: crate::reports::ReportRecord>(
    query: &ResolvedQuery,
    records: Vec<R>,
    total: i64,
) -> ReportPage {
    let total = total.max(0) as usize;
    let (limit, offset) = match query.window {
        Some(w) => (w.limit, w.offset),
        None => (total, 0),
    };
    ReportPage {
        report_type: query.report_type,
        columns: query.columns.iter().map(|c| **c).collect(),
        rows: records
            .iter()
            .map(|record| ReportRow::project(record, &query.columns))
            .collect(),
        total,
        limit,
        offset,
    }
}

fn names_by_id<I>(
    conn: &mut PgConnection,
    kind: RelationKind,
    ids: I,
) -> RepositoryResult<HashMap<i64, String>>
where
    I: IntoIterator<Item = i64>,
{
    let mut ids: Vec<i64> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let pairs: Vec<(i64, String)> = match kind {
        RelationKind::Coop => coops::table
            .filter(coops::id.eq_any(&ids))
            .select((coops::id, coops::name))
            .load(conn)?,
        RelationKind::Bird => birds::table
            .filter(birds::id.eq_any(&ids))
            .select((birds::id, birds::name))
            .load(conn)?,
    };
    Ok(pairs.into_iter().collect())
}

fn lookup(names: &HashMap<i64, String>, id: Option<i64>) -> Option<String> {
    id.and_then(|id| names.get(&id).cloned())
}

// ==================== Birds ====================

fn bird_report_query(predicates: &[Predicate]) -> RepositoryResult<birds::BoxedQuery<'static, Pg>> {
    let mut query = birds::table.into_boxed();
    for predicate in predicates {
        query = match predicate {
            Predicate::Equals { column, values } => match *column {
                "name" => query.filter(birds::name.eq_any(texts(values))),
                "bandNumber" => query.filter(
                    birds::id.eq_any(
                        bird_identifiers::table
                            .filter(bird_identifiers::kind.eq(IdentifierKind::LegBand.as_str()))
                            .filter(bird_identifiers::value.eq_any(texts(values)))
                            .select(bird_identifiers::bird_id),
                    ),
                ),
                "sex" => query.filter(birds::sex.eq_any(texts(values))),
                "status" => query.filter(birds::status.eq_any(texts(values))),
                "hatchDate" => query.filter(birds::hatch_date.eq_any(dates(values))),
                "combType" => query.filter(birds::comb_type.eq_any(texts(values))),
                "color" => query.filter(birds::color.eq_any(texts(values))),
                other => return Err(unsupported(ReportType::Birds, other)),
            },
            Predicate::RelationIn { column, ids } => match *column {
                "coop" => query.filter(birds::coop_id.eq_any(ids.clone())),
                "sire" => query.filter(birds::sire_id.eq_any(ids.clone())),
                "dam" => query.filter(birds::dam_id.eq_any(ids.clone())),
                other => return Err(unsupported(ReportType::Birds, other)),
            },
            Predicate::BreedIn { breed_ids } => query.filter(
                birds::id.eq_any(
                    bird_breeds::table
                        .filter(
                            bird_breeds::breed_id
                                .eq_any(breed_ids.iter().map(|b| b.value()).collect::<Vec<_>>()),
                        )
                        .select(bird_breeds::bird_id),
                ),
            ),
        };
    }
    Ok(query)
}

fn sort_birds(
    query: birds::BoxedQuery<'static, Pg>,
    sort: &SortSpec,
) -> RepositoryResult<birds::BoxedQuery<'static, Pg>> {
    let direction = sort.direction;
    Ok(match sort.column.id {
        "name" => sort_by!(query, direction, birds::name, birds::id),
        "sex" => sort_by!(query, direction, birds::sex, birds::id),
        "status" => sort_by!(query, direction, birds::status, birds::id),
        "hatchDate" => sort_by!(query, direction, birds::hatch_date, birds::id),
        "combType" => sort_by!(query, direction, birds::comb_type, birds::id),
        "color" => sort_by!(query, direction, birds::color, birds::id),
        "createdAt" => sort_by!(query, direction, birds::created_at, birds::id),
        other => return Err(unsupported(ReportType::Birds, other)),
    })
}

fn run_bird_report(conn: &mut PgConnection, query: &ResolvedQuery) -> RepositoryResult<ReportPage> {
    let total: i64 = bird_report_query(&query.predicates)?.count().get_result(conn)?;
    let mut page_query = sort_birds(bird_report_query(&query.predicates)?, &query.sort)?;
    if let Some((limit, offset)) = window(query) {
        page_query = page_query.limit(limit).offset(offset);
    }
    let rows = page_query.select(BirdDbRow::as_select()).load(conn)?;
    let birds = load_birds(conn, rows)?;

    let coop_names = names_by_id(
        conn,
        RelationKind::Coop,
        birds.iter().filter_map(|b| b.coop_id.map(|id| id.value())),
    )?;
    let parent_names = names_by_id(
        conn,
        RelationKind::Bird,
        birds
            .iter()
            .flat_map(|b| [b.sire_id, b.dam_id])
            .flatten()
            .map(|id| id.value()),
    )?;
    let breed_ids: Vec<i64> = birds
        .iter()
        .flat_map(|b| b.breed_composition.iter().map(|s| s.breed_id.value()))
        .collect();
    let breed_names: HashMap<i64, String> = if breed_ids.is_empty() {
        HashMap::new()
    } else {
        breeds::table
            .filter(breeds::id.eq_any(&breed_ids))
            .select((breeds::id, breeds::name))
            .load::<(i64, String)>(conn)?
            .into_iter()
            .collect()
    };

    let today = Utc::now().date_naive();
    let records: Vec<BirdRow> = birds
        .into_iter()
        .map(|bird| BirdRow {
            coop_name: lookup(&coop_names, bird.coop_id.map(|id| id.value())),
            sire_name: lookup(&parent_names, bird.sire_id.map(|id| id.value())),
            dam_name: lookup(&parent_names, bird.dam_id.map(|id| id.value())),
            breeds: bird
                .breed_composition
                .iter()
                .map(|share| NamedShare {
                    breed_id: share.breed_id,
                    name: breed_names
                        .get(&share.breed_id.value())
                        .cloned()
                        .unwrap_or_default(),
                    percentage: share.percentage,
                })
                .collect(),
            bird,
            today,
        })
        .collect();
    Ok(finish(query, records, total))
}

// ==================== Eggs ====================

fn egg_report_query(predicates: &[Predicate]) -> RepositoryResult<eggs::BoxedQuery<'static, Pg>> {
    let mut query = eggs::table.into_boxed();
    for predicate in predicates {
        query = match predicate {
            Predicate::Equals { column, values } => match *column {
                "laidDate" => query.filter(eggs::laid_date.eq_any(dates(values))),
                "shellQuality" => query.filter(eggs::shell_quality.eq_any(texts(values))),
                "shellColor" => query.filter(eggs::shell_color.eq_any(texts(values))),
                "outcome" => query.filter(eggs::outcome.eq_any(texts(values))),
                "incubationStart" => query.filter(eggs::incubation_start.eq_any(dates(values))),
                "hatchDate" => query.filter(eggs::hatch_date.eq_any(dates(values))),
                other => return Err(unsupported(ReportType::Eggs, other)),
            },
            Predicate::RelationIn { column, ids } => match *column {
                "dam" => query.filter(eggs::dam_id.eq_any(ids.clone())),
                "sire" => query.filter(eggs::sire_id.eq_any(ids.clone())),
                "coop" => query.filter(eggs::coop_id.eq_any(ids.clone())),
                other => return Err(unsupported(ReportType::Eggs, other)),
            },
            Predicate::BreedIn { .. } => return Err(unsupported(ReportType::Eggs, "breed")),
        };
    }
    Ok(query)
}

fn sort_eggs(
    query: eggs::BoxedQuery<'static, Pg>,
    sort: &SortSpec,
) -> RepositoryResult<eggs::BoxedQuery<'static, Pg>> {
    let direction = sort.direction;
    Ok(match sort.column.id {
        "laidDate" => sort_by!(query, direction, eggs::laid_date, eggs::id),
        "weightGrams" => sort_by!(query, direction, eggs::weight_grams, eggs::id),
        "shellQuality" => sort_by!(query, direction, eggs::shell_quality, eggs::id),
        "shellColor" => sort_by!(query, direction, eggs::shell_color, eggs::id),
        "outcome" => sort_by!(query, direction, eggs::outcome, eggs::id),
        "incubationStart" => sort_by!(query, direction, eggs::incubation_start, eggs::id),
        "hatchDate" => sort_by!(query, direction, eggs::hatch_date, eggs::id),
        "createdAt" => sort_by!(query, direction, eggs::created_at, eggs::id),
        other => return Err(unsupported(ReportType::Eggs, other)),
    })
}

fn run_egg_report(conn: &mut PgConnection, query: &ResolvedQuery) -> RepositoryResult<ReportPage> {
    let total: i64 = egg_report_query(&query.predicates)?.count().get_result(conn)?;
    let mut page_query = sort_eggs(egg_report_query(&query.predicates)?, &query.sort)?;
    if let Some((limit, offset)) = window(query) {
        page_query = page_query.limit(limit).offset(offset);
    }
    let eggs: Vec<EggRecord> = page_query
        .select(EggDbRow::as_select())
        .load(conn)?
        .into_iter()
        .map(EggRecord::try_from)
        .collect::<RepositoryResult<_>>()?;

    let bird_names = names_by_id(
        conn,
        RelationKind::Bird,
        eggs.iter()
            .flat_map(|e| [e.dam_id, e.sire_id])
            .flatten()
            .map(|id| id.value()),
    )?;
    let coop_names = names_by_id(
        conn,
        RelationKind::Coop,
        eggs.iter().filter_map(|e| e.coop_id.map(|id| id.value())),
    )?;

    let records: Vec<EggRow> = eggs
        .into_iter()
        .map(|egg| EggRow {
            dam_name: lookup(&bird_names, egg.dam_id.map(|id| id.value())),
            sire_name: lookup(&bird_names, egg.sire_id.map(|id| id.value())),
            coop_name: lookup(&coop_names, egg.coop_id.map(|id| id.value())),
            egg,
        })
        .collect();
    Ok(finish(query, records, total))
}

// ==================== Health ====================

fn incident_report_query(
    predicates: &[Predicate],
) -> RepositoryResult<health_incidents::BoxedQuery<'static, Pg>> {
    let mut query = health_incidents::table.into_boxed();
    for predicate in predicates {
        query = match predicate {
            Predicate::Equals { column, values } => match *column {
                "incidentDate" => {
                    query.filter(health_incidents::incident_date.eq_any(dates(values)))
                }
                "category" => query.filter(health_incidents::category.eq_any(texts(values))),
                "severity" => query.filter(health_incidents::severity.eq_any(texts(values))),
                "resolved" => query.filter(health_incidents::resolved.eq_any(bools(values))),
                "resolvedDate" => {
                    query.filter(health_incidents::resolved_date.eq_any(dates(values)))
                }
                other => return Err(unsupported(ReportType::Health, other)),
            },
            Predicate::RelationIn { column, ids } => match *column {
                "bird" => query.filter(health_incidents::bird_id.eq_any(ids.clone())),
                "coop" => query.filter(
                    health_incidents::bird_id.eq_any(
                        birds::table
                            .filter(birds::coop_id.eq_any(ids.clone()))
                            .select(birds::id),
                    ),
                ),
                other => return Err(unsupported(ReportType::Health, other)),
            },
            Predicate::BreedIn { .. } => return Err(unsupported(ReportType::Health, "breed")),
        };
    }
    Ok(query)
}

fn sort_incidents(
    query: health_incidents::BoxedQuery<'static, Pg>,
    sort: &SortSpec,
) -> RepositoryResult<health_incidents::BoxedQuery<'static, Pg>> {
    use health_incidents as hi;
    let direction = sort.direction;
    Ok(match sort.column.id {
        "incidentDate" => sort_by!(query, direction, hi::incident_date, hi::id),
        "category" => sort_by!(query, direction, hi::category, hi::id),
        "severity" => sort_by!(query, direction, hi::severity, hi::id),
        "resolved" => sort_by!(query, direction, hi::resolved, hi::id),
        "resolvedDate" => sort_by!(query, direction, hi::resolved_date, hi::id),
        "createdAt" => sort_by!(query, direction, hi::created_at, hi::id),
        other => return Err(unsupported(ReportType::Health, other)),
    })
}

fn run_health_report(
    conn: &mut PgConnection,
    query: &ResolvedQuery,
) -> RepositoryResult<ReportPage> {
    let total: i64 = incident_report_query(&query.predicates)?.count().get_result(conn)?;
    let mut page_query = sort_incidents(incident_report_query(&query.predicates)?, &query.sort)?;
    if let Some((limit, offset)) = window(query) {
        page_query = page_query.limit(limit).offset(offset);
    }
    let incidents: Vec<HealthIncident> = page_query
        .select(IncidentDbRow::as_select())
        .load(conn)?
        .into_iter()
        .map(HealthIncident::try_from)
        .collect::<RepositoryResult<_>>()?;

    let mut bird_ids: Vec<i64> = incidents.iter().map(|i| i.bird_id.value()).collect();
    bird_ids.sort_unstable();
    bird_ids.dedup();
    let owners: HashMap<i64, (String, Option<i64>)> = birds::table
        .filter(birds::id.eq_any(&bird_ids))
        .select((birds::id, birds::name, birds::coop_id))
        .load::<(i64, String, Option<i64>)>(conn)?
        .into_iter()
        .map(|(id, name, coop_id)| (id, (name, coop_id)))
        .collect();
    let coop_names = names_by_id(
        conn,
        RelationKind::Coop,
        owners.values().filter_map(|(_, coop)| *coop),
    )?;


    let records: Vec<IncidentRow> = incidents
        .into_iter()
        .map(|incident| {
            let owner = owners.get(&incident.bird_id.value());
            let coop_id = owner.and_then(|(_, coop)| *coop);
            IncidentRow {
                bird_name: owner.map(|(name, _)| name.clone()),
                coop_id: coop_id.map(CoopId),
                coop_name: lookup(&coop_names, coop_id),
                incident,
            }
        })
        .collect();
    Ok(finish(query, records, total))
}

#[async_trait]
impl RelationResolver for PostgresRepository {
    async fn resolve_relation(
        &self,
        kind: RelationKind,
        names: &[String],
    ) -> RepositoryResult<Vec<i64>> {
        let names = names.to_vec();
        self.with_conn(move |conn| {
            let ids = match kind {
                RelationKind::Coop => coops::table
                    .filter(coops::name.eq_any(&names))
                    .order(coops::id.asc())
                    .select(coops::id)
                    .load(conn)?,
                RelationKind::Bird => birds::table
                    .filter(birds::name.eq_any(&names))
                    .order(birds::id.asc())
                    .select(birds::id)
                    .load(conn)?,
            };
            Ok(ids)
        })
        .await
    }
}

#[async_trait]
impl ReportRepository for PostgresRepository {
    async fn run_report(&self, query: &ResolvedQuery) -> RepositoryResult<ReportPage> {
        if query.matches_nothing() {
            let (limit, offset) = query.window.map_or((0, 0), |w| (w.limit, w.offset));
            return Ok(ReportPage::empty(query.report_type, &query.columns, limit, offset));
        }
        let query = query.clone();
        self.with_conn(move |conn| match query.report_type {
            ReportType::Birds => run_bird_report(conn, &query),
            ReportType::Eggs => run_egg_report(conn, &query),
            ReportType::Health => run_health_report(conn, &query),
        })
        .await
        .map_err(|e| e.with_operation("run_report"))
    }
}
