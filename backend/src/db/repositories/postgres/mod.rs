//! Postgres repository implementation using Diesel.
//!
//! Breed composition is stored relationally in `bird_breeds` so breed
//! filters run in SQL; identifiers live in `bird_identifiers` with a unique
//! `(kind, value)` constraint.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Retry with exponential backoff when a pooled connection cannot be
//!   checked out
//! - Connection health monitoring
//! - Automatic migration execution
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for checkout failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;

use crate::api::*;
use crate::db::repository::{
    BirdRepository, CatalogRepository, EggRepository, ErrorContext, FeedRepository,
    HealthRepository, PresetRepository, RepositoryError, RepositoryResult,
};
use crate::models::BirdRecordWrite;

mod models;
mod report;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

diesel::define_sql_function!(fn lower(x: Text) -> Text);

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for connection checkout
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    ///
    /// See the module documentation for the variables and their defaults.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let defaults = Self::default();
        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", defaults.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", defaults.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", defaults.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", defaults.retry_delay_ms),
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Pool health statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of connections currently in use
    pub connections_in_use: u32,
    /// Number of idle connections
    pub idle_connections: u32,
    /// Total number of connections in the pool
    pub total_connections: u32,
    /// Maximum pool size
    pub max_size: u32,
    /// Total operations executed
    pub total_queries: u64,
    /// Total failed operations
    pub failed_queries: u64,
    /// Total checkout retries
    pub retried_operations: u64,
}

/// Diesel-backed repository for Postgres.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    // Metrics counters
    total_queries: Arc<AtomicU64>,
    failed_queries: Arc<AtomicU64>,
    retried_operations: Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }
        log::info!(
            "Postgres repository ready (pool max={}, min={})",
            config.max_pool_size,
            config.min_pool_size
        );

        Ok(Self {
            pool,
            config,
            total_queries: Arc::new(AtomicU64::new(0)),
            failed_queries: Arc::new(AtomicU64::new(0)),
            retried_operations: Arc::new(AtomicU64::new(0)),
        })
    }

    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;
        Ok(())
    }

    /// Run `f` on a pooled connection inside `spawn_blocking`.
    ///
    /// Only the connection checkout is retried (with exponential backoff);
    /// once `f` has started, its error is returned as is so a write is never
    /// applied twice.
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut retry_delay = Duration::from_millis(retry_delay_ms);
            let mut attempt = 0;
            let mut conn = loop {
                match pool.get() {
                    Ok(conn) => break conn,
                    Err(e) if attempt < max_retries => {
                        log::warn!("Connection checkout failed (attempt {}): {}", attempt + 1, e);
                        attempt += 1;
                        retried_operations.fetch_add(1, Ordering::Relaxed);
                        std::thread::sleep(retry_delay);
                        retry_delay *= 2;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempts={}", attempt + 1)),
                        ));
                    }
                }
            };

            total_queries.fetch_add(1, Ordering::Relaxed);
            let result = f(&mut conn);
            if result.is_err() {
                failed_queries.fetch_add(1, Ordering::Relaxed);
            }
            result
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    /// Get pool health statistics.
    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            total_connections: state.connections,
            max_size: self.config.max_pool_size,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
        }
    }

    /// Returns a tuple of (is_healthy, latency_ms, error_message).
    pub async fn health_check_detailed(&self) -> (bool, Option<u64>, Option<String>) {
        let start = Instant::now();
        let result = self.health_check().await;
        let latency = Some(start.elapsed().as_millis() as u64);
        match result {
            Ok(true) => (true, latency, None),
            Ok(false) => (false, latency, Some("Health check returned false".to_string())),
            Err(e) => (false, latency, Some(e.to_string())),
        }
    }
}

fn map_diesel_error(err: diesel::result::Error) -> RepositoryError {
    RepositoryError::from(err)
}

fn page_window(params: &ListParams) -> (i64, i64) {
    (
        i64::try_from(params.limit()).unwrap_or(i64::MAX),
        i64::try_from(params.offset()).unwrap_or(i64::MAX),
    )
}

fn page<T>(data: Vec<T>, total: i64, params: &ListParams) -> Page<T> {
    Page {
        data,
        total: total.max(0) as usize,
        limit: params.limit(),
        offset: params.offset(),
    }
}

/// Escape LIKE wildcards in user supplied search terms.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn bird_exists(conn: &mut PgConnection, id: i64) -> RepositoryResult<bool> {
    diesel::select(diesel::dsl::exists(birds::table.find(id)))
        .get_result(conn)
        .map_err(map_diesel_error)
}

fn require_bird(conn: &mut PgConnection, id: BirdId) -> RepositoryResult<()> {
    if bird_exists(conn, id.value())? {
        Ok(())
    } else {
        Err(RepositoryError::not_found_entity("bird", id))
    }
}

// ==================== Bird helpers ====================

fn load_birds(conn: &mut PgConnection, rows: Vec<BirdDbRow>) -> RepositoryResult<Vec<Bird>> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let identifiers = bird_identifiers::table
        .filter(bird_identifiers::bird_id.eq_any(&ids))
        .order(bird_identifiers::id.asc())
        .select(IdentifierDbRow::as_select())
        .load(conn)?;
    let shares = bird_breeds::table
        .filter(bird_breeds::bird_id.eq_any(&ids))
        .order((bird_breeds::bird_id.asc(), bird_breeds::position.asc()))
        .select(BirdBreedRow::as_select())
        .load(conn)?;
    assemble_birds(rows, identifiers, shares)
}

fn load_bird(conn: &mut PgConnection, id: BirdId) -> RepositoryResult<Bird> {
    let row = birds::table
        .find(id.value())
        .select(BirdDbRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| RepositoryError::not_found_entity("bird", id))?;
    load_birds(conn, vec![row])?
        .pop()
        .ok_or_else(|| RepositoryError::not_found_entity("bird", id))
}

fn coop_occupancy(
    conn: &mut PgConnection,
    coop_id: i64,
    excluding: Option<i64>,
) -> RepositoryResult<i64> {
    let mut query = birds::table
        .filter(birds::coop_id.eq(coop_id))
        .filter(birds::status.eq(BirdStatus::Active.as_str()))
        .into_boxed();
    if let Some(id) = excluding {
        query = query.filter(birds::id.ne(id));
    }
    query.count().get_result(conn).map_err(map_diesel_error)
}

/// Coop capacity and identifier uniqueness, checked inside the write
/// transaction with the coop row locked.
fn check_bird_write(
    conn: &mut PgConnection,
    id: Option<i64>,
    bird: &BirdRecordWrite,
) -> RepositoryResult<()> {
    if let Some(coop_id) = bird.coop_id {
        let coop: Coop = coops::table
            .find(coop_id.value())
            .for_update()
            .select(CoopDbRow::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| {
                RepositoryError::invalid_field("coopId", format!("coop {} does not exist", coop_id))
            })?
            .into();
        if bird.status == BirdStatus::Active {
            let occupancy = coop_occupancy(conn, coop_id.value(), id)?;
            if !coop.has_room_for(occupancy.max(0) as usize, 1) {
                return Err(RepositoryError::invalid_field(
                    "coopId",
                    format!("coop '{}' is at capacity", coop.name),
                ));
            }
        }
    }

    for (idx, identifier) in bird.identifiers.iter().enumerate() {
        let mut query = bird_identifiers::table
            .filter(bird_identifiers::kind.eq(identifier.kind.as_str()))
            .filter(bird_identifiers::value.eq(&identifier.value))
            .into_boxed();
        if let Some(id) = id {
            query = query.filter(bird_identifiers::bird_id.ne(id));
        }
        let taken: i64 = query.count().get_result(conn)?;
        if taken > 0 {
            return Err(RepositoryError::invalid_field(
                format!("identifiers[{}].value", idx),
                format!(
                    "{} '{}' is already assigned to another bird",
                    identifier.kind, identifier.value
                ),
            ));
        }
    }
    Ok(())
}

fn replace_breed_rows(
    conn: &mut PgConnection,
    bird_id: i64,
    shares: &[BreedShare],
) -> RepositoryResult<()> {
    diesel::delete(bird_breeds::table.filter(bird_breeds::bird_id.eq(bird_id))).execute(conn)?;
    if !shares.is_empty() {
        diesel::insert_into(bird_breeds::table)
            .values(breed_rows(bird_id, shares))
            .execute(conn)?;
    }
    Ok(())
}

fn replace_bird_children(
    conn: &mut PgConnection,
    bird_id: i64,
    bird: &BirdRecordWrite,
) -> RepositoryResult<()> {
    diesel::delete(bird_identifiers::table.filter(bird_identifiers::bird_id.eq(bird_id)))
        .execute(conn)?;
    if !bird.identifiers.is_empty() {
        diesel::insert_into(bird_identifiers::table)
            .values(identifier_rows(bird_id, &bird.identifiers))
            .execute(conn)?;
    }
    replace_breed_rows(conn, bird_id, &bird.breed_composition)
}

fn bird_list_query(filter: &BirdFilter) -> birds::BoxedQuery<'static, Pg> {
    let mut query = birds::table.into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(birds::status.eq(status.as_str()));
    }
    if let Some(sex) = filter.sex {
        query = query.filter(birds::sex.eq(sex.as_str()));
    }
    if let Some(coop_id) = filter.coop_id {
        query = query.filter(birds::coop_id.eq(coop_id.value()));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = like_pattern(term);
        query = query.filter(
            birds::name.ilike(pattern.clone()).or(birds::id.eq_any(
                bird_identifiers::table
                    .filter(bird_identifiers::value.ilike(pattern))
                    .select(bird_identifiers::bird_id),
            )),
        );
    }
    query
}

// ==================== Catalog helpers ====================

fn breed_name_taken(
    conn: &mut PgConnection,
    name: &str,
    excluding: Option<i64>,
) -> RepositoryResult<bool> {
    let mut query = breeds::table
        .filter(lower(breeds::name).eq(name.trim().to_lowercase()))
        .into_boxed();
    if let Some(id) = excluding {
        query = query.filter(breeds::id.ne(id));
    }
    Ok(query.count().get_result::<i64>(conn)? > 0)
}

fn coop_name_taken(
    conn: &mut PgConnection,
    name: &str,
    excluding: Option<i64>,
) -> RepositoryResult<bool> {
    let mut query = coops::table
        .filter(lower(coops::name).eq(name.trim().to_lowercase()))
        .into_boxed();
    if let Some(id) = excluding {
        query = query.filter(coops::id.ne(id));
    }
    Ok(query.count().get_result::<i64>(conn)? > 0)
}

fn coop_summaries(
    conn: &mut PgConnection,
    rows: Vec<CoopDbRow>,
) -> RepositoryResult<Vec<CoopSummary>> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let counts: HashMap<Option<i64>, i64> = birds::table
        .filter(birds::coop_id.eq_any(&ids))
        .filter(birds::status.eq(BirdStatus::Active.as_str()))
        .group_by(birds::coop_id)
        .select((birds::coop_id, diesel::dsl::count_star()))
        .load::<(Option<i64>, i64)>(conn)?
        .into_iter()
        .collect();

    Ok(rows
        .into_iter()
        .map(|row| {
            let occupancy = counts.get(&Some(row.id)).copied().unwrap_or(0).max(0) as usize;
            CoopSummary {
                coop: row.into(),
                occupancy,
            }
        })
        .collect())
}

fn load_coop(conn: &mut PgConnection, id: CoopId) -> RepositoryResult<CoopSummary> {
    let row = coops::table
        .find(id.value())
        .select(CoopDbRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| RepositoryError::not_found_entity("coop", id))?;
    coop_summaries(conn, vec![row])?
        .pop()
        .ok_or_else(|| RepositoryError::not_found_entity("coop", id))
}

fn egg_list_query(filter: &EggFilter) -> eggs::BoxedQuery<'static, Pg> {
    let mut query = eggs::table.into_boxed();
    if let Some(dam_id) = filter.dam_id {
        query = query.filter(eggs::dam_id.eq(dam_id.value()));
    }
    if let Some(outcome) = filter.outcome {
        query = query.filter(eggs::outcome.eq(outcome.as_str()));
    }
    if let Some(from) = filter.from {
        query = query.filter(eggs::laid_date.ge(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(eggs::laid_date.le(to));
    }
    query
}

fn consumption_list_query(filter: &ConsumptionFilter) -> feed_consumption::BoxedQuery<'static, Pg> {
    let mut query = feed_consumption::table.into_boxed();
    if let Some(inventory_id) = filter.inventory_id {
        query = query.filter(feed_consumption::inventory_id.eq(inventory_id.value()));
    }
    if let Some(coop_id) = filter.coop_id {
        query = query.filter(feed_consumption::coop_id.eq(coop_id.value()));
    }
    query
}

fn clear_default_presets(
    conn: &mut PgConnection,
    owner_id: &str,
    report_type: &str,
    keep: Option<i64>,
) -> RepositoryResult<()> {
    let mut targets = report_presets::table
        .filter(report_presets::owner_id.eq(owner_id))
        .filter(report_presets::report_type.eq(report_type))
        .filter(report_presets::is_default.eq(true))
        .select(report_presets::id)
        .into_boxed();
    if let Some(id) = keep {
        targets = targets.filter(report_presets::id.ne(id));
    }
    let ids: Vec<i64> = targets.load(conn)?;
    if !ids.is_empty() {
        diesel::update(report_presets::table.filter(report_presets::id.eq_any(&ids)))
            .set(report_presets::is_default.eq(false))
            .execute(conn)?;
    }
    Ok(())
}

// ==================== Birds ====================

#[async_trait]
impl BirdRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn create_bird(&self, bird: &BirdRecordWrite) -> RepositoryResult<Bird> {
        let bird = bird.clone();
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                check_bird_write(tx, None, &bird)?;
                let id: i64 = diesel::insert_into(birds::table)
                    .values((BirdWriteRow::from(&bird), birds::created_by.eq(&bird.actor)))
                    .returning(birds::id)
                    .get_result(tx)?;
                replace_bird_children(tx, id, &bird)?;
                load_bird(tx, BirdId(id))
            })
        })
        .await
        .map_err(|e| e.with_operation("create_bird"))
    }

    async fn update_bird(&self, id: BirdId, bird: &BirdRecordWrite) -> RepositoryResult<Bird> {
        let bird = bird.clone();
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                require_bird(tx, id)?;
                check_bird_write(tx, Some(id.value()), &bird)?;
                diesel::update(birds::table.find(id.value()))
                    .set((BirdWriteRow::from(&bird), birds::updated_at.eq(Utc::now())))
                    .execute(tx)?;
                replace_bird_children(tx, id.value(), &bird)?;
                load_bird(tx, id)
            })
        })
        .await
        .map_err(|e| e.with_operation("update_bird"))
    }

    async fn get_bird(&self, id: BirdId) -> RepositoryResult<Bird> {
        self.with_conn(move |conn| load_bird(conn, id)).await
    }

    async fn list_birds(
        &self,
        filter: &BirdFilter,
        params: ListParams,
    ) -> RepositoryResult<Page<Bird>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let total: i64 = bird_list_query(&filter).count().get_result(conn)?;
            let (limit, offset) = page_window(&params);
            let rows = bird_list_query(&filter)
                .order((birds::created_at.desc(), birds::id.desc()))
                .limit(limit)
                .offset(offset)
                .select(BirdDbRow::as_select())
                .load(conn)?;
            Ok(page(load_birds(conn, rows)?, total, &params))
        })
        .await
    }

    async fn delete_bird(&self, id: BirdId) -> RepositoryResult<()> {
        // Dependants cascade or are nulled by the foreign keys.
        self.with_conn(move |conn| {
            let deleted = diesel::delete(birds::table.find(id.value())).execute(conn)?;
            if deleted == 0 {
                return Err(RepositoryError::not_found_entity("bird", id));
            }
            log::debug!("Deleted bird {}", id);
            Ok(())
        })
        .await
    }

    async fn set_breed_composition(
        &self,
        id: BirdId,
        composition: &[BreedShare],
    ) -> RepositoryResult<Bird> {
        let composition = composition.to_vec();
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                require_bird(tx, id)?;
                replace_breed_rows(tx, id.value(), &composition)?;
                diesel::update(birds::table.find(id.value()))
                    .set(birds::updated_at.eq(Utc::now()))
                    .execute(tx)?;
                load_bird(tx, id)
            })
        })
        .await
    }

    async fn list_offspring(&self, id: BirdId) -> RepositoryResult<Vec<Bird>> {
        self.with_conn(move |conn| {
            require_bird(conn, id)?;
            let rows = birds::table
                .filter(birds::sire_id.eq(id.value()).or(birds::dam_id.eq(id.value())))
                .order((birds::hatch_date.asc().nulls_last(), birds::id.asc()))
                .select(BirdDbRow::as_select())
                .load(conn)?;
            load_birds(conn, rows)
        })
        .await
    }

    async fn add_weight(
        &self,
        bird_id: BirdId,
        weight: &WeightInput,
    ) -> RepositoryResult<WeightRecord> {
        let row = NewWeightRow {
            bird_id: bird_id.value(),
            recorded_on: weight.recorded_on,
            weight_grams: weight.weight_grams,
            notes: weight.notes.clone(),
        };
        self.with_conn(move |conn| {
            require_bird(conn, bird_id)?;
            let stored: WeightDbRow = diesel::insert_into(weight_records::table)
                .values(&row)
                .returning(WeightDbRow::as_returning())
                .get_result(conn)?;
            Ok(stored.into())
        })
        .await
    }

    async fn list_weights(&self, bird_id: BirdId) -> RepositoryResult<Vec<WeightRecord>> {
        self.with_conn(move |conn| {
            require_bird(conn, bird_id)?;
            let rows = weight_records::table
                .filter(weight_records::bird_id.eq(bird_id.value()))
                .order((weight_records::recorded_on.desc(), weight_records::id.desc()))
                .select(WeightDbRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(WeightRecord::from).collect())
        })
        .await
    }

    async fn delete_weight(&self, id: WeightId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            match diesel::delete(weight_records::table.find(id.value())).execute(conn)? {
                0 => Err(RepositoryError::not_found_entity("weight", id)),
                _ => Ok(()),
            }
        })
        .await
    }
}

// ==================== Catalog ====================

#[async_trait]
impl CatalogRepository for PostgresRepository {
    async fn create_breed(&self, breed: &BreedInput) -> RepositoryResult<Breed> {
        let row = BreedWriteRow::from(breed);
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                if breed_name_taken(tx, &row.name, None)? {
                    return Err(RepositoryError::invalid_field("name", "breed name already exists"));
                }
                let stored: BreedDbRow = diesel::insert_into(breeds::table)
                    .values(&row)
                    .returning(BreedDbRow::as_returning())
                    .get_result(tx)?;
                Breed::try_from(stored)
            })
        })
        .await
    }

    async fn update_breed(&self, id: BreedId, breed: &BreedInput) -> RepositoryResult<Breed> {
        let row = BreedWriteRow::from(breed);
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                if breed_name_taken(tx, &row.name, Some(id.value()))? {
                    return Err(RepositoryError::invalid_field("name", "breed name already exists"));
                }
                let stored: BreedDbRow = diesel::update(breeds::table.find(id.value()))
                    .set(&row)
                    .returning(BreedDbRow::as_returning())
                    .get_result(tx)
                    .optional()?
                    .ok_or_else(|| RepositoryError::not_found_entity("breed", id))?;
                Breed::try_from(stored)
            })
        })
        .await
    }

    async fn get_breed(&self, id: BreedId) -> RepositoryResult<Breed> {
        self.with_conn(move |conn| {
            breeds::table
                .find(id.value())
                .select(BreedDbRow::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| RepositoryError::not_found_entity("breed", id))
                .and_then(Breed::try_from)
        })
        .await
    }

    async fn list_breeds(&self) -> RepositoryResult<Vec<Breed>> {
        self.with_conn(|conn| {
            breeds::table
                .order((breeds::name.asc(), breeds::id.asc()))
                .select(BreedDbRow::as_select())
                .load(conn)?
                .into_iter()
                .map(Breed::try_from)
                .collect()
        })
        .await
    }

    async fn delete_breed(&self, id: BreedId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let users: i64 = bird_breeds::table
                    .filter(bird_breeds::breed_id.eq(id.value()))
                    .count()
                    .get_result(tx)?;
                if users > 0 {
                    return Err(RepositoryError::invalid_field(
                        "breedId",
                        format!("breed is used in the composition of {} bird(s)", users),
                    ));
                }
                match diesel::delete(breeds::table.find(id.value())).execute(tx)? {
                    0 => Err(RepositoryError::not_found_entity("breed", id)),
                    _ => Ok(()),
                }
            })
        })
        .await
    }

    async fn create_coop(&self, coop: &CoopInput) -> RepositoryResult<CoopSummary> {
        let row = CoopWriteRow::from(coop);
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                if coop_name_taken(tx, &row.name, None)? {
                    return Err(RepositoryError::invalid_field("name", "coop name already exists"));
                }
                let stored: CoopDbRow = diesel::insert_into(coops::table)
                    .values(&row)
                    .returning(CoopDbRow::as_returning())
                    .get_result(tx)?;
                Ok(CoopSummary {
                    coop: stored.into(),
                    occupancy: 0,
                })
            })
        })
        .await
    }

    async fn update_coop(&self, id: CoopId, coop: &CoopInput) -> RepositoryResult<CoopSummary> {
        let row = CoopWriteRow::from(coop);
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let exists: Option<i64> = coops::table
                    .find(id.value())
                    .for_update()
                    .select(coops::id)
                    .first(tx)
                    .optional()?;
                if exists.is_none() {
                    return Err(RepositoryError::not_found_entity("coop", id));
                }
                if coop_name_taken(tx, &row.name, Some(id.value()))? {
                    return Err(RepositoryError::invalid_field("name", "coop name already exists"));
                }
                let occupancy = coop_occupancy(tx, id.value(), None)?;
                if row.capacity.is_some_and(|c| i64::from(c) < occupancy) {
                    return Err(RepositoryError::invalid_field(
                        "capacity",
                        format!("coop currently holds {} active bird(s)", occupancy),
                    ));
                }
                diesel::update(coops::table.find(id.value()))
                    .set(&row)
                    .execute(tx)?;
                load_coop(tx, id)
            })
        })
        .await
    }

    async fn get_coop(&self, id: CoopId) -> RepositoryResult<CoopSummary> {
        self.with_conn(move |conn| load_coop(conn, id)).await
    }

    async fn list_coops(&self) -> RepositoryResult<Vec<CoopSummary>> {
        self.with_conn(|conn| {
            let rows = coops::table
                .order((coops::name.asc(), coops::id.asc()))
                .select(CoopDbRow::as_select())
                .load(conn)?;
            coop_summaries(conn, rows)
        })
        .await
    }

    async fn delete_coop(&self, id: CoopId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            match diesel::delete(coops::table.find(id.value())).execute(conn)? {
                0 => Err(RepositoryError::not_found_entity("coop", id)),
                _ => Ok(()),
            }
        })
        .await
    }
}

// ==================== Eggs ====================

#[async_trait]
impl EggRepository for PostgresRepository {
    async fn create_egg(&self, egg: &EggInput, actor: &str) -> RepositoryResult<EggRecord> {
        let row = EggWriteRow::from(egg);
        let actor = actor.to_string();
        self.with_conn(move |conn| {
            let stored: EggDbRow = diesel::insert_into(eggs::table)
                .values((&row, eggs::created_by.eq(&actor)))
                .returning(EggDbRow::as_returning())
                .get_result(conn)?;
            EggRecord::try_from(stored)
        })
        .await
    }

    async fn update_egg(&self, id: EggId, egg: &EggInput) -> RepositoryResult<EggRecord> {
        let row = EggWriteRow::from(egg);
        self.with_conn(move |conn| {
            diesel::update(eggs::table.find(id.value()))
                .set(&row)
                .returning(EggDbRow::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| RepositoryError::not_found_entity("egg", id))
                .and_then(EggRecord::try_from)
        })
        .await
    }

    async fn get_egg(&self, id: EggId) -> RepositoryResult<EggRecord> {
        self.with_conn(move |conn| {
            eggs::table
                .find(id.value())
                .select(EggDbRow::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| RepositoryError::not_found_entity("egg", id))
                .and_then(EggRecord::try_from)
        })
        .await
    }

    async fn list_eggs(
        &self,
        filter: &EggFilter,
        params: ListParams,
    ) -> RepositoryResult<Page<EggRecord>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let total: i64 = egg_list_query(&filter).count().get_result(conn)?;
            let (limit, offset) = page_window(&params);
            let rows = egg_list_query(&filter)
                .order((eggs::laid_date.desc(), eggs::id.desc()))
                .limit(limit)
                .offset(offset)
                .select(EggDbRow::as_select())
                .load(conn)?;
            let data = rows
                .into_iter()
                .map(EggRecord::try_from)
                .collect::<RepositoryResult<Vec<_>>>()?;
            Ok(page(data, total, &params))
        })
        .await
    }

    async fn delete_egg(&self, id: EggId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            match diesel::delete(eggs::table.find(id.value())).execute(conn)? {
                0 => Err(RepositoryError::not_found_entity("egg", id)),
                _ => Ok(()),
            }
        })
        .await
    }
}

// ==================== Feed ====================

#[async_trait]
impl FeedRepository for PostgresRepository {
    async fn create_inventory(&self, item: &FeedInventoryInput) -> RepositoryResult<FeedInventory> {
        let row = InventoryWriteRow::from(item);
        self.with_conn(move |conn| {
            let stored: InventoryDbRow = diesel::insert_into(feed_inventory::table)
                .values(&row)
                .returning(InventoryDbRow::as_returning())
                .get_result(conn)?;
            FeedInventory::try_from(stored)
        })
        .await
    }

    async fn update_inventory(
        &self,
        id: FeedInventoryId,
        item: &FeedInventoryInput,
    ) -> RepositoryResult<FeedInventory> {
        let row = InventoryWriteRow::from(item);
        self.with_conn(move |conn| {
            diesel::update(feed_inventory::table.find(id.value()))
                .set(&row)
                .returning(InventoryDbRow::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| RepositoryError::not_found_entity("feed inventory", id))
                .and_then(FeedInventory::try_from)
        })
        .await
    }

    async fn get_inventory(&self, id: FeedInventoryId) -> RepositoryResult<FeedInventory> {
        self.with_conn(move |conn| {
            feed_inventory::table
                .find(id.value())
                .select(InventoryDbRow::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| RepositoryError::not_found_entity("feed inventory", id))
                .and_then(FeedInventory::try_from)
        })
        .await
    }

    async fn list_inventory(&self, params: ListParams) -> RepositoryResult<Page<FeedInventory>> {
        self.with_conn(move |conn| {
            let total: i64 = feed_inventory::table.count().get_result(conn)?;
            let (limit, offset) = page_window(&params);
            let data = feed_inventory::table
                .order((feed_inventory::purchase_date.desc(), feed_inventory::id.desc()))
                .limit(limit)
                .offset(offset)
                .select(InventoryDbRow::as_select())
                .load(conn)?
                .into_iter()
                .map(FeedInventory::try_from)
                .collect::<RepositoryResult<Vec<_>>>()?;
            Ok(page(data, total, &params))
        })
        .await
    }

    async fn delete_inventory(&self, id: FeedInventoryId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let in_use: i64 = feed_consumption::table
                    .filter(feed_consumption::inventory_id.eq(id.value()))
                    .count()
                    .get_result(tx)?;
                if in_use > 0 {
                    return Err(RepositoryError::invalid_field(
                        "inventoryId",
                        "inventory lot still has consumption records",
                    ));
                }
                match diesel::delete(feed_inventory::table.find(id.value())).execute(tx)? {
                    0 => Err(RepositoryError::not_found_entity("feed inventory", id)),
                    _ => Ok(()),
                }
            })
        })
        .await
    }

    async fn record_consumption(
        &self,
        record: &FeedConsumptionInput,
        actor: &str,
    ) -> RepositoryResult<FeedConsumption> {
        let row = NewConsumptionRow {
            inventory_id: record.inventory_id.value(),
            coop_id: record.coop_id.map(|id| id.value()),
            quantity_kg: record.quantity_kg,
            consumed_on: record.consumed_on,
            notes: record.notes.clone(),
            created_by: actor.to_string(),
        };
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                if let Some(coop_id) = row.coop_id {
                    let exists: bool =
                        diesel::select(diesel::dsl::exists(coops::table.find(coop_id)))
                            .get_result(tx)?;

                    if !exists {
                        return Err(RepositoryError::invalid_field(
                            "coopId",
                            format!("coop {} does not exist", coop_id),
                        ));
                    }
                }
                let remaining: f64 = feed_inventory::table
                    .find(row.inventory_id)
                    .for_update()
                    .select(feed_inventory::quantity_kg)
                    .first(tx)
                    .optional()?
                    .ok_or_else(|| {
                        RepositoryError::invalid_field(
                            "inventoryId",
                            format!("feed inventory {} does not exist", row.inventory_id),
                        )
                    })?;
                if row.quantity_kg > remaining {
                    return Err(RepositoryError::invalid_field(
                        "quantityKg",
                        format!("only {} kg remaining in this lot", remaining),
                    ));
                }
                diesel::update(feed_inventory::table.find(row.inventory_id))
                    .set(
                        feed_inventory::quantity_kg
                            .eq(feed_inventory::quantity_kg - row.quantity_kg),
                    )
                    .execute(tx)?;
                let stored: ConsumptionDbRow = diesel::insert_into(feed_consumption::table)
                    .values(&row)
                    .returning(ConsumptionDbRow::as_returning())
                    .get_result(tx)?;
                Ok(stored.into())
            })
        })
        .await
        .map_err(|e| e.with_operation("record_consumption"))
    }

    async fn list_consumption(
        &self,
        filter: &ConsumptionFilter,
        params: ListParams,
    ) -> RepositoryResult<Page<FeedConsumption>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let total: i64 = consumption_list_query(&filter).count().get_result(conn)?;
            let (limit, offset) = page_window(&params);
            let data = consumption_list_query(&filter)
                .order((feed_consumption::consumed_on.desc(), feed_consumption::id.desc()))
                .limit(limit)
                .offset(offset)
                .select(ConsumptionDbRow::as_select())
                .load(conn)?
                .into_iter()
                .map(FeedConsumption::from)
                .collect();
            Ok(page(data, total, &params))
        })
        .await
    }

    async fn delete_consumption(&self, id: FeedConsumptionId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let removed: ConsumptionDbRow =
                    diesel::delete(feed_consumption::table.find(id.value()))
                        .returning(ConsumptionDbRow::as_returning())
                        .get_result(tx)
                        .optional()?
                        .ok_or_else(|| RepositoryError::not_found_entity("feed consumption", id))?;
                diesel::update(feed_inventory::table.find(removed.inventory_id))
                    .set(
                        feed_inventory::quantity_kg
                            .eq(feed_inventory::quantity_kg + removed.quantity_kg),
                    )

                    .execute(tx)?;
                Ok(())
            })
        })
        .await
    }
}

// ==================== Health ====================

#[async_trait]
impl HealthRepository for PostgresRepository {
    async fn create_incident(
        &self,
        incident: &IncidentInput,
        actor: &str,
    ) -> RepositoryResult<HealthIncident> {
        let row = IncidentWriteRow::from(incident);
        let actor = actor.to_string();
        self.with_conn(move |conn| {
            let stored: IncidentDbRow = diesel::insert_into(health_incidents::table)
                .values((&row, health_incidents::created_by.eq(&actor)))
                .returning(IncidentDbRow::as_returning())
                .get_result(conn)?;
            HealthIncident::try_from(stored)
        })
        .await
    }

    async fn update_incident(
        &self,
        id: IncidentId,
        incident: &IncidentInput,
    ) -> RepositoryResult<HealthIncident> {
        let row = IncidentWriteRow::from(incident);
        self.with_conn(move |conn| {
            diesel::update(health_incidents::table.find(id.value()))
                .set(&row)
                .returning(IncidentDbRow::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| RepositoryError::not_found_entity("health incident", id))
                .and_then(HealthIncident::try_from)
        })
        .await
    }

    async fn get_incident(&self, id: IncidentId) -> RepositoryResult<HealthIncident> {
        self.with_conn(move |conn| {
            health_incidents::table
                .find(id.value())
                .select(IncidentDbRow::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| RepositoryError::not_found_entity("health incident", id))
                .and_then(HealthIncident::try_from)
        })
        .await
    }

    async fn list_incidents(
        &self,
        bird_id: Option<BirdId>,
        params: ListParams,
    ) -> RepositoryResult<Page<HealthIncident>> {
        self.with_conn(move |conn| {
            let filtered = || {
                let mut query = health_incidents::table.into_boxed();
                if let Some(bird_id) = bird_id {
                    query = query.filter(health_incidents::bird_id.eq(bird_id.value()));
                }
                query
            };
            let total: i64 = filtered().count().get_result(conn)?;
            let (limit, offset) = page_window(&params);
            let data = filtered()
                .order((health_incidents::incident_date.desc(), health_incidents::id.desc()))
                .limit(limit)
                .offset(offset)
                .select(IncidentDbRow::as_select())
                .load(conn)?
                .into_iter()
                .map(HealthIncident::try_from)
                .collect::<RepositoryResult<Vec<_>>>()?;
            Ok(page(data, total, &params))
        })
        .await
    }

    async fn delete_incident(&self, id: IncidentId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            match diesel::delete(health_incidents::table.find(id.value())).execute(conn)? {
                0 => Err(RepositoryError::not_found_entity("health incident", id)),
                _ => Ok(()),
            }
        })
        .await
    }

    async fn create_vaccination(
        &self,
        vaccination: &VaccinationInput,
    ) -> RepositoryResult<Vaccination> {
        let row = NewVaccinationRow::from(vaccination);
        self.with_conn(move |conn| {
            let stored: VaccinationDbRow = diesel::insert_into(vaccinations::table)
                .values(&row)
                .returning(VaccinationDbRow::as_returning())
                .get_result(conn)?;
            Ok(stored.into())
        })
        .await
    }

    async fn list_vaccinations(
        &self,
        bird_id: Option<BirdId>,
        params: ListParams,
    ) -> RepositoryResult<Page<Vaccination>> {
        self.with_conn(move |conn| {
            let filtered = || {
                let mut query = vaccinations::table.into_boxed();
                if let Some(bird_id) = bird_id {
                    query = query.filter(vaccinations::bird_id.eq(bird_id.value()));
                }
                query
            };
            let total: i64 = filtered().count().get_result(conn)?;
            let (limit, offset) = page_window(&params);
            let data = filtered()
                .order((vaccinations::administered_on.desc(), vaccinations::id.desc()))
                .limit(limit)
                .offset(offset)
                .select(VaccinationDbRow::as_select())
                .load(conn)?
                .into_iter()
                .map(Vaccination::from)
                .collect();
            Ok(page(data, total, &params))
        })
        .await
    }

    async fn delete_vaccination(&self, id: VaccinationId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            match diesel::delete(vaccinations::table.find(id.value())).execute(conn)? {
                0 => Err(RepositoryError::not_found_entity("vaccination", id)),
                _ => Ok(()),
            }
        })
        .await
    }

    async fn create_medication(
        &self,
        medication: &MedicationInput,
    ) -> RepositoryResult<Medication> {
        let row = NewMedicationRow::from(medication);
        self.with_conn(move |conn| {
            let stored: MedicationDbRow = diesel::insert_into(medications::table)
                .values(&row)
                .returning(MedicationDbRow::as_returning())
                .get_result(conn)?;
            Ok(stored.into())
        })
        .await
    }

    async fn list_medications(
        &self,
        bird_id: Option<BirdId>,
        params: ListParams,
    ) -> RepositoryResult<Page<Medication>> {
        self.with_conn(move |conn| {
            let filtered = || {
                let mut query = medications::table.into_boxed();
                if let Some(bird_id) = bird_id {
                    query = query.filter(medications::bird_id.eq(bird_id.value()));
                }
                query
            };
            let total: i64 = filtered().count().get_result(conn)?;
            let (limit, offset) = page_window(&params);
            let data = filtered()
                .order((medications::start_date.desc(), medications::id.desc()))
                .limit(limit)
                .offset(offset)
                .select(MedicationDbRow::as_select())
                .load(conn)?
                .into_iter()
                .map(Medication::from)
                .collect();
            Ok(page(data, total, &params))
        })
        .await
    }

    async fn delete_medication(&self, id: MedicationId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            match diesel::delete(medications::table.find(id.value())).execute(conn)? {
                0 => Err(RepositoryError::not_found_entity("medication", id)),
                _ => Ok(()),
            }
        })
        .await
    }
}

// ==================== Presets ====================

#[async_trait]
impl PresetRepository for PostgresRepository {
    async fn create_preset(
        &self,
        owner_id: &str,
        preset: &PresetInput,
    ) -> RepositoryResult<ReportPreset> {
        let row = PresetWriteRow::try_from(preset)?;
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                if row.is_default {
                    clear_default_presets(tx, &owner_id, &row.report_type, None)?;
                }
                let stored: PresetDbRow = diesel::insert_into(report_presets::table)
                    .values((&row, report_presets::owner_id.eq(&owner_id)))
                    .returning(PresetDbRow::as_returning())
                    .get_result(tx)?;
                ReportPreset::try_from(stored)
            })
        })
        .await
    }

    async fn update_preset(
        &self,
        id: PresetId,
        preset: &PresetInput,
    ) -> RepositoryResult<ReportPreset> {
        let row = PresetWriteRow::try_from(preset)?;
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let owner_id: String = report_presets::table
                    .find(id.value())
                    .for_update()
                    .select(report_presets::owner_id)
                    .first(tx)
                    .optional()?
                    .ok_or_else(|| RepositoryError::not_found_entity("preset", id))?;
                if row.is_default {
                    clear_default_presets(tx, &owner_id, &row.report_type, Some(id.value()))?;
                }
                let stored: PresetDbRow = diesel::update(report_presets::table.find(id.value()))
                    .set((&row, report_presets::updated_at.eq(Utc::now())))
                    .returning(PresetDbRow::as_returning())
                    .get_result(tx)?;
                ReportPreset::try_from(stored)
            })
        })
        .await
    }

    async fn get_preset(&self, id: PresetId) -> RepositoryResult<ReportPreset> {
        self.with_conn(move |conn| {
            report_presets::table
                .find(id.value())
                .select(PresetDbRow::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| RepositoryError::not_found_entity("preset", id))
                .and_then(ReportPreset::try_from)
        })
        .await
    }

    async fn list_presets(
        &self,
        owner_id: &str,
        report_type: Option<ReportType>,
    ) -> RepositoryResult<Vec<ReportPreset>> {
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            let mut query = report_presets::table
                .filter(report_presets::owner_id.eq(owner_id))
                .into_boxed();
            if let Some(report_type) = report_type {
                query = query.filter(report_presets::report_type.eq(report_type.as_str()));
            }
            query
                .order((report_presets::name.asc(), report_presets::id.asc()))
                .select(PresetDbRow::as_select())
                .load(conn)?
                .into_iter()
                .map(ReportPreset::try_from)
                .collect()
        })
        .await
    }

    async fn delete_preset(&self, id: PresetId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            match diesel::delete(report_presets::table.find(id.value())).execute(conn)? {
                0 => Err(RepositoryError::not_found_entity("preset", id)),
                _ => Ok(()),
            }
        })
        .await
    }
}
