//! HTTP handlers for the REST API.
//!
//! Each handler checks the caller's role, then delegates to the service
//! layer in [`crate::db::services`] for validation and business rules.

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::dto::{
    BirdListQuery, ColumnsResponse, CompositionPreviewQuery, ConsumptionListQuery, DataResponse,
    EggListQuery, ExportQuery, HealthListQuery, HealthResponse, PageQuery, PresetListQuery,
};
use super::error::AppError;
use super::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use super::state::AppState;
use crate::api::*;
use crate::db::services::{self as db_services, CompositionPreview, ReportSummary};
use crate::reports::{default_column_ids, report_columns, DEFAULT_SORT_COLUMN};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<DataResponse<T>>, AppError>;
/// Result type for list handlers.
pub type ListResult<T> = Result<Json<Page<T>>, AppError>;
/// Result type for create handlers.
pub type CreatedResult<T> = Result<(StatusCode, Json<DataResponse<T>>), AppError>;

fn ok<T>(data: T) -> HandlerResult<T> {
    Ok(Json(DataResponse::new(data)))
}

fn created<T>(data: T) -> CreatedResult<T> {
    Ok((StatusCode::CREATED, Json(DataResponse::new(data))))
}

fn parse_report_type(value: &str) -> Result<ReportType, AppError> {
    value
        .parse()
        .map_err(|_| ReportError::InvalidReportType(value.to_string()).into())
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Liveness plus repository reachability. No identity required.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_status = match db_services::health_check(state.repository.as_ref()).await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    })
}

// =============================================================================
// Birds
// =============================================================================

/// GET /v1/birds
pub async fn list_birds(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<BirdListQuery>,
) -> ListResult<Bird> {
    user.require(Role::Viewer)?;
    let (filter, params) = query.split();
    let page = db_services::list_birds(state.repository.as_ref(), &filter, params).await?;
    Ok(Json(page))
}

/// POST /v1/birds
pub async fn create_bird(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<BirdInput>,
) -> CreatedResult<Bird> {
    user.require(Role::Staff)?;
    created(db_services::create_bird(state.repository.as_ref(), input, &user.id).await?)
}

/// GET /v1/birds/{id}
pub async fn get_bird(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<BirdId>,
) -> HandlerResult<Bird> {
    user.require(Role::Viewer)?;
    ok(db_services::get_bird(state.repository.as_ref(), id).await?)
}

/// PUT /v1/birds/{id}
pub async fn update_bird(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<BirdId>,
    ApiJson(input): ApiJson<BirdInput>,
) -> HandlerResult<Bird> {
    user.require(Role::Staff)?;
    ok(db_services::update_bird(state.repository.as_ref(), id, input, &user.id).await?)
}

/// DELETE /v1/birds/{id}
pub async fn delete_bird(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<BirdId>,
) -> Result<StatusCode, AppError> {
    user.require(Role::Owner)?;
    db_services::delete_bird(state.repository.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/birds/{id}/breed-composition/recalculate
pub async fn recalculate_composition(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<BirdId>,
) -> HandlerResult<Bird> {
    user.require(Role::Staff)?;
    ok(db_services::recalculate_composition(state.repository.as_ref(), id).await?)
}

/// GET /v1/birds/{id}/offspring
pub async fn list_offspring(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<BirdId>,
) -> HandlerResult<Vec<BirdSummary>> {
    user.require(Role::Viewer)?;
    let birds = db_services::list_offspring(state.repository.as_ref(), id).await?;
    ok(birds.into_iter().map(BirdSummary::from).collect())
}

/// GET /v1/birds/{id}/weights
pub async fn list_weights(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<BirdId>,
) -> HandlerResult<Vec<WeightRecord>> {
    user.require(Role::Viewer)?;
    ok(db_services::list_weights(state.repository.as_ref(), id).await?)
}

/// POST /v1/birds/{id}/weights
pub async fn add_weight(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<BirdId>,
    ApiJson(input): ApiJson<WeightInput>,
) -> CreatedResult<WeightRecord> {
    user.require(Role::Staff)?;
    created(db_services::add_weight(state.repository.as_ref(), id, input).await?)
}

/// DELETE /v1/weights/{id}
pub async fn delete_weight(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<WeightId>,
) -> Result<StatusCode, AppError> {
    user.require(Role::Owner)?;
    db_services::delete_weight(state.repository.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Breeds & Coops
// =============================================================================

/// GET /v1/breeds
pub async fn list_breeds(
    State(state): State<AppState>,
    user: CurrentUser,
) -> HandlerResult<Vec<Breed>> {
    user.require(Role::Viewer)?;
    ok(db_services::list_breeds(state.repository.as_ref()).await?)
}

/// POST /v1/breeds
pub async fn create_breed(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<BreedInput>,
) -> CreatedResult<Breed> {
    user.require(Role::Owner)?;
    created(db_services::create_breed(state.repository.as_ref(), input).await?)
}

/// GET /v1/breeds/{id}
pub async fn get_breed(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<BreedId>,
) -> HandlerResult<Breed> {
    user.require(Role::Viewer)?;
    ok(db_services::get_breed(state.repository.as_ref(), id).await?)
}

/// PUT /v1/breeds/{id}
pub async fn update_breed(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<BreedId>,
    ApiJson(input): ApiJson<BreedInput>,
) -> HandlerResult<Breed> {
    user.require(Role::Owner)?;
    ok(db_services::update_breed(state.repository.as_ref(), id, input).await?)
}

/// DELETE /v1/breeds/{id}
pub async fn delete_breed(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<BreedId>,
) -> Result<StatusCode, AppError> {
    user.require(Role::Owner)?;
    db_services::delete_breed(state.repository.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/breeds/composition-preview?sireId=&damId=
pub async fn composition_preview(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<CompositionPreviewQuery>,
) -> HandlerResult<CompositionPreview> {
    user.require(Role::Viewer)?;
    let preview =
        db_services::composition_preview(state.repository.as_ref(), query.sire_id, query.dam_id)
            .await?;
    ok(preview)
}

/// GET /v1/coops
pub async fn list_coops(
    State(state): State<AppState>,
    user: CurrentUser,
) -> HandlerResult<Vec<CoopSummary>> {
    user.require(Role::Viewer)?;
    ok(db_services::list_coops(state.repository.as_ref()).await?)
}

/// POST /v1/coops
pub async fn create_coop(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<CoopInput>,
) -> CreatedResult<CoopSummary> {
    user.require(Role::Owner)?;
    created(db_services::create_coop(state.repository.as_ref(), input).await?)
}

/// GET /v1/coops/{id}
pub async fn get_coop(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<CoopId>,
) -> HandlerResult<CoopSummary> {
    user.require(Role::Viewer)?;
    ok(db_services::get_coop(state.repository.as_ref(), id).await?)
}

/// PUT /v1/coops/{id}
pub async fn update_coop(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<CoopId>,
    ApiJson(input): ApiJson<CoopInput>,
) -> HandlerResult<CoopSummary> {
    user.require(Role::Owner)?;
    ok(db_services::update_coop(state.repository.as_ref(), id, input).await?)
}

/// DELETE /v1/coops/{id}
pub async fn delete_coop(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<CoopId>,
) -> Result<StatusCode, AppError> {
    user.require(Role::Owner)?;
    db_services::delete_coop(state.repository.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Eggs
// =============================================================================

/// GET /v1/eggs
pub async fn list_eggs(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<EggListQuery>,
) -> ListResult<EggView> {
    user.require(Role::Viewer)?;
    let (filter, params) = query.split();
    let page = db_services::list_eggs(state.repository.as_ref(), &filter, params).await?;
    Ok(Json(page.map(EggView::from)))
}

/// POST /v1/eggs
pub async fn create_egg(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<EggInput>,
) -> CreatedResult<EggView> {
    user.require(Role::Staff)?;
    let egg = db_services::create_egg(state.repository.as_ref(), input, &user.id).await?;
    created(EggView::from(egg))
}

/// GET /v1/eggs/{id}
pub async fn get_egg(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<EggId>,
) -> HandlerResult<EggView> {
    user.require(Role::Viewer)?;
    ok(EggView::from(db_services::get_egg(state.repository.as_ref(), id).await?))
}

/// PUT /v1/eggs/{id}
pub async fn update_egg(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<EggId>,
    ApiJson(input): ApiJson<EggInput>,
) -> HandlerResult<EggView> {
    user.require(Role::Staff)?;
    ok(EggView::from(db_services::update_egg(state.repository.as_ref(), id, input).await?))
}

/// DELETE /v1/eggs/{id}
pub async fn delete_egg(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<EggId>,
) -> Result<StatusCode, AppError> {
    user.require(Role::Owner)?;
    db_services::delete_egg(state.repository.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Feed
// =============================================================================

/// GET /v1/feed/inventory
pub async fn list_inventory(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ListResult<FeedInventory> {
    user.require(Role::Viewer)?;
    Ok(Json(db_services::list_inventory(state.repository.as_ref(), query.into()).await?))
}

/// POST /v1/feed/inventory
pub async fn create_inventory(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<FeedInventoryInput>,
) -> CreatedResult<FeedInventory> {
    user.require(Role::Owner)?;
    created(db_services::create_inventory(state.repository.as_ref(), input).await?)
}

/// GET /v1/feed/inventory/{id}
pub async fn get_inventory(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<FeedInventoryId>,
) -> HandlerResult<FeedInventory> {
    user.require(Role::Viewer)?;
    ok(db_services::get_inventory(state.repository.as_ref(), id).await?)
}

/// PUT /v1/feed/inventory/{id}
pub async fn update_inventory(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<FeedInventoryId>,
    ApiJson(input): ApiJson<FeedInventoryInput>,
) -> HandlerResult<FeedInventory> {
    user.require(Role::Owner)?;
    ok(db_services::update_inventory(state.repository.as_ref(), id, input).await?)
}

/// DELETE /v1/feed/inventory/{id}
pub async fn delete_inventory(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<FeedInventoryId>,
) -> Result<StatusCode, AppError> {
    user.require(Role::Owner)?;
    db_services::delete_inventory(state.repository.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/feed/consumption
pub async fn list_consumption(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<ConsumptionListQuery>,
) -> ListResult<FeedConsumption> {
    user.require(Role::Viewer)?;
    let (filter, params) = query.split();
    Ok(Json(
        db_services::list_consumption(state.repository.as_ref(), &filter, params).await?,
    ))
}

/// POST /v1/feed/consumption
pub async fn record_consumption(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<FeedConsumptionInput>,
) -> CreatedResult<FeedConsumption> {
    user.require(Role::Staff)?;
    created(db_services::record_consumption(state.repository.as_ref(), input, &user.id).await?)
}

/// DELETE /v1/feed/consumption/{id}
pub async fn delete_consumption(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<FeedConsumptionId>,
) -> Result<StatusCode, AppError> {
    user.require(Role::Owner)?;
    db_services::delete_consumption(state.repository.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Health records
// =============================================================================

/// GET /v1/health/incidents
pub async fn list_incidents(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<HealthListQuery>,
) -> ListResult<HealthIncident> {
    user.require(Role::Viewer)?;
    let page =
        db_services::list_incidents(state.repository.as_ref(), query.bird_id, query.params())
            .await?;
    Ok(Json(page))
}

/// POST /v1/health/incidents
pub async fn create_incident(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<IncidentInput>,
) -> CreatedResult<HealthIncident> {
    user.require(Role::Staff)?;
    created(db_services::create_incident(state.repository.as_ref(), input, &user.id).await?)
}

/// GET /v1/health/incidents/{id}
pub async fn get_incident(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<IncidentId>,
) -> HandlerResult<HealthIncident> {
    user.require(Role::Viewer)?;
    ok(db_services::get_incident(state.repository.as_ref(), id).await?)
}

/// PUT /v1/health/incidents/{id}
pub async fn update_incident(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<IncidentId>,
    ApiJson(input): ApiJson<IncidentInput>,
) -> HandlerResult<HealthIncident> {
    user.require(Role::Staff)?;
    ok(db_services::update_incident(state.repository.as_ref(), id, input).await?)
}

/// DELETE /v1/health/incidents/{id}
pub async fn delete_incident(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<IncidentId>,
) -> Result<StatusCode, AppError> {
    user.require(Role::Owner)?;
    db_services::delete_incident(state.repository.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/health/vaccinations
pub async fn list_vaccinations(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<HealthListQuery>,
) -> ListResult<Vaccination> {
    user.require(Role::Viewer)?;
    let page =
        db_services::list_vaccinations(state.repository.as_ref(), query.bird_id, query.params())
            .await?;
    Ok(Json(page))
}

/// POST /v1/health/vaccinations
pub async fn create_vaccination(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<VaccinationInput>,
) -> CreatedResult<Vaccination> {
    user.require(Role::Staff)?;
    created(db_services::create_vaccination(state.repository.as_ref(), input).await?)
}

/// DELETE /v1/health/vaccinations/{id}
pub async fn delete_vaccination(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<VaccinationId>,
) -> Result<StatusCode, AppError> {
    user.require(Role::Owner)?;
    db_services::delete_vaccination(state.repository.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/health/medications
pub async fn list_medications(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<HealthListQuery>,
) -> ListResult<MedicationView> {
    user.require(Role::Viewer)?;
    let page =
        db_services::list_medications(state.repository.as_ref(), query.bird_id, query.params())
            .await?;
    Ok(Json(page.map(MedicationView::from)))
}

/// POST /v1/health/medications
pub async fn create_medication(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<MedicationInput>,
) -> CreatedResult<MedicationView> {
    user.require(Role::Staff)?;
    let medication = db_services::create_medication(state.repository.as_ref(), input).await?;
    created(MedicationView::from(medication))
}

/// DELETE /v1/health/medications/{id}
pub async fn delete_medication(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<MedicationId>,
) -> Result<StatusCode, AppError> {
    user.require(Role::Owner)?;
    db_services::delete_medication(state.repository.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Reports
// =============================================================================

/// GET /v1/reports/{type}/columns
pub async fn report_columns_for(
    user: CurrentUser,
    ApiPath(report_type): ApiPath<String>,
) -> HandlerResult<ColumnsResponse> {
    user.require(Role::Viewer)?;
    let report_type = parse_report_type(&report_type)?;
    ok(ColumnsResponse {
        report_type,
        columns: report_columns(report_type).to_vec(),
        default_columns: default_column_ids(report_type).to_vec(),
        default_sort_column: DEFAULT_SORT_COLUMN,
    })
}

/// POST /v1/reports/execute
pub async fn execute_report(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(query): ApiJson<ReportQuery>,
) -> HandlerResult<ReportPage> {
    user.require(Role::Viewer)?;
    ok(db_services::execute_report(state.repository.as_ref(), &query).await?)
}

/// POST /v1/reports/summary
pub async fn summarize_report(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(query): ApiJson<ReportQuery>,
) -> HandlerResult<ReportSummary> {
    user.require(Role::Viewer)?;
    ok(db_services::summarize_report(state.repository.as_ref(), &query).await?)
}

/// POST /v1/reports/export?localized=true
///
/// Responds with `text/csv` as an attachment.
pub async fn export_report(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(options): ApiQuery<ExportQuery>,
    ApiJson(query): ApiJson<ReportQuery>,
) -> Result<Response, AppError> {
    user.require(Role::Viewer)?;
    let today = chrono::Utc::now().date_naive();
    let export =
        db_services::export_report(state.repository.as_ref(), &query, options.localized, today)
            .await?;

    let disposition =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", export.filename))
            .map_err(|e| AppError::Internal(format!("invalid export filename: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.content,
    )
        .into_response())
}

/// GET /v1/reports/presets?reportType=
pub async fn list_presets(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<PresetListQuery>,
) -> HandlerResult<Vec<ReportPreset>> {
    user.require(Role::Viewer)?;
    let report_type = query
        .report_type
        .as_deref()
        .map(parse_report_type)
        .transpose()?;
    ok(db_services::list_presets(state.repository.as_ref(), &user.id, report_type).await?)
}

/// POST /v1/reports/presets
pub async fn create_preset(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<PresetInput>,
) -> CreatedResult<ReportPreset> {
    user.require(Role::Viewer)?;
    created(db_services::create_preset(state.repository.as_ref(), &user.id, input).await?)
}

/// GET /v1/reports/presets/{id}
pub async fn get_preset(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<PresetId>,
) -> HandlerResult<ReportPreset> {
    user.require(Role::Viewer)?;
    ok(db_services::get_preset(state.repository.as_ref(), &user.id, id).await?)
}

/// PUT /v1/reports/presets/{id}
pub async fn update_preset(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<PresetId>,
    ApiJson(input): ApiJson<PresetInput>,
) -> HandlerResult<ReportPreset> {
    user.require(Role::Viewer)?;
    ok(db_services::update_preset(state.repository.as_ref(), &user.id, id, input).await?)
}

/// DELETE /v1/reports/presets/{id}
pub async fn delete_preset(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<PresetId>,
) -> Result<StatusCode, AppError> {
    user.require(Role::Viewer)?;
    db_services::delete_preset(state.repository.as_ref(), &user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
