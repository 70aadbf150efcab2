//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (request id, tracing, CORS,
//! compression, body limit), and creates the axum router ready for serving.

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Request},
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use super::handlers;
use super::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Assigns a UUID v4 to requests that arrive without an `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

fn api_v1() -> Router<AppState> {
    Router::new()
        // Birds
        .route("/birds", get(handlers::list_birds).post(handlers::create_bird))
        .route(
            "/birds/{id}",
            get(handlers::get_bird)
                .put(handlers::update_bird)
                .delete(handlers::delete_bird),
        )
        .route(
            "/birds/{id}/breed-composition/recalculate",
            post(handlers::recalculate_composition),
        )
        .route("/birds/{id}/offspring", get(handlers::list_offspring))
        .route(
            "/birds/{id}/weights",
            get(handlers::list_weights).post(handlers::add_weight),
        )
        .route("/weights/{id}", delete(handlers::delete_weight))
        // Breeds & coops
        .route("/breeds", get(handlers::list_breeds).post(handlers::create_breed))
        .route("/breeds/composition-preview", get(handlers::composition_preview))
        .route(
            "/breeds/{id}",
            get(handlers::get_breed)
                .put(handlers::update_breed)
                .delete(handlers::delete_breed),
        )
        .route("/coops", get(handlers::list_coops).post(handlers::create_coop))
        .route(
            "/coops/{id}",
            get(handlers::get_coop)
                .put(handlers::update_coop)
                .delete(handlers::delete_coop),
        )
        // Eggs
        .route("/eggs", get(handlers::list_eggs).post(handlers::create_egg))
        .route(
            "/eggs/{id}",
            get(handlers::get_egg)
                .put(handlers::update_egg)
                .delete(handlers::delete_egg),
        )
        // Feed
        .route(
            "/feed/inventory",
            get(handlers::list_inventory).post(handlers::create_inventory),
        )
        .route(
            "/feed/inventory/{id}",
            get(handlers::get_inventory)
                .put(handlers::update_inventory)
                .delete(handlers::delete_inventory),
        )
        .route(
            "/feed/consumption",
            get(handlers::list_consumption).post(handlers::record_consumption),
        )
        .route("/feed/consumption/{id}", delete(handlers::delete_consumption))
        // Health records
        .route(
            "/health/incidents",
            get(handlers::list_incidents).post(handlers::create_incident),
        )
        .route(
            "/health/incidents/{id}",
            get(handlers::get_incident)
                .put(handlers::update_incident)
                .delete(handlers::delete_incident),
        )
        .route(
            "/health/vaccinations",
            get(handlers::list_vaccinations).post(handlers::create_vaccination),
        )
        .route("/health/vaccinations/{id}", delete(handlers::delete_vaccination))
        .route(
            "/health/medications",
            get(handlers::list_medications).post(handlers::create_medication),
        )
        .route("/health/medications/{id}", delete(handlers::delete_medication))
        // Reports
        .route("/reports/{type}/columns", get(handlers::report_columns_for))
        .route("/reports/execute", post(handlers::execute_report))
        .route("/reports/summary", post(handlers::summarize_report))
        .route("/reports/export", post(handlers::export_report))
        .route(
            "/reports/presets",
            get(handlers::list_presets).post(handlers::create_preset),
        )
        .route(
            "/reports/presets/{id}",
            get(handlers::get_preset)
                .put(handlers::update_preset)
                .delete(handlers::delete_preset),
        )
}

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(cors)
        .layer(CompressionLayer::new());

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1())
        .layer(DefaultBodyLimit::max(state.body_limit_bytes))
        .layer(middleware)
        .with_state(state)
}
