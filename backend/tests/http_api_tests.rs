//! Router-level tests: identity headers, role checks, status codes and
//! the JSON envelopes.

#![cfg(feature = "http-server")]

mod support;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use chickerp::db::LocalRepository;
use chickerp::http::{create_router, AppState, REQUEST_ID_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};

fn app(repo: Arc<LocalRepository>) -> Router {
    create_router(AppState::new(repo))
}

fn request(method: Method, uri: &str, role: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        builder = builder
            .header(USER_ID_HEADER, format!("{}-user", role))
            .header(USER_ROLE_HEADER, role);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health_needs_no_identity() {
    let repo = Arc::new(LocalRepository::new());
    let (status, body) = send(app(repo.clone()), request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");

    repo.set_healthy(false);
    let (_, body) = send(app(repo), request(Method::GET, "/health", None, None)).await;
    assert_eq!(body["database"], "disconnected");
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let repo = Arc::new(LocalRepository::new());
    let (status, body) = send(app(repo), request(Method::GET, "/v1/birds", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_role_is_unauthorized() {
    let repo = Arc::new(LocalRepository::new());
    let (status, _) = send(app(repo), request(Method::GET, "/v1/birds", Some("admin"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_viewer_cannot_create_birds() {
    let repo = Arc::new(LocalRepository::new());
    let (status, body) = send(
        app(repo.clone()),
        request(Method::POST, "/v1/birds", Some("viewer"), Some(json!({"name": "Henny"}))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(repo.bird_count(), 0);
}

#[tokio::test]
async fn test_staff_creates_and_viewer_reads_a_bird() {
    let repo = Arc::new(LocalRepository::new());
    let (status, body) = send(
        app(repo.clone()),
        request(
            Method::POST,
            "/v1/birds",
            Some("staff"),
            Some(json!({
                "name": "Henny",
                "sex": "female",
                "identifiers": [{"kind": "leg_band", "value": "H-1"}]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], "Henny");
    assert_eq!(body["data"]["createdBy"], "staff-user");
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(
        app(repo.clone()),
        request(Method::GET, &format!("/v1/birds/{}", id), Some("viewer"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sex"], "female");

    let list = request(Method::GET, "/v1/birds?limit=10", Some("viewer"), None);
    let (status, body) = send(app(repo), list).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["data"][0]["id"], id);
}

#[tokio::test]
async fn test_validation_error_names_the_field() {
    let repo = Arc::new(LocalRepository::new());
    let (status, body) = send(
        app(repo),
        request(Method::POST, "/v1/birds", Some("owner"), Some(json!({"name": "   "}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["field"], "name");
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let repo = Arc::new(LocalRepository::new());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/coops")
        .header(USER_ID_HEADER, "owner-user")
        .header(USER_ROLE_HEADER, "owner")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(app(repo), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("field").is_none());
}

#[tokio::test]
async fn test_missing_bird_is_not_found() {
    let repo = Arc::new(LocalRepository::new());
    let get = request(Method::GET, "/v1/birds/404", Some("viewer"), None);
    let (status, body) = send(app(repo), get).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_non_numeric_id_is_a_bad_request() {
    let repo = Arc::new(LocalRepository::new());
    let get = request(Method::GET, "/v1/birds/abc", Some("viewer"), None);
    let (status, body) = send(app(repo), get).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "id");
}

#[tokio::test]
async fn test_delete_requires_owner_and_returns_no_content() {
    let repo = Arc::new(LocalRepository::new());
    let flock = support::seed_flock(&repo, 0).await;
    let uri = format!("/v1/birds/{}", flock.dam.id);

    let as_staff = request(Method::DELETE, &uri, Some("staff"), None);
    let (status, _) = send(app(repo.clone()), as_staff).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let as_owner = request(Method::DELETE, &uri, Some("owner"), None);
    let (status, body) = send(app(repo.clone()), as_owner).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    assert_eq!(repo.bird_count(), 1);
}

#[tokio::test]
async fn test_composition_preview_blends_parents() {
    let repo = Arc::new(LocalRepository::new());
    let flock = support::seed_flock(&repo, 0).await;
    let uri = format!(
        "/v1/breeds/composition-preview?sireId={}&damId={}",
        flock.sire.id, flock.dam.id
    );

    let (status, body) = send(app(repo), request(Method::GET, &uri, Some("viewer"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["composition"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["total"], 100.0);
    assert_eq!(body["data"]["complete"], true);
}

#[tokio::test]
async fn test_report_columns_and_invalid_type() {
    let repo = Arc::new(LocalRepository::new());
    let (status, body) = send(
        app(repo.clone()),
        request(Method::GET, "/v1/reports/eggs/columns", Some("viewer"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["defaultSortColumn"], "createdAt");
    assert!(body["data"]["columns"].as_array().unwrap().len() > 5);

    let (status, body) = send(
        app(repo),
        request(Method::GET, "/v1/reports/ducks/columns", Some("viewer"), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "reportType");
}

#[tokio::test]
async fn test_execute_report_returns_a_page() {
    let repo = Arc::new(LocalRepository::new());
    support::seed_flock(&repo, 2).await;
    let (status, body) = send(
        app(repo),
        request(
            Method::POST,
            "/v1/reports/execute",
            Some("viewer"),
            Some(json!({"reportType": "birds", "filters": {"coop": ["South"]}, "limit": 1})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["rows"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_offset_beyond_bigint_range_is_a_bad_request() {
    let repo = Arc::new(LocalRepository::new());
    let body = json!({"reportType": "birds", "offset": 9_223_372_036_854_775_808u64});
    let (status, body) = send(
        app(repo),
        request(Method::POST, "/v1/reports/execute", Some("viewer"), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "offset");
}

#[tokio::test]
async fn test_export_is_served_as_csv_attachment() {
    let repo = Arc::new(LocalRepository::new());
    support::seed_flock(&repo, 1).await;
    let before = chrono::Utc::now().date_naive();
    let response = app(repo)
        .oneshot(request(
            Method::POST,
            "/v1/reports/export",
            Some("viewer"),
            Some(json!({
                "reportType": "birds",
                "columns": ["name"],
                "sortColumn": "name",
                "sortDirection": "asc"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    let after = chrono::Utc::now().date_naive();
    let expected = |date: chrono::NaiveDate| {
        format!("attachment; filename=\"birds_export_{}.csv\"", date.format("%Y-%m-%d"))
    };
    assert!(
        disposition == expected(before) || disposition == expected(after),
        "{}",
        disposition
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(
        String::from_utf8(bytes.to_vec()).unwrap(),
        "Name\nBruno\nChick 1\nDaisy\n"
    );
}

#[tokio::test]
async fn test_presets_are_private_to_their_owner() {
    let repo = Arc::new(LocalRepository::new());
    let (status, body) = send(
        app(repo.clone()),
        request(
            Method::POST,
            "/v1/reports/presets",
            Some("viewer"),
            Some(json!({"name": "Layers", "reportType": "birds", "config": {"columns": ["name"]}})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/v1/reports/presets/{}", body["data"]["id"]);

    let as_viewer = request(Method::GET, &uri, Some("viewer"), None);
    let (status, _) = send(app(repo.clone()), as_viewer).await;

    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(app(repo), request(Method::GET, &uri, Some("owner"), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_request_id_is_generated_and_propagated() {
    let repo = Arc::new(LocalRepository::new());
    let response = app(repo.clone())
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .unwrap();
    let generated = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert_eq!(generated.len(), 36);

    let response = app(repo)
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(REQUEST_ID_HEADER, "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc-123");
}
