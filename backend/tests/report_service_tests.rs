//! Report builder end to end against the in-memory repository.

mod support;

use chickerp::api::*;
use chickerp::db::services::{self, ServiceError};
use chickerp::db::LocalRepository;
use support::{date, incident_input, ACTOR};

fn names(page: &ReportPage) -> Vec<String> {
    page.rows.iter().map(|r| r.get("name").to_string()).collect()
}

#[tokio::test]
async fn test_default_query_uses_default_columns_and_newest_first() {
    let repo = LocalRepository::new();
    let flock = support::seed_flock(&repo, 2).await;

    let page = services::execute_report(&repo, &ReportQuery::new(ReportType::Birds))
        .await
        .unwrap();

    let column_ids: Vec<&str> = page.columns.iter().map(|c| c.id).collect();
    assert_eq!(
        column_ids,
        vec!["name", "bandNumber", "sex", "status", "breed", "coop", "hatchDate"]
    );
    assert_eq!(page.total, 4);
    assert_eq!(page.rows[0].id, flock.chicks[1].id.value());
    assert_eq!(page.rows[3].id, flock.sire.id.value());
}

#[tokio::test]
async fn test_breed_filter_total_ignores_window() {
    let repo = LocalRepository::new();
    let flock = support::seed_flock(&repo, 5).await;

    let query = ReportQuery::new(ReportType::Birds)
        .with_filter("breed", &[&flock.silkie.id.to_string()])
        .with_sort("name", "asc")
        .with_window(2, 1);
    let page = services::execute_report(&repo, &query).await.unwrap();

    // Bruno plus five crossbred chicks carry Silkie.
    assert_eq!(page.total, 6);
    assert_eq!(page.limit, 2);
    assert_eq!(page.offset, 1);
    assert_eq!(names(&page), vec!["Chick 1", "Chick 2"]);
}

#[tokio::test]
async fn test_relation_filter_matches_coop_by_name() {
    let repo = LocalRepository::new();
    support::seed_flock(&repo, 3).await;

    let query = ReportQuery::new(ReportType::Birds)
        .with_filter("coop", &["North"])
        .with_sort("name", "asc");
    let page = services::execute_report(&repo, &query).await.unwrap();
    assert_eq!(names(&page), vec!["Bruno", "Daisy"]);
    assert_eq!(page.rows[0].get("coop"), &CellValue::text("North"));

    let query = ReportQuery::new(ReportType::Birds).with_filter("coop", &["Nowhere"]);
    let page = services::execute_report(&repo, &query).await.unwrap();
    assert_eq!(page.total, 0);
    assert!(page.rows.is_empty());
}

#[tokio::test]
async fn test_filters_on_different_columns_are_combined() {
    let repo = LocalRepository::new();
    support::seed_flock(&repo, 2).await;

    let query = ReportQuery::new(ReportType::Birds)
        .with_filter("coop", &["North", "South"])
        .with_filter("sex", &["male", "female"]);
    let page = services::execute_report(&repo, &query).await.unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn test_unknown_column_is_a_report_error() {
    let repo = LocalRepository::new();
    let mut query = ReportQuery::new(ReportType::Birds);
    query.columns = vec!["name".to_string(), "wingspan".to_string()];

    let err = services::execute_report(&repo, &query).await.unwrap_err();
    match err {
        ServiceError::Report(e) => assert_eq!(e.field(), "columns[1]"),
        other => panic!("expected a report error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sorting_by_unsortable_column_is_rejected() {
    let repo = LocalRepository::new();
    let query = ReportQuery::new(ReportType::Birds).with_sort("notes", "asc");
    let err = services::execute_report(&repo, &query).await.unwrap_err();
    assert!(matches!(err, ServiceError::Report(ReportError::NotSortable(_))));
}

#[tokio::test]
async fn test_summary_groups_whole_result() {
    let repo = LocalRepository::new();
    support::seed_flock(&repo, 3).await;

    let mut query = ReportQuery::new(ReportType::Birds).with_window(1, 0);
    query.columns = vec!["coop".to_string()];
    let summary = services::summarize_report(&repo, &query).await.unwrap();

    assert_eq!(summary.total, 5);
    let groups: Vec<(&str, usize)> = summary
        .groups
        .iter()
        .map(|g| (g.key.as_str(), g.count))
        .collect();
    assert_eq!(groups, vec![("South", 3), ("North", 2)]);
}

#[tokio::test]
async fn test_export_renders_every_row_with_labels() {
    let repo = LocalRepository::new();
    support::seed_flock(&repo, 2).await;

    let mut query = ReportQuery::new(ReportType::Birds)
        .with_sort("name", "asc")
        .with_window(1, 0);
    query.columns = vec!["name".to_string(), "bandNumber".to_string()];

    let export = services::export_report(&repo, &query, false, date(2024, 7, 4))
        .await
        .unwrap();
    assert_eq!(export.filename, "birds_export_2024-07-04.csv");
    let lines: Vec<&str> = export.content.lines().collect();
    assert_eq!(
        lines,
        vec!["Name,Band Number", "Bruno,B-001", "Chick 1,", "Chick 2,", "Daisy,B-002"]
    );

    let localized = services::export_report(&repo, &query, true, date(2024, 7, 4))
        .await
        .unwrap();
    assert!(localized.content.starts_with("ชื่อ,หมายเลขห่วงขา\n"));
}

#[tokio::test]
async fn test_health_report_filters_by_severity() {
    let repo = LocalRepository::new();
    let flock = support::seed_flock(&repo, 1).await;
    services::create_incident(&repo, incident_input(flock.dam.id, Severity::High), ACTOR)
        .await
        .unwrap();
    services::create_incident(&repo, incident_input(flock.sire.id, Severity::Low), ACTOR)
        .await
        .unwrap();

    let query = ReportQuery::new(ReportType::Health).with_filter("severity", &["high"]);
    let page = services::execute_report(&repo, &query).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].get("bird"), &CellValue::text("Daisy"));

    let query = ReportQuery::new(ReportType::Health).with_filter("severity", &["severe"]);
    let err = services::execute_report(&repo, &query).await.unwrap_err();
    match err {
        ServiceError::Report(e) => assert_eq!(e.field(), "filters.severity"),
        other => panic!("expected a report error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_preset_config_round_trips_into_a_query() {
    let repo = LocalRepository::new();
    support::seed_flock(&repo, 1).await;

    let mut config = PresetConfig {
        columns: vec!["name".to_string(), "sex".to_string()],
        sort_column: Some("name".to_string()),
        sort_direction: Some(SortDirection::Asc),
        ..Default::default()
    };
    config
        .filters
        .insert("coop".to_string(), vec!["North".to_string()]);
    let preset = services::create_preset(
        &repo,
        "alice",
        PresetInput {
            name: "Breeders".to_string(),
            description: None,
            report_type: ReportType::Birds,
            config,
            is_default: false,
        },
    )
    .await
    .unwrap();

    let query = ReportQuery::from_preset(preset.report_type, &preset.config);
    let page = services::execute_report(&repo, &query).await.unwrap();
    assert_eq!(names(&page), vec!["Bruno", "Daisy"]);
}
