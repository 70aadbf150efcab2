//! Behaviour of the in-memory repository through the service layer:
//! cascades, atomic rejection of invalid writes and feed stock keeping.

mod support;

use chickerp::api::*;
use chickerp::db::repository::{
    BirdRepository, CatalogRepository, EggRepository, FeedRepository, HealthRepository,
    PresetRepository, RepositoryError,
};
use chickerp::db::services::{self, ServiceError};
use chickerp::db::LocalRepository;
use support::{bird_input, band, coop_input, date, incident_input, inventory_input, ACTOR};

fn field_of(err: ServiceError) -> String {
    match err {
        ServiceError::Validation(e) => e.field,
        ServiceError::Repository(RepositoryError::ValidationError { context, .. }) => {
            context.field.unwrap_or_default()
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_full_coop_rejects_bird_without_partial_write() {
    let repo = LocalRepository::new();
    let coop = services::create_coop(&repo, coop_input("Tiny", Some(1))).await.unwrap();

    let mut first = bird_input("Hen 1", Sex::Female);
    first.coop_id = Some(coop.coop.id);
    services::create_bird(&repo, first, ACTOR).await.unwrap();

    let mut second = bird_input("Hen 2", Sex::Female);
    second.coop_id = Some(coop.coop.id);
    second.identifiers = vec![band("T-2")];
    let err = services::create_bird(&repo, second, ACTOR).await.unwrap_err();
    assert_eq!(field_of(err), "coopId");

    assert_eq!(repo.bird_count(), 1);
    let coop = repo.get_coop(coop.coop.id).await.unwrap();
    assert_eq!(coop.occupancy, 1);
}

#[tokio::test]
async fn test_inactive_birds_do_not_count_towards_capacity() {
    let repo = LocalRepository::new();
    let coop = services::create_coop(&repo, coop_input("Tiny", Some(1))).await.unwrap();

    let mut sold = bird_input("Sold hen", Sex::Female);
    sold.coop_id = Some(coop.coop.id);
    sold.status = BirdStatus::Sold;
    services::create_bird(&repo, sold, ACTOR).await.unwrap();

    let mut active = bird_input("Active hen", Sex::Female);
    active.coop_id = Some(coop.coop.id);
    services::create_bird(&repo, active, ACTOR).await.unwrap();

    assert_eq!(repo.get_coop(coop.coop.id).await.unwrap().occupancy, 1);
}

#[tokio::test]
async fn test_duplicate_band_number_is_rejected() {
    let repo = LocalRepository::new();
    let mut first = bird_input("Hen 1", Sex::Female);
    first.identifiers = vec![band("LB-7")];
    services::create_bird(&repo, first, ACTOR).await.unwrap();

    let mut second = bird_input("Hen 2", Sex::Female);
    second.identifiers = vec![band("LB-7")];
    let err = services::create_bird(&repo, second, ACTOR).await.unwrap_err();
    assert_eq!(field_of(err), "identifiers[0].value");
}

#[tokio::test]
async fn test_updating_a_bird_keeps_its_own_band() {
    let repo = LocalRepository::new();
    let mut input = bird_input("Hen", Sex::Female);
    input.identifiers = vec![band("LB-9")];
    let bird = services::create_bird(&repo, input.clone(), ACTOR).await.unwrap();

    input.notes = Some("Broody".to_string());
    let updated = services::update_bird(&repo, bird.id, input, ACTOR).await.unwrap();
    assert_eq!(updated.identifier(IdentifierKind::LegBand), Some("LB-9"));
    assert_eq!(updated.notes.as_deref(), Some("Broody"));
}

#[tokio::test]
async fn test_deleting_a_bird_cascades_and_clears_parent_links() {
    let repo = LocalRepository::new();
    let flock = support::seed_flock(&repo, 2).await;
    let dam_id = flock.dam.id;

    services::add_weight(
        &repo,
        dam_id,
        WeightInput {
            recorded_on: date(2024, 6, 1),
            weight_grams: 2100.0,
            notes: None,
        },
    )
    .await
    .unwrap();
    services::create_incident(&repo, incident_input(dam_id, Severity::Low), ACTOR)
        .await
        .unwrap();
    let egg = services::create_egg(
        &repo,
        EggInput {
            dam_id: Some(dam_id),
            sire_id: Some(flock.sire.id),
            coop_id: None,
            laid_date: date(2024, 6, 2),
            weight_grams: Some(55.0),
            shell_quality: Some(ShellQuality::Good),
            shell_color: None,
            outcome: EggOutcome::Pending,
            incubation_start: None,
            hatch_date: None,
            notes: None,
        },
        ACTOR,
    )
    .await
    .unwrap();

    services::delete_bird(&repo, dam_id).await.unwrap();

    assert!(repo.get_bird(dam_id).await.unwrap_err().is_not_found());
    assert!(repo.list_weights(dam_id).await.is_err());
    let incidents = repo
        .list_incidents(Some(dam_id), ListParams::default())
        .await
        .unwrap();
    assert_eq!(incidents.total, 0);
    for chick in &flock.chicks {
        let chick = repo.get_bird(chick.id).await.unwrap();
        assert_eq!(chick.dam_id, None);
        assert_eq!(chick.sire_id, Some(flock.sire.id));
    }
    let egg = repo.get_egg(egg.id).await.unwrap();
    assert_eq!(egg.dam_id, None);
    assert_eq!(egg.sire_id, Some(flock.sire.id));
}

#[tokio::test]
async fn test_offspring_and_recalculated_composition() {
    let repo = LocalRepository::new();
    let flock = support::seed_flock(&repo, 3).await;

    let offspring = services::list_offspring(&repo, flock.sire.id).await.unwrap();
    assert_eq!(offspring.len(), 3);

    let chick = &flock.chicks[0];
    assert_eq!(chick.breed_composition.len(), 2);
    repo.set_breed_composition(chick.id, &[]).await.unwrap();
    let recalculated = services::recalculate_composition(&repo, chick.id).await.unwrap();
    assert_eq!(recalculated.breed_composition, chick.breed_composition);
}

#[tokio::test]
async fn test_breed_in_use_cannot_be_deleted() {
    let repo = LocalRepository::new();
    let flock = support::seed_flock(&repo, 0).await;

    let err = services::delete_breed(&repo, flock.silkie.id).await.unwrap_err();
    assert_eq!(field_of(err), "breedId");

    let unused = services::create_breed(&repo, support::breed_input("Brahma")).await.unwrap();
    services::delete_breed(&repo, unused.id).await.unwrap();
}

#[tokio::test]
async fn test_breed_names_are_unique_ignoring_case() {
    let repo = LocalRepository::new();
    services::create_breed(&repo, support::breed_input("Silkie")).await.unwrap();
    let err = services::create_breed(&repo, support::breed_input("  silkie "))
        .await
        .unwrap_err();
    assert_eq!(field_of(err), "name");
}

#[tokio::test]
async fn test_feed_consumption_tracks_stock() {
    let repo = LocalRepository::new();
    let lot = services::create_inventory(&repo, inventory_input(25.0)).await.unwrap();

    let usage = services::record_consumption(
        &repo,
        FeedConsumptionInput {
            inventory_id: lot.id,
            coop_id: None,
            quantity_kg: 10.0,
            consumed_on: date(2024, 3, 2),
            notes: None,
        },
        ACTOR,
    )
    .await
    .unwrap();
    assert_eq!(usage.created_by, ACTOR);
    assert_eq!(repo.get_inventory(lot.id).await.unwrap().quantity_kg, 15.0);

    let err = services::record_consumption(
        &repo,
        FeedConsumptionInput {
            inventory_id: lot.id,
            coop_id: None,
            quantity_kg: 20.0,
            consumed_on: date(2024, 3, 3),
            notes: None,
        },
        ACTOR,
    )
    .await
    .unwrap_err();
    assert_eq!(field_of(err), "quantityKg");
    assert_eq!(repo.get_inventory(lot.id).await.unwrap().quantity_kg, 15.0);

    let err = services::delete_inventory(&repo, lot.id).await.unwrap_err();
    assert_eq!(field_of(err), "inventoryId");

    services::delete_consumption(&repo, usage.id).await.unwrap();
    assert_eq!(repo.get_inventory(lot.id).await.unwrap().quantity_kg, 25.0);
    services::delete_inventory(&repo, lot.id).await.unwrap();
}

#[tokio::test]
async fn test_consumption_for_missing_coop_is_rejected() {
    let repo = LocalRepository::new();
    let lot = services::create_inventory(&repo, inventory_input(5.0)).await.unwrap();
    let err = services::record_consumption(
        &repo,
        FeedConsumptionInput {
            inventory_id: lot.id,
            coop_id: Some(CoopId(999)),
            quantity_kg: 1.0,
            consumed_on: date(2024, 3, 2),
            notes: None,
        },
        ACTOR,
    )
    .await
    .unwrap_err();
    assert_eq!(field_of(err), "coopId");
    assert_eq!(repo.get_inventory(lot.id).await.unwrap().quantity_kg, 5.0);
}

#[tokio::test]
async fn test_health_records_require_an_existing_bird() {
    let repo = LocalRepository::new();
    let err = services::create_incident(&repo, incident_input(BirdId(42), Severity::High), ACTOR)
        .await
        .unwrap_err();
    assert_eq!(field_of(err), "birdId");
}

#[tokio::test]
async fn test_only_one_default_preset_per_owner_and_type() {
    let repo = LocalRepository::new();
    let preset = |name: &str| PresetInput {
        name: name.to_string(),
        description: None,
        report_type: ReportType::Birds,
        config: PresetConfig::default(),
        is_default: true,
    };

    let first = services::create_preset(&repo, "alice", preset("First")).await.unwrap();
    let second = services::create_preset(&repo, "alice", preset("Second")).await.unwrap();
    let other_owner = services::create_preset(&repo, "bob", preset("Bob's")).await.unwrap();

    assert!(!repo.get_preset(first.id).await.unwrap().is_default);
    assert!(repo.get_preset(second.id).await.unwrap().is_default);
    assert!(repo.get_preset(other_owner.id).await.unwrap().is_default);

    let mine = services::list_presets(&repo, "alice", Some(ReportType::Birds)).await.unwrap();
    assert_eq!(mine.len(), 2);
}

#[tokio::test]
async fn test_unhealthy_repository_reports_connection_errors() {
    let repo = LocalRepository::new();
    repo.set_healthy(false);

    assert!(!repo.health_check().await.unwrap());
    let err = repo.list_breeds().await.unwrap_err();
    assert!(matches!(err, RepositoryError::ConnectionError { .. }));

    repo.set_healthy(true);
    assert!(repo.list_breeds().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bird_search_matches_name_and_band() {
    let repo = LocalRepository::new();
    support::seed_flock(&repo, 2).await;

    let filter = BirdFilter {
        search: Some("b-00".to_string()),
        ..Default::default()
    };
    let page = services::list_birds(&repo, &filter, ListParams::default()).await.unwrap();
    assert_eq!(page.total, 2);

    let filter = BirdFilter {
        search: Some("chick".to_string()),
        ..Default::default()
    };
    let page = services::list_birds(&repo, &filter, ListParams::new(Some(1), None)).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.data.len(), 1);
}

#[tokio::test]
async fn test_egg_list_rejects_inverted_date_range() {
    let repo = LocalRepository::new();
    let filter = EggFilter {
        from: Some(date(2024, 6, 10)),
        to: Some(date(2024, 6, 1)),
        ..Default::default()
    };
    let err = services::list_eggs(&repo, &filter, ListParams::default()).await.unwrap_err();
    assert_eq!(field_of(err), "to");
    let all = repo
        .list_eggs(&EggFilter::default(), ListParams::default())
        .await
        .unwrap();
    assert!(all.data.is_empty());

}
