#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::NaiveDate;
use chickerp::api::*;
use chickerp::db::services;
use chickerp::db::LocalRepository;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

pub const ACTOR: &str = "farmhand";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn bird_input(name: &str, sex: Sex) -> BirdInput {
    BirdInput {
        name: name.to_string(),
        sex,
        ..Default::default()
    }
}

pub fn band(value: &str) -> BirdIdentifier {
    BirdIdentifier {
        kind: IdentifierKind::LegBand,
        value: value.to_string(),
    }
}

pub fn coop_input(name: &str, capacity: Option<i32>) -> CoopInput {
    CoopInput {
        name: name.to_string(),
        capacity,
        location: None,
        is_active: true,
        notes: None,
    }
}

pub fn inventory_input(quantity_kg: f64) -> FeedInventoryInput {
    FeedInventoryInput {
        feed_type: FeedType::Layer,
        brand: Some("Golden Grain".to_string()),
        quantity_kg,
        unit_cost: Some(0.8),
        purchase_date: date(2024, 3, 1),
        expiry_date: None,
        notes: None,
    }
}

pub fn incident_input(bird_id: BirdId, severity: Severity) -> IncidentInput {
    IncidentInput {
        bird_id,
        incident_date: date(2024, 4, 2),
        category: IncidentCategory::Respiratory,
        severity,
        description: "Sneezing".to_string(),
        treatment: None,
        resolved: false,
        resolved_date: None,
    }
}

/// Small flock used across report and API tests.
pub struct Flock {
    pub silkie: Breed,
    pub orpington: Breed,
    pub north: CoopSummary,
    pub south: CoopSummary,
    pub sire: Bird,
    pub dam: Bird,
    pub chicks: Vec<Bird>,
}

/// Seeds two breeds, two coops, a pure-bred pair in the north coop and
/// `chicks` crossbred offspring in the south coop.
pub async fn seed_flock(repo: &LocalRepository, chicks: usize) -> Flock {
    let silkie = services::create_breed(repo, breed_input("Silkie")).await.unwrap();
    let orpington = services::create_breed(repo, breed_input("Orpington")).await.unwrap();
    let north = services::create_coop(repo, coop_input("North", None)).await.unwrap();
    let south = services::create_coop(repo, coop_input("South", None)).await.unwrap();

    let mut sire = bird_input("Bruno", Sex::Male);
    sire.coop_id = Some(north.coop.id);
    sire.breed_composition = Some(vec![BreedShare::new(silkie.id, 100.0)]);
    sire.identifiers = vec![band("B-001")];
    let sire = services::create_bird(repo, sire, ACTOR).await.unwrap();

    let mut dam = bird_input("Daisy", Sex::Female);
    dam.coop_id = Some(north.coop.id);
    dam.breed_composition = Some(vec![BreedShare::new(orpington.id, 100.0)]);
    dam.identifiers = vec![band("B-002")];
    let dam = services::create_bird(repo, dam, ACTOR).await.unwrap();

    let mut offspring = Vec::with_capacity(chicks);
    for i in 0..chicks {
        let mut chick = bird_input(&format!("Chick {}", i + 1), Sex::Unknown);
        chick.coop_id = Some(south.coop.id);
        chick.sire_id = Some(sire.id);
        chick.dam_id = Some(dam.id);
        chick.hatch_date = Some(date(2024, 5, 1 + i as u32 % 28));
        offspring.push(services::create_bird(repo, chick, ACTOR).await.unwrap());
    }

    Flock {
        silkie,
        orpington,
        north,
        south,
        sire,
        dam,
        chicks: offspring,
    }
}

pub fn breed_input(name: &str) -> BreedInput {
    BreedInput {
        name: name.to_string(),
        ..Default::default()
    }
}
