//! Tests for db::factory and db::repo_config - repository selection and
//! configuration loading.

mod support;

use std::io::Write;
use std::str::FromStr;

use chickerp::db::factory::{RepositoryFactory, RepositoryType};
use chickerp::db::repository::{BirdRepository, CatalogRepository};
use chickerp::db::{RepositoryBuilder, RepositoryConfig};

const CLEAN_ENV: &[(&str, Option<&str>)] = &[
    ("REPOSITORY_TYPE", None),
    ("DATABASE_URL", None),
    ("PG_DATABASE_URL", None),
    ("HOST", None),
    ("PORT", None),
];

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_repository_type_from_str() {
    assert_eq!(RepositoryType::from_str("postgres").unwrap(), RepositoryType::Postgres);
    assert_eq!(RepositoryType::from_str("PG").unwrap(), RepositoryType::Postgres);
    assert_eq!(RepositoryType::from_str(" Local ").unwrap(), RepositoryType::Local);
    assert_eq!(RepositoryType::from_str("memory").unwrap(), RepositoryType::Local);
}

#[test]
fn test_repository_type_from_str_invalid() {
    let err = RepositoryType::from_str("sqlite").unwrap_err();
    assert!(err.contains("Unknown repository type"));
}

#[test]
fn test_repository_type_from_env_default() {
    support::with_scoped_env(CLEAN_ENV, || {
        assert_eq!(RepositoryType::from_env(), RepositoryType::Local);
    });
}

#[test]
fn test_repository_type_from_env_with_database_url() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", None),
            ("DATABASE_URL", Some("postgres://localhost/chickerp")),
        ],
        || {
            assert_eq!(RepositoryType::from_env(), RepositoryType::Postgres);
        },
    );
}

#[test]
fn test_repository_type_from_env_with_pg_database_url() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", None),
            ("DATABASE_URL", None),
            ("PG_DATABASE_URL", Some("postgres://localhost/chickerp")),
        ],
        || {
            assert_eq!(RepositoryType::from_env(), RepositoryType::Postgres);
        },
    );
}

#[test]
fn test_explicit_repository_type_wins_over_database_url() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", Some("local")),
            ("DATABASE_URL", Some("postgres://localhost/chickerp")),
        ],
        || {
            assert_eq!(RepositoryType::from_env(), RepositoryType::Local);
        },
    );
}

#[test]
fn test_repository_type_from_env_invalid_defaults_to_local() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", Some("invalid")),
            ("DATABASE_URL", None),
            ("PG_DATABASE_URL", None),
        ],
        || {
            assert_eq!(RepositoryType::from_env(), RepositoryType::Local);
        },
    );
}

#[tokio::test]
async fn test_create_local_via_factory() {
    let repo = RepositoryFactory::create(RepositoryType::Local, None)
        .await
        .unwrap();
    assert!(repo.health_check().await.unwrap());
    assert!(repo.list_breeds().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_builder_with_explicit_local_type() {
    let repo = RepositoryBuilder::new()
        .repository_type(RepositoryType::Local)
        .build()
        .await
        .unwrap();
    assert!(repo.health_check().await.unwrap());
}

#[cfg(feature = "postgres-repo")]
#[tokio::test]
async fn test_create_postgres_without_config_fails() {
    let err = RepositoryFactory::create(RepositoryType::Postgres, None)
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("requires PostgresConfig"));
}

#[cfg(not(feature = "postgres-repo"))]
#[tokio::test]
async fn test_create_postgres_without_feature_fails() {
    let err = RepositoryFactory::create(RepositoryType::Postgres, None)
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("feature not enabled"));
}

#[tokio::test]
async fn test_factory_from_local_config_file() {
    let file = config_file("[repository]\ntype = \"local\"\n");
    let repo = RepositoryFactory::from_config_file(file.path()).await.unwrap();
    assert!(repo.health_check().await.unwrap());
}

#[tokio::test]
async fn test_factory_rejects_unknown_type_in_config_file() {
    let file = config_file("[repository]\ntype = \"sqlite\"\n");
    let err = RepositoryFactory::from_config_file(file.path())
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("Invalid repository type"));
}

#[test]
fn test_config_file_missing_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = RepositoryConfig::from_file(dir.path().join("chickerp.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_config_file_with_bad_toml_is_rejected() {
    let file = config_file("[server\nport = ");
    let err = RepositoryConfig::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_server_section_is_read_from_file() {
    let file = config_file("[server]\nhost = \"127.0.0.1\"\nport = 9000\n");
    let config = RepositoryConfig::from_file(file.path()).unwrap();
    assert_eq!(config.server.bind_address(), "127.0.0.1:9000");
    assert_eq!(config.repository.repo_type, "local");
}

#[test]
fn test_env_overrides_take_precedence_over_file() {
    let file = config_file("[server]\nhost = \"127.0.0.1\"\nport = 9000\n");
    support::with_scoped_env(
        &[
            ("HOST", Some("10.0.0.5")),
            ("PORT", Some("7070")),
            ("REPOSITORY_TYPE", Some("postgres")),
            ("DATABASE_URL", Some("postgres://farm@db/chickerp")),
        ],
        || {
            let config = RepositoryConfig::from_file(file.path())
                .unwrap()
                .with_env_overrides();
            assert_eq!(config.server.bind_address(), "10.0.0.5:7070");
            assert_eq!(config.repository_type().unwrap(), RepositoryType::Postgres);
            assert_eq!(config.postgres.database_url, "postgres://farm@db/chickerp");
        },
    );
}

#[test]
fn test_unparseable_port_keeps_file_value() {
    let file = config_file("[server]\nport = 9000\n");
    let mut changes = CLEAN_ENV.to_vec();
    changes.push(("PORT", Some("not-a-port")));
    support::with_scoped_env(&changes, || {
        let config = RepositoryConfig::from_file(file.path())
            .unwrap()
            .with_env_overrides();
        assert_eq!(config.server.port, 9000);
    });
}
