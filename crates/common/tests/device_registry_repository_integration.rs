#![cfg(feature = "integration-tests")]

use chrono::{TimeDelta, Utc};
use common::domain::{
    CanonicalId, DeviceRegistryRepository, GetOrCreateDeviceRepoInput, RenameDeviceRepoInput,
};
use common::postgres::{PostgresClient, PostgresConfig, PostgresDeviceRegistryRepository};
use goose::MigrationRunner;
use std::sync::Arc;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

async fn setup_test_db() -> (ContainerAsync<Postgres>, PostgresDeviceRegistryRepository) {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let config = PostgresConfig {
        host: host.to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_pool_size: 16,
    };

    let migrations_dir = format!("{}/migrations/postgres", env!("CARGO_MANIFEST_DIR"));
    let goose_path = which::which("goose").expect("goose binary not found");

    MigrationRunner::new(
        goose_path.to_string_lossy().to_string(),
        migrations_dir,
        "postgres".to_string(),
        config.dsn(),
    )
    .run_migrations()
    .await
    .expect("Migrations failed");

    let client = PostgresClient::new(&config).expect("Failed to create client");
    (postgres, PostgresDeviceRegistryRepository::new(client))
}

fn canonical() -> CanonicalId {
    CanonicalId::parse("aa:bb:cc:dd:ee:ff").unwrap()
}

fn registration(name: &str) -> GetOrCreateDeviceRepoInput {
    GetOrCreateDeviceRepoInput {
        canonical_id: canonical(),
        default_name: name.to_string(),
        legacy_id: Some(name.to_string()),
        seen_at: Utc::now(),
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_concurrent_get_or_create_creates_one_record() {
    let (_container, repo) = setup_test_db().await;
    let repo = Arc::new(repo);

    let mut handles = Vec::new();
    for i in 0..16 {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            repo.get_or_create(registration(&format!("board-{i}"))).await
        }));
    }

    let mut records = Vec::new();
    for handle in handles {
        records.push(handle.await.unwrap().unwrap());
    }

    let first = &records[0];
    assert!(records.iter().all(|r| r.created_at == first.created_at));
    assert!(records.iter().all(|r| r.display_name == first.display_name));
    assert_eq!(repo.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_get_or_create_returns_existing_record() {
    let (_container, repo) = setup_test_db().await;

    let created = repo.get_or_create(registration("RoomB")).await.unwrap();
    let again = repo.get_or_create(registration("SomethingElse")).await.unwrap();

    assert_eq!(again.display_name, "RoomB");
    assert_eq!(again.created_at, created.created_at);
    assert_eq!(again.legacy_id.as_deref(), Some("RoomB"));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_rename_and_touch() {
    let (_container, repo) = setup_test_db().await;
    let created = repo.get_or_create(registration("RoomB")).await.unwrap();

    let renamed = repo
        .rename(RenameDeviceRepoInput {
            canonical_id: canonical(),
            display_name: "Physics Lab".to_string(),
            updated_at: created.updated_at + TimeDelta::seconds(1),
        })
        .await
        .unwrap()
        .expect("record should exist");
    assert_eq!(renamed.display_name, "Physics Lab");
    assert_eq!(renamed.created_at, created.created_at);
    assert_eq!(renamed.legacy_id, created.legacy_id);

    let seen = created.last_seen_at + TimeDelta::minutes(5);
    repo.touch_last_seen(&canonical(), seen).await.unwrap();
    repo.touch_last_seen(&canonical(), created.last_seen_at).await.unwrap();
    let fetched = repo.get(&canonical()).await.unwrap().unwrap();
    assert_eq!(fetched.last_seen_at, seen);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_rename_unknown_device_returns_none() {
    let (_container, repo) = setup_test_db().await;

    let result = repo
        .rename(RenameDeviceRepoInput {
            canonical_id: canonical(),
            display_name: "Ghost".to_string(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(repo.get(&canonical()).await.unwrap().is_none());
}
