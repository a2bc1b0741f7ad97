mod common;

use shortener::config::{DatabaseKind, StorageBackend, StorageConfig};
use shortener::storage::{RepositoryFactory, SeaOrmRepository, UrlRepository};
use tempfile::TempDir;

/// 每个测试使用独立的临时 SQLite 文件
async fn sqlite_repo() -> (TempDir, SeaOrmRepository) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("links.db").display());
    let repo = SeaOrmRepository::initialize(&url, DatabaseKind::Sqlite, &StorageConfig::default())
        .await
        .unwrap();
    (dir, repo)
}

#[tokio::test]
async fn test_distinct_urls_get_distinct_keys() {
    let (_dir, repo) = sqlite_repo().await;
    common::distinct_urls_get_distinct_keys(&repo).await;
}

#[tokio::test]
async fn test_duplicate_in_one_call_resolves_to_first() {
    let (_dir, repo) = sqlite_repo().await;
    common::duplicate_in_one_call_resolves_to_first(&repo).await;
}

#[tokio::test]
async fn test_duplicate_across_calls_keeps_count() {
    let (_dir, repo) = sqlite_repo().await;
    common::duplicate_across_calls_keeps_count(&repo).await;
}

#[tokio::test]
async fn test_empty_url_is_rejected() {
    let (_dir, repo) = sqlite_repo().await;
    common::empty_url_is_rejected(&repo).await;
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (_dir, repo) = sqlite_repo().await;
    common::delete_is_idempotent(&repo).await;
}

#[tokio::test]
async fn test_delete_by_other_user_is_ignored() {
    let (_dir, repo) = sqlite_repo().await;
    common::delete_by_other_user_is_ignored(&repo).await;
}

#[tokio::test]
async fn test_deleted_key_is_still_found() {
    let (_dir, repo) = sqlite_repo().await;
    common::deleted_key_is_still_found(&repo).await;
}

#[tokio::test]
async fn test_deleted_events_are_hidden() {
    let (_dir, repo) = sqlite_repo().await;
    common::deleted_events_are_hidden(&repo).await;
}

#[tokio::test]
async fn test_save_after_delete_creates_new_key() {
    let (_dir, repo) = sqlite_repo().await;
    common::save_after_delete_creates_new_key(&repo).await;
}

#[tokio::test]
async fn test_stats_count_live_urls_and_owners() {
    let (_dir, repo) = sqlite_repo().await;
    common::stats_count_live_urls_and_owners(&repo).await;
}

#[tokio::test]
async fn test_caller_key_is_kept_when_free() {
    let (_dir, repo) = sqlite_repo().await;
    common::caller_key_is_kept_when_free(&repo).await;
}

#[tokio::test]
async fn test_data_survives_reconnect() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("links.db").display());
    let config = StorageConfig::default();

    let key = {
        let repo = SeaOrmRepository::initialize(&url, DatabaseKind::Sqlite, &config)
            .await
            .unwrap();
        let key = common::save_one(&repo, "https://persist.example.com", "u1").await;
        common::delete(&repo, "u1", &[&key]).await;
        key
    };

    // 迁移可重复执行
    let repo = SeaOrmRepository::initialize(&url, DatabaseKind::Sqlite, &config)
        .await
        .unwrap();
    let event = repo.get(&key).await.unwrap().unwrap();
    assert!(event.deleted);
    assert_eq!(event.user_id, "u1");
}

#[tokio::test]
async fn test_factory_selects_relational_backend() {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig {
        database_dsn: Some(format!("sqlite://{}", dir.path().join("f.db").display())),
        file_storage_path: Some("ignored.json".to_string()),
        ..StorageConfig::default()
    };
    assert!(matches!(
        config.backend().unwrap(),
        StorageBackend::Relational {
            kind: DatabaseKind::Sqlite,
            ..
        }
    ));

    let repo = RepositoryFactory::create(&config).await.unwrap();
    assert_eq!(repo.backend_name(), "sqlite");
    repo.ping().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_database_fails_initialize() {
    let config = StorageConfig {
        database_dsn: Some("postgres://nobody@127.0.0.1:1/none".to_string()),
        retry_count: 0,
        ..StorageConfig::default()
    };
    assert!(RepositoryFactory::create(&config).await.is_err());
}
