//! Mutation operations for SeaOrmRepository
//!
//! Inserts are issued one statement per event, so a failure part-way
//! through a save leaves earlier rows committed. Soft deletes for all
//! batches run in a single transaction, retried as a whole on transient
//! errors.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    TransactionTrait,
};
use tracing::{debug, info};

use super::SeaOrmRepository;
use super::converters::event_to_active_model;
use crate::errors::{Result, ShortenerError};
use crate::storage::{
    DeleteRequestBatch, Event, conflicts_to_result, ensure_original_url, generate_short_key,
};

use migration::entities::url;

/// 生成不冲突短码的最大尝试次数
const MAX_KEY_ATTEMPTS: usize = 8;

impl SeaOrmRepository {
    pub(super) async fn insert_events(&self, events: &mut [Event]) -> Result<()> {
        let mut conflicts = Vec::new();

        for event in events.iter_mut() {
            ensure_original_url(event)?;

            if let Some(existing) = self.find_short_key_by_url(&event.original_url).await? {
                debug!(
                    "URL already shortened: {} -> {}",
                    event.original_url, existing
                );
                event.short_key = existing;
                conflicts.push(event.original_url.clone());
                continue;
            }

            event.short_key = self.unique_key(&event.short_key).await?;
            event.deleted = false;

            let db = &self.db;
            let model = event_to_active_model(event, Utc::now());
            self.retry
                .run(&format!("insert({})", event.short_key), || {
                    let model = model.clone();
                    async move { url::Entity::insert(model).exec_without_returning(db).await }
                })
                .await
                .map_err(|e| {
                    ShortenerError::database_operation(format!(
                        "Failed to insert short link {}: {}",
                        event.short_key, e
                    ))
                })?;

            debug!("Short link saved: {}", event.short_key);
        }

        conflicts_to_result(conflicts)
    }

    async fn unique_key(&self, candidate: &str) -> Result<String> {
        let mut key = candidate.to_string();
        for _ in 0..MAX_KEY_ATTEMPTS {
            if !key.is_empty() && !self.key_exists(&key).await? {
                return Ok(key);
            }
            key = generate_short_key();
        }

        Err(ShortenerError::database_operation(format!(
            "Could not find a free short key after {} attempts",
            MAX_KEY_ATTEMPTS
        )))
    }

    pub(super) async fn soft_delete(&self, batches: &[DeleteRequestBatch]) -> Result<()> {
        let batches: Vec<&DeleteRequestBatch> = batches
            .iter()
            .filter(|b| !b.user_id.is_empty() && !b.short_keys.is_empty())
            .collect();
        if batches.is_empty() {
            return Ok(());
        }

        let db = &self.db;
        let batches = batches.as_slice();
        let deleted = self
            .retry
            .run("soft_delete", || delete_in_transaction(db, batches))
            .await
            .map_err(|e| ShortenerError::database_operation(format!("Soft delete failed: {}", e)))?;

        info!(
            "Soft-deleted {} short links across {} batches",
            deleted,
            batches.len()
        );
        Ok(())
    }
}

/// 每次尝试使用新事务，失败时整体回滚
async fn delete_in_transaction(
    db: &DatabaseConnection,
    batches: &[&DeleteRequestBatch],
) -> std::result::Result<u64, DbErr> {
    let txn = db.begin().await?;
    let deleted = mark_deleted(&txn, batches).await?;
    txn.commit().await?;
    Ok(deleted)
}

async fn mark_deleted<C: ConnectionTrait>(
    conn: &C,
    batches: &[&DeleteRequestBatch],
) -> std::result::Result<u64, DbErr> {
    let mut deleted = 0u64;
    for batch in batches {
        let result = url::Entity::update_many()
            .col_expr(url::Column::IsDeleted, Expr::value(true))
            .filter(url::Column::UserId.eq(batch.user_id.as_str()))
            .filter(url::Column::ShortKey.is_in(batch.short_keys.iter().cloned()))
            .filter(url::Column::IsDeleted.eq(false))
            .exec(conn)
            .await?;
        deleted += result.rows_affected;
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use sea_orm::error::ConnAcquireErr;
    use tempfile::TempDir;

    use super::*;
    use crate::config::{DatabaseKind, StorageConfig};

    async fn sqlite_repo(dir: &TempDir) -> SeaOrmRepository {
        let url = format!("sqlite://{}", dir.path().join("links.db").display());
        let config = StorageConfig {
            retry_base_delay_ms: 5,
            retry_max_delay_ms: 20,
            ..StorageConfig::default()
        };
        SeaOrmRepository::initialize(&url, DatabaseKind::Sqlite, &config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_soft_delete_retries_transient_failure_in_fresh_transaction() {
        let dir = TempDir::new().unwrap();
        let repo = sqlite_repo(&dir).await;
        let mut events = vec![Event::new("https://retry.example.com", "u1")];
        repo.insert_events(&mut events).await.unwrap();
        let key = events[0].short_key.clone();

        let batch = DeleteRequestBatch::new("u1", vec![key.clone()]);
        let batches = [&batch];
        let db = &repo.db;
        let attempts = AtomicU32::new(0);

        let deleted = repo
            .retry
            .run("soft_delete", || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        // 第一次尝试写入后失败，事务回滚
                        let txn = db.begin().await?;
                        assert_eq!(mark_deleted(&txn, &batches).await?, 1);
                        txn.rollback().await?;
                        return Err(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout));
                    }
                    delete_in_transaction(db, &batches).await
                }
            })
            .await
            .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        // 回滚后第二次尝试仍然命中该行
        assert_eq!(deleted, 1);
        assert!(repo.find_event(&key).await.unwrap().unwrap().deleted);
    }

    #[tokio::test]
    async fn test_soft_delete_is_owner_scoped_and_idempotent() {
        let dir = TempDir::new().unwrap();
        let repo = sqlite_repo(&dir).await;
        let mut events = vec![Event::new("https://owned.example.com", "u1")];
        repo.insert_events(&mut events).await.unwrap();
        let key = events[0].short_key.clone();

        repo.soft_delete(&[DeleteRequestBatch::new("u2", vec![key.clone()])])
            .await
            .unwrap();
        assert!(!repo.find_event(&key).await.unwrap().unwrap().deleted);

        let batch = DeleteRequestBatch::new("u1", vec![key.clone()]);
        repo.soft_delete(&[batch.clone(), batch]).await.unwrap();
        assert!(repo.find_event(&key).await.unwrap().unwrap().deleted);
    }
}
