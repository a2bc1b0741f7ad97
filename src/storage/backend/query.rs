//! Query operations for SeaOrmRepository
//!
//! This module contains all read-only database operations.

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use tracing::trace;

use super::SeaOrmRepository;
use super::converters::model_to_event;
use crate::errors::{Result, ShortenerError};
use crate::storage::{Event, RepositoryStats};

use migration::entities::url;

impl SeaOrmRepository {
    pub(super) async fn find_event(&self, short_key: &str) -> Result<Option<Event>> {
        let db = &self.db;

        let model = self
            .retry
            .run(&format!("get({})", short_key), || async {
                url::Entity::find_by_id(short_key).one(db).await
            })
            .await
            .map_err(|e| {
                ShortenerError::database_operation(format!(
                    "Failed to load short link {}: {}",
                    short_key, e
                ))
            })?;

        Ok(model.map(model_to_event))
    }

    pub(super) async fn find_short_key_by_url(&self, original_url: &str) -> Result<Option<String>> {
        let db = &self.db;

        let short_key = self
            .retry
            .run("short_key_by_original_url", || async {
                url::Entity::find()
                    .select_only()
                    .column(url::Column::ShortKey)
                    .filter(url::Column::OriginalUrl.eq(original_url))
                    .filter(url::Column::IsDeleted.eq(false))
                    .into_tuple::<String>()
                    .one(db)
                    .await
            })
            .await
            .map_err(|e| {
                ShortenerError::database_operation(format!("Dedup lookup failed: {}", e))
            })?;

        trace!("Dedup lookup for {}: {:?}", original_url, short_key);
        Ok(short_key)
    }

    /// 短码是否已被占用（包括已删除的记录）
    pub(super) async fn key_exists(&self, short_key: &str) -> Result<bool> {
        let db = &self.db;

        let count = self
            .retry
            .run(&format!("key_exists({})", short_key), || async {
                url::Entity::find_by_id(short_key).count(db).await
            })
            .await
            .map_err(|e| {
                ShortenerError::database_operation(format!("Key lookup failed: {}", e))
            })?;

        Ok(count > 0)
    }

    pub(super) async fn find_events_by_user(&self, user_id: &str) -> Result<Vec<Event>> {
        let db = &self.db;

        let models = self
            .retry
            .run(&format!("events_by_user_id({})", user_id), || async {
                url::Entity::find()
                    .filter(url::Column::UserId.eq(user_id))
                    .filter(url::Column::IsDeleted.eq(false))
                    .order_by_asc(url::Column::CreatedAt)
                    .order_by_asc(url::Column::ShortKey)
                    .all(db)
                    .await
            })
            .await
            .map_err(|e| {
                ShortenerError::database_operation(format!(
                    "Failed to list short links for user {}: {}",
                    user_id, e
                ))
            })?;

        Ok(models.into_iter().map(model_to_event).collect())
    }

    pub(super) async fn count_stats(&self) -> Result<RepositoryStats> {
        let db = &self.db;

        let urls = self
            .retry
            .run("count_urls", || async {
                url::Entity::find()
                    .filter(url::Column::IsDeleted.eq(false))
                    .count(db)
                    .await
            })
            .await
            .map_err(|e| ShortenerError::database_operation(format!("Stats query failed: {}", e)))?;

        let users = self
            .retry
            .run("count_users", || async {
                url::Entity::find()
                    .select_only()
                    .column(url::Column::UserId)
                    .distinct()
                    .filter(url::Column::IsDeleted.eq(false))
                    .filter(url::Column::UserId.ne(""))
                    .count(db)
                    .await
            })
            .await
            .map_err(|e| ShortenerError::database_operation(format!("Stats query failed: {}", e)))?;

        Ok(RepositoryStats { users, urls })
    }
}
