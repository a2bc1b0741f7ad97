//! SeaORM repository backend
//!
//! Relational storage for short links, supporting SQLite, MySQL/MariaDB
//! and PostgreSQL. Schema is created by the `migration` crate at startup.

mod connection;
mod converters;
mod mutations;
mod query;
pub mod retry;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use tracing::info;

use crate::config::{DatabaseKind, StorageConfig};
use crate::errors::{Result, ShortenerError};
use crate::storage::{DeleteRequestBatch, Event, RepositoryStats, UrlRepository};

pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use converters::{event_to_active_model, model_to_event};
pub use retry::RetryPolicy;

/// SeaORM-based repository
#[derive(Clone)]
pub struct SeaOrmRepository {
    db: DatabaseConnection,
    kind: DatabaseKind,
    retry: RetryPolicy,
}

impl SeaOrmRepository {
    /// 连接数据库并运行迁移，失败时调用方应终止启动
    pub async fn initialize(
        database_url: &str,
        kind: DatabaseKind,
        config: &StorageConfig,
    ) -> Result<Self> {
        if database_url.is_empty() {
            return Err(ShortenerError::database_config("database DSN is not set"));
        }

        let db = match kind {
            DatabaseKind::Sqlite => connect_sqlite(database_url).await?,
            DatabaseKind::MySql | DatabaseKind::Postgres => {
                connect_generic(database_url, kind, config.pool_size).await?
            }
        };

        run_migrations(&db).await?;

        info!("{} storage initialized", kind.as_str().to_uppercase());
        Ok(Self {
            db,
            kind,
            retry: RetryPolicy::from(config),
        })
    }
}

#[async_trait]
impl UrlRepository for SeaOrmRepository {
    fn backend_name(&self) -> &'static str {
        self.kind.as_str()
    }

    async fn get(&self, short_key: &str) -> Result<Option<Event>> {
        self.find_event(short_key).await
    }

    async fn short_key_by_original_url(&self, original_url: &str) -> Result<Option<String>> {
        self.find_short_key_by_url(original_url).await
    }

    async fn save(&self, events: &mut [Event]) -> Result<()> {
        self.insert_events(events).await
    }

    async fn delete(&self, batches: &[DeleteRequestBatch]) -> Result<()> {
        self.soft_delete(batches).await
    }

    async fn events_by_user_id(&self, user_id: &str) -> Result<Vec<Event>> {
        self.find_events_by_user(user_id).await
    }

    async fn stats(&self) -> Result<RepositoryStats> {
        self.count_stats().await
    }

    async fn ping(&self) -> Result<()> {
        self.db.ping().await.map_err(|e| {
            ShortenerError::database_connection(format!("Database ping failed: {}", e))
        })
    }
}
