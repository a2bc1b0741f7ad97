//! URL repository
//!
//! A single capability interface over two interchangeable backends:
//! an in-memory map (optionally durable through an event log) and a
//! relational store through SeaORM. The backend is chosen once at startup
//! from [`StorageBackend`] and injected as `Arc<dyn UrlRepository>`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::{Result, ShortenerError};

pub mod backend;
pub mod memory;
pub mod models;

pub use backend::SeaOrmRepository;
pub use memory::MemoryRepository;
pub use models::{DeleteRequestBatch, Event, RepositoryStats, generate_short_key};

/// 短链接仓库
///
/// 所有后端都必须满足：
/// - 按原始 URL 去重（只针对未删除记录），重复时改写调用方的短码并报告冲突
/// - 软删除只在请求用户与所有者一致时生效，且可重复执行
/// - `get` 返回已删除的记录，由调用方决定如何处理
#[async_trait]
pub trait UrlRepository: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// 按短码查询，包括已删除的记录
    async fn get(&self, short_key: &str) -> Result<Option<Event>>;

    /// 去重查询，只匹配未删除的记录
    async fn short_key_by_original_url(&self, original_url: &str) -> Result<Option<String>>;

    /// 按顺序保存事件
    ///
    /// 已存在的 URL 不会插入新行：事件的 `short_key` 被改写为现有短码，
    /// 处理完所有事件后以一个 [`ShortenerError::UrlExists`] 返回全部冲突。
    /// 存储错误会立即返回，之前已写入的事件保持不变。
    async fn save(&self, events: &mut [Event]) -> Result<()>;

    /// 对每个批次中属于该用户的短码执行软删除
    async fn delete(&self, batches: &[DeleteRequestBatch]) -> Result<()>;

    /// 用户拥有的未删除记录
    async fn events_by_user_id(&self, user_id: &str) -> Result<Vec<Event>>;

    async fn stats(&self) -> Result<RepositoryStats>;

    /// 检查后端连接
    async fn ping(&self) -> Result<()>;
}

pub struct RepositoryFactory;

impl RepositoryFactory {
    /// 根据配置创建仓库，失败时调用方应终止启动
    pub async fn create(config: &StorageConfig) -> Result<Arc<dyn UrlRepository>> {
        let backend = config.backend()?;
        Self::create_backend(&backend, config).await
    }

    pub async fn create_backend(
        backend: &StorageBackend,
        config: &StorageConfig,
    ) -> Result<Arc<dyn UrlRepository>> {
        let repository: Arc<dyn UrlRepository> = match backend {
            StorageBackend::Memory { file_storage_path } => Arc::new(
                MemoryRepository::initialize(file_storage_path.as_deref())?,
            ),
            StorageBackend::Relational { database_url, kind } => Arc::new(
                SeaOrmRepository::initialize(database_url, *kind, config).await?,
            ),
        };

        info!("Using storage backend: {}", repository.backend_name());
        Ok(repository)
    }
}

/// 拒绝空 URL
pub(crate) fn ensure_original_url(event: &Event) -> Result<()> {
    if event.original_url.trim().is_empty() {
        return Err(ShortenerError::validation("empty url"));
    }
    Ok(())
}

/// 所有冲突合并为一个错误
pub(crate) fn conflicts_to_result(conflicts: Vec<String>) -> Result<()> {
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(ShortenerError::url_exists(&conflicts))
    }
}
