use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ShortenerError};

/// 应用配置
///
/// 启动时加载一次，之后以值的形式传入各个组件，不存在全局配置状态。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub deletion: DeletionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > 配置文件 > 默认值
    /// ENV 前缀：SHORTENER，分隔符：__
    /// 示例：SHORTENER__STORAGE__DATABASE_DSN=postgres://...
    pub fn load(path: &str) -> Result<Self> {
        use config::{Config, Environment, File};

        let settings = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖
            .add_source(
                Environment::with_prefix("SHORTENER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ShortenerError::validation(format!("Failed to build config: {}", e)))?;

        settings.try_deserialize::<AppConfig>().map_err(|e| {
            ShortenerError::serialization(format!("Failed to deserialize config: {}", e))
        })
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// 存储配置
///
/// `database_dsn` 非空时使用关系型数据库，否则使用内存存储，
/// `file_storage_path` 为内存存储提供可选的事件日志文件。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub database_dsn: Option<String>,
    #[serde(default)]
    pub file_storage_path: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 关系型数据库类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Sqlite,
    MySql,
    Postgres,
}

impl DatabaseKind {
    /// 从数据库 URL 推断数据库类型
    pub fn from_url(database_url: &str) -> Result<Self> {
        if database_url.starts_with("sqlite:")
            || database_url.ends_with(".db")
            || database_url.ends_with(".sqlite")
            || database_url == ":memory:"
        {
            Ok(Self::Sqlite)
        } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://")
        {
            Ok(Self::MySql)
        } else if database_url.starts_with("postgres://")
            || database_url.starts_with("postgresql://")
        {
            Ok(Self::Postgres)
        } else {
            Err(ShortenerError::database_config(format!(
                "Cannot infer database type from URL: {}. Supported: sqlite://, mysql://, mariadb://, postgres://",
                database_url
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }
}

/// 启动时确定的存储后端
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory {
        file_storage_path: Option<PathBuf>,
    },
    Relational {
        database_url: String,
        kind: DatabaseKind,
    },
}

impl StorageConfig {
    /// 解析存储后端，只在启动时调用一次
    pub fn backend(&self) -> Result<StorageBackend> {
        match self.database_dsn.as_deref().map(str::trim) {
            Some(dsn) if !dsn.is_empty() => Ok(StorageBackend::Relational {
                database_url: dsn.to_string(),
                kind: DatabaseKind::from_url(dsn)?,
            }),
            _ => Ok(StorageBackend::Memory {
                file_storage_path: self
                    .file_storage_path
                    .as_deref()
                    .filter(|p| !p.trim().is_empty())
                    .map(PathBuf::from),
            }),
        }
    }
}

/// 延迟删除配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionConfig {
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    #[serde(default = "default_fallback_log_path")]
    pub fallback_log_path: String,
}

impl DeletionConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_pool_size() -> u32 {
    10
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_flush_interval_ms() -> u64 {
    2000
}

fn default_queue_capacity() -> usize {
    100
}

fn default_drain_timeout_ms() -> u64 {
    500
}

fn default_fallback_log_path() -> String {
    "/tmp/short-deleted-db.json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_dsn: None,
            file_storage_path: None,
            pool_size: default_pool_size(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            queue_capacity: default_queue_capacity(),
            drain_timeout_ms: default_drain_timeout_ms(),
            fallback_log_path: default_fallback_log_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}
