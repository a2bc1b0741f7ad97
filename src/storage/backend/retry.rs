//! Retry for transient database failures
//!
//! Connection-pool exhaustion, dropped connections, deadlocks and lock
//! timeouts are retried with exponential backoff plus jitter; everything
//! else is returned to the caller on the first failure.

use std::future::Future;
use std::time::Duration;

use sea_orm::DbErr;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::StorageConfig;

/// 可重试的数据库错误码：MySQL 死锁/锁超时，PostgreSQL 序列化失败/死锁，SQLite BUSY/LOCKED
const RETRYABLE_CODES: &[&str] = &["1213", "1205", "40001", "40P01", "5", "6"];

const RETRYABLE_MESSAGES: &[&str] = &[
    "deadlock",
    "lock wait timeout",
    "database is locked",
    "serialization failure",
];

/// 判断数据库错误是否可重试
pub fn is_transient(err: &DbErr) -> bool {
    use sea_orm::error::RuntimeErr;

    let runtime_err = match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => return true,
        DbErr::Exec(runtime_err) | DbErr::Query(runtime_err) => runtime_err,
        _ => return false,
    };

    match runtime_err {
        RuntimeErr::SqlxError(sqlx_err) => {
            use std::ops::Deref;
            if let Some(code) = sqlx_err
                .deref()
                .as_database_error()
                .and_then(|db_err| db_err.code())
            {
                return RETRYABLE_CODES.contains(&code.as_ref());
            }
            message_is_transient(&sqlx_err.to_string())
        }
        RuntimeErr::Internal(msg) => message_is_transient(msg),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

fn message_is_transient(message: &str) -> bool {
    let message = message.to_lowercase();
    RETRYABLE_MESSAGES.iter().any(|m| message.contains(m))
}

/// 重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

impl From<&StorageConfig> for RetryPolicy {
    fn from(config: &StorageConfig) -> Self {
        Self {
            max_retries: config.retry_count,
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次重试前的等待时间（从 1 开始），附加 0-25% 的随机抖动
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay_ms);
        let jitter = rand::random_range(0..=capped / 4);
        Duration::from_millis(capped.saturating_add(jitter))
    }

    /// 执行操作，对可重试错误按退避策略重试
    pub async fn run<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, DbErr>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbErr>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("'{}' succeeded after {} retries", operation_name, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    warn!(
                        "'{}' failed (attempt {}/{}): {}; retrying in {:?}",
                        operation_name,
                        attempt,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
