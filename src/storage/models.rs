use serde::{Deserialize, Serialize};

/// 短码长度
pub const SHORT_KEY_LENGTH: usize = 6;

const SHORT_KEY_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// 生成随机短码
pub fn generate_short_key() -> String {
    std::iter::repeat_with(|| {
        SHORT_KEY_CHARSET[rand::random_range(0..SHORT_KEY_CHARSET.len())] as char
    })
    .take(SHORT_KEY_LENGTH)
    .collect()
}

/// 短码到原始 URL 的映射记录
///
/// 空字符串表示字段未设置：空 `user_id` 为匿名用户，
/// 空 `short_key` 在保存时会被自动生成。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub short_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(rename = "is_deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Event {
    /// 创建带随机短码的新记录
    pub fn new(original_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            short_key: generate_short_key(),
            original_url: original_url.into(),
            correlation_id: String::new(),
            user_id: user_id.into(),
            deleted: false,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// 一次客户端删除请求：同一用户的一组短码
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteRequestBatch {
    pub short_keys: Vec<String>,
    pub user_id: String,
}

impl DeleteRequestBatch {
    pub fn new(user_id: impl Into<String>, short_keys: Vec<String>) -> Self {
        Self {
            short_keys,
            user_id: user_id.into(),
        }
    }
}

/// 运维统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepositoryStats {
    /// 拥有未删除链接的不同用户数（不含匿名用户）
    pub users: u64,
    /// 未删除链接数
    pub urls: u64,
}
