use chrono::{DateTime, Utc};

use crate::storage::Event;
use migration::entities::url;

/// 将数据库行转换为 Event
pub fn model_to_event(model: url::Model) -> Event {
    Event {
        short_key: model.short_key,
        original_url: model.original_url,
        correlation_id: model.correlation_id,
        user_id: model.user_id,
        deleted: model.is_deleted,
    }
}

/// 将新 Event 转换为待插入的 ActiveModel
pub fn event_to_active_model(event: &Event, created_at: DateTime<Utc>) -> url::ActiveModel {
    use sea_orm::ActiveValue::Set;

    url::ActiveModel {
        short_key: Set(event.short_key.clone()),
        original_url: Set(event.original_url.clone()),
        correlation_id: Set(event.correlation_id.clone()),
        user_id: Set(event.user_id.clone()),
        is_deleted: Set(false),
        created_at: Set(created_at),
    }
}
