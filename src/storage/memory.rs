//! In-memory repository
//!
//! Events live in a map guarded by a reader/writer lock. When a file path is
//! configured every state change is appended to a newline-delimited JSON
//! event log; replaying the log (last record per key wins) rebuilds the map.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use super::models::{DeleteRequestBatch, Event, RepositoryStats, generate_short_key};
use super::{UrlRepository, conflicts_to_result, ensure_original_url};
use crate::errors::Result;
use crate::utils::ndjson::{self, NdjsonWriter};

#[derive(Default)]
struct MemoryState {
    /// short_key -> event，包括已删除的记录
    urls: HashMap<String, Event>,
    /// original_url -> 未删除的短码（按插入顺序）
    ///
    /// 正常写入时每个 URL 最多一个；旧版本写出的日志可能包含重复记录。
    by_url: HashMap<String, Vec<String>>,
    /// 插入顺序
    order: Vec<String>,
    log: Option<NdjsonWriter>,
}

impl MemoryState {
    fn from_events(events: Vec<Event>) -> Self {
        let mut state = Self::default();
        for event in events {
            state.apply(event);
        }

        for (url, keys) in &state.by_url {
            if keys.len() > 1 {
                warn!(
                    "Event log holds {} live short keys for {}: {:?}, dedup resolves to {}",
                    keys.len(),
                    url,
                    keys,
                    keys[0]
                );
            }
        }
        state
    }

    /// 去重查询：最早的未删除短码
    fn live_key(&self, original_url: &str) -> Option<&String> {
        self.by_url.get(original_url).and_then(|keys| keys.first())
    }

    /// 写入内存（不写日志），同一短码后到的记录覆盖之前的
    fn apply(&mut self, event: Event) {
        if let Some(previous) = self.urls.get(&event.short_key) {
            let url = previous.original_url.clone();
            if let Some(keys) = self.by_url.get_mut(&url) {
                keys.retain(|key| key != &event.short_key);
                if keys.is_empty() {
                    self.by_url.remove(&url);
                }
            }
        } else {
            self.order.push(event.short_key.clone());
        }

        if !event.deleted {
            self.by_url
                .entry(event.original_url.clone())
                .or_default()
                .push(event.short_key.clone());
        }
        self.urls.insert(event.short_key.clone(), event);
    }

    /// 先写日志再修改内存，日志失败时状态保持不变
    fn commit(&mut self, event: Event) -> Result<()> {
        if let Some(log) = self.log.as_mut() {
            log.write(&event)?;
        }
        self.apply(event);
        Ok(())
    }

    fn unique_key(&self, candidate: &str) -> String {
        let mut key = candidate.to_string();
        while key.is_empty() || self.urls.contains_key(&key) {
            key = generate_short_key();
        }
        key
    }
}

pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    /// 不带持久化的内存仓库
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// 打开内存仓库，配置了文件时先回放事件日志
    pub fn initialize(file_storage_path: Option<&Path>) -> Result<Self> {
        let Some(path) = file_storage_path else {
            info!("Memory storage initialized without persistence");
            return Ok(Self::new());
        };

        let events: Vec<Event> = ndjson::read_records(path)?;
        let replayed = events.len();
        let mut state = MemoryState::from_events(events);
        state.log = Some(NdjsonWriter::open(path)?);

        info!(
            "Memory storage initialized from {}: {} records replayed, {} short links",
            path.display(),
            replayed,
            state.urls.len()
        );

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    pub fn len(&self) -> usize {
        self.state.read().urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlRepository for MemoryRepository {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, short_key: &str) -> Result<Option<Event>> {
        Ok(self.state.read().urls.get(short_key).cloned())
    }

    async fn short_key_by_original_url(&self, original_url: &str) -> Result<Option<String>> {
        Ok(self.state.read().live_key(original_url).cloned())
    }

    async fn save(&self, events: &mut [Event]) -> Result<()> {
        let mut state = self.state.write();
        let mut conflicts = Vec::new();

        for event in events.iter_mut() {
            ensure_original_url(event)?;

            if let Some(existing) = state.live_key(&event.original_url) {
                debug!(
                    "URL already shortened: {} -> {}",
                    event.original_url, existing
                );
                event.short_key = existing.clone();
                conflicts.push(event.original_url.clone());
                continue;
            }

            event.short_key = state.unique_key(&event.short_key);
            event.deleted = false;
            state.commit(event.clone())?;
            trace!("Short link saved: {}", event.short_key);
        }

        conflicts_to_result(conflicts)
    }

    async fn delete(&self, batches: &[DeleteRequestBatch]) -> Result<()> {
        let mut state = self.state.write();
        let mut deleted = 0usize;

        for batch in batches {
            if batch.user_id.is_empty() {
                debug!("Skipping delete batch without user id");
                continue;
            }

            for short_key in &batch.short_keys {
                let updated = match state.urls.get(short_key) {
                    Some(event) if !event.deleted && event.is_owned_by(&batch.user_id) => {
                        Event {
                            deleted: true,
                            ..event.clone()
                        }
                    }
                    _ => continue,
                };
                state.commit(updated)?;
                deleted += 1;
            }
        }

        debug!("Soft-deleted {} short links", deleted);
        Ok(())
    }

    async fn events_by_user_id(&self, user_id: &str) -> Result<Vec<Event>> {
        let state = self.state.read();
        Ok(state
            .order
            .iter()
            .filter_map(|key| state.urls.get(key))
            .filter(|event| !event.deleted && event.is_owned_by(user_id))
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<RepositoryStats> {
        let state = self.state.read();
        let mut users = HashSet::new();
        let mut urls = 0u64;

        for event in state.urls.values().filter(|e| !e.deleted) {
            urls += 1;
            if !event.user_id.is_empty() {
                users.insert(event.user_id.as_str());
            }
        }

        Ok(RepositoryStats {
            users: users.len() as u64,
            urls,
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(key: &str, url: &str, user: &str, deleted: bool) -> Event {
        Event {
            short_key: key.to_string(),
            original_url: url.to_string(),
            correlation_id: String::new(),
            user_id: user.to_string(),
            deleted,
        }
    }

    #[test]
    fn test_replay_last_write_wins() {
        let state = MemoryState::from_events(vec![
            event("k1", "https://a.com", "u1", false),
            event("k2", "https://b.com", "u1", false),
            event("k1", "https://a.com", "u1", true),
        ]);

        assert!(state.urls["k1"].deleted);
        assert!(!state.by_url.contains_key("https://a.com"));
        assert_eq!(state.live_key("https://b.com").unwrap(), "k2");
        assert_eq!(state.order, vec!["k1", "k2"]);
    }

    #[test]
    fn test_replay_keeps_newer_key_for_recreated_url() {
        let state = MemoryState::from_events(vec![
            event("k1", "https://a.com", "u1", false),
            event("k1", "https://a.com", "u1", true),
            event("k3", "https://a.com", "u1", false),
        ]);

        assert_eq!(state.live_key("https://a.com").unwrap(), "k3");
    }

    #[tokio::test]
    async fn test_deleting_duplicate_key_keeps_older_live_key() {
        // 旧日志：同一 URL 两条未删除记录
        let state = MemoryState::from_events(vec![
            event("k1", "https://dup.com", "u1", false),
            event("k2", "https://dup.com", "u1", false),
        ]);
        assert_eq!(state.live_key("https://dup.com").unwrap(), "k1");

        let repo = MemoryRepository {
            state: RwLock::new(state),
        };
        repo.delete(&[DeleteRequestBatch::new("u1", vec!["k2".to_string()])])
            .await
            .unwrap();
        assert_eq!(
            repo.short_key_by_original_url("https://dup.com")
                .await
                .unwrap(),
            Some("k1".to_string())
        );

        let mut events = vec![Event::new("https://dup.com", "u1")];
        let err = repo.save(&mut events).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(events[0].short_key, "k1");
        assert_eq!(repo.len(), 2);

        repo.delete(&[DeleteRequestBatch::new("u1", vec!["k1".to_string()])])
            .await
            .unwrap();
        assert_eq!(
            repo.short_key_by_original_url("https://dup.com")
                .await
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_unique_key_regenerates_on_collision() {
        let state = MemoryState::from_events(vec![event("taken", "https://a.com", "", false)]);
        let key = state.unique_key("taken");
        assert_ne!(key, "taken");
        assert_eq!(key.len(), super::super::models::SHORT_KEY_LENGTH);
        assert_eq!(state.unique_key("free"), "free");
    }

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let repo = MemoryRepository::new();
        let mut events = vec![Event::new("", "u1")];
        let err = repo.save(&mut events).await.unwrap_err();
        assert!(!err.is_conflict());
        assert!(repo.is_empty());
    }
}
