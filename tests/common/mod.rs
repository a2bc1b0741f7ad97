//! Behaviour shared by every `UrlRepository` backend

#![allow(dead_code)]

use std::collections::HashSet;

use shortener::errors::ShortenerError;
use shortener::storage::{DeleteRequestBatch, Event, RepositoryStats, UrlRepository};

/// 保存单个事件并返回最终短码
pub async fn save_one(repo: &dyn UrlRepository, url: &str, user: &str) -> String {
    let mut events = vec![Event::new(url, user)];
    repo.save(&mut events).await.unwrap();
    events.remove(0).short_key
}

pub async fn delete(repo: &dyn UrlRepository, user: &str, keys: &[&str]) {
    let batch = DeleteRequestBatch::new(user, keys.iter().map(|k| k.to_string()).collect());
    repo.delete(&[batch]).await.unwrap();
}

pub async fn distinct_urls_get_distinct_keys(repo: &dyn UrlRepository) {
    let mut events = vec![
        Event::new("https://one.example.com", "u1"),
        Event::new("https://two.example.com", "u1"),
        Event::new("https://three.example.com", "u2"),
    ];
    repo.save(&mut events).await.unwrap();

    let keys: HashSet<_> = events.iter().map(|e| e.short_key.clone()).collect();
    assert_eq!(keys.len(), 3);
    for event in &events {
        let stored = repo.get(&event.short_key).await.unwrap().unwrap();
        assert_eq!(stored.original_url, event.original_url);
        assert!(!stored.deleted);
    }
}

pub async fn duplicate_in_one_call_resolves_to_first(repo: &dyn UrlRepository) {
    let mut events = vec![
        Event::new("https://a.com", "u1"),
        Event::new("https://a.com", "u1"),
        Event::new("https://b.com", "u1"),
    ];
    let result = repo.save(&mut events).await;

    match result {
        Err(ShortenerError::UrlExists(msg)) => assert!(msg.contains("https://a.com")),
        other => panic!("expected UrlExists, got {:?}", other),
    }
    assert_eq!(events[0].short_key, events[1].short_key);
    assert_ne!(events[0].short_key, events[2].short_key);

    // 冲突之后的事件仍然被保存
    assert!(repo.get(&events[2].short_key).await.unwrap().is_some());
    assert_eq!(repo.stats().await.unwrap().urls, 2);
}

pub async fn duplicate_across_calls_keeps_count(repo: &dyn UrlRepository) {
    let first = save_one(repo, "https://dup.example.com", "u1").await;

    let mut again = vec![Event::new("https://dup.example.com", "u2")];
    let err = repo.save(&mut again).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(!err.is_fatal());
    assert_eq!(again[0].short_key, first);

    assert_eq!(repo.stats().await.unwrap().urls, 1);
    assert_eq!(
        repo.short_key_by_original_url("https://dup.example.com")
            .await
            .unwrap(),
        Some(first)
    );
}

pub async fn empty_url_is_rejected(repo: &dyn UrlRepository) {
    let mut events = vec![Event::new("", "u1")];
    let err = repo.save(&mut events).await.unwrap_err();
    assert!(matches!(err, ShortenerError::Validation(_)));
    assert_eq!(repo.stats().await.unwrap().urls, 0);
}

pub async fn delete_is_idempotent(repo: &dyn UrlRepository) {
    let key = save_one(repo, "https://idem.example.com", "u1").await;

    delete(repo, "u1", &[&key]).await;
    assert!(repo.get(&key).await.unwrap().unwrap().deleted);

    delete(repo, "u1", &[&key, &key]).await;
    assert!(repo.get(&key).await.unwrap().unwrap().deleted);
}

pub async fn delete_by_other_user_is_ignored(repo: &dyn UrlRepository) {
    let key = save_one(repo, "https://x.com", "u1").await;

    delete(repo, "u2", &[&key]).await;
    assert!(!repo.get(&key).await.unwrap().unwrap().deleted);

    // 没有用户的批次不生效
    delete(repo, "", &[&key]).await;
    assert!(!repo.get(&key).await.unwrap().unwrap().deleted);
}

pub async fn deleted_key_is_still_found(repo: &dyn UrlRepository) {
    let key = save_one(repo, "https://gone.example.com", "u1").await;
    delete(repo, "u1", &[&key]).await;

    let event = repo.get(&key).await.unwrap().unwrap();
    assert!(event.deleted);
    assert_eq!(event.original_url, "https://gone.example.com");
    assert_eq!(repo.get("nokey1").await.unwrap(), None);
}

pub async fn deleted_events_are_hidden(repo: &dyn UrlRepository) {
    let kept = save_one(repo, "https://keep.example.com", "u1").await;
    let gone = save_one(repo, "https://drop.example.com", "u1").await;
    save_one(repo, "https://other.example.com", "u2").await;

    delete(repo, "u1", &[&gone]).await;

    let events = repo.events_by_user_id("u1").await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].short_key, kept);
    assert!(events.iter().all(|e| !e.deleted));

    assert_eq!(
        repo.short_key_by_original_url("https://drop.example.com")
            .await
            .unwrap(),
        None
    );
}

pub async fn save_after_delete_creates_new_key(repo: &dyn UrlRepository) {
    let old = save_one(repo, "https://y.com", "u1").await;
    delete(repo, "u1", &[&old]).await;

    let new = save_one(repo, "https://y.com", "u1").await;
    assert_ne!(old, new);
    assert!(repo.get(&old).await.unwrap().unwrap().deleted);
    assert!(!repo.get(&new).await.unwrap().unwrap().deleted);
    assert_eq!(
        repo.short_key_by_original_url("https://y.com").await.unwrap(),
        Some(new)
    );
}

pub async fn stats_count_live_urls_and_owners(repo: &dyn UrlRepository) {
    let a = save_one(repo, "https://s1.example.com", "u1").await;
    save_one(repo, "https://s2.example.com", "u1").await;
    save_one(repo, "https://s3.example.com", "u2").await;
    let c = save_one(repo, "https://s4.example.com", "u3").await;
    save_one(repo, "https://s5.example.com", "").await;

    assert_eq!(repo.stats().await.unwrap(), RepositoryStats { users: 3, urls: 5 });

    delete(repo, "u1", &[&a]).await;
    delete(repo, "u3", &[&c]).await;
    assert_eq!(repo.stats().await.unwrap(), RepositoryStats { users: 2, urls: 3 });
}

pub async fn caller_key_is_kept_when_free(repo: &dyn UrlRepository) {
    let mut events = vec![Event {
        short_key: "custom".to_string(),
        ..Event::new("https://custom.example.com", "u1")
    }
    .with_correlation_id("req-1")];
    repo.save(&mut events).await.unwrap();
    assert_eq!(events[0].short_key, "custom");

    let stored = repo.get("custom").await.unwrap().unwrap();
    assert_eq!(stored.correlation_id, "req-1");

    // 已占用的短码（即使已删除）会被替换
    delete(repo, "u1", &["custom"]).await;
    let mut clash = vec![Event {
        short_key: "custom".to_string(),
        ..Event::new("https://clash.example.com", "u1")
    }];
    repo.save(&mut clash).await.unwrap();
    assert_ne!(clash[0].short_key, "custom");
}
