//! 인메모리 스토어 구현.
//!
//! `REDIS_URL`이 설정되지 않은 단일 프로세스 배포를 위한 폴백이며,
//! 테스트에서 캐시 불변식을 검증하는 용도로도 사용됩니다.
//! 프로세스 간에 공유되지 않으므로 수평 확장 환경에서는 쓸 수 없습니다.

use crate::error::Result;
use crate::store::KeyValueStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if deadline <= now)
    }
}

/// 인메모리 키-값 스토어.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, MemoryEntry>>>,
}

impl MemoryStore {
    /// 빈 스토어 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 만료된 항목을 읽기 시점에 정리합니다.
    fn purge_if_expired(entries: &mut HashMap<String, MemoryEntry>, key: &str) {
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn is_connected(&self) -> bool {
        true
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        Self::purge_if_expired(&mut entries, key);
        Ok(entries.get(key).map(|e| e.value.clone()))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        Ok(entries.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        Self::purge_if_expired(&mut entries, key);
        Ok(entries.contains_key(key))
    }

    async fn incr_with_expire(&self, key: &str, expire_secs: u64) -> Result<i64> {
        let mut entries = self.entries.lock().await;
        Self::purge_if_expired(&mut entries, key);

        let count = entries
            .get(key)
            .and_then(|e| e.value.parse::<i64>().ok())
            .unwrap_or(0)
            + 1;

        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: count.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(expire_secs)),
            },
        );
        Ok(count)
    }

    async fn acquire_lock(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        Self::purge_if_expired(&mut entries, key);

        if entries.contains_key(key) {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: "locked".to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(true)
    }

    async fn release_lock(&self, key: &str) -> Result<bool> {
        self.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = MemoryStore::new();
        store.set_raw("k", "v", 60).await.unwrap();

        assert_eq!(store.get_raw("k").await.unwrap(), Some("v".to_string()));
        assert!(store.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_eviction() {
        let store = MemoryStore::new();
        store.set_raw("k", "v", 1).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.get_raw("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_with_expire_counts() {
        let store = MemoryStore::new();

        assert_eq!(store.incr_with_expire("c", 90).await.unwrap(), 1);
        assert_eq!(store.incr_with_expire("c", 90).await.unwrap(), 2);
        assert_eq!(store.incr_with_expire("c", 90).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_lock_mutual_exclusion() {
        let store = MemoryStore::new();

        assert!(store.acquire_lock("lock", 60).await.unwrap());
        assert!(!store.acquire_lock("lock", 60).await.unwrap());

        assert!(store.release_lock("lock").await.unwrap());
        assert!(store.acquire_lock("lock", 60).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_ttl_backstop() {
        let store = MemoryStore::new();
        assert!(store.acquire_lock("lock", 1).await.unwrap());

        // 해제가 누락돼도 TTL 경과 후 다시 잡을 수 있다
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.acquire_lock("lock", 1).await.unwrap());
    }
}
