//! Stale-while-revalidate 캐시 코어.
//!
//! 임의의 계산 함수를 논리 TTL / 물리 TTL 의미론으로 감쌉니다.
//!
//! - 논리 TTL 이내: fresh 반환, 재계산 없음
//! - 논리 TTL 경과 ~ 물리 TTL 이내: stale을 즉시 반환하고
//!   백그라운드 재계산을 최대 1건만 기동 (single-flight)
//! - 물리 TTL 경과 또는 미존재: cold 경로 (동기 계산이 유일하게
//!   호출자를 블록하는 경로)
//!
//! 물리 TTL은 스토어 키의 만료로 강제되고, 논리 신선도는
//! 엔트리에 기록된 `computed_at`으로 코어가 독립적으로 판정합니다.
//!
//! 계산 함수는 실패를 반드시 `Err`로 반환해야 합니다. `Ok`로 돌려준
//! 값은 에러 형태의 필드를 담고 있어도 그대로 캐시됩니다 — 코어는
//! payload 내용을 들여다보지 않습니다.

use crate::error::{DataError, Result};
use crate::store::KeyValueStore;
use chrono::Utc;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// 캐시 코어가 감싸는 계산 함수.
///
/// 인자는 키 구성 시점에 클로저로 바인딩됩니다. 백그라운드 재계산을
/// 위해 여러 번 호출될 수 있으므로 공유 가능해야 합니다.
pub type ComputeFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// 논리/물리 TTL 쌍.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// 이 시간이 지나면 stale로 간주 (백그라운드 재계산 트리거)
    pub logical_ttl_secs: u64,
    /// 이 시간이 지나면 스토어에서 완전히 축출
    pub physical_ttl_secs: u64,
}

impl CachePolicy {
    /// TTL 쌍 생성. `logical >= 1`, `physical >= logical`을 강제합니다.
    pub fn new(logical_ttl_secs: u64, physical_ttl_secs: u64) -> Result<Self> {
        if logical_ttl_secs < 1 {
            return Err(DataError::InvalidPolicy(
                "논리 TTL은 1초 이상이어야 합니다".to_string(),
            ));
        }
        if physical_ttl_secs < logical_ttl_secs {
            return Err(DataError::InvalidPolicy(format!(
                "물리 TTL({}s)이 논리 TTL({}s)보다 짧습니다",
                physical_ttl_secs, logical_ttl_secs
            )));
        }
        Ok(Self {
            logical_ttl_secs,
            physical_ttl_secs,
        })
    }

    /// 논리 TTL에 배율을 적용해 물리 TTL을 유도합니다.
    ///
    /// 배율은 주말/공휴일/업스트림 장애를 버틸 만큼 커야 합니다 (기본 24배).
    pub fn with_ratio(logical_ttl_secs: u64, ratio: u64) -> Result<Self> {
        Self::new(
            logical_ttl_secs,
            logical_ttl_secs.saturating_mul(ratio.max(1)),
        )
    }
}

/// 스토어에 저장되는 캐시 엔트리.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    payload: Value,
    computed_at: i64,
}

/// 캐시 응답의 신선도.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Stale => "stale",
        }
    }
}

/// `get_or_compute` 결과.
#[derive(Debug)]
pub enum CacheOutcome {
    /// 캐시 또는 동기 계산으로 얻은 payload
    Hit {
        payload: Value,
        freshness: Freshness,
        computed_at: i64,
    },
    /// cold miss를 동기 해소하지 않기로 한 경우 (재계산 진행 중)
    WarmingUp,
}

/// cold miss 처리 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissMode {
    /// 동기 계산 (호출자 블록)
    Block,
    /// 백그라운드 계산 기동 후 즉시 `WarmingUp` 반환
    Background,
}

/// Stale-while-revalidate 캐시.
///
/// 프로세스 전역 싱글턴이 아니라 명시적으로 생성해 주입합니다.
/// 테스트는 `MemoryStore` 위에 독립 인스턴스를 만들어 씁니다.
#[derive(Clone)]
pub struct SwrCache {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    lock_ttl_secs: u64,
    inflight: Arc<Mutex<HashSet<String>>>,
}

impl SwrCache {
    /// 새 캐시 코어 생성.
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>, lock_ttl_secs: u64) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            lock_ttl_secs,
            inflight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// 계산 함수를 캐시 정책과 함께 묶어 재사용 가능한 핸들로 만듭니다.
    ///
    /// 라우트 핸들러와 스케줄러가 같은 핸들을 공유하므로
    /// single-flight 프로토콜도 자연히 공유됩니다.
    pub fn wrap(&self, key: impl Into<String>, policy: CachePolicy, compute: ComputeFn) -> CachedOp {
        CachedOp {
            cache: self.clone(),
            key: key.into(),
            policy,
            compute,
        }
    }

    fn entry_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    fn lock_key(&self, key: &str) -> String {
        format!("{}:{}:refresh_lock", self.prefix, key)
    }

    /// 캐시 조회 후 필요 시 계산.
    ///
    /// 스토어 읽기 실패는 "엔트리 없음"으로 간주하고(cold 강제),
    /// 쓰기 실패는 로그만 남깁니다 — 이번 라운드만 캐시를 건너뛸 뿐
    /// 요청 실패로 번지지 않습니다. cold 경로의 계산 실패만 전파됩니다.
    pub async fn get_or_compute(
        &self,
        key: &str,
        policy: CachePolicy,
        compute: ComputeFn,
        mode: MissMode,
    ) -> Result<CacheOutcome> {
        let entry = self.read_entry(key).await;
        let now = Utc::now().timestamp();

        if let Some(entry) = entry {
            let age = now.saturating_sub(entry.computed_at);

            if age < policy.logical_ttl_secs as i64 {
                return Ok(CacheOutcome::Hit {
                    payload: entry.payload,
                    freshness: Freshness::Fresh,
                    computed_at: entry.computed_at,
                });
            }

            if age < policy.physical_ttl_secs as i64 {
                // stale-but-alive: 즉시 반환하고 재계산은 백그라운드로
                debug!(key, age, "stale 엔트리 반환, 백그라운드 재계산 시도");
                self.spawn_revalidate(key, policy, compute);
                return Ok(CacheOutcome::Hit {
                    payload: entry.payload,
                    freshness: Freshness::Stale,
                    computed_at: entry.computed_at,
                });
            }

            // 물리 TTL 경과: 스토어 만료가 늦어도 cold로 취급
        }

        self.cold_miss(key, policy, compute, mode).await
    }

    /// 캐시를 무시하고 동기 재계산 후 덮어씁니다.
    pub async fn force_refresh(
        &self,
        key: &str,
        policy: CachePolicy,
        compute: ComputeFn,
    ) -> Result<Value> {
        let payload = compute().await?;
        self.write_entry(key, &payload, policy).await;
        Ok(payload)
    }

    /// 잠금을 잡은 경우에만 재계산합니다 (예열 경로).
    ///
    /// 다른 프로세스/태스크가 이미 재계산 중이면 `Ok(None)`.
    pub async fn refresh_if_idle(
        &self,
        key: &str,
        policy: CachePolicy,
        compute: ComputeFn,
    ) -> Result<Option<Value>> {
        let Some(_guard) = self.try_begin_inflight(key) else {
            return Ok(None);
        };

        if !self.try_acquire_lock(key).await {
            return Ok(None);
        }

        let result = compute().await;

        // 성공/실패 모두 잠금 해제. 해제가 누락되는 크래시 경로는
        // 잠금 TTL이 안전장치로 풀어준다.
        match result {
            Ok(payload) => {
                self.write_entry(key, &payload, policy).await;
                self.release_lock(key).await;
                Ok(Some(payload))
            }
            Err(e) => {
                self.release_lock(key).await;
                Err(e)
            }
        }
    }

    async fn cold_miss(
        &self,
        key: &str,
        policy: CachePolicy,
        compute: ComputeFn,
        mode: MissMode,
    ) -> Result<CacheOutcome> {
        match mode {
            MissMode::Block => {
                // 유일하게 호출자를 블록하는 경로. 실패는 전파되고
                // 아무것도 캐시되지 않는다.
                let payload = compute().await?;
                let computed_at = Utc::now().timestamp();
                self.write_entry(key, &payload, policy).await;
                Ok(CacheOutcome::Hit {
                    payload,
                    freshness: Freshness::Fresh,
                    computed_at,
                })
            }
            MissMode::Background => {
                self.spawn_revalidate(key, policy, compute);
                Ok(CacheOutcome::WarmingUp)
            }
        }
    }

    /// 백그라운드 재계산 태스크를 기동합니다 (fire-and-forget).
    ///
    /// 요청 측은 이미 stale 값을 반환했으므로 이 태스크를 기다리거나
    /// 취소하지 않습니다. 프로세스 종료로 유실되면 stale 엔트리와
    /// 물리 TTL이 복구 수단입니다.
    fn spawn_revalidate(&self, key: &str, policy: CachePolicy, compute: ComputeFn) {
        let cache = self.clone();
        let key = key.to_string();

        tokio::spawn(async move {
            match cache.refresh_if_idle(&key, policy, compute).await {
                Ok(Some(_)) => info!(key = %key, "백그라운드 재계산 완료"),
                Ok(None) => debug!(key = %key, "재계산 이미 진행 중, 건너뜀"),
                // 실패 시 stale 엔트리를 지우지 않고 그대로 둔다
                Err(e) => warn!(key = %key, "백그라운드 재계산 실패: {}", e),
            }
        });
    }

    async fn read_entry(&self, key: &str) -> Option<CacheEntry> {
        match self.store.get_raw(&self.entry_key(key)).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(key, "캐시 엔트리 역직렬화 실패, cold로 처리: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, "스토어 읽기 실패, 엔트리 없음으로 처리: {}", e);
                None
            }
        }
    }

    async fn write_entry(&self, key: &str, payload: &Value, policy: CachePolicy) {
        let entry = CacheEntry {
            payload: payload.clone(),
            computed_at: Utc::now().timestamp(),
        };

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, "캐시 엔트리 직렬화 실패: {}", e);
                return;
            }
        };

        // 스토어에는 물리 TTL을 건다. 논리 신선도는 computed_at으로 판정.
        if let Err(e) = self
            .store
            .set_raw(&self.entry_key(key), &raw, policy.physical_ttl_secs)
            .await
        {
            warn!(key, "캐시 쓰기 실패, 이번 라운드는 캐시 없이 진행: {}", e);
        }
    }

    /// 프로세스 내 in-flight 중복 제거.
    ///
    /// 가드가 drop되면 키가 집합에서 빠지므로 모든 종료 경로에서
    /// 해제가 보장됩니다.
    fn try_begin_inflight(&self, key: &str) -> Option<InflightGuard> {
        let mut inflight = self.inflight.lock().expect("inflight 잠금 오염");
        if !inflight.insert(key.to_string()) {
            return None;
        }
        Some(InflightGuard {
            set: Arc::clone(&self.inflight),
            key: key.to_string(),
        })
    }

    /// 스토어 잠금 획득. 스토어 장애 시 fail-open (중복 재계산 허용).
    async fn try_acquire_lock(&self, key: &str) -> bool {
        match self
            .store
            .acquire_lock(&self.lock_key(key), self.lock_ttl_secs)
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!(key, "잠금 획득 실패, fail-open으로 진행: {}", e);
                true
            }
        }
    }

    async fn release_lock(&self, key: &str) {
        if let Err(e) = self.store.release_lock(&self.lock_key(key)).await {
            // TTL이 남은 잠금을 풀어준다
            warn!(key, "잠금 해제 실패, TTL 만료 대기: {}", e);
        }
    }
}

struct InflightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.key);
        }
    }
}

/// 캐시 정책이 바인딩된 계산 핸들.
#[derive(Clone)]
pub struct CachedOp {
    cache: SwrCache,
    key: String,
    policy: CachePolicy,
    compute: ComputeFn,
}

impl CachedOp {
    /// 캐시 키.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 블로킹 miss 모드로 조회.
    pub async fn get(&self) -> Result<CacheOutcome> {
        self.cache
            .get_or_compute(&self.key, self.policy, Arc::clone(&self.compute), MissMode::Block)
            .await
    }

    /// 논블로킹 miss 모드로 조회 (miss 시 `WarmingUp`).
    pub async fn get_nonblocking(&self) -> Result<CacheOutcome> {
        self.cache
            .get_or_compute(
                &self.key,
                self.policy,
                Arc::clone(&self.compute),
                MissMode::Background,
            )
            .await
    }

    /// 예열: 다른 재계산이 없을 때만 동기 재계산.
    pub async fn warm(&self) -> Result<Option<Value>> {
        self.cache
            .refresh_if_idle(&self.key, self.policy, Arc::clone(&self.compute))
            .await
    }

    /// 강제 재계산.
    pub async fn force_refresh(&self) -> Result<Value> {
        self.cache
            .force_refresh(&self.key, self.policy, Arc::clone(&self.compute))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_rejects_zero_logical_ttl() {
        assert!(CachePolicy::new(0, 100).is_err());
    }

    #[test]
    fn test_policy_rejects_physical_shorter_than_logical() {
        assert!(CachePolicy::new(300, 100).is_err());
        assert!(CachePolicy::new(300, 300).is_ok());
    }

    #[test]
    fn test_policy_ratio() {
        let policy = CachePolicy::with_ratio(300, 24).unwrap();
        assert_eq!(policy.physical_ttl_secs, 7200);
    }

    #[test]
    fn test_key_layout() {
        let cache = SwrCache::new(
            Arc::new(crate::store::memory::MemoryStore::new()),
            "marketpulse",
            60,
        );
        assert_eq!(cache.entry_key("metals:spot_price"), "marketpulse:metals:spot_price");
        assert_eq!(
            cache.lock_key("metals:spot_price"),
            "marketpulse:metals:spot_price:refresh_lock"
        );
    }

    #[test]
    fn test_freshness_labels() {
        assert_eq!(Freshness::Fresh.as_str(), "fresh");
        assert_eq!(Freshness::Stale.as_str(), "stale");
    }
}
