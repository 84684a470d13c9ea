//! SWR 캐시 코어 동작 검증.
//!
//! 인메모리 스토어 위에서 신선도/축출/single-flight 불변식을 검증합니다.

use chrono::Utc;
use pulse_data::{
    CacheOutcome, CachePolicy, ComputeFn, Freshness, KeyValueStore, MemoryStore, MissMode,
    SwrCache,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PREFIX: &str = "test";
const LOCK_TTL: u64 = 60;

fn cache_over(store: Arc<dyn KeyValueStore>) -> SwrCache {
    SwrCache::new(store, PREFIX, LOCK_TTL)
}

/// 호출 횟수를 세는 계산 함수.
fn counting_compute(payload: Value, calls: Arc<AtomicU32>) -> ComputeFn {
    Arc::new(move || {
        let payload = payload.clone();
        let calls = Arc::clone(&calls);
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(payload)
        })
    })
}

/// 일정 시간 대기 후 결과를 내는 계산 함수.
fn slow_compute(payload: Value, delay: Duration, calls: Arc<AtomicU32>) -> ComputeFn {
    Arc::new(move || {
        let payload = payload.clone();
        let calls = Arc::clone(&calls);
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(payload)
        })
    })
}

fn failing_compute(calls: Arc<AtomicU32>) -> ComputeFn {
    Arc::new(move || {
        let calls = Arc::clone(&calls);
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(pulse_data::DataError::ComputeError(
                "업스트림 실패".to_string(),
            ))
        })
    })
}

/// 지정한 나이의 엔트리를 스토어에 직접 심는다.
async fn seed_entry(store: &dyn KeyValueStore, key: &str, payload: Value, age_secs: i64) {
    let entry = json!({
        "payload": payload,
        "computed_at": Utc::now().timestamp() - age_secs,
    });
    store
        .set_raw(&format!("{}:{}", PREFIX, key), &entry.to_string(), 86_400)
        .await
        .unwrap();
}

/// 백그라운드 재계산이 끝날 때까지 폴링.
async fn wait_until<F: Fn() -> bool>(cond: F) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("백그라운드 작업이 제한 시간 내에 끝나지 않음");
}

fn hit(outcome: CacheOutcome) -> (Value, Freshness) {
    match outcome {
        CacheOutcome::Hit {
            payload, freshness, ..
        } => (payload, freshness),
        CacheOutcome::WarmingUp => panic!("Hit을 기대했으나 WarmingUp"),
    }
}

#[tokio::test]
async fn test_cold_miss_computes_once_then_serves_fresh() {
    let cache = cache_over(Arc::new(MemoryStore::new()));
    let calls = Arc::new(AtomicU32::new(0));
    let policy = CachePolicy::new(300, 7200).unwrap();
    let compute = counting_compute(json!({"x": 1}), Arc::clone(&calls));

    // cold: 동기 계산
    let (payload, freshness) = hit(cache
        .get_or_compute("k", policy, Arc::clone(&compute), MissMode::Block)
        .await
        .unwrap());
    assert_eq!(payload, json!({"x": 1}));
    assert_eq!(freshness, Freshness::Fresh);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // 논리 TTL 이내: 계산 함수 호출 없이 캐시 반환
    let (payload, freshness) = hit(cache
        .get_or_compute("k", policy, Arc::clone(&compute), MissMode::Block)
        .await
        .unwrap());
    assert_eq!(payload, json!({"x": 1}));
    assert_eq!(freshness, Freshness::Fresh);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stale_entry_served_then_revalidated() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let cache = cache_over(Arc::clone(&store));
    let calls = Arc::new(AtomicU32::new(0));
    let policy = CachePolicy::new(300, 7200).unwrap();

    // 논리 TTL(300초)을 막 넘긴 엔트리
    seed_entry(store.as_ref(), "k", json!({"x": 1}), 301).await;

    let compute = counting_compute(json!({"x": 2}), Arc::clone(&calls));
    let (payload, freshness) = hit(cache
        .get_or_compute("k", policy, Arc::clone(&compute), MissMode::Block)
        .await
        .unwrap());

    // stale 사본이 즉시 반환되고 재계산은 뒤에서 돈다
    assert_eq!(payload, json!({"x": 1}));
    assert_eq!(freshness, Freshness::Stale);

    wait_until(|| calls.load(Ordering::SeqCst) == 1).await;

    // 재계산 완료 후에는 새 값이 fresh로 나온다
    for _ in 0..200 {
        let outcome = cache
            .get_or_compute("k", policy, Arc::clone(&compute), MissMode::Block)
            .await
            .unwrap();
        if matches!(
            outcome,
            CacheOutcome::Hit { ref payload, freshness: Freshness::Fresh, .. }
                if *payload == json!({"x": 2})
        ) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("재계산 결과가 캐시에 반영되지 않음");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stale_callers_spawn_single_recompute() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let cache = cache_over(Arc::clone(&store));
    let calls = Arc::new(AtomicU32::new(0));
    let policy = CachePolicy::new(300, 7200).unwrap();

    seed_entry(store.as_ref(), "k", json!({"x": 1}), 301).await;

    let compute = slow_compute(json!({"x": 2}), Duration::from_millis(100), Arc::clone(&calls));

    // 두 호출자가 동시에 stale 윈도우를 만난다
    let (a, b) = tokio::join!(
        cache.get_or_compute("k", policy, Arc::clone(&compute), MissMode::Block),
        cache.get_or_compute("k", policy, Arc::clone(&compute), MissMode::Block),
    );

    // 둘 다 블록 없이 stale 사본을 받는다
    let (payload_a, freshness_a) = hit(a.unwrap());
    let (payload_b, freshness_b) = hit(b.unwrap());
    assert_eq!(payload_a, json!({"x": 1}));
    assert_eq!(payload_b, json!({"x": 1}));
    assert_eq!(freshness_a, Freshness::Stale);
    assert_eq!(freshness_b, Freshness::Stale);

    // 재계산은 한 건만 기동된다
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_entry_older_than_physical_ttl_forces_cold_compute() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let cache = cache_over(Arc::clone(&store));
    let calls = Arc::new(AtomicU32::new(0));
    let policy = CachePolicy::new(300, 7200).unwrap();

    // 물리 TTL(7200초)보다 오래된 엔트리 — 스토어 축출이 늦은 상황
    seed_entry(store.as_ref(), "k", json!({"x": 1}), 7300).await;

    let compute = counting_compute(json!({"x": 9}), Arc::clone(&calls));
    let (payload, freshness) = hit(cache
        .get_or_compute("k", policy, compute, MissMode::Block)
        .await
        .unwrap());

    // stale 반환이 아니라 동기 cold 계산
    assert_eq!(payload, json!({"x": 9}));
    assert_eq!(freshness, Freshness::Fresh);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cold_failure_propagates_and_caches_nothing() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let cache = cache_over(Arc::clone(&store));
    let calls = Arc::new(AtomicU32::new(0));
    let policy = CachePolicy::new(300, 7200).unwrap();

    let result = cache
        .get_or_compute("k", policy, failing_compute(Arc::clone(&calls)), MissMode::Block)
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!store.exists(&format!("{}:k", PREFIX)).await.unwrap());
}

#[tokio::test]
async fn test_background_failure_keeps_stale_and_releases_lock() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let cache = cache_over(Arc::clone(&store));
    let calls = Arc::new(AtomicU32::new(0));
    let policy = CachePolicy::new(300, 7200).unwrap();

    seed_entry(store.as_ref(), "k", json!({"x": 1}), 301).await;

    let (payload, freshness) = hit(cache
        .get_or_compute("k", policy, failing_compute(Arc::clone(&calls)), MissMode::Block)
        .await
        .unwrap());
    assert_eq!(payload, json!({"x": 1}));
    assert_eq!(freshness, Freshness::Stale);

    wait_until(|| calls.load(Ordering::SeqCst) == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // 실패해도 stale 엔트리는 지워지지 않는다
    let raw = store.get_raw(&format!("{}:k", PREFIX)).await.unwrap().unwrap();
    let entry: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(entry["payload"], json!({"x": 1}));

    // 잠금이 해제되어 다음 시도가 가능하다
    assert!(store
        .acquire_lock(&format!("{}:k:refresh_lock", PREFIX), 60)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_nonblocking_miss_returns_warming_up() {
    let cache = cache_over(Arc::new(MemoryStore::new()));
    let calls = Arc::new(AtomicU32::new(0));
    let policy = CachePolicy::new(300, 7200).unwrap();
    let compute = slow_compute(json!({"x": 1}), Duration::from_millis(100), Arc::clone(&calls));

    // miss를 동기 해소하지 않는 모드: 즉시 warming_up
    let first = cache
        .get_or_compute("k", policy, Arc::clone(&compute), MissMode::Background)
        .await
        .unwrap();
    assert!(matches!(first, CacheOutcome::WarmingUp));

    // 재계산이 진행 중인 동안의 재요청도 warming_up (중복 기동 없음)
    let second = cache
        .get_or_compute("k", policy, Arc::clone(&compute), MissMode::Background)
        .await
        .unwrap();
    assert!(matches!(second, CacheOutcome::WarmingUp));

    wait_until(|| calls.load(Ordering::SeqCst) >= 1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // 완료 후에는 fresh hit
    let (payload, freshness) = hit(cache
        .get_or_compute("k", policy, compute, MissMode::Block)
        .await
        .unwrap());
    assert_eq!(payload, json!({"x": 1}));
    assert_eq!(freshness, Freshness::Fresh);
}

#[tokio::test]
async fn test_warm_skips_when_another_refresh_holds_lock() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let cache = cache_over(Arc::clone(&store));
    let calls = Arc::new(AtomicU32::new(0));
    let policy = CachePolicy::new(300, 7200).unwrap();

    // 다른 프로세스가 잡은 잠금을 흉내낸다
    store
        .acquire_lock(&format!("{}:k:refresh_lock", PREFIX), 60)
        .await
        .unwrap();

    let op = cache.wrap("k", policy, counting_compute(json!({"x": 1}), Arc::clone(&calls)));
    assert!(op.warm().await.unwrap().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_force_refresh_overwrites_fresh_entry() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let cache = cache_over(Arc::clone(&store));
    let policy = CachePolicy::new(300, 7200).unwrap();

    seed_entry(store.as_ref(), "k", json!({"x": 1}), 10).await;

    let op = cache.wrap(
        "k",
        policy,
        counting_compute(json!({"x": 2}), Arc::new(AtomicU32::new(0))),
    );
    let refreshed = op.force_refresh().await.unwrap();
    assert_eq!(refreshed, json!({"x": 2}));

    let (payload, freshness) = hit(op.get().await.unwrap());
    assert_eq!(payload, json!({"x": 2}));
    assert_eq!(freshness, Freshness::Fresh);
}
