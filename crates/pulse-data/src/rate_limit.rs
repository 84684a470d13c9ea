//! API 레이트 리미터.
//!
//! 기본은 공유 스토어 기반 고정 윈도우(fixed window) 방식입니다.
//! 스토어에 접근할 수 없으면 요청을 허용합니다(fail open) —
//! 엄격한 집행보다 서비스 가용성을 우선합니다.
//!
//! 공유 스토어가 없는 배포를 위한 프로세스 내 슬라이딩 윈도우
//! 구현도 제공합니다 (분산 환경에서는 인스턴스 간 공유되지 않음).

use crate::store::KeyValueStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// 윈도우 길이 (초).
const WINDOW_SECS: i64 = 60;

/// 카운터 키 만료 (초). 윈도우보다 길게 잡아 윈도우 경계에서
/// 늦게 읽는 쪽이 방금 닫힌 윈도우를 여전히 볼 수 있게 한다.
const COUNTER_EXPIRE_SECS: u64 = 90;

/// 레이트 리밋 설정.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 분당 최대 요청 수
    pub requests_per_minute: u32,
    /// 네임스페이스 — 서로 다른 리미터 인스턴스의 키 충돌을 막는다
    pub namespace: String,
}

impl RateLimitConfig {
    /// 새 설정 생성.
    pub fn new(namespace: impl Into<String>, requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            namespace: namespace.into(),
        }
    }
}

/// 스토어 기반 고정 윈도우 리미터.
///
/// 60초 epoch 버킷마다 독립 카운터를 쓰며, 증가와 만료 갱신은
/// 스토어 파이프라인으로 원자 적용됩니다.
#[derive(Clone)]
pub struct FixedWindowLimiter {
    store: Arc<dyn KeyValueStore>,
    config: RateLimitConfig,
}

impl FixedWindowLimiter {
    /// 새 리미터 생성.
    pub fn new(store: Arc<dyn KeyValueStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    fn window_key(&self, client_id: &str, epoch_secs: i64) -> String {
        format!(
            "rate_limit:{}:{}:{}",
            self.config.namespace,
            client_id,
            epoch_secs / WINDOW_SECS
        )
    }

    /// 요청 허용 여부 확인 (카운터 증가 포함).
    pub async fn is_allowed(&self, client_id: &str) -> bool {
        self.is_allowed_at(client_id, Utc::now().timestamp()).await
    }

    /// 명시적 시각 기준 판정. 경계 테스트용으로 분리.
    pub async fn is_allowed_at(&self, client_id: &str, epoch_secs: i64) -> bool {
        if !self.store.is_connected() {
            return true; // Fail open
        }

        let key = self.window_key(client_id, epoch_secs);
        match self.store.incr_with_expire(&key, COUNTER_EXPIRE_SECS).await {
            Ok(count) => count <= i64::from(self.config.requests_per_minute),
            Err(e) => {
                warn!(namespace = %self.config.namespace, "레이트 리미터 스토어 오류, 허용 처리: {}", e);
                true // Fail open
            }
        }
    }

    /// 현재 윈도우의 잔여 허용량.
    pub async fn remaining(&self, client_id: &str) -> u32 {
        if !self.store.is_connected() {
            return self.config.requests_per_minute;
        }

        let key = self.window_key(client_id, Utc::now().timestamp());
        let count = match self.store.get_raw(&key).await {
            Ok(Some(raw)) => raw.parse::<i64>().unwrap_or(0),
            Ok(None) => 0,
            Err(_) => return self.config.requests_per_minute,
        };

        let limit = i64::from(self.config.requests_per_minute);
        (limit - count).max(0) as u32
    }
}

/// 프로세스 내 슬라이딩 윈도우 리미터.
///
/// 클라이언트별 타임스탬프 목록을 유지하고 매 검사 시 최근 60초
/// 밖의 항목을 잘라냅니다. 여러 요청 처리 컨텍스트에서 접근되므로
/// 뮤텍스로 보호합니다. 단일 프로세스 전용입니다.
///
/// 서버 배선은 Redis가 없어도 `MemoryStore` 위의
/// `FixedWindowLimiter`를 쓰므로 이 구현은 스토어 추상화 자체를
/// 쓸 수 없는 임베딩 환경을 위한 대안입니다.
pub struct SlidingWindowLimiter {
    requests_per_minute: usize,
    clients: Mutex<HashMap<String, Vec<Instant>>>,
    last_cleanup: Mutex<Instant>,
    cleanup_interval: Duration,
}

impl SlidingWindowLimiter {
    /// 새 리미터 생성.
    pub fn new(requests_per_minute: usize) -> Self {
        Self {
            requests_per_minute,
            clients: Mutex::new(HashMap::new()),
            last_cleanup: Mutex::new(Instant::now()),
            cleanup_interval: Duration::from_secs(300),
        }
    }

    /// 요청 허용 여부 확인.
    pub async fn is_allowed(&self, client_id: &str) -> bool {
        let now = Instant::now();
        self.maybe_cleanup(now).await;

        let mut clients = self.clients.lock().await;
        let window = clients.entry(client_id.to_string()).or_default();

        let cutoff = now - Duration::from_secs(WINDOW_SECS as u64);
        window.retain(|t| *t > cutoff);

        if window.len() >= self.requests_per_minute {
            return false;
        }
        window.push(now);
        true
    }

    /// 잔여 허용량.
    pub async fn remaining(&self, client_id: &str) -> usize {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;

        let Some(window) = clients.get_mut(client_id) else {
            return self.requests_per_minute;
        };

        let cutoff = now - Duration::from_secs(WINDOW_SECS as u64);
        window.retain(|t| *t > cutoff);
        self.requests_per_minute.saturating_sub(window.len())
    }

    /// 주기적으로 빈 클라이언트 항목을 정리합니다.
    async fn maybe_cleanup(&self, now: Instant) {
        let mut last = self.last_cleanup.lock().await;
        if now.duration_since(*last) < self.cleanup_interval {
            return;
        }
        *last = now;
        drop(last);

        let cutoff = now - Duration::from_secs(WINDOW_SECS as u64);
        let mut clients = self.clients.lock().await;
        clients.retain(|_, window| {
            window.retain(|t| *t > cutoff);
            !window.is_empty()
        });
    }
}
