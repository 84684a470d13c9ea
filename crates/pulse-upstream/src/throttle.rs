//! 업스트림 호출 간격 제한.
//!
//! 공개 시세 엔드포인트는 짧은 간격의 연속 호출을 차단하는 경우가
//! 많아, 프로세스 전체에서 공유하는 최소 간격 게이트를 둡니다.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// 연속 호출 사이에 최소 간격을 강제하는 게이트.
///
/// 여러 태스크가 공유하며, `wait()`는 직전 호출로부터 최소 간격이
/// 지날 때까지 대기한 뒤 통과시킵니다.
pub struct ThrottleGate {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl ThrottleGate {
    /// 최소 간격(밀리초)으로 게이트 생성.
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval: Duration::from_millis(min_interval_ms),
            last_call: Mutex::new(None),
        }
    }

    /// 간격이 확보될 때까지 대기합니다.
    ///
    /// 잠금을 잡은 채로 대기하므로 뒤따르는 태스크도 순서대로
    /// 간격을 지키게 됩니다.
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}
