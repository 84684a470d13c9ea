//! 예열 작업용 재시도 헬퍼.
//!
//! 업스트림 호출 재시도와 달리 스케줄러 레벨의 재시도는 결과를
//! 성공 여부로만 보고합니다. 기동 시 예열이 실패해도 서비스는
//! 계속 떠야 하므로 에러를 전파하지 않습니다.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// 지수 백오프로 작업을 재시도하고 최종 성공 여부를 반환합니다.
///
/// 대기 시간은 `1s × 2^attempt` 고정입니다. 예열은 서로 다른 키를
/// 순차 처리하므로 재시도 시점이 겹칠 일이 없어 지터를 두지 않습니다.
pub async fn run_with_retry<T, E, F, Fut>(name: &str, max_retries: u32, op: F) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    for attempt in 0..=max_retries {
        match op().await {
            Ok(_) => {
                if attempt > 0 {
                    info!(name, attempt, "재시도 후 성공");
                }
                return true;
            }
            Err(e) if attempt < max_retries => {
                let delay = Duration::from_secs(1 << attempt.min(16));
                warn!(
                    name,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "작업 실패, 재시도 예정: {}",
                    e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(name, "작업 재시도 소진: {}", e);
            }
        }
    }
    false
}
