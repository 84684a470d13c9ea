//! 업스트림 호출 재시도 헬퍼.

use crate::error::Result;
use crate::throttle::ThrottleGate;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// 재시도 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최초 시도 이후 추가 재시도 횟수
    pub max_retries: u32,
    /// 첫 재시도 전 기본 대기 시간
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// 지수 백오프 대기 시간 계산.
///
/// `base × 2^attempt`에 0.5~1.5배 지터를 곱합니다. 여러 작업이 같은
/// 주기로 실패했을 때 재시도가 한 시점에 몰리는 것을 막습니다.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let jitter: f64 = rand::thread_rng().gen_range(0.5..1.5);
    let secs = base.as_secs_f64() * f64::from(1u32 << attempt.min(16)) * jitter;
    Duration::from_secs_f64(secs)
}

/// 일시적 에러에 한해 재시도하며 업스트림 호출을 실행합니다.
///
/// - [`UpstreamError::is_transient`]가 참인 실패만 재시도합니다.
///   형태 불일치/HTTP 상태 에러는 즉시 반환됩니다.
/// - `throttle`이 주어지면 매 시도 전에 게이트를 통과합니다
///   (재시도도 최소 호출 간격을 지킵니다).
pub async fn call_with_retry<T, F, Fut>(
    name: &str,
    config: &RetryConfig,
    throttle: Option<&ThrottleGate>,
    op: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        if let Some(gate) = throttle {
            gate.wait().await;
        }

        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(name, attempt, "업스트림 호출 재시도 성공");
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() => {
                warn!(name, "업스트림 호출 실패 (재시도 불가): {}", e);
                return Err(e);
            }
            Err(e) if attempt >= config.max_retries => {
                warn!(name, attempt, "업스트림 호출 재시도 소진: {}", e);
                return Err(e);
            }
            Err(e) => {
                let delay = backoff_delay(config.base_delay, attempt);
                warn!(
                    name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "업스트림 호출 일시 실패, 재시도 예정: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
