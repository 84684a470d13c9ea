//! 기본 예열 잡 구성.

use crate::calendar::TradeCalendar;
use crate::retry::run_with_retry;
use crate::scheduler::{JobFn, WarmupScheduler};
use chrono::NaiveTime;
use pulse_core::calendar::MarketPolicy;
use pulse_data::CachedOp;
use std::sync::Arc;
use tracing::{info, warn};

/// 시장 하나의 예열 잡 명세: 정책 + 그 시장에 속한 캐시 연산들.
pub struct MarketJobSpec {
    pub job_id: String,
    pub policy: MarketPolicy,
    pub ops: Vec<CachedOp>,
}

/// 여러 캐시 연산을 순차 예열하는 잡 본문.
///
/// 일부 키가 실패해도 나머지는 계속 진행하고, 실패 키 목록을
/// 에러 메시지로 합쳐 보고합니다.
pub fn market_warmup_fn(ops: Vec<CachedOp>) -> JobFn {
    let ops = Arc::new(ops);
    Arc::new(move || {
        let ops = Arc::clone(&ops);
        Box::pin(async move {
            let mut failed: Vec<String> = Vec::new();

            for op in ops.iter() {
                if let Err(e) = op.warm().await {
                    warn!(key = op.key(), "예열 실패: {}", e);
                    failed.push(op.key().to_string());
                }
            }

            if failed.is_empty() {
                Ok(())
            } else {
                Err(format!("예열 실패 키: {}", failed.join(", ")))
            }
        })
    })
}

/// 시장별 주기 잡과 개장 전 예열 잡을 등록합니다.
pub async fn register_default_jobs(
    scheduler: &WarmupScheduler,
    specs: Vec<MarketJobSpec>,
    calendar: Arc<TradeCalendar>,
    premarket_at: NaiveTime,
) {
    let mut premarket_ops: Vec<CachedOp> = Vec::new();

    for spec in specs {
        premarket_ops.extend(spec.ops.iter().cloned());
        scheduler
            .register_market_job(&spec.job_id, spec.policy, market_warmup_fn(spec.ops))
            .await;
    }

    scheduler
        .register_premarket_job(
            "premarket_warmup",
            premarket_at,
            calendar,
            market_warmup_fn(premarket_ops),
        )
        .await;
}

/// 기동 시 초기 예열.
///
/// 키별로 재시도하며, 실패해도 서비스 기동을 막지 않습니다.
pub async fn initial_warmup(ops: &[CachedOp], max_retries: u32) {
    info!(count = ops.len(), "초기 예열 시작");
    let mut succeeded = 0usize;

    for op in ops {
        if run_with_retry(op.key(), max_retries, || op.warm()).await {
            succeeded += 1;
        }
    }

    info!(succeeded, total = ops.len(), "초기 예열 완료");
}
