//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/cn/*` - 중국 시장 (공포탐욕, 주도 지수, 국채)
//! - `/api/us/*` - 미국 시장 (히트, 주도 지수, 국채)
//! - `/api/metals/*` - 귀금속 (현물가, 금은비)
//! - `/api/funds/top` - 펀드 순위
//! - `/api/global/indices` - 글로벌 지수
//! - `/api/admin/scheduler/*` - 스케줄러 관리 (엄격한 레이트 리밋)

pub mod admin;
pub mod funds;
pub mod global;
pub mod health;
pub mod market_cn;
pub mod market_us;
pub mod metals;

use crate::state::AppState;
use axum::{Json, Router};
use pulse_core::envelope::ApiEnvelope;
use pulse_data::{CacheOutcome, CachedOp};
use std::sync::Arc;
use tracing::error;

pub use health::health_router;

/// 공개 데이터 라우터 조합.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/cn", market_cn::market_cn_router())
        .nest("/us", market_us::market_us_router())
        .nest("/metals", metals::metals_router())
        .nest("/funds", funds::funds_router())
        .nest("/global", global::global_router())
}

/// 캐시 연산 결과를 응답 envelope으로 변환합니다.
///
/// 호출자는 캐시 레이어의 원시 에러를 보지 않습니다. cold 경로
/// 계산 실패는 `error` envelope으로 접습니다.
pub(crate) async fn respond(op: &CachedOp) -> Json<ApiEnvelope> {
    match op.get().await {
        Ok(CacheOutcome::Hit {
            payload,
            freshness,
            computed_at,
        }) => Json(ApiEnvelope::ok_cached(
            payload,
            freshness.as_str(),
            Some(computed_at),
        )),
        Ok(CacheOutcome::WarmingUp) => Json(ApiEnvelope::warming_up()),
        Err(e) => {
            error!(key = op.key(), "데이터 조회 실패: {}", e);
            Json(ApiEnvelope::error("데이터를 가져오지 못했습니다"))
        }
    }
}

/// 논블로킹 모드 응답 변환 (cold miss 시 `warming_up`).
pub(crate) async fn respond_nonblocking(op: &CachedOp) -> Json<ApiEnvelope> {
    match op.get_nonblocking().await {
        Ok(CacheOutcome::Hit {
            payload,
            freshness,
            computed_at,
        }) => Json(ApiEnvelope::ok_cached(
            payload,
            freshness.as_str(),
            Some(computed_at),
        )),
        Ok(CacheOutcome::WarmingUp) => Json(ApiEnvelope::warming_up()),
        Err(e) => {
            error!(key = op.key(), "데이터 조회 실패: {}", e);
            Json(ApiEnvelope::error("데이터를 가져오지 못했습니다"))
        }
    }
}
